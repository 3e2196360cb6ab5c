use rpedecomp::{
    AbsoluteColumn, Executor, GridParam, RayonExecutor, RelativeColumn, SegmentReport,
    SerialExecutor,
};

mod common;

/// drive every segment with both executors and compare the results
fn compare_executors<const W: usize>(values: &[u32], anchoring_period: usize, work_group_size: usize) {
    let column = RelativeColumn::<u32, u32, u32>::encode(values, anchoring_period).unwrap();
    let view = column.view().unwrap();
    let grid = GridParam {
        work_group_size,
        num_work_groups: view.num_anchors(),
    };

    let mut serial_out = vec![0_u32; values.len()];
    let serial_report = SerialExecutor
        .drive_decompress::<_, _, _, true, W>(&view, &grid, &mut serial_out)
        .unwrap();
    let mut rayon_out = vec![0_u32; values.len()];
    let rayon_report = RayonExecutor
        .drive_decompress::<_, _, _, true, W>(&view, &grid, &mut rayon_out)
        .unwrap();

    assert_eq!(serial_out, values);
    assert_eq!(rayon_out, serial_out);
    assert_eq!(serial_report, rayon_report);
    assert_eq!(serial_report.positions_written, values.len());
}

#[test]
fn executors_agree() {
    common::init_logging();
    let values = common::random_runs::<u32>(7, 10_000, 30);
    compare_executors::<32>(&values, 512, 64);
    compare_executors::<32>(&values, 100, 32);
    compare_executors::<8>(&values, 77, 24);
    compare_executors::<64>(&values, 4096, 64);
}

#[test]
fn lane_groups_share_nothing() {
    // any multiple of the lane-group width is a valid work-group size, and
    // it never changes the output
    common::init_logging();
    let values = common::random_runs::<u32>(3, 3000, 5);
    for work_group_size in [8, 16, 40, 128, 512] {
        compare_executors::<8>(&values, 250, work_group_size);
    }
}

#[test]
fn grid_is_validated() {
    common::init_logging();
    let values = common::random_runs::<u32>(5, 100, 4);
    let column = AbsoluteColumn::<u32, u32, u32>::encode(&values, 10).unwrap();
    let view = column.view().unwrap();
    let mut out = vec![0_u32; 100];

    let not_a_multiple = GridParam {
        work_group_size: 48,
        num_work_groups: 10,
    };
    assert!(
        SerialExecutor
            .drive_decompress::<_, _, _, false, 32>(&view, &not_a_multiple, &mut out)
            .is_err()
    );

    let too_few_work_groups = GridParam {
        work_group_size: 32,
        num_work_groups: 9,
    };
    assert!(
        RayonExecutor
            .drive_decompress::<_, _, _, false, 32>(&view, &too_few_work_groups, &mut out)
            .is_err()
    );

    let valid = GridParam {
        work_group_size: 32,
        num_work_groups: 10,
    };
    let mut short = vec![0_u32; 99];
    assert!(
        SerialExecutor
            .drive_decompress::<_, _, _, false, 32>(&view, &valid, &mut short)
            .is_err()
    );
    let report: SegmentReport = SerialExecutor
        .drive_decompress::<_, _, _, false, 32>(&view, &valid, &mut out)
        .unwrap();
    assert_eq!(report.positions_written, 100);
    assert_eq!(out, values);
}
