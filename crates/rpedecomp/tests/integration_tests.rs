use rpedecomp::{
    AbsoluteColumn, DeviceProperties, Decompressor, ExecutionMode, RelativeColumn, UnsignedWord,
};

mod common;

fn serial_decompressor() -> Decompressor {
    Decompressor::builder()
        .execution_mode(ExecutionMode::Serial)
        .build()
        .unwrap()
}

fn check_both_forms<V: UnsignedWord>(values: &[V], anchoring_period: usize) {
    let decompressor = serial_decompressor();

    let absolute = AbsoluteColumn::<u32, u64, V>::encode(values, anchoring_period).unwrap();
    let mut out = vec![V::max_value(); values.len()];
    let report = decompressor.decompress_into(&absolute, &mut out).unwrap();
    assert_eq!(out, values, "absolute, period {anchoring_period}");
    assert_eq!(report.positions_written, values.len());

    let relative = RelativeColumn::<u64, u32, V>::encode(values, anchoring_period).unwrap();
    let mut out = vec![V::max_value(); values.len()];
    let report = decompressor.decompress_into(&relative, &mut out).unwrap();
    assert_eq!(out, values, "relative, period {anchoring_period}");
    assert_eq!(report.positions_written, values.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_written_column() {
        common::init_logging();
        #[rustfmt::skip]
        let values: [u32; 20] = [
            3, 3, 3, 3, 3, 3, 3,
            8,
            9, 9,
            0, 0, 0, 0, 0, 0, 0, 0, 0,
            2,
        ];
        for anchoring_period in [1, 2, 3, 7, 8, 19, 20, 64] {
            check_both_forms(&values, anchoring_period);
        }
    }

    #[test]
    fn empty_and_single_value_columns() {
        common::init_logging();
        check_both_forms::<u32>(&[], 4);
        check_both_forms::<u16>(&[42], 1);
        check_both_forms::<u64>(&[u64::MAX], 16);
    }

    #[test]
    fn random_columns_every_value_width() {
        common::init_logging();
        for (seed, period) in [(1_u64, 31_usize), (2, 64), (3, 100), (4, 257), (5, 1000)] {
            check_both_forms(&common::random_runs::<u16>(seed, 3001, 12), period);
            check_both_forms(&common::random_runs::<u32>(seed, 2048, 40), period);
            check_both_forms(&common::random_runs::<u64>(seed, 999, 3), period);
        }
    }

    #[test]
    fn one_run_covers_everything() {
        common::init_logging();
        let values = vec![17_u16; 1001];
        let column = RelativeColumn::<u32, u32, u16>::encode(&values, 50).unwrap();
        assert_eq!(column.num_runs(), 1);
        assert!(column.position_anchors().iter().all(|&anchor| anchor == 0));
        check_both_forms(&values, 50);
    }

    #[test]
    fn wide_lane_groups() {
        common::init_logging();
        let device = DeviceProperties {
            lane_group_width: 64,
            ..DeviceProperties::default()
        };
        let decompressor = Decompressor::builder().device(device).build().unwrap();
        let values = common::random_runs::<u32>(11, 5000, 25);
        let column = AbsoluteColumn::<u64, u64, u32>::encode(&values, 300).unwrap();
        assert_eq!(decompressor.decompress(&column).unwrap(), values);
    }

    #[test]
    fn validated_parts_decompress() {
        common::init_logging();
        let column = RelativeColumn::<u32, u32, u32>::from_parts(
            vec![10, 20, 30, 40],
            // absolute starts: 0, 3, 8, 9
            vec![0, 3, 0, 1],
            vec![0, 2],
            8,
            12,
        )
        .unwrap();
        let decompressed = serial_decompressor().decompress(&column).unwrap();
        assert_eq!(decompressed, [10, 10, 10, 20, 20, 20, 20, 20, 30, 40, 40, 40]);
    }
}
