/*!
Decompresses columns of fixed-width unsigned integers that were compressed
with Run-Position Encoding (RPE), using kernels that are written in terms of
lane-groups (the portable analogue of a GPU Warp).

<div class="warning">

The kernels are currently executed on the CPU (by emulating the lanes of
each lane-group). They are written so that they can be ported to a GPU
backend without changing their structure.

</div>

# High-Level: Run-Position Encoding

A column is stored as a table of runs (each run is a value plus the position
where the run starts) together with a table of position anchors. Every
`anchoring_period` positions, an anchor records the index of the run that
covers that position. The anchors split the output into independent
segments, which lets each segment be decompressed by its own work-group
without consulting any other segment.

Run start positions are either absolute (positions in the uncompressed
column) or relative (offsets from the start of the segment in which the run
starts). Relative positions only need to be wide enough to hold the
anchoring period.

# User Guide

Columns are built with [`EncodedColumn::encode`] (or validated with
[`EncodedColumn::from_parts`]) and decompressed with a [`Decompressor`]:

```
use rpedecomp::{Decompressor, RelativeColumn};

let values: Vec<u32> = vec![4, 4, 4, 9, 9, 1, 1, 1, 1, 7];
let column = RelativeColumn::<u32, u32, u32>::encode(&values, 4).unwrap();
let decompressor = Decompressor::builder().build().unwrap();
assert_eq!(decompressor.decompress(&column).unwrap(), values);
```

Columns that only exist as raw byte buffers can be decompressed through
[`Decompressor::decompress_raw`], which picks the kernel variant for the
buffers' widths from a [`KernelRegistry`].

# Developer Guide

See the crate-level documentation for [`rpedecomp_nostd_internal`].

*/

#![deny(rustdoc::broken_intra_doc_links)]

// inform build-system of the modules in this package
mod decompress;
mod encode;
mod error;
mod launch;
mod parallel_rayon;
mod parallel_serial;
mod registry;

// pull in symbols that are visible outside of the package
pub use decompress::{Decompressor, DecompressorBuilder, ExecutionMode};
pub use encode::{AbsoluteColumn, EncodedColumn, RelativeColumn};
pub use error::Error;
pub use launch::{
    DeviceProperties, KernelArgument, KernelArguments, LaunchConfig, resolve_launch_config,
};
pub use parallel_rayon::RayonExecutor;
pub use parallel_serial::SerialExecutor;
pub use registry::{KernelRegistry, WidthCombination};
pub use rpedecomp_nostd_internal::{
    Executor, GridParam, LANE_GROUP_WIDTH, RpeColumnView, SegmentDescriptor, SegmentReport,
    UnsignedWord,
};
