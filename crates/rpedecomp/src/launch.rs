//! Named kernel arguments and the choice of launch grid

use crate::error::Error;
use log::debug;
use rpedecomp_nostd_internal::{GridParam, LANE_GROUP_WIDTH, WriteSlack};
use std::collections::HashMap;

/// The device limits that the launch grid has to respect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceProperties {
    pub lane_group_width: usize,
    pub max_threads_per_work_group: usize,
    pub max_work_groups: usize,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        DeviceProperties {
            lane_group_width: LANE_GROUP_WIDTH,
            max_threads_per_work_group: 1024,
            max_work_groups: i32::MAX as usize,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    pub num_work_groups: usize,
    /// in lanes
    pub work_group_size: usize,
}

impl LaunchConfig {
    pub fn grid_param(&self) -> GridParam {
        GridParam {
            work_group_size: self.work_group_size,
            num_work_groups: self.num_work_groups,
        }
    }
}

/// A single type-erased kernel argument
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelArgument<'a> {
    Size(usize),
    Flag(bool),
    Buffer(&'a [u8]),
}

impl KernelArgument<'_> {
    fn type_name(&self) -> &'static str {
        match self {
            KernelArgument::Size(_) => "a size",
            KernelArgument::Flag(_) => "a flag",
            KernelArgument::Buffer(_) => "a buffer",
        }
    }
}

/// Kernel arguments, looked up by name
#[derive(Clone, Debug, Default)]
pub struct KernelArguments<'a> {
    args: HashMap<String, KernelArgument<'a>>,
}

impl<'a> KernelArguments<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, arg: KernelArgument<'a>) -> Self {
        self.insert(name, arg);
        self
    }

    /// returns the argument previously stored under `name`, if any
    pub fn insert(&mut self, name: &str, arg: KernelArgument<'a>) -> Option<KernelArgument<'a>> {
        self.args.insert(name.to_owned(), arg)
    }

    pub fn get(&self, name: &str) -> Option<KernelArgument<'a>> {
        self.args.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<KernelArgument<'a>, Error> {
        self.get(name)
            .ok_or_else(|| Error::kernel_argument(name, "the argument is missing"))
    }

    fn mistyped(name: &str, expected: &str, actual: &KernelArgument) -> Error {
        Error::kernel_argument(
            name,
            format!("expected {expected}, but got {}", actual.type_name()),
        )
    }

    pub fn size(&self, name: &str) -> Result<usize, Error> {
        match self.require(name)? {
            KernelArgument::Size(value) => Ok(value),
            other => Err(Self::mistyped(name, "a size", &other)),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool, Error> {
        match self.require(name)? {
            KernelArgument::Flag(value) => Ok(value),
            other => Err(Self::mistyped(name, "a flag", &other)),
        }
    }

    pub fn buffer(&self, name: &str) -> Result<&'a [u8], Error> {
        match self.require(name)? {
            KernelArgument::Buffer(bytes) => Ok(bytes),
            other => Err(Self::mistyped(name, "a buffer", &other)),
        }
    }

    /// The uncompressed length, which may be passed as either
    /// `"length_in_elements"` or `"length"`
    pub fn length(&self) -> Result<usize, Error> {
        if self.args.contains_key("length_in_elements") {
            self.size("length_in_elements")
        } else {
            self.size("length")
        }
    }
}

/// Choose the launch grid for decompressing the column described by `args`.
///
/// There is one work-group per anchored segment. The work-group is given
/// enough lanes to perform all of a segment's packed writes at once, but no
/// more than 2 lane-groups: every lane-group repeats the run search
/// independently, so extra lane-groups cost more than they save.
pub fn resolve_launch_config(
    device: &DeviceProperties,
    args: &KernelArguments,
    value_size: usize,
) -> Result<LaunchConfig, Error> {
    launch_config_for(
        device,
        args.length()?,
        args.size("position_anchoring_period")?,
        value_size,
    )
}

/// [`resolve_launch_config`] for callers that already hold the sizes
pub(crate) fn launch_config_for(
    device: &DeviceProperties,
    length: usize,
    anchoring_period: usize,
    value_size: usize,
) -> Result<LaunchConfig, Error> {
    if anchoring_period == 0 {
        return Err(Error::anchoring_period());
    }
    let lane_group_width = device.lane_group_width;
    if lane_group_width == 0 {
        return Err(Error::launch_configuration(
            "the lane-group width is zero".to_owned(),
        ));
    }

    let num_work_groups = length.div_ceil(anchoring_period);
    if num_work_groups > device.max_work_groups {
        return Err(Error::launch_configuration(format!(
            "{num_work_groups} work-groups are needed, but the device allows at most {}",
            device.max_work_groups
        )));
    }

    let device_max = (device.max_threads_per_work_group / lane_group_width) * lane_group_width;
    if device_max == 0 {
        return Err(Error::launch_configuration(format!(
            "a work-group of at most {} lanes can't hold a lane-group of {lane_group_width} lanes",
            device.max_threads_per_work_group
        )));
    }

    let packing_factor = WriteSlack::packing_factor_for_size(value_size);
    let writes_per_segment = anchoring_period.div_ceil(packing_factor);
    let work_group_size = writes_per_segment
        .min(2 * lane_group_width)
        .div_ceil(lane_group_width)
        * lane_group_width;
    let config = LaunchConfig {
        num_work_groups,
        work_group_size: work_group_size.min(device_max),
    };
    debug!(
        "launch config for {length} elements (anchoring period {anchoring_period}, \
         {value_size}-byte values): {config:?}"
    );
    Ok(config)
}
