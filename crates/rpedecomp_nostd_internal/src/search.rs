use crate::parallel::LaneGroup;

/// Below this many candidate lanes, [`LaneGroup::multisearch`] stops
/// bisecting and scans the remaining candidates linearly.
pub const MULTISEARCH_LINEAR_CUTOFF: usize = 6;

/// The outcome of one lane's search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchResult<T> {
    /// the index of the first lane whose hay value is strictly greater than
    /// the needle, or `W` when there is no such lane
    pub lane_index: usize,
    /// the hay value held by `lane_index` (`None` when `lane_index == W`)
    pub value: Option<T>,
}

impl<const W: usize> LaneGroup<W> {
    /// Every lane searches the hay values (one per lane) for the first one
    /// strictly greater than its own needle.
    ///
    /// The hay values must already be sorted in increasing lane order; this
    /// isn't checked. All lanes bisect in lockstep, reading hay values from
    /// other lanes with a shuffle, until their candidate interval holds no
    /// more than [`MULTISEARCH_LINEAR_CUTOFF`] lanes. Then each lane scans its
    /// interval.
    pub fn multisearch<T: Copy + PartialOrd>(
        &self,
        needles: &[T; W],
        hay: &[T; W],
    ) -> [SearchResult<T>; W] {
        // the answer for each lane always lies in `lower..=upper`
        let mut lower = [0_usize; W];
        let mut upper = [W; W];

        loop {
            let still_bisecting: [bool; W] =
                core::array::from_fn(|lane| upper[lane] - lower[lane] > MULTISEARCH_LINEAR_CUTOFF);
            if self.none_satisfy(&still_bisecting) {
                break;
            }
            let probe_lanes: [usize; W] =
                core::array::from_fn(|lane| lower[lane] + (upper[lane] - lower[lane]) / 2);
            let probed = self.shuffle(hay, &probe_lanes);
            for lane in 0..W {
                if still_bisecting[lane] {
                    if probed[lane] > needles[lane] {
                        upper[lane] = probe_lanes[lane];
                    } else {
                        lower[lane] = probe_lanes[lane] + 1;
                    }
                }
            }
        }

        core::array::from_fn(|lane| {
            let mut candidate = lower[lane];
            while candidate < upper[lane] && !(self.get_from_lane(hay, candidate) > needles[lane]) {
                candidate += 1;
            }
            SearchResult {
                lane_index: candidate,
                value: (candidate < W).then(|| self.get_from_lane(hay, candidate)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multisearch_small_group() {
        let group = LaneGroup::<4>::new();
        let hay = [10, 20, 30, 40];
        let results = group.multisearch(&hay, &hay);
        let lanes: [usize; 4] = core::array::from_fn(|lane| results[lane].lane_index);
        let values: [Option<i32>; 4] = core::array::from_fn(|lane| results[lane].value);
        assert_eq!(lanes, [1, 2, 3, 4]);
        assert_eq!(values, [Some(20), Some(30), Some(40), None]);
    }

    #[test]
    fn multisearch_matches_partition_point() {
        // 32 lanes exercise the bisection phase before the linear cutoff
        let group = LaneGroup::<32>::new();
        let hay: [u32; 32] = core::array::from_fn(|lane| 3 * (lane as u32 / 2));
        let needles: [u32; 32] = core::array::from_fn(|lane| (lane as u32 * 7) % 50);
        let results = group.multisearch(&needles, &hay);
        for lane in 0..32 {
            let expected = hay.partition_point(|&h| h <= needles[lane]);
            assert_eq!(results[lane].lane_index, expected, "lane {lane}");
            assert_eq!(results[lane].value, hay.get(expected).copied());
        }
    }

    #[test]
    fn multisearch_needle_below_everything() {
        let group = LaneGroup::<16>::new();
        let hay: [i64; 16] = core::array::from_fn(|lane| lane as i64);
        let results = group.multisearch(&[-5; 16], &hay);
        assert!(results.iter().all(|r| r.lane_index == 0 && r.value == Some(0)));
    }
}
