use super::histogram::StreamingHistogram;
use crate::core::model::rounded_quality;
use std::ops::ControlFlow;

#[derive(Clone, Debug, Default)]
pub struct QualityAgg {
    pub hist: StreamingHistogram,
    pub quality_count: u64,
}

impl QualityAgg {
    pub fn observe(&mut self, accuracy: f64) {
        self.hist.increment(rounded_quality(accuracy));
        self.quality_count += 1;
    }

    pub fn median(&self) -> u64 {
        let n = self.quality_count;
        debug_assert_eq!(self.hist.total_count(), n);
        if n == 0 {
            return 0;
        }
        let mid = n.div_ceil(2);
        self.hist
            .ascending_cumulative_scan(|q, _, cum| {
                if cum >= mid {
                    ControlFlow::Break(q)
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap_or(0)
    }
}
