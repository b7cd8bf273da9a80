use crate::core::model::{ReadRecord, WellSummary};
use thiserror::Error;

mod histogram;
mod length;
mod passes;
mod quality;

use length::LengthAgg;
use passes::PassAgg;
use quality::QualityAgg;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{0} does not fit in 64 bits")]
pub struct Overflow(pub &'static str);

#[derive(Clone, Debug, Default)]
pub struct WellAgg {
    lengths: LengthAgg,
    quality: QualityAgg,
    passes: PassAgg,
}

impl WellAgg {
    pub fn new() -> Self {
        Self::default()
    }

    // After an error the aggregators are inconsistent and the well must be dropped.
    pub fn observe(&mut self, read: &ReadRecord) -> Result<(), Overflow> {
        self.lengths.observe(read.length)?;
        self.passes.observe(read.passes)?;
        self.quality.observe(read.accuracy);
        Ok(())
    }

    pub fn read_count(&self) -> u64 {
        self.lengths.read_count
    }

    pub fn total_bases(&self) -> u64 {
        self.lengths.total_bases
    }

    pub fn distinct_lengths(&self) -> usize {
        self.lengths.hist.distinct_keys()
    }

    pub fn finalize(self) -> WellSummary {
        WellSummary {
            total_bases: self.lengths.total_bases,
            read_count: self.lengths.read_count,
            average_length: self.lengths.average(),
            n50: self.lengths.n50(),
            mean_passes: self.passes.mean(),
            median_quality: self.quality.median(),
        }
    }
}
