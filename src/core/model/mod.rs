// accuracy >= 1.0 is pulled back by this much before the log
pub const ACCURACY_EPS: f64 = 1e-12;

// secondary | supplementary
pub const DEFAULT_EXCLUDE_FLAGS: u16 = 0x900;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputFormat {
    Auto,
    ReadStats,
    Sam,
}

impl InputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            InputFormat::Auto => "auto",
            InputFormat::ReadStats => "readstats",
            InputFormat::Sam => "sam",
        }
    }
}

// Reads without an accuracy are dropped by the producer and never get here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReadRecord {
    pub length: u64,
    pub accuracy: f64,
    pub passes: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WellSummary {
    pub total_bases: u64,
    pub read_count: u64,
    pub average_length: u64,
    pub n50: u64,
    pub mean_passes: u64,
    pub median_quality: u64,
}

// -10 * log10(1 - accuracy), unrounded
pub fn phred_from_accuracy(accuracy: f64) -> f64 {
    let acc = if accuracy >= 1.0 {
        1.0 - ACCURACY_EPS
    } else {
        accuracy
    };
    -10.0 * (1.0 - acc).log10()
}

pub fn rounded_quality(accuracy: f64) -> u64 {
    let q = (phred_from_accuracy(accuracy) + 0.5).floor();
    if q <= 0.0 { 0 } else { q as u64 }
}

pub fn round_ratio(sum: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u64
}
