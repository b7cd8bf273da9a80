use super::Overflow;
use super::histogram::StreamingHistogram;
use std::ops::ControlFlow;

#[derive(Clone, Debug, Default)]
pub struct LengthAgg {
    pub hist: StreamingHistogram,
    pub total_bases: u64,
    pub read_count: u64,
}

impl LengthAgg {
    pub fn observe(&mut self, length: u64) -> Result<(), Overflow> {
        self.total_bases = self
            .total_bases
            .checked_add(length)
            .ok_or(Overflow("total read length"))?;
        self.hist.increment(length);
        self.read_count += 1;
        Ok(())
    }

    pub fn average(&self) -> u64 {
        if self.read_count == 0 {
            0
        } else {
            self.total_bases / self.read_count
        }
    }

    pub fn n50(&self) -> u64 {
        if self.hist.is_empty() {
            return 0;
        }
        let total = self.total_bases;
        // run >= total / 2, kept in integers
        self.hist
            .descending_cumulative_scan(|len, _, run| {
                if run.saturating_mul(2) >= total {
                    ControlFlow::Break(len)
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg_of(lengths: &[u64]) -> LengthAgg {
        let mut agg = LengthAgg::default();
        for &l in lengths {
            agg.observe(l).unwrap();
        }
        agg
    }

    #[test]
    fn totals_and_average() {
        let agg = agg_of(&[100, 200, 300, 401]);
        assert_eq!(agg.total_bases, 1001);
        assert_eq!(agg.read_count, 4);
        assert_eq!(agg.average(), 250);
        assert_eq!(agg.hist.total_count(), 4);
    }

    #[test]
    fn n50_crosses_half_in_descending_order() {
        assert_eq!(agg_of(&[100, 200, 300, 400]).n50(), 300);
        assert_eq!(agg_of(&[1000]).n50(), 1000);
        // exactly half counts as reached
        assert_eq!(agg_of(&[10, 10, 20]).n50(), 20);
        assert_eq!(agg_of(&[2, 3, 4, 5, 6, 7, 8, 9, 10]).n50(), 8);
    }

    #[test]
    fn zero_length_reads_are_counted() {
        let agg = agg_of(&[0, 0, 0]);
        assert_eq!(agg.read_count, 3);
        assert_eq!(agg.total_bases, 0);
        assert_eq!(agg.average(), 0);
        assert_eq!(agg.n50(), 0);
    }

    #[test]
    fn empty_is_zero() {
        let agg = LengthAgg::default();
        assert_eq!(agg.average(), 0);
        assert_eq!(agg.n50(), 0);
    }

    #[test]
    fn base_total_overflow_is_rejected() {
        let mut agg = LengthAgg::default();
        agg.observe(u64::MAX / 2 + 1).unwrap();
        assert_eq!(
            agg.observe(u64::MAX / 2 + 1),
            Err(Overflow("total read length"))
        );
        assert_eq!(agg.read_count, 1);
        assert_eq!(agg.hist.total_count(), 1);
        assert_eq!(agg.total_bases, u64::MAX / 2 + 1);
    }
}
