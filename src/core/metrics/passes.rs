use super::Overflow;
use crate::core::model::round_ratio;

#[derive(Clone, Debug, Default)]
pub struct PassAgg {
    pub sum_passes: u64,
    pub pass_count: u64,
}

impl PassAgg {
    pub fn observe(&mut self, passes: Option<u64>) -> Result<(), Overflow> {
        if let Some(p) = passes {
            self.sum_passes = self
                .sum_passes
                .checked_add(p)
                .ok_or(Overflow("total pass count"))?;
            self.pass_count += 1;
        }
        Ok(())
    }

    pub fn mean(&self) -> u64 {
        round_ratio(self.sum_passes, self.pass_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_passes_do_not_dilute_the_mean() {
        let mut agg = PassAgg::default();
        for p in [Some(2), None, Some(4), None, Some(6), Some(8)] {
            agg.observe(p).unwrap();
        }
        assert_eq!(agg.pass_count, 4);
        assert_eq!(agg.mean(), 5);
    }

    #[test]
    fn explicit_zero_passes_count() {
        let mut agg = PassAgg::default();
        agg.observe(Some(0)).unwrap();
        agg.observe(Some(5)).unwrap();
        assert_eq!(agg.mean(), 3);
    }

    #[test]
    fn no_passes_is_zero() {
        let mut agg = PassAgg::default();
        agg.observe(None).unwrap();
        assert_eq!(agg.mean(), 0);
    }

    #[test]
    fn pass_sum_overflow_is_rejected() {
        let mut agg = PassAgg::default();
        agg.observe(Some(u64::MAX)).unwrap();
        assert_eq!(agg.observe(Some(1)), Err(Overflow("total pass count")));
        assert_eq!(agg.pass_count, 1);
        assert_eq!(agg.observe(None), Ok(()));
    }
}
