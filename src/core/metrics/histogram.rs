use std::collections::BTreeMap;
use std::ops::ControlFlow;

// Keys below this live in a flat vector, larger ones in the tree.
pub const DENSE_LIMIT: u64 = 1 << 20;

#[derive(Clone, Debug, Default)]
pub struct StreamingHistogram {
    dense: Vec<u64>,
    sparse: BTreeMap<u64, u64>,
    total: u64,
}

impl StreamingHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: u64) {
        if key < DENSE_LIMIT {
            let idx = key as usize;
            if self.dense.len() <= idx {
                self.dense.resize(idx + 1, 0);
            }
            self.dense[idx] += 1;
        } else {
            *self.sparse.entry(key).or_insert(0) += 1;
        }
        self.total += 1;
    }

    pub fn total_count(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn distinct_keys(&self) -> usize {
        self.dense.iter().filter(|&&c| c > 0).count() + self.sparse.len()
    }

    pub fn iter_asc(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.dense_nonzero()
            .chain(self.sparse.iter().map(|(&k, &c)| (k, c)))
    }

    pub fn iter_desc(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.sparse
            .iter()
            .rev()
            .map(|(&k, &c)| (k, c))
            .chain(self.dense_nonzero().rev())
    }

    /// Visits keys high to low with `(key, count, running sum of key * count)`.
    pub fn descending_cumulative_scan<B, F>(&self, mut visit: F) -> Option<B>
    where
        F: FnMut(u64, u64, u64) -> ControlFlow<B>,
    {
        let mut running = 0u64;
        for (key, count) in self.iter_desc() {
            running = running.saturating_add(key.saturating_mul(count));
            if let ControlFlow::Break(b) = visit(key, count, running) {
                return Some(b);
            }
        }
        None
    }

    /// Visits keys low to high with `(key, count, running count)`.
    pub fn ascending_cumulative_scan<B, F>(&self, mut visit: F) -> Option<B>
    where
        F: FnMut(u64, u64, u64) -> ControlFlow<B>,
    {
        let mut running = 0u64;
        for (key, count) in self.iter_asc() {
            running += count;
            if let ControlFlow::Break(b) = visit(key, count, running) {
                return Some(b);
            }
        }
        None
    }

    fn dense_nonzero(&self) -> impl DoubleEndedIterator<Item = (u64, u64)> + '_ {
        self.dense
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(k, &c)| (k as u64, c))
    }
}
