use std::fmt;

/// Min, max and mean of a set of counts (node fill, depth, ...).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub count: usize,
    /// Meaningless while `count` is zero.
    pub min: usize,
    pub max: usize,
    pub sum: usize,
}

impl Stats {
    pub fn single(value: usize) -> Self {
        Stats {
            count: 1,
            min: value,
            max: value,
            sum: value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.sum as f64 / self.count as f64)
    }

    pub fn add(&mut self, value: usize) {
        *self = self.merge(Stats::single(value));
    }

    pub fn merge(self, other: Stats) -> Stats {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => other,
            (_, true) => self,
            _ => Stats {
                count: self.count + other.count,
                min: self.min.min(other.min),
                max: self.max.max(other.max),
                sum: self.sum + other.sum,
            },
        }
    }

    /// Adds `offset` to every sample.
    pub fn shifted(self, offset: usize) -> Stats {
        if self.is_empty() {
            return self;
        }
        Stats {
            min: self.min + offset,
            max: self.max + offset,
            sum: self.sum + offset * self.count,
            ..self
        }
    }
}

impl Extend<usize> for Stats {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<usize> for Stats {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut stats = Stats::default();
        stats.extend(iter);
        stats
    }
}

impl FromIterator<Stats> for Stats {
    fn from_iter<I: IntoIterator<Item = Stats>>(iter: I) -> Self {
        iter.into_iter().fold(Stats::default(), Stats::merge)
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mean() {
            None => write!(f, "no samples"),
            Some(mean) => write!(
                f,
                "{}..={}, mean {:.1} over {} samples",
                self.min, self.max, mean, self.count
            ),
        }
    }
}
