mod stats;
pub mod simd;

pub use stats::Stats;

/// Indices of the set bits of a lane mask, lowest first.
pub fn set_lanes(mask: u64) -> SetLanes {
    SetLanes(mask)
}

#[derive(Copy, Clone, Debug)]
pub struct SetLanes(u64);

impl Iterator for SetLanes {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let lane = (self.0 != 0).then(|| self.0.trailing_zeros() as usize)?;
        self.0 &= self.0 - 1;
        Some(lane)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len(), Some(self.len()))
    }
}

impl DoubleEndedIterator for SetLanes {
    fn next_back(&mut self) -> Option<usize> {
        let lane = (self.0 != 0).then(|| (u64::BITS - 1 - self.0.leading_zeros()) as usize)?;
        self.0 ^= 1 << lane;
        Some(lane)
    }
}

impl ExactSizeIterator for SetLanes {
    fn len(&self) -> usize {
        self.0.count_ones() as usize
    }
}
