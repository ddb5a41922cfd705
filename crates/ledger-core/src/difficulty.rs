use crate::constants::{MAX_DIFFICULTY, MIN_DIFFICULTY};
use std::ops::RangeInclusive;
use tracing::info;

/// Tracks mining difficulty against how fast the chain grew since the last
/// adjustment.
#[derive(Clone, Debug)]
pub struct DifficultyController {
    current: u32,
    last_observed_len: usize,
    bounds: RangeInclusive<u32>,
}

impl DifficultyController {
    pub fn new(initial: u32, chain_len: usize) -> Self {
        Self::with_bounds(initial, chain_len, MIN_DIFFICULTY..=MAX_DIFFICULTY)
    }

    pub fn with_bounds(initial: u32, chain_len: usize, bounds: RangeInclusive<u32>) -> Self {
        let mut controller = Self {
            current: initial,
            last_observed_len: chain_len,
            bounds,
        };
        controller.current = controller.clamp(initial as i64);
        controller
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn last_observed_len(&self) -> usize {
        self.last_observed_len
    }

    /// More than one new block since the last call raises difficulty by one,
    /// none lowers it by one. Out-of-range results snap to the bound.
    pub fn adjust(&mut self, chain_len: usize) -> u32 {
        let growth = chain_len as i64 - self.last_observed_len as i64;
        let mut next = self.current as i64;
        if growth > 1 {
            next += 1;
        } else if growth < 1 {
            next -= 1;
        }
        self.current = self.clamp(next);
        self.last_observed_len = chain_len;
        info!(difficulty = self.current, growth, "difficulty adjusted");
        self.current
    }

    fn clamp(&self, difficulty: i64) -> u32 {
        let (min, max) = (*self.bounds.start(), *self.bounds.end());
        if difficulty < min as i64 {
            min
        } else if difficulty > max as i64 {
            max
        } else {
            difficulty as u32
        }
    }
}
