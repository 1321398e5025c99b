//! Where single-node dispatch starts looking for a node.

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks the first candidate to try. Candidates after it are tried in list
/// order, wrapping around once.
pub trait SelectionPolicy: Send + Sync {
    /// Index in `0..candidates` to start from. Only called with
    /// `candidates > 0`.
    fn start(&self, candidates: usize) -> usize;
}

/// Always start at the head of the list.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCandidate;

impl SelectionPolicy for FirstCandidate {
    fn start(&self, _candidates: usize) -> usize {
        0
    }
}

/// Start at a uniformly random position, spreading clients over nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomStart;

impl SelectionPolicy for RandomStart {
    fn start(&self, candidates: usize) -> usize {
        rand::thread_rng().gen_range(0..candidates)
    }
}

/// Each call starts one position after the previous call.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl SelectionPolicy for RoundRobin {
    fn start(&self, candidates: usize) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % candidates
    }
}

/// Indices to try, beginning at `start` and visiting each candidate once.
pub fn scan_order(start: usize, candidates: usize) -> impl Iterator<Item = usize> {
    (0..candidates).map(move |i| (start + i) % candidates)
}
