//! Cycle-partitioned buses between adjacent pipeline stages.
//!
//! A [`BufferedBus`] is not a plain FIFO: entries added during cycle `c` stay
//! invisible until [`BufferedBus::connect`] is called with a later cycle. This
//! models one pipeline register per stage boundary, so a producer's output in
//! cycle `c` is its consumer's input in cycle `c + 1`.

use std::collections::VecDeque;

/// Bounded, cycle-indexed channel with per-cycle add/get budgets.
#[derive(Debug)]
pub struct BufferedBus<T> {
    /// Entries tagged with the cycle they were added in, not yet visible.
    staged: VecDeque<(T, u64)>,
    /// Entries released by a later `connect`, visible to `get`.
    ready: VecDeque<T>,
    in_length: usize,
    out_length: usize,
    added_this_cycle: usize,
    taken_this_cycle: usize,
}

impl<T> BufferedBus<T> {
    pub fn new(in_length: usize, out_length: usize) -> BufferedBus<T> {
        BufferedBus {
            staged: VecDeque::new(),
            ready: VecDeque::new(),
            in_length,
            out_length,
            added_this_cycle: 0,
            taken_this_cycle: 0,
        }
    }

    /// Opens the bus for `cycle`: resets the per-cycle budgets and releases
    /// every entry staged in an earlier cycle, in FIFO order.
    pub fn connect(&mut self, cycle: u64) {
        self.added_this_cycle = 0;
        self.taken_this_cycle = 0;
        while let Some((_, tagged)) = self.staged.front() {
            if *tagged < cycle {
                let (value, _) = self.staged.pop_front().expect("front checked");
                self.ready.push_back(value);
            } else {
                break;
            }
        }
    }

    /// Whether one more entry fits this cycle (budget and capacity).
    pub fn can_add(&self) -> bool {
        self.added_this_cycle < self.in_length && self.len() < self.in_length + self.out_length
    }

    /// Stages `value`, tagged with the producing cycle. Producers that respect
    /// backpressure poll [`BufferedBus::can_add`] first; a stage resuming from
    /// a latency wait commits its result unconditionally.
    pub fn add(&mut self, value: T, cycle: u64) {
        self.staged.push_back((value, cycle));
        self.added_this_cycle += 1;
    }

    pub fn can_get(&self) -> bool {
        self.taken_this_cycle < self.out_length && !self.ready.is_empty()
    }

    /// Takes the oldest visible entry, if the per-cycle budget allows.
    pub fn get(&mut self) -> Option<T> {
        if !self.can_get() {
            return None;
        }
        self.taken_this_cycle += 1;
        self.ready.pop_front()
    }

    /// Number of entries a consumer could observe right now.
    pub fn pending_read(&self) -> usize {
        self.ready.len()
    }

    pub fn in_length(&self) -> usize {
        self.in_length
    }

    pub fn out_length(&self) -> usize {
        self.out_length
    }

    /// Drops everything in transit (pipeline flush).
    pub fn clean(&mut self) {
        self.staged.clear();
        self.ready.clear();
    }

    /// Drops every entry after the first `keep`, preserving FIFO order.
    /// Visible entries are older than staged ones.
    pub fn truncate(&mut self, keep: usize) {
        if keep >= self.len() {
            return;
        }
        if keep <= self.ready.len() {
            self.ready.truncate(keep);
            self.staged.clear();
        } else {
            self.staged.truncate(keep - self.ready.len());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.ready.is_empty()
    }

    pub fn len(&self) -> usize {
        self.staged.len() + self.ready.len()
    }
}
