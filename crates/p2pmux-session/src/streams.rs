use std::collections::BTreeSet;

use crate::error::{Result, SessionError};

/// Whether released stream ids may be allocated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReusePolicy {
    /// Ids only ever increase.
    #[default]
    Never,
    /// Hand out the lowest released id before advancing the counter.
    LowestReleased,
}

/// Hands out locally initiated mplex stream ids.
#[derive(Debug, Clone)]
pub struct StreamAllocator {
    next: u64,
    max: u32,
    policy: ReusePolicy,
    open: BTreeSet<u32>,
    released: BTreeSet<u32>,
}

impl StreamAllocator {
    /// Allocate ids `first..=max`.
    pub fn new(first: u32, max: u32, policy: ReusePolicy) -> Result<Self> {
        if first > max {
            return Err(SessionError::Config(format!(
                "first stream id {first} exceeds the header limit {max}"
            )));
        }
        Ok(Self {
            next: u64::from(first),
            max,
            policy,
            open: BTreeSet::new(),
            released: BTreeSet::new(),
        })
    }

    pub fn allocate(&mut self) -> Result<u32> {
        if self.policy == ReusePolicy::LowestReleased {
            if let Some(id) = self.released.pop_first() {
                self.open.insert(id);
                return Ok(id);
            }
        }

        if self.next > u64::from(self.max) {
            return Err(SessionError::StreamIdsExhausted { max: self.max });
        }
        let id = self.next as u32;
        self.next += 1;
        self.open.insert(id);
        Ok(id)
    }

    /// Mark `id` closed. Returns false if it was not open.
    pub fn release(&mut self, id: u32) -> bool {
        if !self.open.remove(&id) {
            return false;
        }
        if self.policy == ReusePolicy::LowestReleased {
            self.released.insert(id);
        }
        true
    }

    pub fn is_open(&self, id: u32) -> bool {
        self.open.contains(&id)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
