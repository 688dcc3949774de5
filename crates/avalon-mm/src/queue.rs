//! FIFO bookkeeping for pending beats and completed reads.

use std::collections::VecDeque;
use std::ops::RangeInclusive;

use crate::beat::{ReadChunk, WriteChunk};
use crate::{Beat, BeatOp, CompletedRead, TransactionId};

/// Pending beats in issue order, plus the id allocator.
#[derive(Debug, Clone, Default)]
pub struct TransactionQueue {
    pending: VecDeque<Beat>,
    last_id: u64,
}

impl TransactionQueue {
    /// Creates an empty queue whose first id will be `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> TransactionId {
        self.last_id += 1;
        TransactionId::new(self.last_id)
    }

    fn next_range(&self, first: u64) -> RangeInclusive<TransactionId> {
        TransactionId::new(first)..=TransactionId::new(self.last_id)
    }

    /// Appends write beats and returns the id range they received.
    ///
    /// The range is empty when `chunks` is empty.
    pub fn push_writes(
        &mut self,
        chunks: Vec<WriteChunk>,
        byte_enable: Option<u128>,
        error_expected: bool,
    ) -> RangeInclusive<TransactionId> {
        let first = self.last_id + 1;
        for chunk in chunks {
            let id = self.allocate();
            self.pending.push_back(Beat {
                id,
                byte_address: chunk.byte_address,
                op: BeatOp::Write {
                    data: chunk.data,
                    byte_enable,
                },
                error_expected,
            });
        }
        self.next_range(first)
    }

    /// Appends read beats and returns the id range they received.
    ///
    /// The range is empty when `chunks` is empty.
    pub fn push_reads(
        &mut self,
        chunks: Vec<ReadChunk>,
        error_expected: bool,
    ) -> RangeInclusive<TransactionId> {
        let first = self.last_id + 1;
        for chunk in chunks {
            let id = self.allocate();
            self.pending.push_back(Beat {
                id,
                byte_address: chunk.byte_address,
                op: BeatOp::Read {
                    expected: chunk.expected,
                },
                error_expected,
            });
        }
        self.next_range(first)
    }

    /// Allocates an id that is never queued.
    ///
    /// Used for requests rejected before any beat could be built, so the
    /// caller still receives a unique id.
    pub fn burn_id(&mut self) -> TransactionId {
        self.allocate()
    }

    /// Removes the head beat.
    pub fn pop(&mut self) -> Option<Beat> {
        self.pending.pop_front()
    }

    /// Number of beats waiting to be issued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` when nothing is waiting to be issued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every pending beat and returns how many were dropped.
    ///
    /// The id allocator is not reset.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Id of the most recently enqueued beat, if any was ever enqueued.
    #[must_use]
    pub const fn last_id(&self) -> Option<TransactionId> {
        if self.last_id == 0 {
            None
        } else {
            Some(TransactionId::new(self.last_id))
        }
    }
}

/// Completed reads in completion order.
#[derive(Debug, Clone, Default)]
pub struct ResponseQueue {
    completed: VecDeque<CompletedRead>,
}

impl ResponseQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a completed read.
    pub fn push(&mut self, read: CompletedRead) {
        self.completed.push_back(read);
    }

    /// Removes the oldest completed read.
    pub fn pop(&mut self) -> Option<CompletedRead> {
        self.completed.pop_front()
    }

    /// Removes the completed read with `id`, leaving every other entry in place.
    pub fn take(&mut self, id: TransactionId) -> Option<CompletedRead> {
        let index = self.completed.iter().position(|read| read.id == id)?;
        self.completed.remove(index)
    }

    /// Removes every entry whose id lies in `ids`, in queue order.
    pub fn take_range(&mut self, ids: &RangeInclusive<TransactionId>) -> Vec<CompletedRead> {
        let mut taken = Vec::new();
        self.completed.retain(|read| {
            if ids.contains(&read.id) {
                taken.push(read.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Number of completed reads not yet consumed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    /// Returns `true` when no completed read is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Drops every completed read and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.completed.len();
        self.completed.clear();
        dropped
    }
}
