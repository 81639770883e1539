use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::{Error, Result};

/// Turns out-of-order arrivals back into ascending height order.
///
/// The buffer is created with the exact set of heights it will see. Items
/// are released only when every lower expected height has been released.
pub struct ReorderBuffer<T> {
    heights: Vec<u32>,
    cursor: usize,
    heap: BinaryHeap<Reverse<Slot<T>>>,
}

struct Slot<T> {
    height: u32,
    item: T,
}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height
    }
}

impl<T> Eq for Slot<T> {}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Slot<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.height.cmp(&other.height)
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new(mut heights: Vec<u32>) -> Self {
        heights.sort_unstable();
        heights.dedup();
        Self {
            heights,
            cursor: 0,
            heap: BinaryHeap::new(),
        }
    }

    /// Buffers `item`. Heights outside the expected set, or already released,
    /// are rejected.
    pub fn push(&mut self, height: u32, item: T) -> Result<()> {
        let pending = &self.heights[self.cursor..];
        if pending.binary_search(&height).is_err() {
            return Err(Error::UnexpectedHeight(height));
        }
        self.heap.push(Reverse(Slot { height, item }));
        Ok(())
    }

    /// Releases the next item if it is the next expected height.
    pub fn pop_ready(&mut self) -> Option<(u32, T)> {
        let expected = self.next_expected()?;
        if self.heap.peek()?.0.height != expected {
            return None;
        }
        let Reverse(slot) = self.heap.pop()?;
        self.cursor += 1;
        Some((slot.height, slot.item))
    }

    pub fn next_expected(&self) -> Option<u32> {
        self.heights.get(self.cursor).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.heights.len()
    }

    pub fn buffered(&self) -> usize {
        self.heap.len()
    }
}
