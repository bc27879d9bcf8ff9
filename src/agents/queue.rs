//! Binary min-heap event queue
//! Comparator-driven so the ordering policy stays with the caller

use std::cmp::Ordering;

/// Generic binary min-heap with an injected comparator.
///
/// `pop` always returns the minimum element under the comparator, or `None`
/// when empty. `push`/`pop` are O(log n), `peek` is O(1). Ties are broken by
/// heap insertion order only; the scheduler's composite priority key is
/// already total for practical purposes.
pub struct BinaryMinHeap<T> {
    items: Vec<T>,
    compare: Box<dyn Fn(&T, &T) -> Ordering + Send>,
}

impl<T> BinaryMinHeap<T> {
    pub fn new(compare: impl Fn(&T, &T) -> Ordering + Send + 'static) -> Self {
        Self {
            items: Vec::new(),
            compare: Box::new(compare),
        }
    }

    /// Append and sift up.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    /// Swap root with last, truncate, sift down.
    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let item = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        item
    }

    /// Read the minimum element without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if (self.compare)(&self.items[idx], &self.items[parent]) == Ordering::Less {
                self.items.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut smallest = idx;
            if left < len && (self.compare)(&self.items[left], &self.items[smallest]) == Ordering::Less
            {
                smallest = left;
            }
            if right < len
                && (self.compare)(&self.items[right], &self.items[smallest]) == Ordering::Less
            {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.items.swap(idx, smallest);
            idx = smallest;
        }
    }
}
