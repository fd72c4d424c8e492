//! LRU Policy Module
//!
//! Implements Least Recently Used ordering for partition eviction.

use std::collections::HashMap;

use crate::cache::EvictionPolicy;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node {
    key: String,
    prev: usize,
    next: usize,
}

// == LRU Policy ==
/// Recency order over one partition's keys.
///
/// Keys live in an index-linked list stored in a `Vec`:
/// - `head` = most recently used
/// - `tail` = least recently used
///
/// A `HashMap` from key to slot makes touch, admit, remove and eviction O(1).
/// Freed slots are recycled through `free`.
#[derive(Debug)]
pub struct LruPolicy {
    capacity: usize,
    index: HashMap<String, usize>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl LruPolicy {
    // == Constructor ==
    /// Creates an empty policy that evicts once `capacity` keys are tracked.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    #[cfg(test)]
    fn peek_oldest(&self) -> Option<&str> {
        (self.tail != NIL).then(|| self.nodes[self.tail].key.as_str())
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);

        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }

        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;

        if self.head == NIL {
            self.tail = idx;
        } else {
            self.nodes[self.head].prev = idx;
        }

        self.head = idx;
    }

    fn allocate(&mut self, key: String) -> usize {
        let node = Node {
            key,
            prev: NIL,
            next: NIL,
        };

        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> String {
        self.free.push(idx);
        std::mem::take(&mut self.nodes[idx].key)
    }

    // == Evict Oldest ==
    fn evict_oldest(&mut self) -> Option<String> {
        if self.tail == NIL {
            return None;
        }

        let idx = self.tail;
        self.unlink(idx);
        let key = self.release(idx);
        self.index.remove(&key);
        Some(key)
    }
}

impl EvictionPolicy for LruPolicy {
    fn touch(&mut self, key: &str) {
        if let Some(&idx) = self.index.get(key) {
            if idx != self.head {
                self.unlink(idx);
                self.push_front(idx);
            }
        }
    }

    fn admit(&mut self, key: String) -> Option<String> {
        if self.index.contains_key(&key) {
            self.touch(&key);
            return None;
        }

        let victim = if self.index.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let idx = self.allocate(key.clone());
        self.push_front(idx);
        self.index.insert(key, idx);

        victim
    }

    fn remove(&mut self, key: &str) {
        if let Some(idx) = self.index.remove(key) {
            self.unlink(idx);
            self.release(idx);
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }
}
