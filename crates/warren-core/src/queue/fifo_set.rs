//! Insertion-ordered set with O(1) push / remove / pop_front.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A set that remembers insertion order.
///
/// Elements live in a slab of doubly linked nodes; `index` maps each element
/// to its slot. Vacated slots are recycled through `free`.
///
/// Invariants:
/// - no element appears twice
/// - `pop_front` returns the earliest-inserted remaining element
/// - `index.len()` equals the number of linked nodes
#[derive(Debug)]
pub struct FifoSet<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    index: HashMap<T, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<T: Eq + Hash + Clone> FifoSet<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.index.contains_key(value)
    }

    /// Append `value` at the tail. Returns `false` (and changes nothing) if
    /// it is already present.
    pub fn push_back(&mut self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }

        let slot = self.alloc(Node {
            value: value.clone(),
            prev: self.tail,
            next: None,
        });
        match self.tail.and_then(|t| self.node_mut(t)) {
            Some(tail) => tail.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.index.insert(value, slot);
        true
    }

    /// Insert `value` at the head, so the next `pop_front` returns it.
    pub fn push_front(&mut self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }

        let slot = self.alloc(Node {
            value: value.clone(),
            prev: None,
            next: self.head,
        });
        match self.head.and_then(|h| self.node_mut(h)) {
            Some(head) => head.prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        self.index.insert(value, slot);
        true
    }

    /// Remove `value` if present. Returns whether anything was removed.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.index.get(value).copied() {
            Some(slot) => self.unlink(slot).is_some(),
            None => false,
        }
    }

    /// Remove and return the oldest element.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.unlink(head)
    }

    pub fn front(&self) -> Option<&T> {
        self.head.and_then(|h| self.node(h)).map(|node| &node.value)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            set: self,
            cursor: self.head,
        }
    }

    fn node(&self, slot: usize) -> Option<&Node<T>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn unlink(&mut self, slot: usize) -> Option<T> {
        let node = self.slots.get_mut(slot)?.take()?;

        match node.prev.and_then(|p| self.node_mut(p)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|n| self.node_mut(n)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }

        self.free.push(slot);
        self.index.remove(&node.value);
        Some(node.value)
    }
}

impl<T: Eq + Hash + Clone> Default for FifoSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for FifoSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.push_back(value);
        }
        set
    }
}

pub struct Iter<'a, T> {
    set: &'a FifoSet<T>,
    cursor: Option<usize>,
}

impl<'a, T: Eq + Hash + Clone> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.set.node(self.cursor?)?;
        self.cursor = node.next;
        Some(&node.value)
    }
}

impl<'a, T: Eq + Hash + Clone> IntoIterator for &'a FifoSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
