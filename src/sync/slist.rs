//! Singly linked list with arena-allocated nodes.
//!
//! Nodes live in a `Vec` and link to each other by index. Released nodes go
//! on a free list and are reused by later appends, so a list that is filled
//! and drained repeatedly stops allocating.

extern crate alloc;
use alloc::vec::Vec;

struct Node<T> {
    item: Option<T>,
    next: Option<usize>,
}

/// Append-at-tail, take-at-head list.
///
/// Either empty (no head, no tail) or both ends are set and the tail node
/// has no successor.
pub struct SList<T> {
    nodes: Vec<Node<T>>,
    head: Option<usize>,
    tail: Option<usize>,
    free: Option<usize>,
    len: usize,
}

impl<T> SList<T> {
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: None,
            tail: None,
            free: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn alloc(&mut self, item: T) -> usize {
        match self.free {
            Some(index) => {
                let node = &mut self.nodes[index];
                self.free = node.next;
                node.item = Some(item);
                node.next = None;
                index
            }
            None => {
                self.nodes.push(Node {
                    item: Some(item),
                    next: None,
                });
                self.nodes.len() - 1
            }
        }
    }

    /// Add `item` at the tail.
    pub fn append(&mut self, item: T) {
        let index = self.alloc(item);
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    /// Move every item of `other` to the tail, keeping their order.
    pub fn append_list(&mut self, other: SList<T>) {
        if self.is_empty() && self.free.is_none() {
            *self = other;
            return;
        }
        for item in other {
            self.append(item);
        }
    }

    /// Remove and return the head item.
    pub fn get(&mut self) -> Option<T> {
        let index = self.head?;
        let node = &mut self.nodes[index];
        let item = node.item.take();

        self.head = node.next;
        if self.head.is_none() {
            self.tail = None;
        }
        node.next = self.free;
        self.free = Some(index);
        self.len -= 1;

        item
    }

    pub fn peek_head(&self) -> Option<&T> {
        self.head.and_then(|index| self.nodes[index].item.as_ref())
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            next: self.head,
        }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        match (self.head, self.tail) {
            (None, None) => assert_eq!(self.len, 0),
            (Some(_), Some(tail)) => {
                assert!(self.nodes[tail].next.is_none());
                assert_eq!(self.iter().count(), self.len);
            }
            _ => panic!("head and tail disagree"),
        }
    }
}

impl<T> Default for SList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for SList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = SList::new();
        for item in iter {
            list.append(item);
        }
        list
    }
}

/// Draining iterator, head first.
pub struct IntoIter<T>(SList<T>);

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.get()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.0.len, Some(self.0.len))
    }
}

impl<T> IntoIterator for SList<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter(self)
    }
}

pub struct Iter<'a, T> {
    list: &'a SList<T>,
    next: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = &self.list.nodes[self.next?];
        self.next = node.next;
        node.item.as_ref()
    }
}
