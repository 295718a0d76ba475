//! Doubly-linked list of `K` keys, used for the scheduler's ready queue, the
//! per-process children/zombie-children lists, and any other FIFO the kernel needs to
//! splice nodes into and out of in O(1).
//!
//! Generic over any `Copy + Ord` key rather than hardcoded to one node type — the
//! scheduler links by `Tid`, the process table links by `Pid`, both plain `u32`
//! newtypes. This mirrors the original kernel's intrusive `next`/`prev` fields
//! embedded directly in each TCB/PCB (`original_source/p3/kern/inc/thread.h`), but
//! keeps the embedding type free of list-specific fields by storing the links here
//! instead, addressed by the key alone — the "index into an external table" pattern
//! the spec's own design notes call for instead of raw intrusive pointers.

use alloc::collections::BTreeMap;

#[derive(Clone, Copy)]
struct Links<K> {
    prev: Option<K>,
    next: Option<K>,
}

/// A FIFO of `K`s. `push_back`/`pop_front` give the round-robin ready queue its
/// rotation; `remove` supports descheduling an arbitrary member out of order (the
/// case where a sleeping or blocked thread is pulled by tid rather than drained from
/// the front).
pub struct IntrusiveList<K> {
    links: BTreeMap<K, Links<K>>,
    head: Option<K>,
    tail: Option<K>,
    len: usize,
}

impl<K: Copy + Ord> IntrusiveList<K> {
    pub const fn new() -> Self {
        Self {
            links: BTreeMap::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, key: K) -> bool {
        self.links.contains_key(&key)
    }

    pub fn push_back(&mut self, key: K) {
        debug_assert!(!self.contains(key), "key already linked");
        let old_tail = self.tail;
        self.links.insert(
            key,
            Links {
                prev: old_tail,
                next: None,
            },
        );
        if let Some(tail) = old_tail {
            self.links.get_mut(&tail).expect("tail must be linked").next = Some(key);
        } else {
            self.head = Some(key);
        }
        self.tail = Some(key);
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<K> {
        let head = self.head?;
        self.remove(head);
        Some(head)
    }

    pub fn push_front(&mut self, key: K) {
        debug_assert!(!self.contains(key), "key already linked");
        let old_head = self.head;
        self.links.insert(
            key,
            Links {
                prev: None,
                next: old_head,
            },
        );
        if let Some(head) = old_head {
            self.links.get_mut(&head).expect("head must be linked").prev = Some(key);
        } else {
            self.tail = Some(key);
        }
        self.head = Some(key);
        self.len += 1;
    }

    pub fn front(&self) -> Option<K> {
        self.head
    }

    /// Unlink an arbitrary member. No-op if `key` isn't currently in the list.
    pub fn remove(&mut self, key: K) {
        let Some(links) = self.links.remove(&key) else {
            return;
        };
        match links.prev {
            Some(prev) => self.links.get_mut(&prev).expect("prev must be linked").next = links.next,
            None => self.head = links.next,
        }
        match links.next {
            Some(next) => self.links.get_mut(&next).expect("next must be linked").prev = links.prev,
            None => self.tail = links.prev,
        }
        self.len -= 1;
    }

    /// Move the current head to the tail, returning the new head (round-robin
    /// rotation, the core of `Scheduler::yield_to`).
    pub fn rotate(&mut self) -> Option<K> {
        let head = self.pop_front()?;
        self.push_back(head);
        self.front()
    }

    pub fn iter(&self) -> IntrusiveListIter<'_, K> {
        IntrusiveListIter {
            list: self,
            current: self.head,
        }
    }
}

impl<K: Copy + Ord> Default for IntrusiveList<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct IntrusiveListIter<'a, K> {
    list: &'a IntrusiveList<K>,
    current: Option<K>,
}

impl<'a, K: Copy + Ord> Iterator for IntrusiveListIter<'a, K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        let current = self.current?;
        self.current = self.list.links.get(&current).and_then(|l| l.next);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_rotation() {
        let mut list: IntrusiveList<u32> = IntrusiveList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);
        assert_eq!(list.pop_front(), Some(1));
        list.push_back(1);
        assert_eq!(list.pop_front(), Some(2));
        assert_eq!(list.pop_front(), Some(3));
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_front(), None);
    }

    #[test]
    fn remove_from_middle() {
        let mut list: IntrusiveList<u32> = IntrusiveList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);
        list.remove(2);
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().collect::<alloc::vec::Vec<_>>(), alloc::vec![1, 3]);
    }

    #[test]
    fn rotate_cycles_through_every_member() {
        let mut list: IntrusiveList<u32> = IntrusiveList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);
        assert_eq!(list.rotate(), Some(2));
        assert_eq!(list.rotate(), Some(3));
        assert_eq!(list.rotate(), Some(1));
    }
}
