/*!
 * Slot List
 *
 * Singly-linked list over slot indices. The `next` links live in one array
 * owned by the pool and shared by every list over that pool, so a slot can
 * belong to at most one list at a time and moving it between lists never
 * allocates.
 */

/// Link array shared by all lists over one pool
pub type Links = [Option<usize>];

/// Index-linked list with O(1) push at either end and pop at the head
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlotList {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl SlotList {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn push_head(&mut self, links: &mut Links, idx: usize) {
        links[idx] = self.head;
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
        self.len += 1;
    }

    pub fn push_tail(&mut self, links: &mut Links, idx: usize) {
        links[idx] = None;
        match self.tail {
            Some(tail) => links[tail] = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
    }

    /// Link `idx` directly behind `after`, which must be on this list
    pub fn insert_after(&mut self, links: &mut Links, after: usize, idx: usize) {
        links[idx] = links[after];
        links[after] = Some(idx);
        if self.tail == Some(after) {
            self.tail = Some(idx);
        }
        self.len += 1;
    }

    pub fn pop_head(&mut self, links: &mut Links) -> Option<usize> {
        let idx = self.head?;
        self.head = links[idx].take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(idx)
    }

    /// Walk the list from head to tail
    pub fn iter<'a>(&self, links: &'a Links) -> SlotIter<'a> {
        SlotIter {
            links,
            cursor: self.head,
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Iterator returned by [`SlotList::iter`]
pub struct SlotIter<'a> {
    links: &'a Links,
    cursor: Option<usize>,
}

impl Iterator for SlotIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let idx = self.cursor?;
        self.cursor = self.links[idx];
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tail_then_head_ordering() {
        let mut links = vec![None; 4];
        let mut list = SlotList::new();
        list.push_tail(&mut links, 0);
        list.push_tail(&mut links, 1);
        list.push_head(&mut links, 2);

        assert_eq!(list.iter(&links).collect::<Vec<_>>(), vec![2, 0, 1]);
        assert_eq!(list.count(), 3);
    }

    #[test]
    fn test_pop_until_empty() {
        let mut links = vec![None; 2];
        let mut list = SlotList::new();
        list.push_tail(&mut links, 1);
        list.push_tail(&mut links, 0);

        assert_eq!(list.pop_head(&mut links), Some(1));
        assert_eq!(list.pop_head(&mut links), Some(0));
        assert_eq!(list.pop_head(&mut links), None);
        assert!(list.is_empty());

        // tail must be reset, otherwise this would link from a stale slot
        list.push_tail(&mut links, 1);
        assert_eq!(list.iter(&links).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_insert_after_middle_and_tail() {
        let mut links = vec![None; 4];
        let mut list = SlotList::new();
        list.push_tail(&mut links, 0);
        list.push_tail(&mut links, 1);
        list.insert_after(&mut links, 0, 2);
        assert_eq!(list.iter(&links).collect::<Vec<_>>(), vec![0, 2, 1]);

        list.insert_after(&mut links, 1, 3);
        list.pop_head(&mut links);
        list.push_tail(&mut links, 0);
        assert_eq!(list.iter(&links).collect::<Vec<_>>(), vec![2, 1, 3, 0]);
        assert_eq!(list.count(), 4);
    }

    #[test]
    fn test_move_between_lists() {
        let mut links = vec![None; 3];
        let mut free = SlotList::new();
        let mut ready = SlotList::new();
        for idx in 0..3 {
            free.push_tail(&mut links, idx);
        }

        let idx = free.pop_head(&mut links).unwrap();
        ready.push_tail(&mut links, idx);

        assert_eq!(free.iter(&links).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(ready.iter(&links).collect::<Vec<_>>(), vec![0]);
    }
}
