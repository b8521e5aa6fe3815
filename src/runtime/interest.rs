//! The set of descriptors an event loop watches for readability.
//!
//! Holds the listening descriptor plus one entry per accepted client.
//! Keyed by descriptor number so a pass can walk it in ascending order.

use std::collections::btree_map::{self, BTreeMap};
use std::os::unix::io::RawFd;

/// Listener plus open clients, ordered by descriptor.
#[derive(Debug)]
pub struct InterestSet<C> {
    listener: RawFd,
    clients: BTreeMap<RawFd, C>,
    max_fd: RawFd,
}

impl<C> InterestSet<C> {
    /// Create a set containing only the listening descriptor.
    pub fn new(listener: RawFd) -> Self {
        Self {
            listener,
            clients: BTreeMap::new(),
            max_fd: listener,
        }
    }

    pub fn listener(&self) -> RawFd {
        self.listener
    }

    pub fn is_listener(&self, fd: RawFd) -> bool {
        fd == self.listener
    }

    /// Add a client. Returns the client back if `fd` is already watched.
    pub fn insert(&mut self, fd: RawFd, client: C) -> Result<(), C> {
        if fd == self.listener {
            return Err(client);
        }
        match self.clients.entry(fd) {
            btree_map::Entry::Occupied(_) => Err(client),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(client);
                self.max_fd = self.max_fd.max(fd);
                Ok(())
            }
        }
    }

    /// Remove a client. The listener is never removed.
    pub fn remove(&mut self, fd: RawFd) -> Option<C> {
        self.clients.remove(&fd)
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        fd == self.listener || self.clients.contains_key(&fd)
    }

    pub fn get_mut(&mut self, fd: RawFd) -> Option<&mut C> {
        self.clients.get_mut(&fd)
    }

    /// Number of watched descriptors, listener included.
    pub fn len(&self) -> usize {
        self.clients.len() + 1
    }

    /// Number of open clients.
    pub fn clients(&self) -> usize {
        self.clients.len()
    }

    /// Highest descriptor ever added; an upper bound for iteration.
    pub fn max_descriptor(&self) -> RawFd {
        self.max_fd
    }

    /// All watched descriptors in ascending order.
    pub fn descriptors(&self) -> Vec<RawFd> {
        let mut fds: Vec<RawFd> = self.clients.keys().copied().collect();
        let pos = fds.partition_point(|&fd| fd < self.listener);
        fds.insert(pos, self.listener);
        fds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_listener_only() {
        let set: InterestSet<()> = InterestSet::new(3);
        assert_eq!(set.len(), 1);
        assert_eq!(set.clients(), 0);
        assert!(set.contains(3));
        assert!(set.is_listener(3));
        assert_eq!(set.descriptors(), vec![3]);
        assert_eq!(set.max_descriptor(), 3);
    }

    #[test]
    fn test_accept_and_close_sequence() {
        let mut set = InterestSet::new(3);

        set.insert(5, "a").unwrap();
        set.insert(4, "b").unwrap();
        set.insert(7, "c").unwrap();
        assert_eq!(set.descriptors(), vec![3, 4, 5, 7]);
        assert_eq!(set.max_descriptor(), 7);

        assert_eq!(set.remove(5), Some("a"));
        assert_eq!(set.descriptors(), vec![3, 4, 7]);

        // Max is a high-water mark, not the current maximum.
        assert_eq!(set.remove(7), Some("c"));
        assert_eq!(set.max_descriptor(), 7);
        assert_eq!(set.descriptors(), vec![3, 4]);
    }

    #[test]
    fn test_no_duplicates() {
        let mut set = InterestSet::new(3);
        set.insert(4, 1).unwrap();
        assert_eq!(set.insert(4, 2), Err(2));
        assert_eq!(set.insert(3, 9), Err(9));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_listener_never_removed() {
        let mut set: InterestSet<()> = InterestSet::new(3);
        assert_eq!(set.remove(3), None);
        assert!(set.contains(3));
    }

    #[test]
    fn test_listener_sorted_among_clients() {
        let mut set = InterestSet::new(6);
        set.insert(9, ()).unwrap();
        set.insert(2, ()).unwrap();
        assert_eq!(set.descriptors(), vec![2, 6, 9]);
    }

    #[test]
    fn test_membership_tracks_open_clients() {
        let mut set = InterestSet::new(3);
        let mut open = Vec::new();

        for fd in 4..20 {
            set.insert(fd, ()).unwrap();
            open.push(fd);
            if fd % 3 == 0 {
                let closed = open.remove(0);
                set.remove(closed);
            }

            let mut expected = vec![3];
            expected.extend(open.iter().copied());
            assert_eq!(set.descriptors(), expected);
        }
    }
}
