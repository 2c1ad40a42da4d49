//! Thread-safe FIFO of received messages.
//!
//! The middleware delivers messages on its own dispatch threads while the
//! holon's owner drains them from another, so every operation takes the
//! internal lock for its whole duration.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::message::Message;

/// A FIFO queue of [`Message`]s shared between delivery and consumption.
#[derive(Debug, Default)]
pub struct Mailbox {
    queue: Mutex<VecDeque<Message>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message at the back.
    pub fn push(&self, message: Message) {
        self.lock().push_back(message);
    }

    /// Take the oldest message, if any.
    pub fn pop(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    /// Remove the first message equal to `message`. Returns `true` if one was removed.
    pub fn remove(&self, message: &Message) -> bool {
        let mut queue = self.lock();
        match queue.iter().position(|m| m == message) {
            Some(idx) => {
                queue.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Copy of the current contents, oldest first, for iteration without
    /// holding the lock.
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn fifo_order() {
        let mb = Mailbox::new();
        mb.push(Message::new("a"));
        mb.push(Message::new("b"));
        assert_eq!(mb.pop().unwrap().body, "a");
        assert_eq!(mb.pop().unwrap().body, "b");
        assert!(mb.pop().is_none());
    }

    #[test]
    fn remove_specific_message() {
        let mb = Mailbox::new();
        let keep = Message::new("keep");
        let drop = Message::new("drop");
        mb.push(keep.clone());
        mb.push(drop.clone());
        assert!(mb.remove(&drop));
        assert!(!mb.remove(&drop));
        assert_eq!(mb.snapshot(), vec![keep]);
    }

    #[test]
    fn snapshot_does_not_drain() {
        let mb = Mailbox::new();
        mb.push(Message::new("a"));
        assert_eq!(mb.snapshot().len(), 1);
        assert_eq!(mb.len(), 1);
    }

    #[test]
    fn concurrent_pushes_are_all_kept() {
        let mb = Arc::new(Mailbox::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mb = Arc::clone(&mb);
                thread::spawn(move || {
                    for j in 0..50 {
                        mb.push(Message::new(format!("{i}-{j}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(mb.len(), 400);
    }
}
