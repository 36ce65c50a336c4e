// src/broker/mailbox.rs

//! Bounded per-subscriber FIFO of undelivered messages.

use crate::error::BrokerError;
use crate::message::{Message, SubscriberId};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// What `Mailbox::enqueue` did to make room for the new message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
  /// Appended at the tail; nothing was dropped.
  Appended,
  /// The mailbox was full: the oldest message was released and the new one appended.
  Evicted,
}

/// A FIFO queue of messages owned by one subscriber of one topic.
///
/// `len() <= capacity` holds at all times. When full, `enqueue` drops the head
/// so the mailbox keeps the `capacity` most recently published messages. A
/// publisher is never blocked and memory never grows past the bound.
#[derive(Debug)]
pub struct Mailbox {
  owner: SubscriberId,
  capacity: Option<usize>,
  queue: Mutex<VecDeque<Message>>,
  evicted: AtomicU64,
}

impl Mailbox {
  /// Creates an empty mailbox. `capacity` of `None` (or `Some(0)`) is unbounded.
  pub fn new(owner: SubscriberId, capacity: Option<usize>) -> Self {
    Self {
      owner,
      capacity: capacity.filter(|c| *c > 0),
      queue: Mutex::new(VecDeque::new()),
      evicted: AtomicU64::new(0),
    }
  }

  pub fn owner(&self) -> SubscriberId {
    self.owner
  }

  /// Returns the configured bound, or `None` when unbounded.
  pub fn capacity(&self) -> Option<usize> {
    self.capacity
  }

  /// Appends `message`, evicting the head first if the mailbox is full.
  ///
  /// The message is already fully built when this is called and any queue
  /// growth is reserved before anything is released, so a failed call leaves
  /// the mailbox exactly as it was.
  pub fn enqueue(&self, message: Message) -> Result<Enqueued, BrokerError> {
    let mut queue = self.queue.lock();

    if let Some(cap) = self.capacity {
      if queue.len() >= cap {
        // Swap in place: the slot freed by the head is reused by the tail.
        let dropped = queue.pop_front();
        queue.push_back(message);
        drop(queue);
        self.evicted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
          owner = %self.owner,
          dropped_size = dropped.as_ref().map_or(0, Message::size),
          "Mailbox full, evicted oldest message"
        );
        return Ok(Enqueued::Evicted);
      }
    }

    queue
      .try_reserve(1)
      .map_err(|e| BrokerError::allocation("mailbox slot", e))?;
    queue.push_back(message);
    tracing::trace!(owner = %self.owner, depth = queue.len(), "Message enqueued");
    Ok(Enqueued::Appended)
  }

  /// Pops the oldest message, or `None` when there is nothing to read.
  pub fn dequeue(&self) -> Option<Message> {
    let message = self.queue.lock().pop_front();
    if let Some(ref msg) = message {
      tracing::trace!(owner = %self.owner, size = msg.size(), "Message dequeued");
    }
    message
  }

  /// Returns the current number of queued messages.
  pub fn len(&self) -> usize {
    self.queue.lock().len()
  }

  /// Returns true if the mailbox holds no messages.
  pub fn is_empty(&self) -> bool {
    self.queue.lock().is_empty()
  }

  /// Total messages dropped by the eviction policy over the mailbox's life.
  pub fn evicted(&self) -> u64 {
    self.evicted.load(Ordering::Relaxed)
  }

  /// Releases every queued message, returning how many were dropped.
  pub fn clear(&self) -> usize {
    let mut queue = self.queue.lock();
    let dropped = queue.len();
    queue.clear();
    dropped
  }
}
