// src/broker/topic.rs

use crate::broker::mailbox::{Enqueued, Mailbox};
use crate::error::BrokerError;
use crate::message::{Message, SubscriberId};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

/// Result of `Topic::add_subscriber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscribed {
  /// A new, empty mailbox was created for the subscriber.
  New,
  /// The identity was already subscribed; its mailbox is unchanged.
  Already,
}

/// Per-publish accounting of the fan-out loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
  /// Subscribers present when the message was published.
  pub subscribers: usize,
  /// Mailboxes that received a copy.
  pub delivered: usize,
  /// Deliveries that displaced the oldest message of a full mailbox.
  pub evicted: usize,
  /// Subscribers the message could not be delivered to.
  pub failed: usize,
}

/// Membership of a topic. Guarded as a whole by the topic lock.
///
/// The subscriber set is the key set of `mailboxes`, so a subscriber without
/// a mailbox (or the reverse) cannot be represented.
#[derive(Debug, Default)]
struct TopicState {
  publishers: HashSet<SubscriberId>,
  mailboxes: HashMap<SubscriberId, Arc<Mailbox>>,
}

/// A named channel: publisher identities, subscriber identities and one
/// mailbox per subscriber.
#[derive(Debug)]
pub struct Topic {
  name: String,
  mailbox_capacity: Option<usize>,
  state: RwLock<TopicState>,
}

impl Topic {
  /// Creates an empty topic whose mailboxes hold at most `mailbox_capacity` messages.
  pub fn new(name: impl Into<String>, mailbox_capacity: Option<usize>) -> Self {
    Self {
      name: name.into(),
      mailbox_capacity,
      state: RwLock::new(TopicState::default()),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Subscribes `id`, creating its mailbox. Idempotent.
  pub fn add_subscriber(&self, id: SubscriberId) -> Result<(Arc<Mailbox>, Subscribed), BrokerError> {
    let mut state = self.state.write();
    if let Some(existing) = state.mailboxes.get(&id) {
      tracing::debug!(topic = %self.name, subscriber = %id, "Already subscribed");
      return Ok((existing.clone(), Subscribed::Already));
    }

    state
      .mailboxes
      .try_reserve(1)
      .map_err(|e| BrokerError::allocation("subscriber entry", e))?;
    let mailbox = Arc::new(Mailbox::new(id, self.mailbox_capacity));
    state.mailboxes.insert(id, mailbox.clone());
    tracing::info!(topic = %self.name, subscriber = %id, "Subscriber added");
    Ok((mailbox, Subscribed::New))
  }

  /// Records `id` as a publisher. Returns `true` if it was not one already.
  pub fn add_publisher(&self, id: SubscriberId) -> Result<bool, BrokerError> {
    let mut state = self.state.write();
    if state.publishers.contains(&id) {
      return Ok(false);
    }
    state
      .publishers
      .try_reserve(1)
      .map_err(|e| BrokerError::allocation("publisher entry", e))?;
    state.publishers.insert(id);
    tracing::debug!(topic = %self.name, publisher = %id, "Publisher registered");
    Ok(true)
  }

  /// Forgets a publisher registration made by a publish that then failed.
  fn remove_publisher(&self, id: SubscriberId) {
    if self.state.write().publishers.remove(&id) {
      tracing::debug!(topic = %self.name, publisher = %id, "Publisher registration rolled back");
    }
  }

  /// Unsubscribes `id`, releasing its mailbox and every message in it.
  /// Returns the number of undelivered messages that were dropped.
  pub fn remove_subscriber(&self, id: SubscriberId) -> Result<usize, BrokerError> {
    let removed = self.state.write().mailboxes.remove(&id);
    match removed {
      Some(mailbox) => {
        let dropped = mailbox.clear();
        tracing::info!(topic = %self.name, subscriber = %id, dropped, "Subscriber removed");
        Ok(dropped)
      }
      None => {
        tracing::debug!(topic = %self.name, subscriber = %id, "Unsubscribe for unknown subscriber");
        Err(BrokerError::NotSubscribed {
          topic: self.name.clone(),
          subscriber: id,
        })
      }
    }
  }

  /// Delivers an independent copy of `payload` to every subscriber's mailbox.
  ///
  /// A failure for one subscriber is logged and counted, and delivery to the
  /// rest continues. Only when every subscriber failed does the call itself
  /// fail. Zero subscribers is a successful no-op.
  pub fn publish(&self, payload: &[u8]) -> Result<Delivery, BrokerError> {
    self.publish_with(payload, deliver_copy)
  }

  /// Registers `publisher` and publishes `payload` on its behalf.
  ///
  /// If the publish fails, a registration made by this call is undone so the
  /// topic is left as it was.
  pub fn publish_from(&self, publisher: SubscriberId, payload: &[u8]) -> Result<Delivery, BrokerError> {
    self.publish_from_with(publisher, payload, deliver_copy)
  }

  fn publish_from_with<F>(&self, publisher: SubscriberId, payload: &[u8], deliver: F) -> Result<Delivery, BrokerError>
  where
    F: FnMut(&Mailbox, &[u8]) -> Result<Enqueued, BrokerError>,
  {
    let registered = self.add_publisher(publisher)?;
    self.publish_with(payload, deliver).map_err(|e| {
      if registered {
        self.remove_publisher(publisher);
      }
      e
    })
  }

  /// Fan-out loop. `deliver` places one copy into one mailbox.
  fn publish_with<F>(&self, payload: &[u8], mut deliver: F) -> Result<Delivery, BrokerError>
  where
    F: FnMut(&Mailbox, &[u8]) -> Result<Enqueued, BrokerError>,
  {
    let state = self.state.read();
    let mut delivery = Delivery {
      subscribers: state.mailboxes.len(),
      ..Default::default()
    };
    if delivery.subscribers == 0 {
      tracing::debug!(topic = %self.name, size = payload.len(), "Publish with no subscribers");
      return Ok(delivery);
    }

    let mut last_error = None;
    for (id, mailbox) in state.mailboxes.iter() {
      match deliver(mailbox, payload) {
        Ok(Enqueued::Appended) => delivery.delivered += 1,
        Ok(Enqueued::Evicted) => {
          delivery.delivered += 1;
          delivery.evicted += 1;
        }
        Err(e) => {
          tracing::warn!(topic = %self.name, subscriber = %id, error = %e, "Delivery to subscriber failed");
          delivery.failed += 1;
          last_error = Some(e);
        }
      }
    }
    drop(state);

    tracing::debug!(
      topic = %self.name,
      size = payload.len(),
      subscribers = delivery.subscribers,
      delivered = delivery.delivered,
      evicted = delivery.evicted,
      failed = delivery.failed,
      "Message published"
    );

    match last_error {
      Some(e) if delivery.delivered == 0 => Err(e),
      _ => Ok(delivery),
    }
  }

  /// Pops the oldest message from `id`'s mailbox.
  ///
  /// `Ok(None)` means "no data". An identity that is not subscribed gets
  /// `PermissionDenied`, never another subscriber's messages.
  pub fn fetch(&self, id: SubscriberId) -> Result<Option<Message>, BrokerError> {
    let mailbox = self.mailbox(id).ok_or_else(|| BrokerError::PermissionDenied {
      topic: self.name.clone(),
      subscriber: id,
    })?;
    let message = mailbox.dequeue();
    if message.is_none() {
      tracing::trace!(topic = %self.name, subscriber = %id, "No data");
    }
    Ok(message)
  }

  /// Returns the mailbox of `id` if it is subscribed.
  pub fn mailbox(&self, id: SubscriberId) -> Option<Arc<Mailbox>> {
    self.state.read().mailboxes.get(&id).cloned()
  }

  pub fn is_subscribed(&self, id: SubscriberId) -> bool {
    self.state.read().mailboxes.contains_key(&id)
  }

  pub fn is_publisher(&self, id: SubscriberId) -> bool {
    self.state.read().publishers.contains(&id)
  }

  /// Sorted snapshot of subscriber identities.
  pub fn subscribers(&self) -> Vec<SubscriberId> {
    let mut ids: Vec<_> = self.state.read().mailboxes.keys().copied().collect();
    ids.sort_unstable();
    ids
  }

  /// Sorted snapshot of publisher identities.
  pub fn publishers(&self) -> Vec<SubscriberId> {
    let mut ids: Vec<_> = self.state.read().publishers.iter().copied().collect();
    ids.sort_unstable();
    ids
  }

  pub fn subscriber_count(&self) -> usize {
    self.state.read().mailboxes.len()
  }

  pub fn publisher_count(&self) -> usize {
    self.state.read().publishers.len()
  }

  /// Total undelivered messages across all mailboxes of this topic.
  pub fn queued_messages(&self) -> usize {
    self.state.read().mailboxes.values().map(|m| m.len()).sum()
  }

  /// Drops every mailbox and membership record. Returns the messages released.
  pub(crate) fn release(&self) -> usize {
    let mut state = self.state.write();
    let dropped = state.mailboxes.values().map(|m| m.clear()).sum();
    state.mailboxes.clear();
    state.publishers.clear();
    dropped
  }
}

fn deliver_copy(mailbox: &Mailbox, payload: &[u8]) -> Result<Enqueued, BrokerError> {
  let message = Message::copy_from(payload)?;
  mailbox.enqueue(message)
}
