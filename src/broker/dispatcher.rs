// src/broker/dispatcher.rs

use crate::broker::registry::{validate_topic_name, TopicRegistry};
use crate::broker::topic::{Delivery, Subscribed};
use crate::error::BrokerError;
use crate::message::{Message, SubscriberId};
use crate::options::BrokerOptions;

use std::sync::Arc;

/// Point-in-time counters across the whole broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
  pub topics: usize,
  /// Sum over topics of their subscriber counts.
  pub subscriptions: usize,
  /// Sum over topics of their publisher counts.
  pub publishers: usize,
  pub queued_messages: usize,
}

/// The operation surface of the broker.
///
/// Each call resolves the topic, performs one mutation or read under the
/// topic's own locks and returns. Nothing here waits on another party:
/// `fetch` on an empty mailbox answers `Ok(None)` immediately.
#[derive(Debug, Clone)]
pub struct Dispatcher {
  registry: Arc<TopicRegistry>,
  options: Arc<BrokerOptions>,
}

impl Dispatcher {
  pub fn new(registry: Arc<TopicRegistry>, options: Arc<BrokerOptions>) -> Self {
    Self { registry, options }
  }

  /// Subscribes `id` to `topic`, creating the topic if absent.
  pub fn subscribe(&self, topic: &str, id: SubscriberId) -> Result<Subscribed, BrokerError> {
    let topic = self.registry.find_or_create(topic)?;
    let (_, outcome) = topic.add_subscriber(id)?;
    Ok(outcome)
  }

  /// Removes `id` from `topic`. Returns how many unread messages were dropped.
  pub fn unsubscribe(&self, topic: &str, id: SubscriberId) -> Result<usize, BrokerError> {
    validate_topic_name(topic)?;
    let topic = self
      .registry
      .find(topic)
      .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))?;
    topic.remove_subscriber(id)
  }

  /// Publishes `payload` to every subscriber of `topic` and records `id` as a publisher.
  ///
  /// Oversized payloads are rejected before any state is touched.
  pub fn publish(&self, topic: &str, id: SubscriberId, payload: &[u8]) -> Result<Delivery, BrokerError> {
    let max = self.options.max_message_size;
    if payload.len() > max {
      tracing::debug!(topic = %topic, publisher = %id, size = payload.len(), max, "Rejecting oversized payload");
      return Err(BrokerError::MessageTooLarge {
        size: payload.len(),
        max,
      });
    }

    let topic = self.registry.find_or_create(topic)?;
    topic.publish_from(id, payload)
  }

  /// Reads the oldest message `id` has pending on `topic`.
  ///
  /// `Ok(None)` is "no data". Malformed names are `InvalidArgument`, unknown topics are `TopicNotFound`; topics `id`
  /// never subscribed to are `PermissionDenied`.
  pub fn fetch(&self, topic: &str, id: SubscriberId) -> Result<Option<Message>, BrokerError> {
    validate_topic_name(topic)?;
    let topic = self
      .registry
      .find(topic)
      .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))?;
    topic.fetch(id)
  }

  pub fn stats(&self) -> BrokerStats {
    self
      .registry
      .topics()
      .iter()
      .fold(BrokerStats::default(), |mut stats, topic| {
        stats.topics += 1;
        stats.subscriptions += topic.subscriber_count();
        stats.publishers += topic.publisher_count();
        stats.queued_messages += topic.queued_messages();
        stats
      })
  }

  pub fn topic_names(&self) -> Vec<String> {
    self.registry.names()
  }

  pub fn options(&self) -> &BrokerOptions {
    &self.options
  }

  pub fn registry(&self) -> &Arc<TopicRegistry> {
    &self.registry
  }
}
