// src/broker/registry.rs

use crate::broker::topic::Topic;
use crate::error::BrokerError;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Counts returned when topics are torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Released {
  pub topics: usize,
  pub messages: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
  topics: HashMap<String, Arc<Topic>>,
  closed: bool,
}

/// Directory of topics by name.
///
/// The registry lock is held only for lookup and insertion, never while a
/// topic's own lock is taken, so traffic on unrelated topics is not serialized.
/// Topics persist once created until `remove` or `close`.
#[derive(Debug, Default)]
pub struct TopicRegistry {
  mailbox_capacity: Option<usize>,
  state: RwLock<RegistryState>,
}

impl TopicRegistry {
  pub fn new(mailbox_capacity: Option<usize>) -> Self {
    Self {
      mailbox_capacity,
      state: RwLock::new(RegistryState::default()),
    }
  }

  /// Returns the topic named `name`, creating an empty one if needed.
  pub fn find_or_create(&self, name: &str) -> Result<Arc<Topic>, BrokerError> {
    validate_topic_name(name)?;

    // Fast path: the topic usually exists already.
    {
      let state = self.state.read();
      if state.closed {
        return Err(BrokerError::InvalidState("broker is shut down"));
      }
      if let Some(topic) = state.topics.get(name) {
        return Ok(topic.clone());
      }
    }

    let mut state = self.state.write();
    if state.closed {
      return Err(BrokerError::InvalidState("broker is shut down"));
    }
    // Another caller may have created it between the two locks.
    if let Some(topic) = state.topics.get(name) {
      return Ok(topic.clone());
    }

    state
      .topics
      .try_reserve(1)
      .map_err(|e| BrokerError::allocation("topic entry", e))?;
    let mut key = String::new();
    key
      .try_reserve_exact(name.len())
      .map_err(|e| BrokerError::allocation("topic name", e))?;
    key.push_str(name);

    let topic = Arc::new(Topic::new(key.clone(), self.mailbox_capacity));
    state.topics.insert(key, topic.clone());
    tracing::info!(topic = %name, "Topic created");
    Ok(topic)
  }

  /// Looks `name` up without creating it.
  pub fn find(&self, name: &str) -> Option<Arc<Topic>> {
    self.state.read().topics.get(name).cloned()
  }

  /// Removes the topic and releases every mailbox and message it holds.
  pub fn remove(&self, name: &str) -> Result<Released, BrokerError> {
    let topic = self
      .state
      .write()
      .topics
      .remove(name)
      .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;
    let messages = topic.release();
    tracing::info!(topic = %name, messages, "Topic removed");
    Ok(Released { topics: 1, messages })
  }

  /// Releases all topics and refuses further creation. Idempotent.
  pub fn close(&self) -> Released {
    let drained: Vec<Arc<Topic>> = {
      let mut state = self.state.write();
      state.closed = true;
      state.topics.drain().map(|(_, topic)| topic).collect()
    };
    let released = Released {
      topics: drained.len(),
      messages: drained.iter().map(|t| t.release()).sum(),
    };
    tracing::debug!(topics = released.topics, messages = released.messages, "Topic registry closed");
    released
  }

  pub fn is_closed(&self) -> bool {
    self.state.read().closed
  }

  pub fn len(&self) -> usize {
    self.state.read().topics.len()
  }

  pub fn is_empty(&self) -> bool {
    self.state.read().topics.is_empty()
  }

  /// Sorted snapshot of topic names.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.state.read().topics.keys().cloned().collect();
    names.sort_unstable();
    names
  }

  /// Snapshot of all topics, taken without holding the lock afterwards.
  pub fn topics(&self) -> Vec<Arc<Topic>> {
    self.state.read().topics.values().cloned().collect()
  }
}

/// Topic names are case-sensitive, non-empty and carry no whitespace or NUL.
pub(crate) fn validate_topic_name(name: &str) -> Result<(), BrokerError> {
  if name.is_empty() {
    return Err(BrokerError::InvalidArgument("topic name must not be empty".into()));
  }
  if name.chars().any(|c| c.is_whitespace() || c == '\0') {
    return Err(BrokerError::InvalidArgument(format!(
      "topic name '{}' contains whitespace or NUL",
      name.escape_debug()
    )));
  }
  Ok(())
}
