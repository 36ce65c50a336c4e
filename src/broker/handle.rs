// src/broker/handle.rs

use crate::broker::dispatcher::Dispatcher;
use crate::broker::registry::{Released, TopicRegistry};
use crate::options::BrokerOptions;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// State shared by every clone of a `Broker` handle.
#[derive(Debug)]
pub(crate) struct BrokerInner {
  registry: Arc<TopicRegistry>,
  options: Arc<BrokerOptions>,
  shutdown_initiated: AtomicBool,
}

/// A handle to one broker instance and its topic registry.
///
/// Handles are cloneable (`Arc`-based). The embedding process owns the
/// lifecycle: construct with `Broker::new`, hand `dispatcher()` to whatever
/// decodes requests, and call `shutdown` to release all topics.
#[derive(Clone)]
pub struct Broker {
  inner: Arc<BrokerInner>,
}

impl Broker {
  /// Creates a broker with default options.
  pub fn new() -> Self {
    Self::with_options(BrokerOptions::default())
  }

  pub fn with_options(options: BrokerOptions) -> Self {
    tracing::debug!(
      max_mailbox_depth = options.max_mailbox_depth,
      max_message_size = options.max_message_size,
      "Creating new broker"
    );
    let registry = Arc::new(TopicRegistry::new(options.mailbox_capacity()));
    Self {
      inner: Arc::new(BrokerInner {
        registry,
        options: Arc::new(options),
        shutdown_initiated: AtomicBool::new(false),
      }),
    }
  }

  /// Returns the operation surface bound to this broker.
  pub fn dispatcher(&self) -> Dispatcher {
    Dispatcher::new(self.inner.registry.clone(), self.inner.options.clone())
  }

  pub fn options(&self) -> &BrokerOptions {
    &self.inner.options
  }

  pub fn is_shut_down(&self) -> bool {
    self.inner.shutdown_initiated.load(AtomicOrdering::Acquire)
  }

  /// Releases every topic, mailbox and queued message.
  ///
  /// Afterwards `subscribe`/`publish` fail with `InvalidState` and lookups
  /// report `TopicNotFound`. Calling it again releases nothing.
  pub fn shutdown(&self) -> Released {
    if self
      .inner
      .shutdown_initiated
      .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
      .is_err()
    {
      tracing::debug!("Broker shutdown already initiated.");
      return Released::default();
    }
    let released = self.inner.registry.close();
    tracing::info!(
      topics = released.topics,
      messages = released.messages,
      "Broker shut down"
    );
    released
  }
}

impl Default for Broker {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Broker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Broker")
      .field("topics", &self.inner.registry.len())
      .field("shut_down", &self.is_shut_down())
      .finish_non_exhaustive()
  }
}
