// src/broker/mod.rs

//! The in-memory broker core: mailboxes, topics, the topic registry and the
//! dispatcher that composes them into the four broker operations.

pub mod dispatcher;
pub mod handle;
pub mod mailbox;
pub mod registry;
pub mod topic;

pub use dispatcher::{BrokerStats, Dispatcher};
pub use handle::Broker;
pub use mailbox::{Enqueued, Mailbox};
pub use registry::{Released, TopicRegistry};
pub use topic::{Delivery, Subscribed, Topic};
