//! rpubsub - an in-memory, topic-based publish/subscribe broker.
//!
//! Subscribers register interest in named topics and each gets a private
//! FIFO mailbox per topic; publishing a message places an independent copy in
//! every current subscriber's mailbox, and subscribers poll with `fetch`.
//! Mailboxes may be bounded, in which case the oldest unread message is
//! evicted to make room.
//!
//! The core lives in [`broker`]. [`transport::IpcServer`] serves it over a
//! Unix domain socket using the line protocol in [`protocol`], and [`Client`]
//! talks to such a server.

pub mod broker;
#[cfg(feature = "ipc")]
pub mod client;
pub mod error;
pub mod message;
pub mod options;
pub mod protocol;
pub mod session;
pub mod transport;

pub use broker::{Broker, BrokerStats, Delivery, Dispatcher, Subscribed};
#[cfg(feature = "ipc")]
pub use client::Client;
pub use error::{BrokerError, ErrorCode};
pub use message::{Message, SubscriberId};
pub use options::BrokerOptions;
pub use protocol::{Reply, Request};
#[cfg(feature = "ipc")]
pub use transport::{IdentityPolicy, IpcServer};

// --- Top-Level Functions ---

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 1;
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}

pub fn version_major() -> i32 {
  VERSION_MAJOR
}

pub fn version_minor() -> i32 {
  VERSION_MINOR
}

pub fn version_patch() -> i32 {
  VERSION_PATCH
}
