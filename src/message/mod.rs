//! Message-related types (`Message`, `SubscriberId`).

mod identity;
mod msg;

pub use identity::SubscriberId;
pub use msg::Message;
