// src/session/base.rs

use crate::broker::Dispatcher;
use crate::error::BrokerError;
use crate::message::SubscriberId;
use crate::protocol::{max_request_line, Reply, Request, ServerCodec};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;

/// Events a server broadcasts to its accept loop and sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
  /// Stop accepting; every session finishes its current request and exits.
  ServerTerminating,
}

/// Runs one request against the broker on behalf of `peer` and builds the reply.
///
/// Failures become `Reply::Error`; nothing here ends the session.
pub fn execute(dispatcher: &Dispatcher, peer: SubscriberId, request: Request) -> Reply {
  tracing::trace!(peer = %peer, request = request.variant_name(), topic = ?request.topic(), "Executing request");
  let result = match request {
    Request::Subscribe { topic } => dispatcher.subscribe(&topic, peer).map(Reply::Subscribed),
    Request::Unsubscribe { topic } => dispatcher
      .unsubscribe(&topic, peer)
      .map(|dropped| Reply::Unsubscribed { dropped }),
    Request::Publish { topic, payload } => dispatcher.publish(&topic, peer, &payload).map(Reply::Published),
    Request::Fetch { topic } => dispatcher.fetch(&topic, peer).map(|fetched| match fetched {
      Some(message) => Reply::Message(message.into_bytes()),
      None => Reply::Empty,
    }),
    Request::Stats => Ok(Reply::Stats(dispatcher.stats())),
  };
  result.unwrap_or_else(|e| {
    tracing::debug!(peer = %peer, error = %e, "Request failed");
    Reply::from_error(&e)
  })
}

/// Serves one connected peer: reads request lines, answers each with one reply line.
///
/// The peer's identity is fixed when the session is created. The session ends
/// when the peer closes its end, on an I/O error, or when the server publishes
/// `SystemEvent::ServerTerminating`.
pub struct Session<S> {
  handle: u64,
  peer: SubscriberId,
  dispatcher: Dispatcher,
  framed: Framed<S, ServerCodec>,
  event_rx: broadcast::Receiver<SystemEvent>,
}

impl<S> Session<S>
where
  S: AsyncRead + AsyncWrite + Unpin,
{
  pub fn new(
    handle: u64,
    peer: SubscriberId,
    dispatcher: Dispatcher,
    stream: S,
    event_rx: broadcast::Receiver<SystemEvent>,
  ) -> Self {
    let max_line = max_request_line(dispatcher.options().max_message_size);
    Self {
      handle,
      peer,
      dispatcher,
      framed: Framed::new(stream, ServerCodec::new(max_line)),
      event_rx,
    }
  }

  pub fn peer(&self) -> SubscriberId {
    self.peer
  }

  /// Runs the request loop to completion.
  ///
  /// A peer hanging up is a normal end and returns `Ok(())`.
  pub async fn run(mut self) -> Result<(), BrokerError> {
    let handle = self.handle;
    let peer = self.peer;
    tracing::debug!(session = handle, peer = %peer, "Session started");

    let result = loop {
      tokio::select! {
        biased;
        event = self.event_rx.recv() => {
          match event {
            Ok(SystemEvent::ServerTerminating) => {
              tracing::debug!(session = handle, peer = %peer, "Session received ServerTerminating, stopping.");
              break Ok(());
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
              tracing::warn!(session = handle, peer = %peer, skipped, "Session event receiver lagged, stopping.");
              break Ok(());
            }
            Err(broadcast::error::RecvError::Closed) => {
              tracing::debug!(session = handle, peer = %peer, "Server event channel closed, stopping session.");
              break Ok(());
            }
          }
        }
        frame = self.framed.next() => {
          let reply = match frame {
            None => {
              tracing::debug!(session = handle, peer = %peer, "Peer closed the connection.");
              break Ok(());
            }
            Some(Ok(Ok(request))) => execute(&self.dispatcher, peer, request),
            Some(Ok(Err(malformed))) => {
              tracing::debug!(session = handle, peer = %peer, error = %malformed, "Rejecting malformed request");
              Reply::from_error(&malformed)
            }
            Some(Err(e)) => break Err(e),
          };
          if let Err(e) = self.framed.send(reply).await {
            break Err(e);
          }
        }
      }
    };

    match result {
      Err(BrokerError::ConnectionClosed) => {
        tracing::debug!(session = handle, peer = %peer, "Connection closed while replying.");
        Ok(())
      }
      other => {
        tracing::debug!(session = handle, peer = %peer, "Session finished");
        other
      }
    }
  }
}
