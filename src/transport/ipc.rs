// src/transport/ipc.rs

#![cfg(feature = "ipc")]

use crate::broker::{Broker, Dispatcher};
use crate::error::BrokerError;
use crate::message::SubscriberId;
use crate::session::{Session, SystemEvent};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// First synthetic identity. Process ids never reach this range.
pub const SYNTHETIC_ID_BASE: u64 = 1 << 32;

/// How a connection's `SubscriberId` is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityPolicy {
  /// The peer's process id from the socket credentials. Connections from
  /// the same process share one identity.
  #[default]
  PeerProcess,
  /// A fresh synthetic identity per connection.
  PerConnection,
}

/// Hands out identities for accepted connections.
#[derive(Debug)]
struct IdentitySource {
  policy: IdentityPolicy,
  next_synthetic: u64,
}

impl IdentitySource {
  fn new(policy: IdentityPolicy) -> Self {
    Self {
      policy,
      next_synthetic: SYNTHETIC_ID_BASE,
    }
  }

  fn synthetic(&mut self) -> SubscriberId {
    let id = SubscriberId::new(self.next_synthetic);
    self.next_synthetic += 1;
    id
  }

  fn identify(&mut self, stream: &UnixStream) -> SubscriberId {
    if self.policy == IdentityPolicy::PerConnection {
      return self.synthetic();
    }
    match stream.peer_cred() {
      Ok(cred) => match cred.pid().map(SubscriberId::from_pid) {
        Some(Ok(id)) => return id,
        Some(Err(e)) => tracing::warn!(error = %e, "Peer credentials carry a malformed pid"),
        None => tracing::debug!("Platform did not report the peer pid"),
      },
      Err(e) => tracing::debug!(error = %e, "Could not read peer credentials"),
    }
    let id = self.synthetic();
    tracing::debug!(peer = %id, "Assigned synthetic identity");
    id
  }
}

/// Serves the broker over a Unix domain socket.
///
/// Each accepted connection gets its own session task. The identity used for
/// every request on a connection is fixed when it is accepted.
#[derive(Debug)]
pub struct IpcServer {
  path: PathBuf,
  broker: Broker,
  events: broadcast::Sender<SystemEvent>,
  connections: Arc<AtomicU64>,
  accept_task: Option<JoinHandle<()>>,
  socket_removed: bool,
}

impl IpcServer {
  /// Binds `path` with the default identity policy. Must run inside a Tokio runtime.
  pub fn bind(path: impl AsRef<Path>, broker: Broker) -> Result<Self, BrokerError> {
    Self::bind_with_policy(path, broker, IdentityPolicy::default())
  }

  pub fn bind_with_policy(
    path: impl AsRef<Path>,
    broker: Broker,
    policy: IdentityPolicy,
  ) -> Result<Self, BrokerError> {
    let path = path.as_ref().to_path_buf();
    if broker.is_shut_down() {
      return Err(BrokerError::InvalidState("broker is shut down"));
    }

    // A previous server may have left its socket file behind.
    match std::fs::remove_file(&path) {
      Ok(()) => tracing::debug!(path = ?path, "Removed existing IPC socket file before binding."),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => {
        tracing::warn!(path = ?path, error = %e, "Failed to remove existing IPC socket file before binding. Bind may fail.")
      }
    }

    let listener = UnixListener::bind(&path)?;
    tracing::info!(path = ?path, policy = ?policy, "IPC server bound");

    let (events, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let connections = Arc::new(AtomicU64::new(0));
    let accept_task = tokio::spawn(run_accept_loop(
      listener,
      path.clone(),
      broker.dispatcher(),
      events.clone(),
      event_rx,
      connections.clone(),
      IdentitySource::new(policy),
    ));

    Ok(Self {
      path,
      broker,
      events,
      connections,
      accept_task: Some(accept_task),
      socket_removed: false,
    })
  }

  pub fn local_path(&self) -> &Path {
    &self.path
  }

  pub fn broker(&self) -> &Broker {
    &self.broker
  }

  /// Number of connections accepted since the server was bound.
  pub fn connections_accepted(&self) -> u64 {
    self.connections.load(Ordering::Relaxed)
  }

  /// Stops accepting, waits for every session to finish and removes the socket file.
  ///
  /// The broker itself is left running. Calling this twice is harmless.
  pub async fn shutdown(&mut self) -> Result<(), BrokerError> {
    let Some(accept_task) = self.accept_task.take() else {
      tracing::debug!(path = ?self.path, "IPC server already shut down.");
      return Ok(());
    };
    tracing::info!(path = ?self.path, "Shutting down IPC server");
    if self.events.send(SystemEvent::ServerTerminating).is_err() {
      tracing::debug!(path = ?self.path, "No task was listening for ServerTerminating.");
    }

    let joined = accept_task.await;
    self.remove_socket_file();
    match joined {
      Ok(()) => Ok(()),
      Err(e) if e.is_cancelled() => Ok(()),
      Err(e) => {
        tracing::error!(path = ?self.path, "IPC accept loop panicked: {:?}", e);
        Err(BrokerError::Internal(format!("IPC accept loop panicked: {}", e)))
      }
    }
  }

  fn remove_socket_file(&mut self) {
    if self.socket_removed {
      return;
    }
    self.socket_removed = true;
    match std::fs::remove_file(&self.path) {
      Ok(()) => tracing::debug!(path = ?self.path, "Removed IPC socket file."),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        tracing::trace!(path = ?self.path, "IPC socket file already gone.")
      }
      Err(e) => tracing::warn!(path = ?self.path, error = %e, "Failed to remove IPC socket file."),
    }
  }
}

impl Drop for IpcServer {
  fn drop(&mut self) {
    if let Some(accept_task) = self.accept_task.take() {
      // Aborting drops the session set, which aborts every session.
      accept_task.abort();
      tracing::debug!(path = ?self.path, "Aborted IPC accept loop in Drop.");
    }
    self.remove_socket_file();
  }
}

async fn run_accept_loop(
  listener: UnixListener,
  path: PathBuf,
  dispatcher: Dispatcher,
  events: broadcast::Sender<SystemEvent>,
  mut event_rx: broadcast::Receiver<SystemEvent>,
  connections: Arc<AtomicU64>,
  mut identities: IdentitySource,
) {
  tracing::debug!(path = ?path, "IPC accept loop started");
  let mut sessions: JoinSet<()> = JoinSet::new();

  loop {
    tokio::select! {
      biased;
      event = event_rx.recv() => {
        match event {
          Ok(SystemEvent::ServerTerminating) => {
            tracing::debug!(path = ?path, "IPC accept loop received ServerTerminating.");
          }
          Err(e) => {
            tracing::warn!(path = ?path, error = %e, "IPC accept loop lost its event channel, stopping.");
          }
        }
        break;
      }
      Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
        if let Err(e) = joined {
          if !e.is_cancelled() {
            tracing::error!(path = ?path, "IPC session task panicked: {:?}", e);
          }
        }
      }
      accepted = listener.accept() => {
        match accepted {
          Ok((stream, _addr)) => {
            let session_id = connections.fetch_add(1, Ordering::Relaxed) + 1;
            let peer = identities.identify(&stream);
            tracing::info!(path = ?path, session = session_id, peer = %peer, "Accepted new IPC connection");
            let session = Session::new(session_id, peer, dispatcher.clone(), stream, events.subscribe());
            sessions.spawn(async move {
              if let Err(e) = session.run().await {
                tracing::warn!(session = session_id, peer = %peer, error = %e, "IPC session ended with error");
              }
            });
          }
          Err(e) if is_fatal_accept_error(&e) => {
            tracing::error!(path = ?path, error = %e, "Fatal error in IPC accept loop, stopping.");
            break;
          }
          Err(e) => {
            tracing::error!(path = ?path, error = %e, "Error accepting new IPC connection");
            sleep(Duration::from_millis(100)).await;
          }
        }
      }
    }
  }

  // Stop accepting before waiting on the sessions.
  drop(listener);
  tracing::debug!(path = ?path, active = sessions.len(), "IPC accept loop waiting for sessions");
  while let Some(joined) = sessions.join_next().await {
    if let Err(e) = joined {
      if !e.is_cancelled() {
        tracing::error!(path = ?path, "IPC session task panicked: {:?}", e);
      }
    }
  }
  tracing::debug!(path = ?path, "IPC accept loop finished");
}

fn is_fatal_accept_error(e: &io::Error) -> bool {
  matches!(e.kind(), io::ErrorKind::InvalidInput | io::ErrorKind::BrokenPipe)
}
