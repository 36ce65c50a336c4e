// tests/common.rs
#![allow(dead_code)]

use rpubsub::{Broker, BrokerError, BrokerOptions, Client, IdentityPolicy, IpcServer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

use tokio::time::timeout;

pub const LONG_TIMEOUT: Duration = Duration::from_secs(2);

static IPC_PATH_COUNTER: AtomicUsize = AtomicUsize::new(0);
static TRACING_INIT: Once = Once::new();

fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    // Overridable with RUST_LOG.
    let default_filter = "rpubsub=debug,warn";
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_line_number(true)
      .with_test_writer()
      .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber");
  });
}

/// Unique socket path so tests can run in parallel.
pub fn unique_socket_path() -> PathBuf {
  let pid = std::process::id();
  let count = IPC_PATH_COUNTER.fetch_add(1, Ordering::Relaxed);
  std::env::temp_dir().join(format!("rpubsub_test_{}_{}.sock", pid, count))
}

/// Starts a server whose connections each get their own identity.
pub fn start_server(options: BrokerOptions) -> IpcServer {
  setup_tracing();
  let broker = Broker::with_options(options);
  IpcServer::bind_with_policy(unique_socket_path(), broker, IdentityPolicy::PerConnection)
    .expect("Failed to bind test server")
}

pub async fn connect(server: &IpcServer) -> Client {
  with_timeout(Client::connect(server.local_path()))
    .await
    .expect("Failed to connect test client")
}

/// Fails the operation with `Timeout` instead of hanging the test.
pub async fn with_timeout<T>(fut: impl Future<Output = Result<T, BrokerError>>) -> Result<T, BrokerError> {
  match timeout(LONG_TIMEOUT, fut).await {
    Ok(result) => result,
    Err(_) => Err(BrokerError::Timeout),
  }
}
