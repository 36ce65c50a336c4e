use crate::cli::ServeArgs;

use anyhow::{bail, Context as AnyhowContext, Result};
use rpubsub::{Broker, BrokerOptions, IdentityPolicy, IpcServer};

pub async fn run(args: ServeArgs) -> Result<()> {
  if args.max_message_size == 0 {
    bail!("--max-message-size must be at least 1");
  }
  let options = BrokerOptions::default()
    .with_mailbox_depth(args.mailbox_depth)
    .with_max_message_size(args.max_message_size);
  let policy = if args.per_connection_identity {
    IdentityPolicy::PerConnection
  } else {
    IdentityPolicy::PeerProcess
  };

  let broker = Broker::with_options(options);
  let mut server = IpcServer::bind_with_policy(&args.socket, broker.clone(), policy)
    .with_context(|| format!("Failed to listen on {}", args.socket.display()))?;
  println!("rpubsub listening on {}", args.socket.display());

  tokio::signal::ctrl_c()
    .await
    .context("Failed to wait for Ctrl-C")?;
  tracing::info!("Interrupt received, shutting down");

  server.shutdown().await.context("Failed to stop the IPC server")?;
  let released = broker.shutdown();
  println!(
    "Served {} connection(s); released {} topic(s) and {} queued message(s)",
    server.connections_accepted(),
    released.topics,
    released.messages
  );
  Ok(())
}
