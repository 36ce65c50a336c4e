use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/rpubsub.sock";

#[derive(Parser, Debug)]
#[clap(name = "rpubsub", version, about = "In-memory publish/subscribe broker")]
pub struct Cli {
  #[clap(subcommand)]
  pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
  /// Run a broker and serve it on a Unix domain socket
  Serve(ServeArgs),
  /// Interactive client: one command per line, an empty line exits
  Client(ClientArgs),
  /// Send a single command and print the reply
  Send(SendArgs),
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
  /// Path of the socket to listen on
  #[clap(long, short, default_value = DEFAULT_SOCKET_PATH)]
  pub socket: PathBuf,

  /// Per-subscriber mailbox bound; 0 keeps mailboxes unbounded
  #[clap(long, default_value_t = 0)]
  pub mailbox_depth: usize,

  /// Largest accepted payload in bytes
  #[clap(long, default_value_t = rpubsub::options::DEFAULT_MAX_MESSAGE_SIZE)]
  pub max_message_size: usize,

  /// Give every connection its own identity instead of the peer's pid
  #[clap(long, action)]
  pub per_connection_identity: bool,
}

#[derive(Parser, Debug)]
pub struct ClientArgs {
  /// Path of the broker socket
  #[clap(long, short, default_value = DEFAULT_SOCKET_PATH)]
  pub socket: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SendArgs {
  /// Path of the broker socket
  #[clap(long, short, default_value = DEFAULT_SOCKET_PATH)]
  pub socket: PathBuf,

  /// The command line to send, e.g. `/publish news hello`
  #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
  pub command: Vec<String>,
}
