mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "rpubsub=info";

fn init_tracing() {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .init();
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli_args = Cli::parse();
  init_tracing();

  match cli_args.command {
    Commands::Serve(serve_args) => commands::serve::run(serve_args).await,
    Commands::Client(client_args) => commands::client::run_repl(client_args).await,
    Commands::Send(send_args) => commands::client::send_one(send_args).await,
  }
}
