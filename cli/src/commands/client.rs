use crate::cli::{ClientArgs, SendArgs};

use anyhow::{anyhow, Context as AnyhowContext, Result};
use rpubsub::{Client, Reply, Request};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

async fn connect(socket: &Path) -> Result<Client> {
  Client::connect(socket)
    .await
    .with_context(|| format!("Failed to connect to {}", socket.display()))
}

/// Reads commands from stdin until an empty line or end of input.
pub async fn run_repl(args: ClientArgs) -> Result<()> {
  let mut client = connect(&args.socket).await?;
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  println!("Enter commands such as: /subscribe <topic>, /publish <topic> \"<message>\", /fetch <topic>, /unsubscribe <topic>, /stats");
  println!("Press ENTER on an empty line to exit.");

  loop {
    print!("> ");
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
      break;
    };
    if line.trim().is_empty() {
      break;
    }
    let request = match Request::parse(&line) {
      Ok(request) => request,
      Err(e) => {
        println!("error: {}", e);
        continue;
      }
    };
    let reply = client.request(request).await.context("Request failed")?;
    println!("{}", reply);
  }
  Ok(())
}

/// Sends one command; an error reply makes the process exit non-zero.
pub async fn send_one(args: SendArgs) -> Result<()> {
  let line = args.command.join(" ");
  let request = Request::parse(&line).with_context(|| format!("Invalid command '{}'", line))?;
  let mut client = connect(&args.socket).await?;
  match client.request(request).await.context("Request failed")? {
    Reply::Error { code, message } => Err(anyhow!("{}: {}", code, message)),
    reply => {
      println!("{}", reply);
      Ok(())
    }
  }
}
