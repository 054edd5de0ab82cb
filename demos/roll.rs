//! Roll a die whenever someone says `!roll`.
//!
//! ```text,ignore
//! $ cargo run --example roll -- \
//!   --token yfvzjqb705z12hrhy1zkwa9xt7v662 \
//!   --nick my_bot \
//!   --channel forsen \
//!   --verbosity 1
//! ```
//!
//! Pass `--anon` instead of `--token`/`--nick` to only print the channel's chat.
//!
//! Type `exit` or an empty line to quit.

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use tmi_lite::{ChatEvent, Credentials, Session};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(author, version)]
struct Args {
  /// Login oauth2 token
  #[arg(long, required_unless_present = "anon")]
  token: Option<String>,

  /// Login of the bot account
  #[arg(long, required_unless_present = "anon")]
  nick: Option<String>,

  /// Log in anonymously and print chat instead of answering `!roll`
  #[arg(long, conflicts_with_all = ["token", "nick"])]
  anon: bool,

  /// Channel to join
  #[arg(long)]
  channel: String,

  /// Index of the server to connect to
  #[arg(long, default_value_t = 0)]
  endpoint: usize,

  /// 0 is silent, 1 logs sent lines, 2 also logs received data
  #[arg(long, default_value_t = 0)]
  verbosity: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let credentials = match (args.token, args.nick) {
    (Some(token), Some(nick)) => Credentials::new(nick, token),
    _ => Credentials::anon(),
  };
  let session = Session::builder()
    .endpoint(args.endpoint)
    .verbosity(args.verbosity)
    .connect()
    .await?;

  session.authenticate(&credentials)?;
  session.join(&args.channel)?;

  if credentials.is_anon() {
    session.register_handler(|event| {
      if let ChatEvent::PrivateMessage(msg) = event {
        println!("#{} {}: {}", msg.channel(), msg.sender(), msg.text());
      }
      Ok(())
    });
  } else {
    session.send_channel_message("Hello world!", &args.channel)?;

    let sender = session.sender();
    session.register_handler(move |event| {
      let ChatEvent::PrivateMessage(msg) = event else {
        return Ok(());
      };
      if msg.text() == "!roll" {
        let roll = rand::thread_rng().gen_range(1..=6);
        sender.reply_to(&format!("@{} you rolled a {roll}", msg.sender()), msg)?;
      }
      Ok(())
    });
  }

  let mut stdin = BufReader::new(tokio::io::stdin()).lines();
  loop {
    tokio::select! {
      _ = session.closed() => {
        println!("disconnected");
        break;
      }
      line = stdin.next_line() => {
        match line?.as_deref().map(str::trim) {
          None | Some("") => break,
          Some(line) if line.eq_ignore_ascii_case("exit") => break,
          Some(_) => {}
        }
      }
    }
  }

  Ok(())
}
