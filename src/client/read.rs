use super::write::Sender;
use super::{Config, Verbosity};
use crate::dispatch::Dispatcher;
use crate::msg;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;

/// Size of a single read from the stream.
pub const READ_BUFFER_SIZE: usize = 5120;

/// A partial line longer than this is handed to the parser as-is.
const MAX_PENDING: usize = 8 * READ_BUFFER_SIZE;

/// Joins reads back into whole lines.
///
/// A read may end in the middle of a line (or of a UTF-8 sequence). The
/// unfinished tail is kept and prepended to the next read, so the parser only
/// ever sees complete lines.
#[derive(Default)]
pub struct ChunkBuffer {
  pending: Vec<u8>,
}

impl ChunkBuffer {
  /// Append `bytes` and take every complete line received so far.
  ///
  /// Returns `None` if no line has been completed yet.
  pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
    self.pending.extend_from_slice(bytes);

    let end = match self.pending.iter().rposition(|&b| b == b'\n') {
      Some(last_newline) => last_newline + 1,
      None if self.pending.len() >= MAX_PENDING => {
        trace!(len = self.pending.len(), "giving up on finding a line ending");
        self.pending.len()
      }
      None => return None,
    };

    let rest = self.pending.split_off(end);
    let complete = std::mem::replace(&mut self.pending, rest);
    Some(String::from_utf8_lossy(&complete).into_owned())
  }

  /// Number of bytes waiting for a line ending.
  pub fn pending(&self) -> usize {
    self.pending.len()
  }
}

/// Read from `reader` until it is closed, publishing every parsed event.
///
/// Each event is published to all handlers before the next read.
/// If [`Config::auto_pong`] is set, pings are answered before they are published.
pub(super) async fn run<R>(
  mut reader: R,
  dispatcher: Dispatcher,
  sender: Sender,
  config: Config,
  connected: watch::Sender<bool>,
) where
  R: AsyncRead + Unpin,
{
  let mut buf = vec![0u8; READ_BUFFER_SIZE];
  let mut chunks = ChunkBuffer::default();

  loop {
    let n = match reader.read(&mut buf).await {
      Ok(0) => {
        trace!("stream closed");
        break;
      }
      Ok(n) => n,
      Err(e) => {
        warn!("failed to read message: {e}");
        break;
      }
    };

    let Some(chunk) = chunks.push(&buf[..n]) else {
      continue;
    };

    if config.verbosity.allows(Verbosity::RAW) {
      info!("received <- {chunk}");
    }

    for event in msg::parse(&chunk) {
      if event.is_ping() && config.auto_pong {
        trace!("recv PING");
        if let Err(e) = sender.pong() {
          warn!("failed to answer ping: {e}");
        }
      }
      dispatcher.publish(&event);
    }
  }

  if config.verbosity.allows(Verbosity::INFO) {
    info!("disconnected");
  }
  connected.send_replace(false);
}
