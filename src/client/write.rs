use super::Verbosity;
use crate::endpoint::DEFAULT_CAPABILITIES;
use crate::msg::PrivateMessage;
use std::fmt::Display;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

/// Writes lines to a session.
///
/// Every clone feeds the same writer task, which writes and flushes one line
/// at a time in the order they were sent. This makes it safe to send from
/// handlers and from other threads while the read loop is running.
#[derive(Clone)]
pub struct Sender {
  inner: mpsc::UnboundedSender<String>,
  verbosity: Verbosity,
}

static_assert_send!(Sender);
static_assert_sync!(Sender);

impl Sender {
  pub(super) fn new(inner: mpsc::UnboundedSender<String>, verbosity: Verbosity) -> Self {
    Self { inner, verbosity }
  }

  /// Send a single raw protocol line.
  ///
  /// The line terminator is appended here, so `line` must not contain `\r` or `\n`.
  /// Pass `suppress_logging` for lines carrying secrets.
  pub fn write_raw(&self, line: &str, suppress_logging: bool) -> Result<(), WriteError> {
    if line.contains(|c| c == '\r' || c == '\n') {
      return Err(WriteError::InvalidLine);
    }

    if !suppress_logging && self.verbosity.allows(Verbosity::INFO) {
      info!("sending -> {line}");
    }

    let mut data = String::with_capacity(line.len() + 1);
    data.push_str(line);
    data.push('\n');
    self.inner.send(data).map_err(|_| WriteError::StreamClosed)
  }

  /// Request `capabilities` and authenticate as `nickname`.
  ///
  /// If `capabilities` is `None` or empty, [`DEFAULT_CAPABILITIES`] are requested.
  /// The `oauth:` prefix is added to `password` unless it is already there.
  pub fn login(
    &self,
    password: &str,
    nickname: &str,
    capabilities: Option<&str>,
  ) -> Result<(), WriteError> {
    let capabilities = capabilities
      .filter(|caps| !caps.is_empty())
      .unwrap_or(DEFAULT_CAPABILITIES);
    let password = password.strip_prefix("oauth:").unwrap_or(password);

    self.write_raw(&format!("CAP REQ :{capabilities}"), false)?;
    if self.verbosity.allows(Verbosity::INFO) {
      info!("sending -> PASS oauth:***");
    }
    self.write_raw(&format!("PASS oauth:{password}"), true)?;
    self.write_raw(&format!("NICK {nickname}"), false)
  }

  /// Join `channel`.
  pub fn join(&self, channel: &str) -> Result<(), WriteError> {
    self.write_raw(&format!("JOIN #{}", channel_name(channel)), false)
  }

  /// Leave `channel`.
  pub fn part(&self, channel: &str) -> Result<(), WriteError> {
    self.write_raw(&format!("PART #{}", channel_name(channel)), false)
  }

  /// Send a chat message to `channel`. The channel must have been joined first.
  pub fn send_channel_message(&self, text: &str, channel: &str) -> Result<(), WriteError> {
    self.write_raw(
      &format!("PRIVMSG #{} :{text}", channel_name(channel)),
      false,
    )
  }

  /// Send `text` to the channel `message` was sent in.
  pub fn reply_to(&self, text: &str, message: &PrivateMessage) -> Result<(), WriteError> {
    self.send_channel_message(text, message.channel())
  }

  /// Answer a server ping.
  pub fn pong(&self) -> Result<(), WriteError> {
    self.write_raw("PONG :tmi.twitch.tv", false)
  }

  /// Returns `true` once the session is gone and no more lines are accepted.
  pub fn is_closed(&self) -> bool {
    self.inner.is_closed()
  }
}

impl std::fmt::Debug for Sender {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Sender")
      .field("verbosity", &self.verbosity)
      .field("closed", &self.is_closed())
      .finish()
  }
}

/// Channel names are case-insensitive on the wire, and may be given with or without `#`.
fn channel_name(channel: &str) -> String {
  channel.strip_prefix('#').unwrap_or(channel).to_lowercase()
}

/// Write every queued line to `writer`, flushing after each one.
///
/// Once `shutdown` resolves (or its sender is dropped), no new lines are accepted,
/// but lines already queued are still written. Stops early on the first I/O error.
pub(super) async fn run<W>(
  mut writer: W,
  mut lines: mpsc::UnboundedReceiver<String>,
  mut shutdown: oneshot::Receiver<()>,
) where
  W: AsyncWrite + Unpin,
{
  let mut closing = false;
  loop {
    let line = tokio::select! {
      line = lines.recv() => line,
      _ = &mut shutdown, if !closing => {
        trace!("session dropped, draining queued lines");
        closing = true;
        lines.close();
        continue;
      }
    };
    let Some(line) = line else {
      break;
    };
    if let Err(e) = write_line(&mut writer, &line).await {
      error!("failed to write message: {e}");
      return;
    }
  }

  trace!("shutting down writer");
  let _ = writer.shutdown().await;
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
  W: AsyncWrite + Unpin,
{
  writer.write_all(line.as_bytes()).await?;
  writer.flush().await
}

/// Failed to send a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
  /// The writer task is gone, the session was dropped or the connection failed.
  StreamClosed,

  /// The line contains a line terminator.
  InvalidLine,
}

impl Display for WriteError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      WriteError::StreamClosed => write!(f, "failed to write message: stream closed"),
      WriteError::InvalidLine => write!(f, "failed to write message: line contains CR or LF"),
    }
  }
}

impl std::error::Error for WriteError {}

#[cfg(test)]
mod tests {
  use super::*;

  fn sender() -> (Sender, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender::new(tx, Verbosity::SILENT), rx)
  }

  fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
  }

  #[test]
  fn login_with_default_capabilities() {
    let (sender, mut rx) = sender();
    sender.login("tok123", "mybot", None).unwrap();
    sender.login("tok123", "mybot", Some("")).unwrap();
    let lines = drain(&mut rx);
    assert_eq!(
      lines[..3],
      [
        "CAP REQ :twitch.tv/membership twitch.tv/tags twitch.tv/commands\n",
        "PASS oauth:tok123\n",
        "NICK mybot\n",
      ]
    );
    assert_eq!(lines[..3], lines[3..]);
  }

  #[test]
  fn login_with_custom_capabilities() {
    let (sender, mut rx) = sender();
    sender
      .login("oauth:tok123", "mybot", Some("twitch.tv/tags"))
      .unwrap();
    assert_eq!(
      drain(&mut rx),
      [
        "CAP REQ :twitch.tv/tags\n",
        "PASS oauth:tok123\n",
        "NICK mybot\n"
      ]
    );
  }

  #[derive(Clone, Default)]
  struct Capture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

  impl std::io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn login_never_logs_the_token() {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::TRACE)
      .with_ansi(false)
      .with_writer({
        let capture = capture.clone();
        move || capture.clone()
      })
      .finish();

    let (tx, mut rx) = mpsc::unbounded_channel();
    tracing::subscriber::with_default(subscriber, || {
      let sender = Sender::new(tx, Verbosity::RAW);
      sender.login("SECRETTOK", "mybot", None).unwrap();
      sender.login("oauth:SECRETTOK", "mybot", None).unwrap();
    });

    let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("sending -> CAP REQ :"));
    assert!(logs.contains("sending -> PASS oauth:***"));
    assert!(logs.contains("sending -> NICK mybot"));
    assert!(!logs.contains("SECRETTOK"));
    assert!(drain(&mut rx).contains(&"PASS oauth:SECRETTOK\n".to_owned()));
  }

  #[test]
  fn channel_names_are_normalized() {
    let (sender, mut rx) = sender();
    sender.join("SomeChannel").unwrap();
    sender.join("#Other").unwrap();
    sender.part("SomeChannel").unwrap();
    sender.send_channel_message("Hi There", "#SomeChannel").unwrap();
    assert_eq!(
      drain(&mut rx),
      [
        "JOIN #somechannel\n",
        "JOIN #other\n",
        "PART #somechannel\n",
        "PRIVMSG #somechannel :Hi There\n",
      ]
    );
  }

  #[test]
  fn reply_to_uses_the_message_channel() {
    let (sender, mut rx) = sender();
    let message = PrivateMessage::new("ronni", "Dallas", "!roll");
    sender.reply_to("@ronni you rolled a 4", &message).unwrap();
    sender.pong().unwrap();
    assert_eq!(
      drain(&mut rx),
      [
        "PRIVMSG #dallas :@ronni you rolled a 4\n",
        "PONG :tmi.twitch.tv\n"
      ]
    );
  }

  #[test]
  fn reject_embedded_line_terminators() {
    let (sender, mut rx) = sender();
    assert_eq!(
      sender.send_channel_message("hi\r\nJOIN #elsewhere", "chan"),
      Err(WriteError::InvalidLine)
    );
    assert_eq!(sender.write_raw("PING\n", false), Err(WriteError::InvalidLine));
    assert!(drain(&mut rx).is_empty());
  }

  #[test]
  fn write_after_close() {
    let (sender, rx) = sender();
    drop(rx);
    assert!(sender.is_closed());
    assert_eq!(sender.join("chan"), Err(WriteError::StreamClosed));
  }

  #[tokio::test]
  async fn writer_flushes_lines_in_order() {
    let (sender, rx) = sender();
    sender.join("a").unwrap();
    sender.send_channel_message("hello", "a").unwrap();
    drop(sender);

    let (_shutdown, shutdown) = oneshot::channel();
    let mut out = Vec::new();
    run(&mut out, rx, shutdown).await;
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "JOIN #a\nPRIVMSG #a :hello\n"
    );
  }
}
