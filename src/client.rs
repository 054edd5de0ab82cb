//! ## Twitch IRC session
//!
//! This is the main interface for talking to Twitch chat.
//! The entrypoint to this module is the [`Session`].
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use tmi_lite::{ChatEvent, Session};
//!
//! let session = Session::connect().await?;
//! session.login("your-oauth-token", "your_bot", None)?;
//! session.join("your_channel")?;
//!
//! let sender = session.sender();
//! session.register_handler(move |event| {
//!   if let ChatEvent::PrivateMessage(msg) = event {
//!     if msg.text() == "!hello" {
//!       sender.reply_to("hi!", msg)?;
//!     }
//!   }
//!   Ok(())
//! });
//!
//! session.closed().await;
//! # Ok(())
//! # }
//! ```
//!
//! Once connected, a session runs two background tasks:
//! - The read loop, which parses every chunk it receives and publishes the
//!   resulting events to the registered handlers.
//! - The writer, which writes queued lines to the stream one at a time.
//!
//! ⚠ Note: [`Session`] is a fairly low-level interface! It does not:
//! - Rate limit JOINs or PRIVMSGs
//! - Reconnect, or retry anything at all
//! - Wait for the server to acknowledge the login
//! - Apply timeouts to connecting or reading

pub mod conn;
pub mod read;
pub mod write;

use self::conn::{OpenStreamError, TlsConfig, TlsConfigError};
use self::write::{Sender, WriteError};
use crate::dispatch::{Dispatcher, Handler, HandlerError};
use crate::endpoint;
use crate::msg::{ChatEvent, PrivateMessage};
use rand::{thread_rng, Rng};
use std::fmt::Display;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::client::InvalidDnsNameError;
use tokio_rustls::rustls::ServerName;

/// How much the session logs.
///
/// Logs are emitted through [`tracing`], this only decides which of them are emitted at all.
///
/// ⚠ [`Verbosity::RAW`] logs every received chunk verbatim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Verbosity(pub u8);

impl Verbosity {
  /// Log nothing except failures.
  pub const SILENT: Verbosity = Verbosity(0);
  /// Log connection progress and every sent line (except the password).
  pub const INFO: Verbosity = Verbosity(1);
  /// Also log raw received data.
  pub const RAW: Verbosity = Verbosity(2);

  /// Whether messages at `level` should be logged.
  #[inline]
  pub fn allows(self, level: Verbosity) -> bool {
    self >= level
  }
}

impl From<u8> for Verbosity {
  fn from(value: u8) -> Self {
    Self(value)
  }
}

/// Session configuration.
#[derive(Clone, Debug)]
pub struct Config {
  /// Index into [`endpoint::ENDPOINTS`] of the server to connect to.
  pub endpoint: usize,

  /// How much to log.
  pub verbosity: Verbosity,

  /// Answer server pings with `PONG` automatically.
  ///
  /// Twitch closes connections which do not answer pings.
  /// Handlers still receive [`ChatEvent::PingRequest`] either way.
  pub auto_pong: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      endpoint: 0,
      verbosity: Verbosity::SILENT,
      auto_pong: true,
    }
  }
}

/// Who to log in as, see [`Session::authenticate`].
///
/// Either a bot account with an oauth2 token, or an anonymous `justinfan` login
/// which can read chat but not send to it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  nick: String,
  token: Option<String>,
}

impl Credentials {
  /// Twitch accepts any password for `justinfan` logins.
  const ANON_PASSWORD: &'static str = "anonymous";

  /// Log in as `nick` using an oauth2 `token`, with or without the `oauth:` prefix.
  pub fn new(nick: impl Into<String>, token: impl Into<String>) -> Self {
    Self {
      nick: nick.into(),
      token: Some(token.into()),
    }
  }

  /// An anonymous login as `justinfan` followed by a few random digits.
  pub fn anon() -> Self {
    Self {
      nick: format!("justinfan{}", thread_rng().gen_range(10000..100000)),
      token: None,
    }
  }

  #[inline]
  pub fn nick(&self) -> &str {
    &self.nick
  }

  #[inline]
  pub fn is_anon(&self) -> bool {
    self.token.is_none()
  }

  fn password(&self) -> &str {
    self.token.as_deref().unwrap_or(Self::ANON_PASSWORD)
  }
}

impl Default for Credentials {
  fn default() -> Self {
    Self::anon()
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("nick", &self.nick)
      .field("anon", &self.is_anon())
      .finish_non_exhaustive()
  }
}

/// Builder for a [`Session`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
  config: Config,
  dispatcher: Dispatcher,
}

impl SessionBuilder {
  /// Connect to the endpoint at `index` in [`endpoint::ENDPOINTS`].
  pub fn endpoint(mut self, index: usize) -> Self {
    self.config.endpoint = index;
    self
  }

  pub fn verbosity(mut self, verbosity: impl Into<Verbosity>) -> Self {
    self.config.verbosity = verbosity.into();
    self
  }

  /// See [`Config::auto_pong`].
  pub fn auto_pong(mut self, enabled: bool) -> Self {
    self.config.auto_pong = enabled;
    self
  }

  pub fn config(mut self, config: Config) -> Self {
    self.config = config;
    self
  }

  /// Register a handler before connecting, so it sees every event.
  pub fn handler<F>(self, f: F) -> Self
  where
    F: Fn(&ChatEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
  {
    self.dispatcher.register_fn(f);
    self
  }

  /// Attempt to connect to Twitch IRC using this configuration.
  pub fn connect(self) -> impl Future<Output = Result<Session, ConnectError>> {
    Session::connect_with(self.config, self.dispatcher)
  }

  /// Run a session over an already established `stream`.
  ///
  /// Must be called from within a Tokio runtime.
  pub fn with_stream<S>(self, stream: S) -> Session
  where
    S: AsyncRead + AsyncWrite + Send + 'static,
  {
    Session::spawn(stream, self.config, self.dispatcher)
  }
}

/// A connection to Twitch IRC.
///
/// Dropping the session stops its read loop. The writer still writes every line
/// that was queued before the drop, then closes the connection.
/// [`Sender`]s obtained from it will fail with [`WriteError::StreamClosed`] afterwards.
pub struct Session {
  sender: Sender,
  dispatcher: Dispatcher,
  connected: watch::Receiver<bool>,
  reader: JoinHandle<()>,
  // dropping this tells the writer to stop accepting lines
  _shutdown: oneshot::Sender<()>,
  config: Config,
}

impl Session {
  pub fn builder() -> SessionBuilder {
    SessionBuilder::default()
  }

  /// Connect to the first endpoint with the default configuration.
  pub fn connect() -> impl Future<Output = Result<Session, ConnectError>> {
    Self::builder().connect()
  }

  /// Connect to the endpoint at `index` in [`endpoint::ENDPOINTS`].
  pub fn connect_to(index: usize) -> impl Future<Output = Result<Session, ConnectError>> {
    Self::builder().endpoint(index).connect()
  }

  /// Attempt to connect with the provided `config`, publishing events to `dispatcher`.
  ///
  /// Returns as soon as the TLS handshake completes.
  pub async fn connect_with(config: Config, dispatcher: Dispatcher) -> Result<Session, ConnectError> {
    let endpoint =
      endpoint::get(config.endpoint).ok_or(ConnectError::Endpoint(config.endpoint))?;
    if config.verbosity.allows(Verbosity::INFO) {
      info!(%endpoint, "connecting");
    }

    let tls = TlsConfig::load(ServerName::try_from(endpoint::HOST)?)?;
    let stream = conn::open(endpoint, tls).await?;
    if config.verbosity.allows(Verbosity::INFO) {
      info!(%endpoint, "connected over tls");
    }

    Ok(Self::spawn(stream, config, dispatcher))
  }

  fn spawn<S>(stream: S, config: Config, dispatcher: Dispatcher) -> Session
  where
    S: AsyncRead + AsyncWrite + Send + 'static,
  {
    let (reader, writer) = tokio::io::split(stream);
    let (lines, queue) = mpsc::unbounded_channel();
    let sender = Sender::new(lines, config.verbosity);
    let (connected_tx, connected) = watch::channel(true);

    trace!("spawning read loop");
    let reader = tokio::spawn(read::run(
      reader,
      dispatcher.clone(),
      sender.clone(),
      config.clone(),
      connected_tx,
    ));
    let (shutdown, shutdown_rx) = oneshot::channel();
    tokio::spawn(write::run(writer, queue, shutdown_rx));

    Session {
      sender,
      dispatcher,
      connected,
      reader,
      _shutdown: shutdown,
      config,
    }
  }
}

impl Session {
  #[inline]
  pub fn config(&self) -> &Config {
    &self.config
  }

  /// A cloneable handle for writing to this session, e.g. from inside a handler.
  pub fn sender(&self) -> Sender {
    self.sender.clone()
  }

  pub fn dispatcher(&self) -> &Dispatcher {
    &self.dispatcher
  }

  /// Register a closure to be called for every subsequent event.
  ///
  /// Handlers are called in the order they were registered.
  pub fn register_handler<F>(&self, f: F)
  where
    F: Fn(&ChatEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
  {
    self.dispatcher.register_fn(f)
  }

  /// Register a [`Handler`] to be called for every subsequent event.
  pub fn register(&self, handler: impl Handler) {
    self.dispatcher.register(handler)
  }

  /// See [`Sender::login`].
  pub fn login(
    &self,
    password: &str,
    nickname: &str,
    capabilities: Option<&str>,
  ) -> Result<(), WriteError> {
    self.sender.login(password, nickname, capabilities)
  }

  /// Log in with `credentials`, requesting the default capabilities.
  pub fn authenticate(&self, credentials: &Credentials) -> Result<(), WriteError> {
    self.sender.login(credentials.password(), credentials.nick(), None)
  }

  /// See [`Sender::join`].
  pub fn join(&self, channel: &str) -> Result<(), WriteError> {
    self.sender.join(channel)
  }

  /// See [`Sender::part`].
  pub fn part(&self, channel: &str) -> Result<(), WriteError> {
    self.sender.part(channel)
  }

  /// See [`Sender::send_channel_message`].
  pub fn send_channel_message(&self, text: &str, channel: &str) -> Result<(), WriteError> {
    self.sender.send_channel_message(text, channel)
  }

  /// See [`Sender::reply_to`].
  pub fn reply_to(&self, text: &str, message: &PrivateMessage) -> Result<(), WriteError> {
    self.sender.reply_to(text, message)
  }

  /// See [`Sender::pong`].
  pub fn pong(&self) -> Result<(), WriteError> {
    self.sender.pong()
  }

  /// See [`Sender::write_raw`].
  pub fn write_raw(&self, line: &str, suppress_logging: bool) -> Result<(), WriteError> {
    self.sender.write_raw(line, suppress_logging)
  }

  /// Returns `false` once the read loop has stopped.
  pub fn is_connected(&self) -> bool {
    *self.connected.borrow()
  }

  /// Wait until the read loop stops, which happens when the server closes the connection.
  pub async fn closed(&self) {
    let mut connected = self.connected.clone();
    while *connected.borrow_and_update() {
      if connected.changed().await.is_err() {
        break;
      }
    }
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    self.reader.abort();
  }
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("config", &self.config)
      .field("connected", &self.is_connected())
      .field("dispatcher", &self.dispatcher)
      .finish_non_exhaustive()
  }
}

/// An error which occurred while attempting to connect to Twitch IRC.
#[derive(Debug)]
pub enum ConnectError {
  /// There is no endpoint at this index.
  Endpoint(usize),

  /// The TLS server name is invalid.
  Dns(InvalidDnsNameError),

  /// Failed to set up TLS.
  Tls(TlsConfigError),

  /// Failed to open the connection or perform the TLS handshake.
  Open(OpenStreamError),
}

impl From<InvalidDnsNameError> for ConnectError {
  fn from(value: InvalidDnsNameError) -> Self {
    Self::Dns(value)
  }
}

impl From<TlsConfigError> for ConnectError {
  fn from(value: TlsConfigError) -> Self {
    Self::Tls(value)
  }
}

impl From<OpenStreamError> for ConnectError {
  fn from(value: OpenStreamError) -> Self {
    Self::Open(value)
  }
}

impl Display for ConnectError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ConnectError::Endpoint(index) => write!(
        f,
        "failed to connect: no endpoint at index {index}, there are {}",
        endpoint::ENDPOINTS.len()
      ),
      ConnectError::Dns(e) => write!(f, "failed to connect: {e}"),
      ConnectError::Tls(e) => write!(f, "failed to connect: {e}"),
      ConnectError::Open(e) => write!(f, "failed to connect: {e}"),
    }
  }
}

impl std::error::Error for ConnectError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ConnectError::Endpoint(_) => None,
      ConnectError::Dns(e) => Some(e),
      ConnectError::Tls(e) => Some(e),
      ConnectError::Open(e) => Some(e),
    }
  }
}

static_assert_send!(Session);
static_assert_sync!(Session);
