//! ## Chat events
//!
//! The entrypoint to this module is [`parse`], which turns one chunk of
//! inbound text into a list of [`ChatEvent`]s.
//!
//! ```rust
//! let events = tmi_lite::msg::parse(
//!   ":ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :Hello There\r\n",
//! );
//! assert_eq!(events[0].text(), Some("hello there"));
//! ```
//!
//! ⚠ This is _not_ a general IRC parser! It only recognizes Twitch chat lines
//! and server pings, and silently ignores everything else.

mod privmsg;

pub use privmsg::PrivateMessage;

use once_cell::sync::Lazy;
use regex::Regex;

static PRIVMSG: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r":(\w+)!\w+@\w+\.tmi\.twitch\.tv PRIVMSG #(\w+) :(.+)\r")
    .expect("PRIVMSG pattern is valid")
});

static PING: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"PING :tmi\.twitch\.tv").expect("PING pattern is valid"));

/// Parse every recognized event out of `chunk`.
///
/// - Each `PRIVMSG` line yields a [`ChatEvent::PrivateMessage`], with its text lower-cased.
///   Chat lines must be terminated by `\r` to be recognized.
/// - If the chunk contains a server ping, a single [`ChatEvent::PingRequest`] is appended,
///   no matter how many ping lines it contains.
///
/// Identical messages within the same chunk are collapsed into the first occurrence.
/// Anything else is dropped without error.
pub fn parse(chunk: &str) -> Vec<ChatEvent> {
  let mut events = Vec::new();

  for captures in PRIVMSG.captures_iter(chunk) {
    let event = ChatEvent::PrivateMessage(PrivateMessage::new(
      &captures[1],
      &captures[2],
      captures[3].to_lowercase(),
    ));
    if !events.contains(&event) {
      events.push(event);
    }
  }

  if PING.is_match(chunk) {
    events.push(ChatEvent::PingRequest);
  }

  let ignored = chunk
    .split_inclusive('\n')
    .filter(|line| !line.trim().is_empty())
    .filter(|line| !PRIVMSG.is_match(line) && !PING.is_match(line))
    .count();
  if ignored > 0 {
    trace!(ignored, "ignored unrecognized lines");
  }

  events
}

/// A parsed chat event.
///
/// Handlers receive every event and match on the variant they care about.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChatEvent {
  /// A chat line from a user in a channel.
  PrivateMessage(PrivateMessage),

  /// Sent regularly by TMI to ensure clients are still live.
  ///
  /// TMI expects a `PONG` in response, see [`Config::auto_pong`][crate::client::Config::auto_pong].
  PingRequest,
}

impl ChatEvent {
  /// Parse every recognized event out of `chunk`. See [`parse`].
  #[inline]
  pub fn parse(chunk: &str) -> Vec<ChatEvent> {
    parse(chunk)
  }

  pub fn as_private_message(&self) -> Option<&PrivateMessage> {
    match self {
      ChatEvent::PrivateMessage(msg) => Some(msg),
      ChatEvent::PingRequest => None,
    }
  }

  pub fn is_ping(&self) -> bool {
    matches!(self, ChatEvent::PingRequest)
  }

  /// Text content of the event, if it has any.
  pub fn text(&self) -> Option<&str> {
    self.as_private_message().map(PrivateMessage::text)
  }

  /// The text split on whitespace, if the event has any text.
  pub fn words(&self) -> Option<&[String]> {
    self.as_private_message().map(PrivateMessage::words)
  }

  /// Number of words in the text.
  ///
  /// Fails for events which carry no text at all.
  pub fn word_count(&self) -> Result<usize, WordCountError> {
    self.words().map(<[String]>::len).ok_or(WordCountError)
  }
}

/// Requested the word count of an event that has no text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WordCountError;

impl std::fmt::Display for WordCountError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("word count requested on an event without text")
  }
}

impl std::error::Error for WordCountError {}
