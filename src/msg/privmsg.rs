//! Represents a basic Twitch chat message sent by some user to a specific channel.

use once_cell::sync::OnceCell;
use std::hash::{Hash, Hasher};

/// Represents a basic Twitch chat message sent by some user to a specific channel.
///
/// Two messages are equal when their sender, channel and text are equal.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrivateMessage {
  sender: String,
  channel: String,
  text: String,

  #[cfg_attr(feature = "serde", serde(skip))]
  words: OnceCell<Vec<String>>,
}

impl PrivateMessage {
  /// Construct a message from its parts, stored as given.
  ///
  /// Messages produced by [`parse`][crate::msg::parse] already have their text lower-cased.
  pub fn new(sender: impl Into<String>, channel: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      sender: sender.into(),
      channel: channel.into(),
      text: text.into(),
      words: OnceCell::new(),
    }
  }

  /// Login of the user who sent this message.
  #[inline]
  pub fn sender(&self) -> &str {
    &self.sender
  }

  /// Channel in which this message was sent, without the leading `#`.
  #[inline]
  pub fn channel(&self) -> &str {
    &self.channel
  }

  /// Text content of the message.
  #[inline]
  pub fn text(&self) -> &str {
    &self.text
  }

  /// The text split on whitespace.
  ///
  /// Computed on first access.
  pub fn words(&self) -> &[String] {
    self
      .words
      .get_or_init(|| self.text.split_whitespace().map(String::from).collect())
  }

  /// Number of [`words`][PrivateMessage::words] in the text.
  pub fn word_count(&self) -> usize {
    self.words().len()
  }
}

impl PartialEq for PrivateMessage {
  fn eq(&self, other: &Self) -> bool {
    self.sender == other.sender && self.channel == other.channel && self.text == other.text
  }
}

impl Eq for PrivateMessage {}

impl Hash for PrivateMessage {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.sender.hash(state);
    self.channel.hash(state);
    self.text.hash(state);
  }
}

impl std::fmt::Debug for PrivateMessage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PrivateMessage")
      .field("sender", &self.sender)
      .field("channel", &self.channel)
      .field("text", &self.text)
      .finish()
  }
}

impl From<PrivateMessage> for super::ChatEvent {
  fn from(msg: PrivateMessage) -> Self {
    super::ChatEvent::PrivateMessage(msg)
  }
}
