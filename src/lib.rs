//! # tmi-lite
//!
//! A minimal client for Twitch chat over IRC.
//!
//! - [`endpoint`] lists the known servers and protocol constants.
//! - [`msg`] turns raw inbound text into [`ChatEvent`]s.
//! - [`dispatch`] calls your handlers for every event.
//! - [`client`] owns the TLS connection and ties the above together in a [`Session`].
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = tmi_lite::Session::builder()
//!   .verbosity(tmi_lite::Verbosity::INFO)
//!   .handler(|event| {
//!     if let Some(msg) = event.as_private_message() {
//!       println!("#{} {}: {}", msg.channel(), msg.sender(), msg.text());
//!     }
//!     Ok(())
//!   })
//!   .connect()
//!   .await?;
//!
//! session.authenticate(&tmi_lite::Credentials::anon())?;
//! session.join("forsen")?;
//! session.closed().await;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub(crate) const fn assert_sync<T: ?Sized + Sync>() {}
macro_rules! static_assert_sync {
  ($T:ty) => {
    const _: () = {
      let _ = $crate::assert_sync::<$T>;
    };
  };
}

pub(crate) const fn assert_send<T: ?Sized + Send>() {}
macro_rules! static_assert_send {
  ($T:ty) => {
    const _: () = {
      let _ = $crate::assert_send::<$T>;
    };
  };
}

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "client")]
pub use client::write::{Sender, WriteError};
#[cfg(feature = "client")]
pub use client::{Config, ConnectError, Credentials, Session, SessionBuilder, Verbosity};

pub mod dispatch;
pub use dispatch::{Dispatcher, Handler, HandlerError};

pub mod endpoint;
pub use endpoint::ServerEndpoint;

pub mod msg;
pub use msg::{ChatEvent, PrivateMessage, WordCountError};
