//! ## Twitch IRC endpoints
//!
//! Known server addresses and the protocol constants used during connection
//! and login. Nothing here changes after startup.

use std::fmt::Display;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Hostname used for TLS certificate validation.
///
/// The TCP connection itself goes to one of the [`ENDPOINTS`] literals,
/// but the certificate is always checked against this name.
pub const HOST: &str = "irc.chat.twitch.tv";

/// TLS port of Twitch IRC.
pub const PORT: u16 = 6697;

/// Capabilities requested by [`login`][crate::Session::login] when none are supplied.
pub const DEFAULT_CAPABILITIES: &str = "twitch.tv/membership twitch.tv/tags twitch.tv/commands";

/// Known Twitch IRC servers, in order of preference.
pub const ENDPOINTS: [ServerEndpoint; 3] = [
  ServerEndpoint::new(Ipv4Addr::new(34, 217, 198, 238), PORT),
  ServerEndpoint::new(Ipv4Addr::new(44, 226, 36, 141), PORT),
  ServerEndpoint::new(Ipv4Addr::new(100, 20, 159, 232), PORT),
];

/// Look up the endpoint at `index` in [`ENDPOINTS`].
pub fn get(index: usize) -> Option<ServerEndpoint> {
  ENDPOINTS.get(index).copied()
}

/// An IP address paired with the port it serves on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
  address: Ipv4Addr,
  port: u16,
}

impl ServerEndpoint {
  pub const fn new(address: Ipv4Addr, port: u16) -> Self {
    Self { address, port }
  }

  #[inline]
  pub fn address(&self) -> Ipv4Addr {
    self.address
  }

  #[inline]
  pub fn port(&self) -> u16 {
    self.port
  }

  pub fn socket_addr(&self) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
  }
}

impl Display for ServerEndpoint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.address, self.port)
  }
}
