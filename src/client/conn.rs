use crate::endpoint::ServerEndpoint;
use std::fmt::Display;
use std::io;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerName};
use tokio_rustls::{rustls, TlsConnector};

pub type Stream = TlsStream<TcpStream>;

/// Open a TCP connection to `endpoint` and upgrade it to TLS.
///
/// The certificate is validated against the server name in `config`,
/// not against the endpoint's IP address.
pub async fn open(endpoint: ServerEndpoint, config: TlsConfig) -> Result<Stream, OpenStreamError> {
  trace!(%endpoint, "opening tcp connection");
  let tcp = TcpStream::connect(endpoint.socket_addr())
    .await
    .map_err(OpenStreamError::Connect)?;

  trace!(?config, "performing tls handshake");
  TlsConnector::from(config.client())
    .connect(config.server_name(), tcp)
    .await
    .map_err(OpenStreamError::Handshake)
}

/// Failed to open a TLS stream.
#[derive(Debug)]
pub enum OpenStreamError {
  /// The TCP connection could not be established.
  Connect(io::Error),
  /// The TLS handshake failed.
  Handshake(io::Error),
}

impl Display for OpenStreamError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      OpenStreamError::Connect(e) => write!(f, "failed to open tcp connection: {e}"),
      OpenStreamError::Handshake(e) => write!(f, "tls handshake failed: {e}"),
    }
  }
}

impl std::error::Error for OpenStreamError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      OpenStreamError::Connect(e) | OpenStreamError::Handshake(e) => Some(e),
    }
  }
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
  config: Arc<ClientConfig>,
  server_name: ServerName,
}

impl TlsConfig {
  pub fn load(server_name: ServerName) -> Result<Self, TlsConfigError> {
    trace!("loading native certificates");
    let native_certs = rustls_native_certs::load_native_certs()?
      .into_iter()
      .map(|cert| cert.0)
      .collect::<Vec<_>>();

    let mut root_store = RootCertStore::empty();
    let (added, skipped) = root_store.add_parsable_certificates(&native_certs[..]);
    trace!(added, skipped, "loaded native certificates");
    if added == 0 {
      return Err(TlsConfigError::NoCertificates);
    }

    let config = rustls::ClientConfig::builder()
      .with_safe_defaults()
      .with_root_certificates(root_store)
      .with_no_client_auth();
    Ok(Self {
      config: Arc::new(config),
      server_name,
    })
  }

  pub fn client(&self) -> Arc<ClientConfig> {
    self.config.clone()
  }

  pub fn server_name(&self) -> ServerName {
    self.server_name.clone()
  }
}

/// Failed to load the TLS config.
#[derive(Debug)]
pub enum TlsConfigError {
  /// Reading the platform certificate store failed.
  Io(io::Error),
  /// The platform certificate store has no usable certificates.
  NoCertificates,
}

impl From<io::Error> for TlsConfigError {
  fn from(value: io::Error) -> Self {
    Self::Io(value)
  }
}

impl Display for TlsConfigError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TlsConfigError::Io(e) => write!(f, "tls config error: {e}"),
      TlsConfigError::NoCertificates => write!(f, "tls config error: no usable root certificates"),
    }
  }
}

impl std::error::Error for TlsConfigError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      TlsConfigError::Io(e) => Some(e),
      TlsConfigError::NoCertificates => None,
    }
  }
}
