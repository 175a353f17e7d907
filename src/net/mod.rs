//! Talking to nameservers.
//!
//! Enumeration needs two kinds of exchanges with a nameserver: a plain
//! query for one record type and a zone transfer. Both are expressed as
//! traits, [`Lookup`] and [`TransferSource`], so that the prober and the
//! crawler can be driven by something other than the network. The
//! [`Client`] implements both. Plain queries use the UDP/TCP client
//! transport of the `domain` crate, zone transfers run over `tokio` TCP
//! sockets with message encoding and decoding done by `domain`.
//!
//! Every network step is bounded by the [read timeout] of the client's
//! [`Config`]. A UDP query without any answer is sent once more, nothing
//! else is retried.
//!
//! [read timeout]: Config::read_timeout

pub use self::error::Error;
pub use self::xfr::XfrStream;

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use bytes::BytesMut;
use domain::base::iana::Rtype;
use domain::base::{Message, Name};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::trace;

use crate::config::DefMinMax;
use crate::record::ResourceRecord;
use crate::task::Task;

pub mod error;
pub mod query;
pub mod xfr;

//------------ Configuration Constants ----------------------------------------

/// Configuration limits for the read timeout.
const READ_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(3),
    Duration::from_millis(1),
    Duration::from_secs(600),
);

/// The well-known DNS port.
pub const DEFAULT_PORT: u16 = 53;

//------------ Config ---------------------------------------------------------

/// Configuration for talking to nameservers.
#[derive(Clone, Debug)]
pub struct Config {
    /// Timeout for each individual network step.
    read_timeout: Duration,

    /// The port nameservers listen on.
    port: u16,
}

impl Config {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the read timeout.
    ///
    /// This bounds name resolution, connecting, every single read of a
    /// zone transfer, and every UDP exchange.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Sets the read timeout.
    ///
    /// If this value is too small or too large, it will be caped.
    pub fn set_read_timeout(&mut self, value: Duration) {
        self.read_timeout = READ_TIMEOUT.limit(value)
    }

    /// Returns the port nameservers are contacted on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Sets the port nameservers are contacted on.
    pub fn set_port(&mut self, value: u16) {
        self.port = value
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_timeout: READ_TIMEOUT.default(),
            port: DEFAULT_PORT,
        }
    }
}

//------------ Lookup --------------------------------------------------------

/// Sends a single query to a nameserver.
pub trait Lookup: Send + Sync + 'static {
    /// Asks `nameserver` for the `rtype` records of `name`.
    ///
    /// Returns the records of the answer section.
    fn query<'a>(
        &'a self,
        name: &'a str,
        rtype: Rtype,
        nameserver: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ResourceRecord>, Error>>;
}

//------------ TransferSource ------------------------------------------------

/// Starts zone transfers.
pub trait TransferSource: Send + Sync + 'static {
    /// Starts transferring `task.domain()` from `task.nameserver()`.
    ///
    /// An error means the transfer could not be started at all. Once
    /// started, the returned stream yields the records of each response
    /// message or an error for messages that could not be processed.
    fn transfer<'a>(
        &'a self,
        task: &'a Task,
    ) -> BoxFuture<'a, Result<XfrStream, Error>>;
}

//------------ Client --------------------------------------------------------

/// A client talking to real nameservers.
#[derive(Clone, Debug, Default)]
pub struct Client {
    config: Arc<Config>,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Client {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves `nameserver` into a socket address.
    ///
    /// IP literals are used directly, host names are resolved via the
    /// system resolver and the first address is used.
    pub async fn resolve(&self, nameserver: &str) -> Result<SocketAddr, Error> {
        let host = nameserver.trim_end_matches('.');
        if let Ok(addr) = IpAddr::from_str(host) {
            return Ok(SocketAddr::new(addr, self.config.port));
        }
        let lookup = tokio::net::lookup_host((host, self.config.port));
        let mut addrs = timeout(self.config.read_timeout, lookup)
            .await
            .map_err(|_| Error::ResolveTimeout)?
            .map_err(|err| Error::Resolve(Arc::new(err)))?;
        let addr = addrs.next().ok_or(Error::NoAddress)?;
        trace!("resolved {nameserver} to {addr}");
        Ok(addr)
    }

    /// Opens a TCP connection to `nameserver`.
    async fn connect(&self, nameserver: &str) -> Result<TcpStream, Error> {
        let addr = self.resolve(nameserver).await?;
        self.connect_addr(addr).await
    }

    /// Opens a TCP connection to an already resolved address.
    async fn connect_addr(&self, addr: SocketAddr) -> Result<TcpStream, Error> {
        timeout(self.config.read_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout)?
            .map_err(|err| Error::Connect(Arc::new(err)))
    }
}

impl Lookup for Client {
    fn query<'a>(
        &'a self,
        name: &'a str,
        rtype: Rtype,
        nameserver: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ResourceRecord>, Error>> {
        Box::pin(query::query(self, name, rtype, nameserver))
    }
}

impl TransferSource for Client {
    fn transfer<'a>(
        &'a self,
        task: &'a Task,
    ) -> BoxFuture<'a, Result<XfrStream, Error>> {
        Box::pin(xfr::transfer(self, task))
    }
}

//------------ Helpers -------------------------------------------------------

/// Converts a textual name into an absolute domain name.
pub fn to_name(name: &str) -> Result<Name<Vec<u8>>, Error> {
    Name::vec_from_str(&crate::task::fqdn(name))
        .map_err(|_| Error::BadName(name.into()))
}

/// Writes a DNS message with its two octet length prefix.
async fn write_message(
    sock: &mut TcpStream,
    msg: &[u8],
) -> Result<(), Error> {
    let len =
        u16::try_from(msg.len()).map_err(|_| Error::MessageBuilderPushError)?;
    let mut buf = Vec::with_capacity(msg.len() + 2);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(msg);
    sock.write_all(&buf)
        .await
        .map_err(|err| Error::StreamWriteError(Arc::new(err)))
}

/// Reads the octets of one length-prefixed DNS message.
///
/// Returns `Ok(None)` if the peer closed the connection cleanly before the
/// length prefix.
async fn read_octets(
    sock: &mut TcpStream,
    read_timeout: Duration,
) -> Result<Option<Vec<u8>>, Error> {
    let len = match timeout(read_timeout, sock.read_u16()).await {
        Err(_) => return Err(Error::StreamReadTimeout),
        Ok(Ok(len)) => len as usize,
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(None)
        }
        Ok(Err(err)) => return Err(Error::StreamReadError(Arc::new(err))),
    };

    let mut buf = BytesMut::with_capacity(len);
    while buf.len() < len {
        let read = timeout(read_timeout, sock.read_buf(&mut buf))
            .await
            .map_err(|_| Error::StreamReadTimeout)?
            .map_err(|err| Error::StreamReadError(Arc::new(err)))?;
        if read == 0 {
            return Err(Error::StreamUnexpectedEndOfData);
        }
    }
    Ok(Some(buf.to_vec()))
}

/// Turns octets into a message, checking the message ID.
fn to_message(octets: Vec<u8>, id: u16) -> Result<Message<Vec<u8>>, Error> {
    let msg = Message::from_octets(octets).map_err(|_| Error::ShortMessage)?;
    if msg.header().id() != id || !msg.header().qr() {
        return Err(Error::WrongReplyForQuery);
    }
    Ok(msg)
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn timeout_is_capped() {
        let mut config = Config::new();
        assert_eq!(config.read_timeout(), Duration::from_secs(3));
        config.set_read_timeout(Duration::ZERO);
        assert_eq!(config.read_timeout(), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn address_literals_skip_resolution() {
        let mut config = Config::new();
        config.set_port(5353);
        let client = Client::new(config);
        assert_eq!(
            client.resolve("192.0.2.1").await.unwrap(),
            "192.0.2.1:5353".parse().unwrap()
        );
        assert_eq!(
            client.resolve("2001:db8::1").await.unwrap(),
            "[2001:db8::1]:5353".parse().unwrap()
        );
    }

    #[test]
    fn names_become_absolute() {
        let name = to_name("Example.com").unwrap();
        assert_eq!(name.to_string(), "example.com");
        assert!(to_name("a..b").is_err());
    }
}
