//! Error type for the DNS client collaborators.

use std::error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use domain::base::iana::Rcode;
use domain::net::client::request;

/// Error type for queries and zone transfers.
#[derive(Clone, Debug)]
pub enum Error {
    /// The name to query could not be turned into a domain name.
    BadName(String),

    /// The nameserver name could not be resolved.
    Resolve(Arc<std::io::Error>),

    /// The nameserver name resolved to no address at all.
    NoAddress,

    /// Resolving the nameserver name took too long.
    ResolveTimeout,

    /// Connecting to the nameserver gave an error.
    Connect(Arc<std::io::Error>),

    /// Connecting to the nameserver took too long.
    ConnectTimeout,

    /// PushError from MessageBuilder.
    MessageBuilderPushError,

    /// ParseError from Message.
    MessageParseError,

    /// Octet sequence too short to be a valid DNS message.
    ShortMessage,

    /// Reading from stream gave an error.
    StreamReadError(Arc<std::io::Error>),

    /// Reading from stream took too long.
    StreamReadTimeout,

    /// Writing to a stream gave an error.
    StreamWriteError(Arc<std::io::Error>),

    /// Reading for a stream ended unexpectedly.
    StreamUnexpectedEndOfData,

    /// The query transport gave an error.
    Request(request::Error),

    /// Reply does not match the query.
    WrongReplyForQuery,

    /// The server answered with an error response code.
    Rcode(Rcode),

    /// The response message is not an XFR response.
    NotValidXfrResponse,

    /// The transfer did not start with the zone's SOA record.
    MissingInitialSoa,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::BadName(name) => write!(f, "invalid domain name '{name}'"),
            Error::Resolve(err) => {
                write!(f, "error resolving nameserver: {err}")
            }
            Error::NoAddress => write!(f, "nameserver has no address"),
            Error::ResolveTimeout => {
                write!(f, "timeout resolving nameserver")
            }
            Error::Connect(err) => write!(f, "error connecting: {err}"),
            Error::ConnectTimeout => write!(f, "timeout connecting"),
            Error::MessageBuilderPushError => {
                write!(f, "PushError from MessageBuilder")
            }
            Error::MessageParseError => write!(f, "ParseError from Message"),
            Error::ShortMessage => {
                write!(f, "octet sequence to short to be a valid message")
            }
            Error::StreamReadError(err) => {
                write!(f, "error reading from stream: {err}")
            }
            Error::StreamReadTimeout => {
                write!(f, "timeout reading from stream")
            }
            Error::StreamWriteError(err) => {
                write!(f, "error writing to stream: {err}")
            }
            Error::StreamUnexpectedEndOfData => {
                write!(f, "unexpected end of data")
            }
            Error::Request(err) => write!(f, "query failed: {err}"),
            Error::WrongReplyForQuery => {
                write!(f, "reply does not match query")
            }
            Error::Rcode(rcode) => write!(f, "server responded with {rcode}"),
            Error::NotValidXfrResponse => {
                write!(f, "not a valid XFR response")
            }
            Error::MissingInitialSoa => {
                write!(f, "transfer does not start with a SOA record")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Resolve(e) => Some(e),
            Error::Connect(e) => Some(e),
            Error::StreamReadError(e) => Some(e),
            Error::StreamWriteError(e) => Some(e),
            Error::Request(e) => Some(e),
            _ => None,
        }
    }
}
