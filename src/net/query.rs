//! Single request/response exchanges.
//!
//! Queries go through the UDP-with-TCP-fallback transport of the `domain`
//! crate: the question is asked over UDP first and, if the answer comes back
//! truncated, again over TCP.

use domain::base::iana::{Rcode, Rtype};
use domain::base::{Message, MessageBuilder, Name};
use domain::net::client::protocol::{TcpConnect, UdpConnect};
use domain::net::client::request::{RequestMessage, SendRequest};
use domain::net::client::{dgram, dgram_stream, multi_stream, stream};
use domain::rdata::AllRecordData;
use tracing::{debug, trace};

use super::{Client, Error};
use crate::record::ResourceRecord;

/// Asks `nameserver` for the `rtype` records of `name`.
pub async fn query(
    client: &Client,
    name: &str,
    rtype: Rtype,
    nameserver: &str,
) -> Result<Vec<ResourceRecord>, Error> {
    let qname = super::to_name(name)?;
    let request = RequestMessage::new(build_query(&qname, rtype, true)?);
    let addr = client.resolve(nameserver).await?;

    let (conn, transport) = dgram_stream::Connection::with_config(
        UdpConnect::new(addr),
        TcpConnect::new(addr),
        transport_config(client),
    );
    // Ends once `conn` is dropped.
    tokio::spawn(transport.run());
    trace!("sending {rtype} query for {name} to {addr}");
    let reply = conn
        .send_request(request)
        .get_response()
        .await
        .map_err(Error::Request)?;
    let response = Message::from_octets(reply.as_slice().to_vec())
        .map_err(|_| Error::ShortMessage)?;

    let rcode = response.header().rcode();
    if rcode != Rcode::NOERROR {
        debug!("{name} {rtype} @ {nameserver}: {rcode}");
    }
    answer_records(&response)
}

/// Returns the transport settings derived from the client's config.
fn transport_config(client: &Client) -> dgram_stream::Config {
    let read_timeout = client.config().read_timeout();
    let mut dgram_config = dgram::Config::new();
    dgram_config.set_read_timeout(read_timeout);
    dgram_config.set_max_retries(1);
    let mut stream_config = stream::Config::new();
    stream_config.set_response_timeout(read_timeout);
    dgram_stream::Config::from_parts(
        dgram_config,
        multi_stream::Config::from(stream_config),
    )
}

/// Builds a query message for `qname` and `rtype`.
pub(super) fn build_query(
    qname: &Name<Vec<u8>>,
    rtype: Rtype,
    recursion_desired: bool,
) -> Result<Message<Vec<u8>>, Error> {
    let mut msg = MessageBuilder::new_vec();
    msg.header_mut().set_random_id();
    msg.header_mut().set_rd(recursion_desired);
    let mut msg = msg.question();
    msg.push((qname.clone(), rtype))
        .map_err(|_| Error::MessageBuilderPushError)?;
    Ok(msg.into_message())
}

/// Converts the answer section of a response.
///
/// The first record that fails to decode fails the whole message.
fn answer_records(
    msg: &Message<Vec<u8>>,
) -> Result<Vec<ResourceRecord>, Error> {
    let answer = msg.answer().map_err(|_| Error::MessageParseError)?;
    let mut res = Vec::new();
    for record in answer.limit_to::<AllRecordData<_, _>>() {
        let record = record.map_err(|_| Error::MessageParseError)?;
        res.push(ResourceRecord::from_record(&record));
    }
    Ok(res)
}
