//! Zone transfers over TCP.
//!
//! An AXFR is one request followed by a sequence of response messages on
//! the same TCP connection. The first message must start with the SOA
//! record of the zone and the transfer ends when that same SOA record shows
//! up again (RFC 5936, section 2.2).
//!
//! [`transfer`] checks the first response before handing out a stream, so
//! a refused or otherwise broken transfer is reported as an error up front.
//! After that, every response message becomes one item of the
//! [`XfrStream`]: either the records it contained or the error that
//! prevented processing it. Errors in one message do not end the stream;
//! only a broken connection does.

use std::collections::VecDeque;
use std::pin::Pin;

use domain::base::iana::{Opcode, Rcode, Rtype};
use domain::base::Message;
use domain::rdata::AllRecordData;
use futures_util::stream::{self, Stream};
use tokio::net::TcpStream;
use tokio::time::Duration;
use tracing::{debug, trace};

use super::query::build_query;
use super::{read_octets, to_message, to_name, write_message, Client, Error};
use crate::record::ResourceRecord;
use crate::task::Task;

//------------ XfrStream -----------------------------------------------------

/// The records of a zone transfer, one item per response message.
pub type XfrStream =
    Pin<Box<dyn Stream<Item = Result<Vec<ResourceRecord>, Error>> + Send>>;

/// Starts an AXFR of `task.domain()` from `task.nameserver()`.
pub async fn transfer(client: &Client, task: &Task) -> Result<XfrStream, Error> {
    let qname = to_name(task.domain())?;
    let request = build_query(&qname, Rtype::AXFR, false)?;
    let id = request.header().id();
    let read_timeout = client.config().read_timeout();

    let mut sock = client.connect(task.nameserver()).await?;
    write_message(&mut sock, request.as_slice()).await?;
    let octets = read_octets(&mut sock, read_timeout)
        .await?
        .ok_or(Error::StreamUnexpectedEndOfData)?;
    let first = to_message(octets, id)?;

    let mut interpreter = Interpreter::new();
    interpreter.check_response(&first)?;
    let (records, err) = interpreter.interpret(&first);
    if records.is_empty() {
        if let Some(err) = err {
            return Err(err);
        }
    }
    debug!("transfer of {task} started");

    let mut reader = Reader {
        sock,
        id,
        read_timeout,
        interpreter,
        queue: VecDeque::new(),
        done: false,
    };
    reader.push(records, err);
    Ok(Box::pin(stream::unfold(reader, |mut reader| async move {
        reader.next_item().await.map(|item| (item, reader))
    })))
}

//------------ Reader --------------------------------------------------------

/// The state of a transfer in progress.
struct Reader {
    /// The connection to the nameserver.
    sock: TcpStream,

    /// The ID of the AXFR request.
    id: u16,

    /// How long to wait for each message.
    read_timeout: Duration,

    /// Interprets the records of each message.
    interpreter: Interpreter,

    /// Items produced but not yet handed out.
    queue: VecDeque<Result<Vec<ResourceRecord>, Error>>,

    /// No more messages will be read.
    done: bool,
}

impl Reader {
    /// Returns the next stream item, reading messages as needed.
    async fn next_item(
        &mut self,
    ) -> Option<Result<Vec<ResourceRecord>, Error>> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Some(item);
            }
            if self.done {
                return None;
            }
            match read_octets(&mut self.sock, self.read_timeout).await {
                Ok(Some(octets)) => self.process(octets),
                Ok(None) => {
                    self.done = true;
                    self.queue.push_back(Err(Error::StreamUnexpectedEndOfData));
                }
                Err(err) => {
                    self.done = true;
                    self.queue.push_back(Err(err));
                }
            }
        }
    }

    /// Processes a single response message.
    fn process(&mut self, octets: Vec<u8>) {
        let msg = match to_message(octets, self.id) {
            Ok(msg) => msg,
            Err(err) => {
                self.queue.push_back(Err(err));
                return;
            }
        };
        if let Err(err) = self.interpreter.check_response(&msg) {
            self.queue.push_back(Err(err));
            return;
        }
        let (records, err) = self.interpreter.interpret(&msg);
        self.push(records, err);
    }

    /// Queues the outcome of interpreting one message.
    fn push(&mut self, records: Vec<ResourceRecord>, err: Option<Error>) {
        if !records.is_empty() {
            self.queue.push_back(Ok(records));
        }
        if let Some(err) = err {
            self.queue.push_back(Err(err));
        }
        if self.interpreter.is_finished() {
            trace!(
                "transfer finished after {} records",
                self.interpreter.rr_count
            );
            self.done = true;
        }
    }
}

//------------ Interpreter ---------------------------------------------------

/// Follows the record sequence of an AXFR.
#[derive(Debug, Default)]
struct Interpreter {
    /// The SOA record that opened the transfer.
    initial_soa: Option<ResourceRecord>,

    /// The number of resource records seen so far.
    rr_count: usize,

    /// True once the closing SOA record has been seen.
    finished: bool,
}

impl Interpreter {
    fn new() -> Self {
        Self::default()
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    /// Checks that `msg` looks like an AXFR response.
    fn check_response(&self, msg: &Message<Vec<u8>>) -> Result<(), Error> {
        let header = msg.header();
        let counts = msg.header_counts();

        let rcode = header.rcode();
        if rcode != Rcode::NOERROR {
            return Err(Error::Rcode(rcode));
        }
        if !header.qr()
            || header.opcode() != Opcode::QUERY
            || header.tc()
            || counts.ancount() == 0
        {
            return Err(Error::NotValidXfrResponse);
        }

        // QDCOUNT must be 1 in the first message and 0 or 1 afterwards.
        let qdcount = counts.qdcount();
        let first_message = self.initial_soa.is_none();
        if (first_message && qdcount != 1) || (!first_message && qdcount > 1)
        {
            return Err(Error::NotValidXfrResponse);
        }
        Ok(())
    }

    /// Returns the records of `msg` that belong to the zone.
    ///
    /// The opening SOA record is included, the closing copy is not. Records
    /// that fail to decode are skipped and reported as a single error for
    /// the message.
    fn interpret(
        &mut self,
        msg: &Message<Vec<u8>>,
    ) -> (Vec<ResourceRecord>, Option<Error>) {
        let mut res = Vec::new();
        let mut err = None;
        let answer = match msg.answer() {
            Ok(answer) => answer,
            Err(_) => return (res, Some(Error::MessageParseError)),
        };
        for record in answer.limit_to::<AllRecordData<_, _>>() {
            if self.finished {
                break;
            }
            let record = match record {
                Ok(record) => ResourceRecord::from_record(&record),
                Err(_) => {
                    err.get_or_insert(Error::MessageParseError);
                    continue;
                }
            };
            self.rr_count += 1;

            if self.rr_count == 1 {
                if record.rtype() != Rtype::SOA {
                    return (res, Some(Error::MissingInitialSoa));
                }
                self.initial_soa = Some(record.clone());
                res.push(record);
            } else if self.initial_soa.as_ref() == Some(&record) {
                self.finished = true;
            } else {
                res.push(record);
            }
        }
        (res, err)
    }
}
