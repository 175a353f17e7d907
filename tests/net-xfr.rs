mod common;

use std::sync::Arc;

use domain::base::iana::{Rcode, Rtype};
use domain::base::Message;
use futures_util::StreamExt;
use zonewalk::net::{Client, Config, Error, TransferSource, XfrStream};
use zonewalk::record::ResourceRecord;
use zonewalk::task::Task;

use common::responder::{a, broken_a, message, ns, serve_tcp, soa, Script};

//----------- Helpers --------------------------------------------------------

async fn start(script: Script) -> (Client, Task) {
    common::init_logging();
    let addr = serve_tcp(script).await;
    let mut config = Config::new();
    config.set_port(addr.port());
    (Client::new(config), Task::new("example.com", "127.0.0.1"))
}

async fn collect(
    stream: XfrStream,
) -> (Vec<Vec<ResourceRecord>>, Vec<Error>) {
    let items: Vec<_> = stream.collect().await;
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for item in items {
        match item {
            Ok(item) => records.push(item),
            Err(err) => errors.push(err),
        }
    }
    (records, errors)
}

//----------- Tests ----------------------------------------------------------

#[tokio::test]
async fn transfer_spanning_messages() {
    let script: Script = Arc::new(|req: &Message<Vec<u8>>| {
        vec![
            message(req, Rcode::NOERROR, |answer| {
                soa(answer, "example.com.");
                ns(answer, "example.com.", "ns1.example.com.");
                a(answer, "www.example.com.", 1);
            }),
            message(req, Rcode::NOERROR, |answer| {
                a(answer, "mail.example.com.", 2);
                soa(answer, "example.com.");
            }),
        ]
    });
    let (client, task) = start(script).await;
    let stream = client.transfer(&task).await.unwrap();
    let (records, errors) = collect(stream).await;

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].len(), 3);
    assert_eq!(records[1].len(), 1);
    assert_eq!(records[0][0].rtype(), Rtype::SOA);
    assert_eq!(records[0][1].target(), Some("ns1.example.com."));
    assert_eq!(records[1][0].owner(), "mail.example.com.");
    assert_eq!(records[1][0].data(), "192.0.2.2");
    // The closing SOA is not handed out again.
    let soas = records
        .iter()
        .flatten()
        .filter(|rr| rr.rtype() == Rtype::SOA)
        .count();
    assert_eq!(soas, 1);
}

#[tokio::test]
async fn broken_message_does_not_end_transfer() {
    let script: Script = Arc::new(|req: &Message<Vec<u8>>| {
        vec![
            message(req, Rcode::NOERROR, |answer| {
                soa(answer, "example.com.");
                a(answer, "a.example.com.", 1);
            }),
            vec![1, 2, 3, 4, 5],
            message(req, Rcode::NOERROR, |answer| {
                a(answer, "b.example.com.", 2);
                soa(answer, "example.com.");
            }),
        ]
    });
    let (client, task) = start(script).await;
    let stream = client.transfer(&task).await.unwrap();
    let (records, errors) = collect(stream).await;

    assert_eq!(records.iter().map(Vec::len).sum::<usize>(), 3);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::ShortMessage));
}

#[tokio::test]
async fn broken_record_does_not_end_message() {
    let script: Script = Arc::new(|req: &Message<Vec<u8>>| {
        vec![message(req, Rcode::NOERROR, |answer| {
            soa(answer, "example.com.");
            a(answer, "one.example.com.", 1);
            broken_a(answer, "bad.example.com.");
            a(answer, "two.example.com.", 2);
            soa(answer, "example.com.");
        })]
    });
    let (client, task) = start(script).await;
    let stream = client.transfer(&task).await.unwrap();
    let (records, errors) = collect(stream).await;

    let owners: Vec<_> = records
        .iter()
        .flatten()
        .map(|rr| rr.owner().to_string())
        .collect();
    assert_eq!(
        owners,
        ["example.com.", "one.example.com.", "two.example.com."]
    );
    // The closing SOA still ends the transfer cleanly.
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(errors[0], Error::MessageParseError));
}

#[tokio::test]
async fn early_close_ends_stream_with_error() {
    let script: Script = Arc::new(|req: &Message<Vec<u8>>| {
        vec![message(req, Rcode::NOERROR, |answer| {
            soa(answer, "example.com.");
            a(answer, "a.example.com.", 1);
        })]
    });
    let (client, task) = start(script).await;
    let stream = client.transfer(&task).await.unwrap();
    let (records, errors) = collect(stream).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].len(), 2);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Error::StreamUnexpectedEndOfData));
}

#[tokio::test]
async fn refused_transfer_fails_up_front() {
    let script: Script = Arc::new(|req: &Message<Vec<u8>>| {
        vec![message(req, Rcode::REFUSED, |_| {})]
    });
    let (client, task) = start(script).await;
    let err = client.transfer(&task).await.err().unwrap();
    assert!(matches!(err, Error::Rcode(rcode) if rcode == Rcode::REFUSED));
    assert_eq!(err.to_string(), "server responded with REFUSED");
}

#[tokio::test]
async fn transfer_must_start_with_soa() {
    let script: Script = Arc::new(|req: &Message<Vec<u8>>| {
        vec![message(req, Rcode::NOERROR, |answer| {
            a(answer, "a.example.com.", 1);
        })]
    });
    let (client, task) = start(script).await;
    let err = client.transfer(&task).await.err().unwrap();
    assert!(matches!(err, Error::MissingInitialSoa));
}

#[tokio::test]
async fn unreachable_nameserver_fails_up_front() {
    common::init_logging();
    // Bind and drop a listener to find a port nobody listens on.
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = Config::new();
    config.set_port(port);
    let client = Client::new(config);
    let task = Task::new("example.com", "127.0.0.1");
    let err = client.transfer(&task).await.err().unwrap();
    assert!(matches!(err, Error::Connect(_) | Error::ConnectTimeout));
}
