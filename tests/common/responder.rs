//! In-process nameservers for exercising the client.
//!
//! A responder listens on a local port and answers each request with the
//! messages a script returns for it. Messages are raw octets so scripts can
//! also send garbage.

use std::net::SocketAddr;
use std::sync::Arc;

use domain::base::iana::{Class, Rcode, Rtype};
use domain::base::message_builder::AnswerBuilder;
use domain::base::rdata::UnknownRecordData;
use domain::base::{Message, MessageBuilder, Name, Serial, Ttl};
use domain::rdata::{Ns, Soa, A};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

pub type Answer = AnswerBuilder<Vec<u8>>;

/// Decides which messages to send back for a request.
pub type Script = Arc<dyn Fn(&Message<Vec<u8>>) -> Vec<Vec<u8>> + Send + Sync>;

//------------ Servers -------------------------------------------------------

/// Serves TCP connections on a local port until the test ends.
pub async fn serve_tcp(script: Script) -> SocketAddr {
    serve_tcp_on(TcpListener::bind("127.0.0.1:0").await.unwrap(), script)
}

/// Serves TCP connections on an already bound listener.
pub fn serve_tcp_on(listener: TcpListener, script: Script) -> SocketAddr {
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            let script = script.clone();
            tokio::spawn(async move {
                let Ok(len) = sock.read_u16().await else { return };
                let mut buf = vec![0; len as usize];
                if sock.read_exact(&mut buf).await.is_err() {
                    return;
                }
                let req = Message::from_octets(buf).unwrap();
                for msg in script(&req) {
                    let len = u16::try_from(msg.len()).unwrap();
                    if sock.write_u16(len).await.is_err()
                        || sock.write_all(&msg).await.is_err()
                    {
                        return;
                    }
                }
            });
        }
    });
    addr
}

/// Answers datagrams on `sock` until the test ends.
///
/// Only the first message of the script is sent back.
pub fn serve_udp_on(sock: UdpSocket, script: Script) -> SocketAddr {
    let addr = sock.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0; 65535];
        loop {
            let Ok((len, peer)) = sock.recv_from(&mut buf).await else {
                return;
            };
            let req = Message::from_octets(buf[..len].to_vec()).unwrap();
            if let Some(msg) = script(&req).into_iter().next() {
                let _ = sock.send_to(&msg, peer).await;
            }
        }
    });
    addr
}

//------------ Messages ------------------------------------------------------

pub fn name(s: &str) -> Name<Vec<u8>> {
    Name::vec_from_str(s).unwrap()
}

/// Returns the question name of a request without the trailing dot.
pub fn qname(req: &Message<Vec<u8>>) -> String {
    req.first_question()
        .map(|q| q.qname().to_string())
        .unwrap_or_default()
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Builds a response to `req` filled in by `fill`.
pub fn message(
    req: &Message<Vec<u8>>,
    rcode: Rcode,
    fill: impl FnOnce(&mut Answer),
) -> Vec<u8> {
    let mut answer = MessageBuilder::new_vec().start_answer(req, rcode).unwrap();
    fill(&mut answer);
    answer.finish()
}

pub fn soa(answer: &mut Answer, zone: &str) {
    answer
        .push((
            name(zone),
            Class::IN,
            Ttl::from_secs(3600),
            Soa::new(
                name(&format!("ns0.{zone}")),
                name(&format!("hostmaster.{zone}")),
                Serial(2024030101),
                Ttl::from_secs(7200),
                Ttl::from_secs(900),
                Ttl::from_secs(1209600),
                Ttl::from_secs(300),
            ),
        ))
        .unwrap();
}

pub fn ns(answer: &mut Answer, owner: &str, target: &str) {
    answer
        .push((name(owner), Class::IN, Ttl::from_secs(3600), Ns::new(name(target))))
        .unwrap();
}

pub fn a(answer: &mut Answer, owner: &str, last_octet: u8) {
    answer
        .push((
            name(owner),
            Class::IN,
            Ttl::from_secs(300),
            A::from_octets(192, 0, 2, last_octet),
        ))
        .unwrap();
}

/// Pushes an A record whose data is one octet short.
pub fn broken_a(answer: &mut Answer, owner: &str) {
    let data = UnknownRecordData::from_octets(Rtype::A, vec![192, 0, 2]).unwrap();
    answer
        .push((name(owner), Class::IN, Ttl::from_secs(300), data))
        .unwrap();
}
