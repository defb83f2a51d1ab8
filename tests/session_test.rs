//! Client state machine tests against a scripted peer (no network).

use bytes::Bytes;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use udpsim::transport::{RecvFuture, SendFuture, Transport};
use udpsim::{ClientSession, ExchangeOutcome, Message, SessionState, SimConfig, SimError};

/// Transport whose receives are served from a canned reply queue.
///
/// Each `recv_from` pops one entry: `Some(bytes)` is delivered immediately,
/// `None` (or an empty queue) pends forever so the caller's timeout fires.
/// Every `send_to` is counted and recorded.
#[derive(Clone)]
struct ScriptedTransport {
    inner: Arc<Inner>,
}

struct Inner {
    sends: AtomicUsize,
    sent: Mutex<Vec<Bytes>>,
    replies: Mutex<VecDeque<Option<Bytes>>>,
    peer: SocketAddr,
}

impl ScriptedTransport {
    fn new(replies: Vec<Option<Message>>) -> Self {
        let replies = replies
            .into_iter()
            .map(|slot| slot.map(|msg| msg.encode()))
            .collect();
        Self {
            inner: Arc::new(Inner {
                sends: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
                replies: Mutex::new(replies),
                peer: peer_addr(),
            }),
        }
    }

    fn silent() -> Self {
        Self::new(Vec::new())
    }

    fn send_count(&self) -> usize {
        self.inner.sends.load(Ordering::SeqCst)
    }

    fn sent_kinds(&self) -> Vec<&'static str> {
        self.inner
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|wire| Message::decode(wire.clone()).unwrap().kind_str())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send_to<'a>(&'a self, buf: &'a [u8], _target: SocketAddr) -> SendFuture<'a> {
        let len = buf.len();
        self.inner.sends.fetch_add(1, Ordering::SeqCst);
        self.inner
            .sent
            .lock()
            .unwrap()
            .push(Bytes::copy_from_slice(buf));
        Box::pin(async move { Ok(len) })
    }

    fn recv_from<'a>(&'a self, buf: &'a mut [u8]) -> RecvFuture<'a> {
        Box::pin(async move {
            let slot = self.inner.replies.lock().unwrap().pop_front();
            match slot.flatten() {
                Some(reply) => {
                    buf[..reply.len()].copy_from_slice(&reply);
                    Ok((reply.len(), self.inner.peer))
                }
                None => std::future::pending().await,
            }
        })
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok("127.0.0.1:0".parse().unwrap())
    }
}

fn peer_addr() -> SocketAddr {
    "127.0.0.1:9999".parse().unwrap()
}

fn fast_config() -> SimConfig {
    SimConfig::default().recv_timeout(Duration::from_millis(20))
}

fn session(transport: ScriptedTransport) -> ClientSession<ScriptedTransport> {
    ClientSession::with_transport(transport, peer_addr(), fast_config()).unwrap()
}

fn data_response(seq: u16) -> Message {
    Message::DataResponse {
        seq,
        version: 2,
        timestamp: *b"01-02-03",
    }
}

#[tokio::test]
async fn silent_peer_gets_exactly_three_syn_attempts() {
    let transport = ScriptedTransport::silent();
    let mut session = session(transport.clone());

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, SimError::Handshake { attempts: 3 }));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(transport.send_count(), 3);
    assert_eq!(transport.sent_kinds(), vec!["SYN", "SYN", "SYN"]);
}

#[tokio::test]
async fn wrong_kind_handshake_reply_rejected_without_retry() {
    let transport = ScriptedTransport::new(vec![Some(Message::FinAck)]);
    let mut session = session(transport.clone());

    assert!(session.connect().await.is_err());
    assert_eq!(session.state(), SessionState::Failed);
    // The well-formed (wrong) reply ended the retry loop on the first send.
    assert_eq!(transport.send_count(), 1);
}

#[tokio::test]
async fn handshake_sends_ack_after_syn_ack() {
    let transport = ScriptedTransport::new(vec![Some(Message::SynAck)]);
    let mut session = session(transport.clone());

    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(transport.sent_kinds(), vec!["SYN", "ACK"]);
}

#[tokio::test]
async fn data_request_before_connect_is_rejected() {
    let mut session = session(ScriptedTransport::silent());
    let err = session
        .send_data_request(Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::NotConnected));
}

#[tokio::test]
async fn timed_out_exchange_retries_three_times_and_advances_sequence() {
    let transport = ScriptedTransport::new(vec![Some(Message::SynAck)]);
    let mut session = session(transport.clone());
    session.connect().await.unwrap();
    assert_eq!(session.sequence_number(), 1);

    let outcome = session
        .send_data_request(Bytes::from_static(b"x"))
        .await
        .unwrap();
    assert_eq!(outcome, ExchangeOutcome::TimedOut { seq: 1 });
    assert_eq!(session.sequence_number(), 2);

    // SYN + ACK for the handshake, then exactly 3 data request attempts.
    assert_eq!(transport.send_count(), 5);
    assert_eq!(session.tracker().attempt_count(), 1);
    assert_eq!(session.tracker().received_count(), 0);
}

#[tokio::test]
async fn acknowledged_exchange_records_one_rtt_sample() {
    let transport = ScriptedTransport::new(vec![Some(Message::SynAck), Some(data_response(1))]);
    let mut session = session(transport);
    session.connect().await.unwrap();

    match session
        .send_data_request(Bytes::from_static(b"x"))
        .await
        .unwrap()
    {
        ExchangeOutcome::Reply {
            seq,
            server_time,
            rtt_ms,
        } => {
            assert_eq!(seq, 1);
            assert_eq!(server_time, "01-02-03");
            assert!(rtt_ms >= 0.0);
        }
        other => panic!("expected a reply, got {other:?}"),
    }

    assert_eq!(session.tracker().received_count(), 1);
    assert_eq!(session.tracker().samples().len(), 1);
    assert_eq!(session.sequence_number(), 2);
}

#[tokio::test]
async fn retry_succeeding_on_second_attempt_still_records_rtt() {
    // First data receive pends (timeout), second attempt is answered.
    let transport = ScriptedTransport::new(vec![
        Some(Message::SynAck),
        None,
        Some(data_response(1)),
    ]);
    let mut session = session(transport.clone());
    session.connect().await.unwrap();

    let outcome = session
        .send_data_request(Bytes::from_static(b"x"))
        .await
        .unwrap();
    assert!(matches!(outcome, ExchangeOutcome::Reply { seq: 1, .. }));
    // Handshake (2 sends) + 2 data attempts.
    assert_eq!(transport.send_count(), 4);
    assert_eq!(session.tracker().received_count(), 1);
}

#[tokio::test]
async fn sequence_advances_by_n_over_mixed_outcomes() {
    // One answered exchange, then only silence.
    let transport = ScriptedTransport::new(vec![Some(Message::SynAck), Some(data_response(1))]);
    let mut session = session(transport);
    session.connect().await.unwrap();

    for _ in 0..3 {
        session
            .send_data_request(Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    assert_eq!(session.sequence_number(), 4);
    assert_eq!(session.tracker().attempt_count(), 3);
    assert_eq!(session.tracker().received_count(), 1);
    assert_eq!(session.tracker().summary().loss_rate, 2.0 / 3.0);
}

#[tokio::test]
async fn malformed_reply_counts_as_no_reply_for_that_attempt() {
    // Truncated "data response" followed by silence: all attempts fail.
    let garbage = Bytes::from_static(&[0, 6, 0, 1]);
    let transport = ScriptedTransport {
        inner: Arc::new(Inner {
            sends: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::from([Some(Message::SynAck.encode()), Some(garbage)])),
            peer: peer_addr(),
        }),
    };
    let mut session = session(transport.clone());
    session.connect().await.unwrap();

    let outcome = session
        .send_data_request(Bytes::from_static(b"x"))
        .await
        .unwrap();
    assert_eq!(outcome, ExchangeOutcome::TimedOut { seq: 1 });
    // The malformed reply did not stop the retry loop: 3 data sends happened.
    assert_eq!(transport.send_count(), 5);
}

#[tokio::test]
async fn teardown_completes_with_fin_ack2() {
    let transport = ScriptedTransport::new(vec![Some(Message::SynAck), Some(Message::FinAck)]);
    let mut session = session(transport.clone());
    session.connect().await.unwrap();

    session.disconnect().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(transport.sent_kinds(), vec!["SYN", "ACK", "FIN", "FIN_ACK2"]);

    // The closed session refuses further exchanges.
    let err = session
        .send_data_request(Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::NotConnected));
}

#[tokio::test]
async fn teardown_without_fin_ack_reports_failure() {
    let transport = ScriptedTransport::new(vec![Some(Message::SynAck)]);
    let mut session = session(transport.clone());
    session.connect().await.unwrap();

    let err = session.disconnect().await.unwrap_err();
    assert!(matches!(err, SimError::Teardown { attempts: 3 }));
    assert!(err.is_recoverable());
    assert_eq!(session.state(), SessionState::Failed);
    // Handshake (2 sends) + 3 FIN attempts, no FIN_ACK2.
    assert_eq!(transport.send_count(), 5);
}
