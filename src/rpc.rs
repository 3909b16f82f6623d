//! The wire transport: a length-delimited, `bincode`-framed request/reply
//! protocol carried over `tokio::net::TcpStream`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::election::Election;
use crate::leader::Leader;
use crate::membership::{Membership, Node, NodeId};
use crate::utils::RingVoteError;

/// Largest frame accepted on read: guards against a corrupt length
/// prefix turning into an enormous allocation.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// One named operation and its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    MembershipAdd(Node),
    MembershipUpdate(Node),
    MembershipGetNumNodes,
    MembershipGetNumAlive,
    RequestsAdd { destination: NodeId, snapshot: Membership },
    RequestsListen { destination: NodeId },
    LeaderGet(Leader),
    LeaderUpdate(Leader),
    ElectionRequestVote(Leader),
    ElectionSendVote(Leader),
    ElectionGet(Leader),
    ElectionClear(u64),
    ElectionDrop(NodeId),
}

/// The matching reply payload. `Error` carries the failure message text
/// (e.g. `"ID already exists"`); the caller maps it back to a
/// [`RingVoteError::Rejected`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Reply {
    Node(Node),
    Count(usize),
    Bool(bool),
    Membership(Membership),
    Leader(Leader),
    VoteCount(u32),
    Election(Election),
    Error(String),
}

/// Writes one length-prefixed, `bincode`-encoded frame.
pub async fn write_frame<T: Serialize>(
    stream: &mut TcpStream,
    value: &T,
) -> Result<(), RingVoteError> {
    let bytes = bincode::serialize(value)?;
    let len = u32::try_from(bytes.len())
        .map_err(|_| RingVoteError::transport("frame too large to encode"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one length-prefixed, `bincode`-encoded frame.
pub async fn read_frame<T: for<'de> Deserialize<'de>>(
    stream: &mut TcpStream,
) -> Result<T, RingVoteError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(RingVoteError::transport(format!(
            "frame of {} bytes exceeds the {} byte limit",
            len, MAX_FRAME_BYTES
        )));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(bincode::deserialize(&buf)?)
}

/// A node's persistent connection to the coordinator. Connects lazily on
/// first use and reconnects on the next call after any failure, rather
/// than opening one connection per call, to amortize handshake cost
/// across the heartbeat/gossip/election chains.
pub struct RpcClient {
    addr: String,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl RpcClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        RpcClient {
            addr: addr.into(),
            timeout,
            stream: None,
        }
    }

    async fn ensure_connected(&mut self) -> Result<&mut TcpStream, RingVoteError> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(&self.addr).await?;
            self.stream = Some(stream);
        }
        Ok(self.stream.as_mut().expect("just connected"))
    }

    /// Sends `req` and awaits the matching `Reply`, bounded by this
    /// client's configured RPC timeout. Any failure (connect, I/O,
    /// decode, timeout) drops the underlying connection so the next call
    /// reconnects from scratch; failures are never fatal to the caller,
    /// who is expected to retry on its next timer tick.
    pub async fn call(&mut self, req: Request) -> Result<Reply, RingVoteError> {
        let result = self.call_inner(&req).await;
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    async fn call_inner(&mut self, req: &Request) -> Result<Reply, RingVoteError> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, async {
            let stream = self.ensure_connected().await?;
            write_frame(stream, req).await?;
            read_frame::<Reply>(stream).await
        })
        .await
        .map_err(|_| RingVoteError::transport("RPC call timed out"))?
    }
}

/// Maps a service-level `Result` into the `Reply` wire representation:
/// `Ok` goes through the given constructor, `Err` is flattened to
/// `Reply::Error` carrying the error's message text.
pub fn reply_of<T>(
    result: Result<T, RingVoteError>,
    ok: impl FnOnce(T) -> Reply,
) -> Reply {
    match result {
        Ok(v) => ok(v),
        Err(e) => Reply::Error(e.to_string()),
    }
}

/// Inverse of [`reply_of`]: maps a non-error `Reply` variant back into a
/// typed value, or a transport error if the server replied with a
/// different variant than the one expected for this call. An
/// `Reply::Error` becomes `RingVoteError::Rejected` carrying the
/// original message text.
pub fn expect_reply<T>(
    reply: Reply,
    extract: impl FnOnce(Reply) -> Option<T>,
) -> Result<T, RingVoteError> {
    if let Reply::Error(msg) = reply {
        return Err(RingVoteError::rejected(msg));
    }
    extract(reply).ok_or_else(|| RingVoteError::transport("unexpected reply variant"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn frame_round_trips_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let req: Request = read_frame(&mut sock).await.unwrap();
            let reply = match req {
                Request::ElectionClear(term) => Reply::Bool(term == 4),
                _ => Reply::Error("unexpected".to_string()),
            };
            write_frame(&mut sock, &reply).await.unwrap();
        });

        let mut client_sock = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut client_sock, &Request::ElectionClear(4))
            .await
            .unwrap();
        let reply: Reply = read_frame(&mut client_sock).await.unwrap();
        assert!(matches!(reply, Reply::Bool(true)));

        server.await.unwrap();
    }

    #[test]
    fn reply_of_flattens_error_message() {
        let result: Result<u32, RingVoteError> =
            Err(RingVoteError::rejected("Invalid term"));
        let reply = reply_of(result, Reply::VoteCount);
        assert!(matches!(reply, Reply::Error(msg) if msg == "Invalid term"));
    }

    #[test]
    fn expect_reply_extracts_matching_variant() {
        let got = expect_reply(Reply::Bool(true), |r| match r {
            Reply::Bool(b) => Some(b),
            _ => None,
        });
        assert_eq!(got.unwrap(), true);
    }

    #[test]
    fn expect_reply_maps_error_variant_to_rejected() {
        let got: Result<bool, _> = expect_reply(Reply::Error("Invalid term".into()), |r| match r {
            Reply::Bool(b) => Some(b),
            _ => None,
        });
        assert_eq!(got.unwrap_err().to_string(), "Invalid term");
    }

    #[tokio::test]
    async fn rpc_client_reconnects_after_server_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // nothing is listening

        let mut client = RpcClient::new(addr.to_string(), Duration::from_millis(100));
        let err = client.call(Request::ElectionClear(1)).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
