//! Gateway wire protocol client
//!
//! Protocol:
//! - Request: ASCII sensor id followed by the read command (`03000A0005`)
//! - No length prefix, no checksum
//! - Reply: up to 1024 bytes, a single read bounded by the read timeout
//!
//! Connection state machine:
//! `Idle -> Connecting -> Connected -> Sending -> AwaitingReply -> Connected`.
//! Any I/O fault closes the socket and returns to `Idle`; the caller decides
//! whether to reconnect or end the cycle.

use crate::domain::types::{GatewayTarget, RawResponse};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Read command shared by every sensor of this board variant
pub const SENSOR_READ_COMMAND: &str = "03000A0005";
pub const MAX_RESPONSE_BYTES: usize = 1024;

/// Closed taxonomy of gateway socket failures
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("access is closed")]
    AccessClosed,
    #[error("dns lookup failed for {0}")]
    DnsAbsent(String),
    #[error("connection aborted by peer")]
    Aborted,
    #[error("connection refused")]
    Refused,
    #[error("connection reset by peer")]
    Reset,
    #[error("timed out")]
    Timeout,
    #[error("gateway not responding: {0}")]
    Os(std::io::Error),
    #[error("invalid sensor id {0:?}")]
    InvalidSensorId(String),
}

impl WireError {
    /// Map an OS error onto the taxonomy; unknown kinds stay `Os`
    pub fn from_io(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::ConnectionRefused => WireError::Refused,
            ErrorKind::ConnectionReset => WireError::Reset,
            ErrorKind::ConnectionAborted => WireError::Aborted,
            ErrorKind::TimedOut | ErrorKind::WouldBlock => WireError::Timeout,
            ErrorKind::NotConnected | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => {
                WireError::AccessClosed
            }
            _ => WireError::Os(e),
        }
    }

    /// Refusal and a missing DNS entry will not heal within the cycle
    pub fn is_retryable(&self) -> bool {
        !matches!(self, WireError::Refused | WireError::DnsAbsent(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WireError::AccessClosed => "access_closed",
            WireError::DnsAbsent(_) => "dns_absent",
            WireError::Aborted => "aborted",
            WireError::Refused => "refused",
            WireError::Reset => "reset",
            WireError::Timeout => "timeout",
            WireError::Os(_) => "os_error",
            WireError::InvalidSensorId(_) => "invalid_sensor_id",
        }
    }
}

/// Connect/send/recv primitives, swappable for tests
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self, target: &GatewayTarget, timeout: Duration)
        -> Result<(), WireError>;
    async fn send(&mut self, frame: &[u8]) -> Result<(), WireError>;
    /// Single read into `buf`, bounded by `timeout`
    async fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, WireError>;
    async fn close(&mut self);
}

/// Plain TCP transport
#[derive(Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(
        &mut self,
        target: &GatewayTarget,
        timeout: Duration,
    ) -> Result<(), WireError> {
        let addr = target.addr();
        let addrs: Vec<_> = match tokio::net::lookup_host(&addr).await {
            Ok(addrs) => addrs.collect(),
            Err(_) => return Err(WireError::DnsAbsent(addr.clone())),
        };
        let Some(first) = addrs.first() else {
            return Err(WireError::DnsAbsent(addr));
        };

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(*first)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(WireError::from_io(e)),
            Err(_) => return Err(WireError::Timeout),
        };
        stream.set_nodelay(true).map_err(WireError::from_io)?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), WireError> {
        let stream = self.stream.as_mut().ok_or(WireError::AccessClosed)?;
        stream.write_all(frame).await.map_err(WireError::from_io)
    }

    async fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, WireError> {
        let stream = self.stream.as_mut().ok_or(WireError::AccessClosed)?;
        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => Err(WireError::AccessClosed),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(WireError::from_io(e)),
            Err(_) => Err(WireError::Timeout),
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct WireConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub read_command: String,
    pub max_response_bytes: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(2),
            read_command: SENSOR_READ_COMMAND.to_string(),
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
    Sending,
    AwaitingReply,
}

/// Owns the single connection to one gateway
pub struct GatewayClient<T: Transport> {
    transport: T,
    target: GatewayTarget,
    config: WireConfig,
    state: LinkState,
}

impl<T: Transport> GatewayClient<T> {
    pub fn new(transport: T, target: GatewayTarget, config: WireConfig) -> Self {
        Self { transport, target, config, state: LinkState::Idle }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn target(&self) -> &GatewayTarget {
        &self.target
    }

    pub async fn connect(&mut self) -> Result<(), WireError> {
        self.state = LinkState::Connecting;
        debug!(gateway = %self.target, "gateway_connecting");

        match self.transport.connect(&self.target, self.config.connect_timeout).await {
            Ok(()) => {
                self.state = LinkState::Connected;
                info!(gateway = %self.target, "gateway_connected");
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Idle;
                warn!(gateway = %self.target, kind = e.kind(), error = %e, "gateway_connect_failed");
                Err(e)
            }
        }
    }

    /// Reuse the open connection or dial a new one
    pub async fn ensure_connected(&mut self) -> Result<(), WireError> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect().await
    }

    /// Request frame: sensor id immediately followed by the read command
    pub fn build_frame(&self, sensor_id: &str) -> Vec<u8> {
        let mut frame = Vec::with_capacity(sensor_id.len() + self.config.read_command.len());
        frame.extend_from_slice(sensor_id.as_bytes());
        frame.extend_from_slice(self.config.read_command.as_bytes());
        frame
    }

    /// Send one read request and wait for the reply
    pub async fn request(&mut self, sensor_id: &str) -> Result<RawResponse, WireError> {
        if sensor_id.is_empty() || !sensor_id.is_ascii() {
            return Err(WireError::InvalidSensorId(sensor_id.to_string()));
        }
        if !self.is_connected() {
            return Err(WireError::AccessClosed);
        }

        let frame = self.build_frame(sensor_id);
        self.state = LinkState::Sending;
        if let Err(e) = self.transport.send(&frame).await {
            self.fault().await;
            return Err(e);
        }

        self.state = LinkState::AwaitingReply;
        let mut buf = vec![0u8; self.config.max_response_bytes];
        match self.transport.recv(&mut buf, self.config.read_timeout).await {
            Ok(n) => {
                self.state = LinkState::Connected;
                buf.truncate(n);
                let response = RawResponse::from(buf);
                trace!(sensor_id = %sensor_id, bytes = n, hex = %response.to_hex(), "gateway_reply");
                Ok(response)
            }
            Err(e) => {
                self.fault().await;
                Err(e)
            }
        }
    }

    pub async fn close(&mut self) {
        if self.state != LinkState::Idle {
            debug!(gateway = %self.target, "gateway_closed");
        }
        self.transport.close().await;
        self.state = LinkState::Idle;
    }

    async fn fault(&mut self) {
        self.transport.close().await;
        self.state = LinkState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Fake socket answering from a queue of canned replies
    #[derive(Default)]
    struct FakeTransport {
        connect_results: VecDeque<Result<(), WireError>>,
        replies: VecDeque<Result<Vec<u8>, WireError>>,
        sent: Vec<Vec<u8>>,
        closed: usize,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn connect(&mut self, _: &GatewayTarget, _: Duration) -> Result<(), WireError> {
            self.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn send(&mut self, frame: &[u8]) -> Result<(), WireError> {
            self.sent.push(frame.to_vec());
            Ok(())
        }

        async fn recv(&mut self, buf: &mut [u8], _: Duration) -> Result<usize, WireError> {
            match self.replies.pop_front().unwrap_or(Err(WireError::Timeout)) {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Err(e) => Err(e),
            }
        }

        async fn close(&mut self) {
            self.closed += 1;
        }
    }

    fn client(transport: FakeTransport) -> GatewayClient<FakeTransport> {
        GatewayClient::new(
            transport,
            GatewayTarget::new("127.0.0.1", 4001, "vanak"),
            WireConfig::default(),
        )
    }

    #[test]
    fn test_from_io_taxonomy() {
        let kind = |k| WireError::from_io(std::io::Error::from(k)).kind();
        assert_eq!(kind(ErrorKind::ConnectionRefused), "refused");
        assert_eq!(kind(ErrorKind::ConnectionReset), "reset");
        assert_eq!(kind(ErrorKind::ConnectionAborted), "aborted");
        assert_eq!(kind(ErrorKind::TimedOut), "timeout");
        assert_eq!(kind(ErrorKind::BrokenPipe), "access_closed");
        assert_eq!(kind(ErrorKind::PermissionDenied), "os_error");
    }

    #[test]
    fn test_retryable() {
        assert!(!WireError::Refused.is_retryable());
        assert!(!WireError::DnsAbsent("x:1".to_string()).is_retryable());
        assert!(WireError::Reset.is_retryable());
        assert!(WireError::Aborted.is_retryable());
        assert!(WireError::Timeout.is_retryable());
        assert!(WireError::AccessClosed.is_retryable());
    }

    #[test]
    fn test_build_frame() {
        let client = client(FakeTransport::default());
        assert_eq!(client.build_frame("0A12"), b"0A1203000A0005".to_vec());
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let mut transport = FakeTransport::default();
        transport.replies.push_back(Ok(vec![0x01, 0, 0, 0, 0, 0, 0x01]));
        let mut client = client(transport);

        client.connect().await.unwrap();
        assert_eq!(client.state(), LinkState::Connected);

        let response = client.request("S1").await.unwrap();
        assert_eq!(response.to_hex(), "01000000000001");
        assert_eq!(client.state(), LinkState::Connected);
        assert_eq!(client.transport.sent, vec![b"S103000A0005".to_vec()]);
    }

    #[tokio::test]
    async fn test_timeout_returns_to_idle() {
        let mut client = client(FakeTransport::default());
        client.connect().await.unwrap();

        let err = client.request("S2").await.unwrap_err();
        assert!(matches!(err, WireError::Timeout));
        assert_eq!(client.state(), LinkState::Idle);
        assert_eq!(client.transport.closed, 1);
    }

    #[tokio::test]
    async fn test_request_requires_connection() {
        let mut client = client(FakeTransport::default());
        let err = client.request("S1").await.unwrap_err();
        assert!(matches!(err, WireError::AccessClosed));
        assert!(client.transport.sent.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_sensor_id_keeps_connection() {
        let mut client = client(FakeTransport::default());
        client.connect().await.unwrap();

        let err = client.request("").await.unwrap_err();
        assert!(matches!(err, WireError::InvalidSensorId(_)));
        let err = client.request("sensör").await.unwrap_err();
        assert!(matches!(err, WireError::InvalidSensorId(_)));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_stays_idle() {
        let mut transport = FakeTransport::default();
        transport.connect_results.push_back(Err(WireError::Refused));
        let mut client = client(transport);

        let err = client.ensure_connected().await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(client.state(), LinkState::Idle);

        // next attempt succeeds and is reused afterwards
        client.ensure_connected().await.unwrap();
        client.ensure_connected().await.unwrap();
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_tcp_transport_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"S903000A0005");
            socket.write_all(&[0x01, 0x02, 0, 0, 0, 0, 0x00]).await.unwrap();
        });

        let target = GatewayTarget::new("127.0.0.1", port, "vanak");
        let mut client = GatewayClient::new(TcpTransport::new(), target, WireConfig::default());
        client.connect().await.unwrap();
        let response = client.request("S9").await.unwrap();
        assert_eq!(response.to_hex(), "01020000000000");
        client.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_transport_refused() {
        // bind then drop to get a port with no listener
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let target = GatewayTarget::new("127.0.0.1", port, "vanak");
        let mut client = GatewayClient::new(TcpTransport::new(), target, WireConfig::default());
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, WireError::Refused));
    }
}
