//! UDP 연결 (Transport 구현)
//!
//! 상대 한 명과의 가상 연결. 서버는 listen 후 처음 들어온 상대를 받아들이고,
//! 클라이언트는 서버에서 첫 패킷을 받으면 연결된다. `connection_timeout`
//! 동안 유효한 패킷이 없으면 연결이 끊긴다.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::packet::{PacketHeader, HEADER_SIZE};
use crate::reliability::ReliabilitySystem;
use crate::stats::ConnectionStats;
use crate::transport::{Inbox, Transport};
use crate::{Config, Error, Result};

/// ack 되지 않은 패킷을 손실로 보는 시간
const MAX_RTT: Duration = Duration::from_secs(1);

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Listening,
    Connecting,
    ConnectFail,
    Connected,
}

/// 연결 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    None,
    Client,
    Server,
}

/// UDP 가상 연결
pub struct Connection {
    socket: UdpSocket,
    protocol_id: u32,
    timeout: f64,
    max_packet_size: usize,

    mode: Mode,
    state: ConnectionState,
    address: Option<SocketAddr>,
    timeout_accumulator: f64,

    reliability: ReliabilitySystem,
    inbox: Inbox,
    recv_buf: Vec<u8>,
}

impl Connection {
    /// 로컬 주소에 소켓 바인드
    pub async fn bind(addr: SocketAddr, config: &Config) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        debug!("소켓 바인드: {}", socket.local_addr()?);

        Ok(Self {
            socket,
            protocol_id: config.protocol_id,
            timeout: config.connection_timeout,
            max_packet_size: config.max_packet_size,
            mode: Mode::None,
            state: ConnectionState::Disconnected,
            address: None,
            timeout_accumulator: 0.0,
            reliability: ReliabilitySystem::new(MAX_RTT),
            inbox: Inbox::default(),
            recv_buf: vec![0u8; HEADER_SIZE + config.max_packet_size],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 서버 모드로 연결 대기
    pub fn listen(&mut self) {
        info!("연결 대기: {:?}", self.socket.local_addr().ok());
        self.clear_data();
        self.mode = Mode::Server;
        self.state = ConnectionState::Listening;
    }

    /// 클라이언트 모드로 서버에 연결 시도
    pub fn connect(&mut self, addr: SocketAddr) {
        info!("연결 시도: {}", addr);
        self.clear_data();
        self.mode = Mode::Client;
        self.state = ConnectionState::Connecting;
        self.address = Some(addr);
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_listening(&self) -> bool {
        self.state == ConnectionState::Listening
    }

    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    /// 연결 상대 주소
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.address
    }

    pub fn stats(&self) -> ConnectionStats {
        self.reliability.stats()
    }

    fn clear_data(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.timeout_accumulator = 0.0;
        self.address = None;
        self.reliability.reset();
        self.inbox.clear();
    }

    /// 소켓에 쌓인 데이터그램 전부 처리 (블로킹 없음)
    fn pump(&mut self) {
        loop {
            match self.socket.try_recv_from(&mut self.recv_buf) {
                Ok((len, from)) => {
                    let datagram = Bytes::copy_from_slice(&self.recv_buf[..len]);
                    self.handle_datagram(datagram, from);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("수신 오류: {}", e);
                    break;
                }
            }
        }
    }

    fn handle_datagram(&mut self, datagram: Bytes, from: SocketAddr) {
        let Some((header, _)) = PacketHeader::decode(&datagram) else {
            debug!("헤더 파싱 실패: {} bytes from {}", datagram.len(), from);
            return;
        };
        if header.protocol_id != self.protocol_id {
            return;
        }

        match self.mode {
            Mode::Server if self.state != ConnectionState::Connected => {
                info!("클라이언트 연결: {}", from);
                self.state = ConnectionState::Connected;
                self.address = Some(from);
                self.timeout_accumulator = 0.0;
                self.reliability.reset();
            }
            Mode::Client
                if self.state == ConnectionState::Connecting && self.address == Some(from) =>
            {
                info!("서버 연결됨: {}", from);
                self.state = ConnectionState::Connected;
            }
            _ => {}
        }

        if self.state != ConnectionState::Connected || self.address != Some(from) {
            return;
        }

        self.timeout_accumulator = 0.0;
        self.reliability.packet_received(header.sequence);
        self.reliability.process_ack(header.ack, header.ack_bits);
        self.inbox.push(datagram.slice(HEADER_SIZE..));
    }
}

impl Transport for Connection {
    async fn send_packet(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() > self.max_packet_size {
            return Err(Error::PacketTooLarge {
                size: data.len(),
                max_size: self.max_packet_size,
            });
        }

        let address = match (self.state, self.address) {
            (ConnectionState::Connected | ConnectionState::Connecting, Some(address)) => address,
            _ => return Err(Error::NotConnected),
        };

        let header = PacketHeader {
            protocol_id: self.protocol_id,
            sequence: self.reliability.local_sequence(),
            ack: self.reliability.remote_sequence(),
            ack_bits: self.reliability.ack_bits(),
        };
        let packet = header.encode(data)?;

        self.socket.send_to(&packet, address).await?;
        self.reliability.packet_sent();
        Ok(data.len())
    }

    async fn receive_packet(&mut self, capacity: usize) -> Result<Option<Bytes>> {
        self.pump();
        Ok(self.inbox.pop(capacity))
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn connect_failed(&self) -> bool {
        self.state == ConnectionState::ConnectFail
    }

    fn round_trip_time(&self) -> f64 {
        self.reliability.rtt()
    }

    fn update(&mut self, delta_time: f64) {
        self.pump();
        self.reliability.update();

        self.timeout_accumulator += delta_time;
        if self.timeout_accumulator <= self.timeout {
            return;
        }

        match self.state {
            ConnectionState::Connecting => {
                warn!("연결 시간 초과: {:?}", self.address);
                self.clear_data();
                self.state = ConnectionState::ConnectFail;
            }
            ConnectionState::Connected => {
                warn!("연결 끊김 (시간 초과): {:?}", self.address);
                self.clear_data();
                if self.mode == Mode::Server {
                    self.state = ConnectionState::Listening;
                }
            }
            _ => {}
        }
    }

    async fn send_keepalive(&mut self) -> Result<()> {
        // listen 중에는 보낼 상대가 없음
        if self.address.is_none() {
            return Ok(());
        }
        self.send_packet(&[]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_client_server_handshake_and_data() {
        let config = Config::default();
        let mut server = Connection::bind(loopback(), &config).await.unwrap();
        let mut client = Connection::bind(loopback(), &config).await.unwrap();

        server.listen();
        client.connect(server.local_addr().unwrap());
        assert!(client.is_connecting());

        client.send_packet(b"hello").await.unwrap();
        settle().await;
        server.update(0.01);
        assert!(server.is_connected());
        assert_eq!(server.peer_addr(), client.local_addr().ok());
        assert_eq!(server.receive_packet(64).await.unwrap().unwrap().as_ref(), b"hello");

        server.send_keepalive().await.unwrap();
        settle().await;
        client.update(0.01);
        assert!(client.is_connected());
        assert!(client.receive_packet(64).await.unwrap().is_none());
        assert_eq!(client.stats().acked_packets, 1);
    }

    #[tokio::test]
    async fn test_foreign_protocol_is_ignored() {
        let config = Config::default();
        let mut server = Connection::bind(loopback(), &config).await.unwrap();
        server.listen();

        let stranger = UdpSocket::bind(loopback()).await.unwrap();
        let header = PacketHeader {
            protocol_id: 0xdead_beef,
            sequence: 0,
            ack: 0,
            ack_bits: 0,
        };
        stranger
            .send_to(&header.encode(b"x").unwrap(), server.local_addr().unwrap())
            .await
            .unwrap();
        settle().await;

        server.update(0.01);
        assert!(server.is_listening());
    }

    #[tokio::test]
    async fn test_connect_times_out() {
        let config = Config {
            connection_timeout: 0.5,
            ..Config::default()
        };
        let mut client = Connection::bind(loopback(), &config).await.unwrap();
        let silent = UdpSocket::bind(loopback()).await.unwrap();
        client.connect(silent.local_addr().unwrap());

        client.update(0.3);
        assert!(client.is_connecting());
        client.update(0.3);
        assert!(client.connect_failed());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_server_returns_to_listening_on_timeout() {
        let config = Config {
            connection_timeout: 0.5,
            ..Config::default()
        };
        let mut server = Connection::bind(loopback(), &config).await.unwrap();
        let mut client = Connection::bind(loopback(), &config).await.unwrap();
        server.listen();
        client.connect(server.local_addr().unwrap());

        client.send_keepalive().await.unwrap();
        settle().await;
        server.update(0.01);
        assert!(server.is_connected());

        server.update(0.6);
        assert!(server.is_listening());
        assert!(server.peer_addr().is_none());
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected() {
        let config = Config::default();
        let mut client = Connection::bind(loopback(), &config).await.unwrap();
        client.connect(loopback());

        let big = vec![0u8; config.max_packet_size + 1];
        assert!(matches!(
            client.send_packet(&big).await,
            Err(Error::PacketTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_without_peer_fails() {
        let mut conn = Connection::bind(loopback(), &Config::default()).await.unwrap();
        assert!(matches!(conn.send_packet(b"x").await, Err(Error::NotConnected)));

        conn.listen();
        assert!(conn.send_keepalive().await.is_ok());
    }
}
