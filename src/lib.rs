//! # RFT (Reliable File Transfer)
//!
//! 신뢰성 있는 패킷 트랜스포트 위에서 파일 한 개를 전송하고 MD5 로 검증
//!
//! ## 핵심 특징
//! - **메타데이터 선행**: `"<이름> <크기> <md5 hex>"` 패킷 1개 후 데이터 청크
//! - **고정 크기 청크**: 256바이트 이하 청크를 파일 순서대로 전송
//! - **종단 검증**: 수신 완료 후 디스크 파일을 다시 읽어 MD5 비교
//! - **흐름 제어**: RTT 기반 Good / Bad 2단계, 페널티 시간으로 진동 억제
//! - **트랜스포트 분리**: [`Transport`] 트레이트 뒤에 UDP / 메모리 구현

pub mod chunk;
pub mod config;
pub mod connection;
pub mod digest;
pub mod driver;
pub mod error;
pub mod flow;
pub mod memory;
pub mod metadata;
pub mod packet;
pub mod receiver;
pub mod reliability;
pub mod sender;
pub mod session;
pub mod stats;
pub mod transport;

pub use chunk::{ChunkBuffer, ChunkPlan};
pub use config::Config;
pub use connection::{Connection, ConnectionState, Mode};
pub use digest::FileDigest;
pub use driver::{Driver, LinkEvent};
pub use error::{Error, Result};
pub use flow::{FlowControl, FlowMode};
pub use memory::MemoryTransport;
pub use metadata::TransferMetadata;
pub use packet::PacketHeader;
pub use receiver::{FileReceiver, ReceivedFileInfo, Verification};
pub use sender::FileSender;
pub use session::{Direction, TransferSession};
pub use stats::{ConnectionStats, TransferStats};
pub use transport::Transport;

/// 프로토콜 식별자 (패킷 헤더 첫 4바이트)
pub const PROTOCOL_ID: u32 = 0x11223344;

/// 기본 청크 크기 (바이트)
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// 메타데이터 패킷 최대 크기 (바이트)
pub const METADATA_CAPACITY: usize = 512;

/// 파일 이름 최대 길이 (바이트)
pub const MAX_FILE_NAME_LEN: usize = 255;

/// 기본 서버 포트
pub const SERVER_PORT: u16 = 30000;

/// 기본 클라이언트 포트
pub const CLIENT_PORT: u16 = 30001;

/// 드라이버 틱 간격 (초)
pub const TICK_SECONDS: f64 = 1.0 / 30.0;
