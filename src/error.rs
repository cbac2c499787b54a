//! 에러 타입 정의

use thiserror::Error;

/// RFT 에러 타입
///
/// `Metadata*`, `File*`, `Chunk*`, `DigestMismatch` 는 전송 한 건을 종료시키는
/// 에러이며 내부에서 재시도하지 않는다.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("메타데이터 전송 실패: {reason}")]
    MetadataSend { reason: String },

    #[error("메타데이터 수신 실패: {reason}")]
    MetadataReceive { reason: String },

    #[error("메타데이터 형식 오류: {reason}")]
    MetadataParse { reason: String },

    #[error("파일 열기 실패: {path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("파일 생성 실패: {path}: {source}")]
    FileCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("파일 쓰기 실패: {path}: {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("청크 전송 실패: offset={offset}, {reason}")]
    ChunkSend { offset: u64, reason: String },

    #[error("청크 수신 실패: offset={offset}, {reason}")]
    ChunkReceive { offset: u64, reason: String },

    #[error("다이제스트 불일치: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("패킷 크기 초과: {size} bytes (최대 {max_size})")]
    PacketTooLarge { size: usize, max_size: usize },

    #[error("연결되지 않음")]
    NotConnected,

    #[error("연결 실패")]
    ConnectFailed,

    #[error("연결 종료")]
    ConnectionClosed,

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// 전송 세션 종료 에러 여부 (트랜스포트/설정 에러와 구분)
    pub fn is_transfer_error(&self) -> bool {
        matches!(
            self,
            Error::MetadataSend { .. }
                | Error::MetadataReceive { .. }
                | Error::MetadataParse { .. }
                | Error::FileOpen { .. }
                | Error::FileCreate { .. }
                | Error::FileWrite { .. }
                | Error::ChunkSend { .. }
                | Error::ChunkReceive { .. }
                | Error::DigestMismatch { .. }
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
