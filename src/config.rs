//! 프로토콜 설정

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result, DEFAULT_CHUNK_SIZE, METADATA_CAPACITY, PROTOCOL_ID, TICK_SECONDS};

/// RFT 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 데이터 청크 최대 크기 (바이트)
    pub chunk_size: usize,

    /// 메타데이터 패킷 수신 버퍼 크기 (바이트)
    pub metadata_capacity: usize,

    /// 패킷 페이로드 최대 크기 (헤더 제외)
    pub max_packet_size: usize,

    /// 프로토콜 식별자 (다른 프로토콜 패킷 걸러내기용)
    pub protocol_id: u32,

    /// 연결 타임아웃 (초)
    pub connection_timeout: f64,

    /// 드라이버 틱 간격 (초)
    pub tick_seconds: f64,

    /// 수신 대기 시 폴링 간격
    pub poll_interval: Duration,

    /// 청크 전송 간격 (마이크로초)
    /// 0이면 최대 속도로 전송
    pub chunk_interval_us: u64,

    /// 수신 파일 저장 디렉터리
    pub output_dir: PathBuf,

    /// 연결 통계 로그 주기 (초)
    pub stats_interval: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            metadata_capacity: METADATA_CAPACITY,
            max_packet_size: 1024,
            protocol_id: PROTOCOL_ID,
            connection_timeout: 10.0,        // 10초
            tick_seconds: TICK_SECONDS,      // 30Hz
            poll_interval: Duration::from_millis(1),
            chunk_interval_us: 0,            // 최대 속도
            output_dir: PathBuf::from("."),
            stats_interval: 0.25,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            connection_timeout: 30.0,
            poll_interval: Duration::from_millis(5),
            chunk_interval_us: 500,          // 청크 사이 0.5ms
            ..Self::default()
        }
    }

    /// 저장 디렉터리 지정
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// 청크 간격
    pub fn chunk_interval(&self) -> Option<Duration> {
        (self.chunk_interval_us > 0).then(|| Duration::from_micros(self.chunk_interval_us))
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size는 0보다 커야 함".into()));
        }
        if self.chunk_size > DEFAULT_CHUNK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "chunk_size({})가 최대 청크 크기({})보다 큼",
                self.chunk_size, DEFAULT_CHUNK_SIZE
            )));
        }
        if self.chunk_size > self.max_packet_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_size({})가 max_packet_size({})보다 큼",
                self.chunk_size, self.max_packet_size
            )));
        }
        if self.metadata_capacity == 0 || self.metadata_capacity > self.max_packet_size {
            return Err(Error::InvalidConfig(format!(
                "metadata_capacity({})는 1..={} 범위여야 함",
                self.metadata_capacity, self.max_packet_size
            )));
        }
        if !(self.connection_timeout > 0.0) {
            return Err(Error::InvalidConfig("connection_timeout은 양수여야 함".into()));
        }
        if !(self.tick_seconds > 0.0) {
            return Err(Error::InvalidConfig("tick_seconds는 양수여야 함".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.metadata_capacity, 512);
        assert!(config.validate().is_ok());
        assert!(Config::unstable_network().validate().is_ok());
    }

    #[test]
    fn test_rejects_chunk_larger_than_packet() {
        let config = Config {
            chunk_size: 2048,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            chunk_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_size_capped_at_default() {
        let config = Config {
            chunk_size: DEFAULT_CHUNK_SIZE + 1,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            chunk_size: 100,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunk_interval_zero_means_unpaced() {
        assert!(Config::default().chunk_interval().is_none());
        assert_eq!(
            Config::unstable_network().chunk_interval(),
            Some(Duration::from_micros(500))
        );
    }
}
