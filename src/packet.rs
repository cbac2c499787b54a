//! UDP 패킷 헤더
//!
//! ```text
//! [protocol_id u32][sequence u32][ack u32][ack_bits u32][payload ...]
//! ```
//!
//! bincode 기본 설정 (고정 길이 정수, little endian) 으로 16바이트.

use serde::{Deserialize, Serialize};

use crate::Result;

/// 헤더 크기 (바이트)
pub const HEADER_SIZE: usize = 16;

/// 패킷 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// 프로토콜 식별자
    pub protocol_id: u32,

    /// 이 패킷의 시퀀스 번호
    pub sequence: u32,

    /// 상대에게서 받은 가장 최근 시퀀스
    pub ack: u32,

    /// ack 이전 32개 시퀀스 수신 비트맵 (bit n = ack - n - 1)
    pub ack_bits: u32,
}

impl PacketHeader {
    /// 헤더 + 페이로드 직렬화
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let header_bytes = bincode::serialize(self)?;
        debug_assert_eq!(header_bytes.len(), HEADER_SIZE);

        let mut buf = Vec::with_capacity(header_bytes.len() + payload.len());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(payload);
        Ok(buf)
    }

    /// 데이터그램에서 헤더 파싱, (헤더, 페이로드) 반환
    pub fn decode(datagram: &[u8]) -> Option<(Self, &[u8])> {
        if datagram.len() < HEADER_SIZE {
            return None;
        }
        let header: PacketHeader = bincode::deserialize(&datagram[..HEADER_SIZE]).ok()?;
        Some((header, &datagram[HEADER_SIZE..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = PacketHeader {
            protocol_id: 0x11223344,
            sequence: 1,
            ack: 2,
            ack_bits: 0x8000_0001,
        };

        let bytes = header.encode(b"payload").unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 7);
        assert_eq!(&bytes[..4], &[0x44, 0x33, 0x22, 0x11]);

        let (parsed, payload) = PacketHeader::decode(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn test_short_datagram_is_rejected() {
        assert!(PacketHeader::decode(&[0u8; HEADER_SIZE - 1]).is_none());
    }
}
