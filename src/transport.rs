//! 트랜스포트 경계
//!
//! 파일 전송 세션은 이 트레이트로만 패킷을 주고받는다. 순서 보장, 신뢰성,
//! RTT 측정은 구현체 책임.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::Result;

/// 패킷 트랜스포트
///
/// 길이 0 패킷은 keepalive 로 취급한다. 구현체는 이를 내부에서 소비하고
/// `receive_packet` 으로 올려보내지 않는다.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// 패킷 전송. 받아들인 바이트 수 반환 (요청보다 적을 수 있음)
    async fn send_packet(&mut self, data: &[u8]) -> Result<usize>;

    /// 최대 `capacity` 바이트 수신
    ///
    /// `Ok(None)` 은 "지금은 받을 것이 없음". `capacity` 보다 긴 패킷은
    /// 이어지는 호출들에 나뉘어 순서대로 전달되며 다음 패킷과 합쳐지지 않는다.
    async fn receive_packet(&mut self, capacity: usize) -> Result<Option<Bytes>>;

    fn is_connected(&self) -> bool;

    fn connect_failed(&self) -> bool;

    /// 현재 RTT 추정값 (초)
    fn round_trip_time(&self) -> f64;

    /// 타이머 진행 (틱마다 호출)
    fn update(&mut self, _delta_time: f64) {}

    /// 헤더만 있는 패킷 전송 (연결 유지 / ack 전달)
    async fn send_keepalive(&mut self) -> Result<()> {
        self.send_packet(&[]).await.map(|_| ())
    }
}

/// 수신 패킷 큐
///
/// 용량보다 긴 패킷은 앞부분만 꺼내고 나머지를 큐 앞에 남긴다.
#[derive(Debug, Default)]
pub(crate) struct Inbox {
    packets: VecDeque<Bytes>,
}

impl Inbox {
    /// keepalive (빈 패킷) 는 버림
    pub(crate) fn push(&mut self, packet: Bytes) {
        if !packet.is_empty() {
            self.packets.push_back(packet);
        }
    }

    pub(crate) fn pop(&mut self, capacity: usize) -> Option<Bytes> {
        if capacity == 0 {
            return None;
        }
        let front = self.packets.front_mut()?;
        if front.len() > capacity {
            return Some(front.split_to(capacity));
        }
        self.packets.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.packets.clear();
    }
}
