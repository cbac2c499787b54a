//! 전송 세션 런타임 상태

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::chunk::ChunkPlan;
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::Result;

/// 전송 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// 파일 전송 한 건의 진행 상태
///
/// 0 <= bytes_transferred <= file_size, 청크 하나는 chunk_size 이하.
#[derive(Debug)]
pub struct TransferSession {
    direction: Direction,
    plan: ChunkPlan,
    bytes_transferred: u64,
    stats: TransferStats,
}

impl TransferSession {
    pub fn new(direction: Direction, file_size: u64, chunk_size: usize) -> Result<Self> {
        Ok(Self {
            direction,
            plan: ChunkPlan::new(file_size, chunk_size)?,
            bytes_transferred: 0,
            stats: TransferStats::new(file_size),
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn file_size(&self) -> u64 {
        self.plan.file_size()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn remaining(&self) -> u64 {
        self.file_size() - self.bytes_transferred
    }

    /// 다음 청크 길이 (완료 시 0)
    pub fn next_chunk_len(&self) -> usize {
        self.plan.chunk_len_at(self.bytes_transferred)
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_transferred == self.file_size()
    }

    /// 청크 하나 완료
    pub fn complete_chunk(&mut self, len: usize) {
        debug_assert!(len <= self.plan.chunk_size());
        debug_assert!(len as u64 <= self.remaining());
        self.bytes_transferred += len as u64;
        self.stats.record_chunk(len);
    }

    /// 트랜스포트 호출 1회 기록
    pub fn record_call(&mut self) {
        self.stats.record_call();
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// 세션 종료, 통계 반환
    pub fn finish(mut self) -> TransferStats {
        self.stats.finish();
        self.stats
    }
}

/// 수신 대기 중 keepalive 간격
const IDLE_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(100);

/// 패킷이 올 때까지 대기
///
/// 받을 것이 없으면 `poll_interval` 만큼 쉬고 트랜스포트 타이머를 진행시킨다.
/// 대기가 길어지면 keepalive 를 보내 상대 쪽 연결과 ack 를 유지한다.
/// 연결이 끊기면 `Ok(None)`.
pub(crate) async fn next_packet<T: Transport>(
    transport: &mut T,
    capacity: usize,
    poll_interval: Duration,
) -> Result<Option<Bytes>> {
    let mut idle = Duration::ZERO;
    loop {
        if let Some(packet) = transport.receive_packet(capacity).await? {
            return Ok(Some(packet));
        }
        if !transport.is_connected() {
            return Ok(None);
        }
        if idle >= IDLE_KEEPALIVE_INTERVAL {
            if let Err(e) = transport.send_keepalive().await {
                debug!("keepalive 실패: {}", e);
            }
            idle = Duration::ZERO;
        }
        tokio::time::sleep(poll_interval).await;
        idle += poll_interval;
        transport.update(poll_interval.as_secs_f64());
    }
}
