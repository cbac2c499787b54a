//! 전송 통계

use std::time::{Duration, Instant};

/// 파일 전송 한 건의 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 종료 시간 (진행 중이면 None)
    pub end_time: Option<Instant>,

    /// 파일 크기
    pub file_size: u64,

    /// 전송/수신 완료 바이트
    pub total_bytes: u64,

    /// 완료된 청크 수
    pub total_chunks: u64,

    /// 트랜스포트 호출 수 (부분 전송/수신 포함)
    pub transport_calls: u64,
}

impl TransferStats {
    pub fn new(file_size: u64) -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            file_size,
            total_bytes: 0,
            total_chunks: 0,
            transport_calls: 0,
        }
    }

    /// 청크 하나 완료 기록
    pub fn record_chunk(&mut self, size: usize) {
        self.total_chunks += 1;
        self.total_bytes += size as u64;
    }

    pub fn record_call(&mut self) {
        self.transport_calls += 1;
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 진행률 (0.0 ~ 1.0), 빈 파일은 1.0
    pub fn progress(&self) -> f64 {
        if self.file_size == 0 {
            return 1.0;
        }
        self.total_bytes as f64 / self.file_size as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Bytes: {}/{} | Chunks: {} | Calls: {} | Throughput: {:.3} MB/s",
            self.elapsed().as_secs_f64(),
            self.total_bytes,
            self.file_size,
            self.total_chunks,
            self.transport_calls,
            self.throughput() / 1_000_000.0,
        )
    }
}

/// 연결 신뢰성 통계
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConnectionStats {
    pub sent_packets: u64,
    pub received_packets: u64,
    pub acked_packets: u64,
    pub lost_packets: u64,

    /// 평활화된 RTT (초)
    pub rtt: f64,
}

impl ConnectionStats {
    /// 손실률 계산
    pub fn loss_rate(&self) -> f64 {
        let total = self.acked_packets + self.lost_packets;
        if total == 0 {
            return 0.0;
        }
        self.lost_packets as f64 / total as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "rtt {:.1}ms, sent {}, recv {}, acked {}, lost {} ({:.1}%)",
            self.rtt * 1000.0,
            self.sent_packets,
            self.received_packets,
            self.acked_packets,
            self.lost_packets,
            self.loss_rate() * 100.0,
        )
    }
}
