//! 시퀀스 / ack 관리와 RTT 추정
//!
//! 재전송은 하지 않는다. 보낸 패킷의 ack 여부로 RTT 를 측정하고,
//! max_rtt 안에 ack 되지 않은 패킷은 손실로 집계한다.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::stats::ConnectionStats;

/// ack_bits 로 표현하는 이전 시퀀스 수
const ACK_WINDOW: u32 = 32;

/// ack 대기 패킷 최대 수, 넘치면 가장 오래된 것부터 손실 처리
const MAX_PENDING: usize = 256;

/// RTT 평활 계수
const RTT_SMOOTHING: f64 = 0.1;

/// u32 wrap-around 를 고려한 시퀀스 비교: s1 이 s2 보다 최근인가
pub fn sequence_more_recent(s1: u32, s2: u32) -> bool {
    const HALF: u32 = u32::MAX / 2;
    (s1 > s2 && s1 - s2 <= HALF) || (s2 > s1 && s2 - s1 > HALF)
}

/// ack 대기 중인 송신 패킷
#[derive(Debug, Clone, Copy)]
struct PendingPacket {
    sequence: u32,
    sent_at: Instant,
}

#[derive(Debug)]
pub struct ReliabilitySystem {
    local_sequence: u32,
    remote_sequence: u32,
    received: VecDeque<u32>,
    pending: VecDeque<PendingPacket>,
    max_rtt: Duration,
    rtt: f64,
    stats: ConnectionStats,
}

impl ReliabilitySystem {
    pub fn new(max_rtt: Duration) -> Self {
        Self {
            local_sequence: 0,
            // 첫 수신 전에는 어떤 시퀀스도 ack 하지 않도록 0 보다 "오래된" 값
            remote_sequence: u32::MAX,
            received: VecDeque::with_capacity(ACK_WINDOW as usize + 1),
            pending: VecDeque::new(),
            max_rtt,
            rtt: 0.0,
            stats: ConnectionStats::default(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.max_rtt);
    }

    pub fn local_sequence(&self) -> u32 {
        self.local_sequence
    }

    pub fn remote_sequence(&self) -> u32 {
        self.remote_sequence
    }

    /// 평활화된 RTT (초)
    pub fn rtt(&self) -> f64 {
        self.rtt
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            rtt: self.rtt,
            ..self.stats
        }
    }

    /// ack 대기 중인 송신 패킷 수
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // 호출 위치: 패킷 송신 직후
    pub fn packet_sent(&mut self) {
        // 틱 없는 연속 송신 중에도 만료 처리
        self.expire_pending();
        if self.pending.len() >= MAX_PENDING {
            self.pending.pop_front();
            self.stats.lost_packets += 1;
        }

        self.pending.push_back(PendingPacket {
            sequence: self.local_sequence,
            sent_at: Instant::now(),
        });
        self.stats.sent_packets += 1;
        self.local_sequence = self.local_sequence.wrapping_add(1);
    }

    // 호출 위치: 유효한 패킷 수신 시
    pub fn packet_received(&mut self, sequence: u32) {
        self.stats.received_packets += 1;

        if self.received.contains(&sequence) {
            return;
        }
        self.received.push_back(sequence);
        if self.received.len() > ACK_WINDOW as usize + 1 {
            self.received.pop_front();
        }

        if sequence_more_recent(sequence, self.remote_sequence) {
            self.remote_sequence = sequence;
        }
    }

    /// remote_sequence 기준 ack 비트맵
    pub fn ack_bits(&self) -> u32 {
        let ack = self.remote_sequence;
        self.received
            .iter()
            .filter(|&&seq| seq != ack && sequence_more_recent(ack, seq))
            .filter_map(|&seq| {
                let bit = ack.wrapping_sub(seq) - 1;
                (bit < ACK_WINDOW).then(|| 1u32 << bit)
            })
            .fold(0, |bits, bit| bits | bit)
    }

    /// 수신 헤더의 ack 정보 처리
    pub fn process_ack(&mut self, ack: u32, ack_bits: u32) {
        let now = Instant::now();
        let mut samples = Vec::new();

        self.pending.retain(|packet| {
            let acked = packet.sequence == ack
                || (sequence_more_recent(ack, packet.sequence) && {
                    let bit = ack.wrapping_sub(packet.sequence) - 1;
                    bit < ACK_WINDOW && ack_bits & (1 << bit) != 0
                });
            if acked {
                samples.push(now.duration_since(packet.sent_at).as_secs_f64());
            }
            !acked
        });

        for sample in samples {
            self.rtt += (sample - self.rtt) * RTT_SMOOTHING;
            self.stats.acked_packets += 1;
        }
    }

    // 호출 위치: 매 틱
    pub fn update(&mut self) {
        self.expire_pending();
    }

    fn expire_pending(&mut self) {
        let max_rtt = self.max_rtt;
        let before = self.pending.len();
        self.pending
            .retain(|packet| packet.sent_at.elapsed() <= max_rtt);
        self.stats.lost_packets += (before - self.pending.len()) as u64;
    }
}
