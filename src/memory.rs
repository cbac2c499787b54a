//! 프로세스 내 트랜스포트
//!
//! crossbeam 채널 한 쌍으로 연결된 두 끝점. 순서와 신뢰성이 보장되는
//! 이상적인 링크이며, 테스트를 위해 부분 전송 / 전송 실패 / 연결 끊김을 흉내낼 수 있다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::transport::{Inbox, Transport};
use crate::{Error, Result};

/// 메모리 트랜스포트 끝점
pub struct MemoryTransport {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    inbox: Inbox,

    /// 양 끝점이 공유하는 링크 상태
    link: Arc<AtomicBool>,

    /// 보고할 RTT (초)
    rtt: f64,

    /// 전송 1회당 받아들이는 최대 바이트 (부분 전송 시뮬레이션)
    max_send: Option<usize>,

    /// 이 횟수 이후 전송은 0 바이트 반환
    fail_after: Option<usize>,

    sends: usize,
}

impl MemoryTransport {
    /// 연결된 끝점 한 쌍 생성
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        let link = Arc::new(AtomicBool::new(true));

        (
            Self::new(a_tx, a_rx, link.clone()),
            Self::new(b_tx, b_rx, link),
        )
    }

    fn new(tx: Sender<Bytes>, rx: Receiver<Bytes>, link: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            rx,
            inbox: Inbox::default(),
            link,
            rtt: 0.0,
            max_send: None,
            fail_after: None,
            sends: 0,
        }
    }

    pub fn with_rtt(mut self, rtt: f64) -> Self {
        self.rtt = rtt;
        self
    }

    pub fn with_max_send(mut self, max_send: usize) -> Self {
        self.max_send = Some(max_send);
        self
    }

    pub fn fail_after_sends(mut self, sends: usize) -> Self {
        self.fail_after = Some(sends);
        self
    }

    pub fn set_rtt(&mut self, rtt: f64) {
        self.rtt = rtt;
    }

    /// 링크 끊기 (양쪽 모두 연결 해제로 보임)
    pub fn disconnect(&self) {
        self.link.store(false, Ordering::SeqCst);
    }

    /// 누적 전송 호출 수
    pub fn send_count(&self) -> usize {
        self.sends
    }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(packet) => self.inbox.push(packet),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnect();
                    break;
                }
            }
        }
    }
}

impl Transport for MemoryTransport {
    async fn send_packet(&mut self, data: &[u8]) -> Result<usize> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        if let Some(limit) = self.fail_after {
            if self.sends >= limit {
                return Ok(0);
            }
        }
        self.sends += 1;

        let accepted = self.max_send.map_or(data.len(), |max| data.len().min(max));
        self.tx
            .send(Bytes::copy_from_slice(&data[..accepted]))
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(accepted)
    }

    async fn receive_packet(&mut self, capacity: usize) -> Result<Option<Bytes>> {
        self.drain();
        Ok(self.inbox.pop(capacity))
    }

    fn is_connected(&self) -> bool {
        self.link.load(Ordering::SeqCst)
    }

    fn connect_failed(&self) -> bool {
        false
    }

    fn round_trip_time(&self) -> f64 {
        self.rtt
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
