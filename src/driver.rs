//! 세션 드라이버
//!
//! 고정 틱으로 트랜스포트 타이머와 흐름 제어를 진행시키고,
//! 현재 모드의 전송률로 keepalive 를 보낸다. 연결 / 끊김 때마다
//! 흐름 제어는 초기 상태로 돌아간다.

use std::path::Path;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::flow::{FlowControl, FlowMode};
use crate::receiver::{FileReceiver, ReceivedFileInfo};
use crate::sender::FileSender;
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::{Config, Error, Result};

/// 틱 한 번 동안 관찰된 연결 변화
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Idle,
    Connected,
    Disconnected,
}

/// 트랜스포트 + 흐름 제어 구동기
pub struct Driver<T: Transport> {
    transport: T,
    flow: FlowControl,
    config: Config,
    connected: bool,
    last_mode: FlowMode,
    send_accumulator: f64,
    stats_accumulator: f64,
}

impl<T: Transport> Driver<T> {
    pub fn new(transport: T, config: Config) -> Self {
        let flow = FlowControl::new();
        Self {
            transport,
            last_mode: flow.mode,
            flow,
            config,
            connected: false,
            send_accumulator: 0.0,
            stats_accumulator: 0.0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn flow(&self) -> &FlowControl {
        &self.flow
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 마지막 틱 기준 연결 여부
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// 한 틱 진행
    pub async fn tick(&mut self, delta_time: f64) -> Result<LinkEvent> {
        self.transport.update(delta_time);

        if self.transport.connect_failed() {
            warn!("연결 실패");
            return Err(Error::ConnectFailed);
        }

        let now_connected = self.transport.is_connected();
        let event = match (self.connected, now_connected) {
            (false, true) => {
                info!("연결됨, 흐름 제어 초기화");
                self.flow.reset();
                LinkEvent::Connected
            }
            (true, false) => {
                warn!("연결 끊김, 흐름 제어 초기화");
                self.flow.reset();
                LinkEvent::Disconnected
            }
            _ => LinkEvent::Idle,
        };
        self.connected = now_connected;

        if self.connected {
            self.flow
                .update(delta_time, self.transport.round_trip_time());
        }
        if self.flow.mode != self.last_mode {
            info!(
                "흐름 제어 모드 변경: {:?} -> {:?} ({} pkt/s)",
                self.last_mode,
                self.flow.mode,
                self.flow.send_rate()
            );
            self.last_mode = self.flow.mode;
        }

        self.send_accumulator += delta_time;
        let send_interval = 1.0 / self.flow.send_rate();
        while self.send_accumulator > send_interval {
            // 연결 전 / 끊긴 뒤의 keepalive 실패는 무시
            if let Err(e) = self.transport.send_keepalive().await {
                debug!("keepalive 실패: {}", e);
            }
            self.send_accumulator -= send_interval;
        }

        self.stats_accumulator += delta_time;
        if self.stats_accumulator >= self.config.stats_interval {
            if self.connected {
                debug!(
                    "rtt={:.1}ms, mode={:?}, rate={} pkt/s",
                    self.transport.round_trip_time() * 1000.0,
                    self.flow.mode,
                    self.flow.send_rate()
                );
            }
            self.stats_accumulator -= self.config.stats_interval;
        }

        Ok(event)
    }

    /// 연결될 때까지 틱 진행
    ///
    /// `limit` 이 지나도록 연결되지 않으면 `ConnectFailed`.
    pub async fn wait_connected(&mut self, limit: Option<Duration>) -> Result<()> {
        let start = Instant::now();
        let mut ticker = self.ticker();

        loop {
            ticker.tick().await;
            self.tick(self.config.tick_seconds).await?;
            if self.connected {
                return Ok(());
            }
            if limit.is_some_and(|limit| start.elapsed() > limit) {
                warn!("연결 대기 시간 초과");
                return Err(Error::ConnectFailed);
            }
        }
    }

    /// 연결이 끊길 때까지 틱 진행
    pub async fn wait_disconnected(&mut self) -> Result<()> {
        let mut ticker = self.ticker();
        while self.connected {
            ticker.tick().await;
            self.tick(self.config.tick_seconds).await?;
        }
        Ok(())
    }

    /// 주어진 시간 동안 틱 진행 (송신 후 상대가 꼬리를 받을 시간)
    pub async fn linger(&mut self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        let mut ticker = self.ticker();
        while Instant::now() < deadline {
            ticker.tick().await;
            self.tick(self.config.tick_seconds).await?;
        }
        Ok(())
    }

    /// 파일 송신
    pub async fn send_file(&mut self, path: impl AsRef<Path>) -> Result<TransferStats> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        FileSender::new(self.config.clone())
            .send_file(path, &mut self.transport)
            .await
    }

    /// 파일 수신
    pub async fn receive_file(&mut self) -> Result<ReceivedFileInfo> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        FileReceiver::new(self.config.clone())
            .receive_file(&mut self.transport)
            .await
    }

    fn ticker(&self) -> tokio::time::Interval {
        let mut ticker = interval(Duration::from_secs_f64(self.config.tick_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}
