//! RTT 기반 흐름 제어
//!
//! Good / Bad 두 모드 상태 머신. RTT 가 임계값을 넘으면 Bad 로 떨어지고,
//! 불안정이 반복될수록 Good 복귀까지의 대기(penalty)가 지수적으로 늘어난다.
//! I/O 없이 시간과 RTT 샘플만으로 동작.

/// RTT 임계값 (초)
pub const RTT_THRESHOLD: f64 = 0.250;

/// Good 모드 전송률 (packets/sec)
pub const GOOD_SEND_RATE: f64 = 30.0;

/// Bad 모드 전송률 (packets/sec)
pub const BAD_SEND_RATE: f64 = 10.0;

/// 초기 penalty (초)
pub const INITIAL_PENALTY: f64 = 4.0;

/// penalty 하한 / 상한 (초)
pub const MIN_PENALTY: f64 = 1.0;
pub const MAX_PENALTY: f64 = 60.0;

/// 이 시간 안에 다시 나빠지면 penalty 2배 (초)
pub const UNSTABLE_WINDOW: f64 = 10.0;

/// 좋은 상태가 이만큼 지속될 때마다 penalty 절반 (초)
pub const PENALTY_REDUCTION_INTERVAL: f64 = 10.0;

/// 흐름 제어 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    Good,
    Bad,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowControl {
    pub mode: FlowMode,
    pub penalty_time: f64,            // seconds
    pub good_conditions_time: f64,    // seconds
    pub penalty_reduction_accumulator: f64,
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowControl {
    pub fn new() -> Self {
        Self {
            mode: FlowMode::Bad,
            penalty_time: INITIAL_PENALTY,
            good_conditions_time: 0.0,
            penalty_reduction_accumulator: 0.0,
        }
    }

    // 호출 위치: 연결 수립 / 재수립 시
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // 호출 위치: 매 틱 (기본 1/30초)
    pub fn update(&mut self, delta_time: f64, rtt: f64) {
        match self.mode {
            FlowMode::Good => {
                if rtt > RTT_THRESHOLD {
                    if self.good_conditions_time < UNSTABLE_WINDOW && self.penalty_time < MAX_PENALTY {
                        self.penalty_time = (self.penalty_time * 2.0).min(MAX_PENALTY);
                    }
                    self.mode = FlowMode::Bad;
                    self.good_conditions_time = 0.0;
                    self.penalty_reduction_accumulator = 0.0;
                    return;
                }

                self.good_conditions_time += delta_time;
                self.penalty_reduction_accumulator += delta_time;

                if self.penalty_reduction_accumulator > PENALTY_REDUCTION_INTERVAL
                    && self.penalty_time > MIN_PENALTY
                {
                    self.penalty_time = (self.penalty_time / 2.0).max(MIN_PENALTY);
                    self.penalty_reduction_accumulator = 0.0;
                }
            }
            FlowMode::Bad => {
                if rtt <= RTT_THRESHOLD {
                    self.good_conditions_time += delta_time;
                } else {
                    self.good_conditions_time = 0.0;
                }

                if self.good_conditions_time > self.penalty_time {
                    self.mode = FlowMode::Good;
                    self.good_conditions_time = 0.0;
                    self.penalty_reduction_accumulator = 0.0;
                }
            }
        }
    }

    /// 현재 허용 전송률 (packets/sec)
    pub fn send_rate(&self) -> f64 {
        match self.mode {
            FlowMode::Good => GOOD_SEND_RATE,
            FlowMode::Bad => BAD_SEND_RATE,
        }
    }

    pub fn is_good(&self) -> bool {
        self.mode == FlowMode::Good
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 30.0;

    /// good RTT 로 Good 모드까지 진행, 소요 틱 수 반환
    fn drive_to_good(flow: &mut FlowControl) -> usize {
        let mut ticks = 0;
        while !flow.is_good() {
            flow.update(DT, 0.05);
            ticks += 1;
            assert!(ticks < 100_000, "Good 모드 도달 실패");
        }
        ticks
    }

    #[test]
    fn test_starts_bad_with_default_penalty() {
        let flow = FlowControl::new();
        assert_eq!(flow.mode, FlowMode::Bad);
        assert_eq!(flow.penalty_time, 4.0);
        assert_eq!(flow.send_rate(), 10.0);
    }

    #[test]
    fn test_good_rtt_for_longer_than_penalty_switches_to_good() {
        let mut flow = FlowControl::new();

        // 100틱 = 3.33초 < penalty
        for _ in 0..100 {
            flow.update(DT, 0.1);
            assert_eq!(flow.mode, FlowMode::Bad);
        }

        // 4.0초를 넘는 120~121번째 틱에서 전환
        let total = 100 + drive_to_good(&mut flow);
        assert!((120..=122).contains(&total), "전환 틱: {total}");
        assert_eq!(flow.send_rate(), 30.0);
        assert_eq!(flow.good_conditions_time, 0.0);
        assert_eq!(flow.penalty_reduction_accumulator, 0.0);
    }

    #[test]
    fn test_rtt_at_threshold_counts_as_good() {
        let mut flow = FlowControl::new();
        for _ in 0..200 {
            flow.update(DT, RTT_THRESHOLD);
        }
        assert!(flow.is_good());
    }

    #[test]
    fn test_bad_rtt_in_bad_mode_resets_good_time() {
        let mut flow = FlowControl::new();
        for _ in 0..60 {
            flow.update(DT, 0.1);
        }
        assert!(flow.good_conditions_time > 1.9);

        flow.update(DT, 0.3);
        assert_eq!(flow.good_conditions_time, 0.0);
        assert_eq!(flow.mode, FlowMode::Bad);
    }

    #[test]
    fn test_quick_drop_doubles_penalty() {
        let mut flow = FlowControl::new();
        drive_to_good(&mut flow);

        flow.update(DT, 0.1);
        flow.update(DT, 0.3);

        assert_eq!(flow.mode, FlowMode::Bad);
        assert_eq!(flow.penalty_time, 8.0);
        assert_eq!(flow.good_conditions_time, 0.0);
        assert_eq!(flow.penalty_reduction_accumulator, 0.0);
        assert_eq!(flow.send_rate(), 10.0);
    }

    #[test]
    fn test_penalty_is_capped_at_sixty() {
        let mut flow = FlowControl::new();
        let mut expected = 4.0;
        for _ in 0..8 {
            drive_to_good(&mut flow);
            flow.update(DT, 1.0);
            expected = f64::min(expected * 2.0, 60.0);
            assert_eq!(flow.penalty_time, expected);
        }
        assert_eq!(flow.penalty_time, 60.0);
    }

    #[test]
    fn test_stable_drop_keeps_penalty() {
        let mut flow = FlowControl::new();
        drive_to_good(&mut flow);

        // 10초 넘게 안정적이면 penalty 가 절반으로 줄고, 이후 하락은 2배 하지 않음
        for _ in 0..(11 * 30) {
            flow.update(DT, 0.05);
        }
        assert_eq!(flow.penalty_time, 2.0);

        flow.update(DT, 0.5);
        assert_eq!(flow.mode, FlowMode::Bad);
        assert_eq!(flow.penalty_time, 2.0);
    }

    #[test]
    fn test_penalty_decays_to_floor() {
        let mut flow = FlowControl::new();
        drive_to_good(&mut flow);

        for _ in 0..(60 * 30) {
            flow.update(DT, 0.05);
            assert!(flow.penalty_time >= MIN_PENALTY);
        }
        assert_eq!(flow.penalty_time, 1.0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut flow = FlowControl::new();
        drive_to_good(&mut flow);
        flow.update(DT, 0.9);
        assert_eq!(flow.penalty_time, 8.0);

        flow.reset();
        assert_eq!(flow.mode, FlowMode::Bad);
        assert_eq!(flow.penalty_time, INITIAL_PENALTY);
        assert_eq!(flow.good_conditions_time, 0.0);
        assert_eq!(flow.penalty_reduction_accumulator, 0.0);
    }
}
