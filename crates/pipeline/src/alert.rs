//! 트래픽 알림 상태 — 리포트를 받아 슬라이딩 윈도우 임계값을 판정합니다.
//!
//! # 책임
//! - 트래픽 리포트를 받아 윈도우 길이에 맞는 슬롯 링을 유지
//! - 윈도우 내 요청 수가 임계값(`max_req_per_second * window`)에 도달하면
//!   알림을 발화하고, 다시 내려가면 해당 알림의 해소 이벤트를 발행
//!
//! # 주의
//! - [`TrafficState::store`]는 동시 호출에 안전하지 않습니다. 리포트 구독
//!   태스크의 리스너로 등록해 사용하거나 외부에서 직렬화해야 합니다.
//! - 임계값을 넘는 동안에는 사이클마다 새 id의 알림이 다시 발화됩니다.
//!   해소 이벤트는 마지막 발화 id를 담아 한 번만 발행됩니다.
//! - 알림 큐가 가득 차면 가장 오래된 알림을 버리고 에러로 기록합니다.

use tracing::{debug, error};

use tailstat_core::types::{Report, TrafficAlert};

use crate::error::MonitorError;
use crate::ring::{EvictingRing, RingReceiver, RingSender, ring_channel};

/// 윈도우를 구성하는 사이클 슬롯 하나
#[derive(Debug, Clone, Copy)]
struct TrafficSlot {
    cycle_requests: u64,
    cycle_start_unix_time: i64,
}

/// 슬롯 수의 상한 — 설정 검증과 동일한 값입니다
const MAX_SLOTS: i64 = 4096;

/// 슬라이딩 윈도우 트래픽 알림 상태 머신
pub struct TrafficState {
    window_duration_seconds: i64,
    reports_cycle_seconds: i64,
    max_traffic_in_window: u64,

    requests_in_window: u64,
    reports_ring: EvictingRing<TrafficSlot>,

    alerts_count: u64,
    current: Option<TrafficAlert>,
    alerts_tx: RingSender<TrafficAlert>,
}

impl TrafficState {
    /// 새 알림 상태와 알림 수신측을 생성합니다.
    ///
    /// 슬롯 수(`window / cycle`)는 1 이상 4096 이하여야 합니다.
    pub fn new(
        window_duration_seconds: i64,
        reports_cycle_seconds: i64,
        max_avg_req_per_second: u64,
        alert_ring_size: usize,
    ) -> Result<(Self, RingReceiver<TrafficAlert>), MonitorError> {
        if reports_cycle_seconds < 1 {
            return Err(MonitorError::config(
                "stat.cycle_seconds",
                "must be at least 1",
            ));
        }
        let slots = window_duration_seconds / reports_cycle_seconds;
        if slots < 1 {
            return Err(MonitorError::config(
                "alert.window_seconds",
                "must be at least stat.cycle_seconds",
            ));
        }
        if slots > MAX_SLOTS {
            return Err(MonitorError::config(
                "alert.window_seconds",
                "too large for the configured stat.cycle_seconds",
            ));
        }
        if alert_ring_size < 1 {
            return Err(MonitorError::config(
                "alert.ring_size",
                "must be at least 1",
            ));
        }

        let (alerts_tx, alerts_rx) = ring_channel(alert_ring_size);
        Ok((
            Self {
                window_duration_seconds,
                reports_cycle_seconds,
                max_traffic_in_window: max_avg_req_per_second
                    .saturating_mul(window_duration_seconds as u64),
                requests_in_window: 0,
                reports_ring: EvictingRing::new(slots as usize),
                alerts_count: 0,
                current: None,
                alerts_tx,
            },
            alerts_rx,
        ))
    }

    /// 리포트 하나를 윈도우에 반영하고 알림 전이를 판정합니다.
    ///
    /// 동시 호출에 안전하지 않습니다 — 호출자가 직렬화해야 합니다.
    pub fn store(&mut self, report: &Report) {
        if self.reports_cycle_seconds != report.cycle_duration_seconds {
            error!(
                expected = self.reports_cycle_seconds,
                actual = report.cycle_duration_seconds,
                "report cycle duration mismatch, dropping report"
            );
            return;
        }

        // 윈도우를 벗어난 슬롯을 머리에서부터 걷어냅니다
        let window_start = report.cycle_start_unix_time - self.window_duration_seconds;
        while let Some(head) = self.reports_ring.head() {
            if head.cycle_start_unix_time >= window_start {
                break;
            }
            self.requests_in_window -= head.cycle_requests;
            self.reports_ring.remove_head();
        }

        // 시간이 역행해 링이 가득 찬 경우 가장 오래된 슬롯이 밀려납니다
        if let Some(evicted) = self.reports_ring.push_tail(TrafficSlot {
            cycle_requests: report.total_requests,
            cycle_start_unix_time: report.cycle_start_unix_time,
        }) {
            debug!(
                cycle_start = evicted.cycle_start_unix_time,
                "slot ring full, evicted oldest slot"
            );
            self.requests_in_window -= evicted.cycle_requests;
        }
        self.requests_in_window += report.total_requests;

        self.check_for_alert_violation(report);
    }

    /// 현재 윈도우 내 요청 수를 반환합니다.
    pub fn requests_in_window(&self) -> u64 {
        self.requests_in_window
    }

    /// 지금까지 발화된 알림 수를 반환합니다.
    pub fn alerts_count(&self) -> u64 {
        self.alerts_count
    }

    fn check_for_alert_violation(&mut self, report: &Report) {
        if self.requests_in_window >= self.max_traffic_in_window {
            self.alerts_count += 1;
            let alert = TrafficAlert {
                alert_id: self.alerts_count,
                resolved: false,
                max_allowed_requests: self.max_traffic_in_window,
                observed_in_window_requests: self.requests_in_window,
                window_start_unix_time: report.cycle_start_unix_time
                    - self.window_duration_seconds,
                window_end_unix_time: report.cycle_start_unix_time,
            };
            self.current = Some(alert.clone());
            self.publish(alert);
            return;
        }

        let Some(current) = self.current.take() else {
            return;
        };
        self.publish(TrafficAlert {
            alert_id: current.alert_id,
            resolved: true,
            max_allowed_requests: self.max_traffic_in_window,
            observed_in_window_requests: self.requests_in_window,
            window_start_unix_time: report.cycle_start_unix_time - self.window_duration_seconds,
            window_end_unix_time: report.cycle_start_unix_time,
        });
    }

    fn publish(&self, alert: TrafficAlert) {
        if let Some(dropped) = self.alerts_tx.send(alert) {
            error!(alert = %dropped, "alert wasn't consumed, dropping oldest");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(cycle_duration: i64, offset: i64, total: u64) -> Report {
        let mut report = Report::new(cycle_duration, offset);
        report.total_requests = total;
        report
    }

    fn expect_alert(rx: &mut RingReceiver<TrafficAlert>, expected: TrafficAlert) {
        let alert = rx.try_recv().expect("an alert should be queued");
        assert_eq!(alert, expected);
    }

    #[test]
    fn rejects_invalid_configuration() {
        // 윈도우가 사이클보다 작으면 슬롯이 0개가 됩니다
        assert!(TrafficState::new(1, 2, 1, 2).is_err());
        // 슬롯 수 상한 초과
        assert!(TrafficState::new(MAX_SLOTS * 2 + 2, 1, 1, 2).is_err());
        // 알림 큐 용량 0
        assert!(TrafficState::new(10, 2, 1, 0).is_err());
        // 사이클 0
        assert!(TrafficState::new(10, 0, 1, 2).is_err());

        assert!(TrafficState::new(10, 2, 1, 2).is_ok());
    }

    #[test]
    fn fires_resolves_and_keeps_latest_alerts() {
        let (mut state, mut alerts) = TrafficState::new(10, 2, 1, 2).unwrap();

        state.store(&report(2, 3, 4));
        assert!(alerts.try_recv().is_none());

        state.store(&report(2, 4, 4));
        assert!(alerts.try_recv().is_none());

        // 누적 10 == 임계값 10 — 바로 이 리포트에서 발화합니다
        state.store(&report(2, 5, 2));
        expect_alert(
            &mut alerts,
            TrafficAlert {
                alert_id: 1,
                resolved: false,
                max_allowed_requests: 10,
                observed_in_window_requests: 10,
                window_start_unix_time: 0,
                window_end_unix_time: 10,
            },
        );

        // 임계값 초과가 지속되는 동안 사이클마다 새 id로 재발화합니다
        state.store(&report(2, 6, 4));
        expect_alert(
            &mut alerts,
            TrafficAlert {
                alert_id: 2,
                resolved: false,
                max_allowed_requests: 10,
                observed_in_window_requests: 14,
                window_start_unix_time: 2,
                window_end_unix_time: 12,
            },
        );

        // 임계값 아래로 내려가면 마지막 발화 id로 해소됩니다
        state.store(&report(2, 11, 3));
        expect_alert(
            &mut alerts,
            TrafficAlert {
                alert_id: 2,
                resolved: true,
                max_allowed_requests: 10,
                observed_in_window_requests: 7,
                window_start_unix_time: 12,
                window_end_unix_time: 22,
            },
        );

        // 알림 큐(용량 2)에 3건을 연속으로 넣으면 최신 2건만 남습니다
        state.store(&report(2, 16, 30));
        state.store(&report(2, 17, 40));
        state.store(&report(2, 18, 50));

        expect_alert(
            &mut alerts,
            TrafficAlert {
                alert_id: 4,
                resolved: false,
                max_allowed_requests: 10,
                observed_in_window_requests: 70,
                window_start_unix_time: 24,
                window_end_unix_time: 34,
            },
        );
        expect_alert(
            &mut alerts,
            TrafficAlert {
                alert_id: 5,
                resolved: false,
                max_allowed_requests: 10,
                observed_in_window_requests: 120,
                window_start_unix_time: 26,
                window_end_unix_time: 36,
            },
        );
        assert!(alerts.try_recv().is_none());
    }

    #[test]
    fn resolve_is_emitted_exactly_once() {
        let (mut state, mut alerts) = TrafficState::new(10, 2, 1, 8).unwrap();

        state.store(&report(2, 0, 10));
        assert!(!alerts.try_recv().unwrap().resolved);

        // 첫 번째 임계값 미만 리포트가 해소를 발행합니다
        state.store(&report(2, 10, 1));
        let resolved = alerts.try_recv().unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.alert_id, 1);

        // 이후의 미만 리포트는 아무것도 발행하지 않습니다
        state.store(&report(2, 11, 1));
        assert!(alerts.try_recv().is_none());
    }

    #[test]
    fn mismatched_cycle_duration_is_dropped_without_state_change() {
        let (mut state, mut alerts) = TrafficState::new(10, 2, 1, 8).unwrap();
        state.store(&report(2, 0, 4));
        assert_eq!(state.requests_in_window(), 4);

        // 사이클 길이가 다른 리포트는 상태를 건드리지 않습니다
        state.store(&report(5, 1, 100));
        assert_eq!(state.requests_in_window(), 4);
        assert!(alerts.try_recv().is_none());
    }

    #[test]
    fn window_sum_matches_ring_contents() {
        let (mut state, _alerts) = TrafficState::new(10, 2, 100, 8).unwrap();
        // 역행 입력을 포함한 임의 순서의 리포트
        for (offset, total) in [(3, 4), (4, 7), (1, 2), (5, 1), (2, 9), (9, 3), (4, 5)] {
            state.store(&report(2, offset, total));
            let ring_sum: u64 = state.reports_ring.iter().map(|s| s.cycle_requests).sum();
            assert_eq!(state.requests_in_window(), ring_sum);
        }
    }

    #[test]
    fn backwards_time_evicts_oldest_slot() {
        // 슬롯 2개짜리 작은 윈도우
        let (mut state, _alerts) = TrafficState::new(4, 2, 100, 8).unwrap();
        state.store(&report(2, 10, 1));
        state.store(&report(2, 11, 2));
        assert_eq!(state.requests_in_window(), 3);

        // 과거 리포트 — 만료 제거는 없지만 링이 가득 차서 머리가 밀려납니다
        state.store(&report(2, 5, 7));
        let ring_sum: u64 = state.reports_ring.iter().map(|s| s.cycle_requests).sum();
        assert_eq!(state.requests_in_window(), ring_sum);
        assert_eq!(state.reports_ring.len(), 2);
    }

    #[test]
    fn threshold_is_rate_times_window() {
        let (mut state, mut alerts) = TrafficState::new(120, 10, 10, 8).unwrap();
        // 임계값 1200 미만
        state.store(&report(10, 0, 1199));
        assert!(alerts.try_recv().is_none());

        let (mut state, mut alerts) = TrafficState::new(120, 10, 10, 8).unwrap();
        state.store(&report(10, 0, 1200));
        let alert = alerts.try_recv().unwrap();
        assert_eq!(alert.max_allowed_requests, 1200);
        assert_eq!(alert.observed_in_window_requests, 1200);
    }

    #[test]
    fn empty_window_report_resolves_long_running_alert() {
        let (mut state, mut alerts) = TrafficState::new(10, 2, 1, 8).unwrap();
        state.store(&report(2, 0, 50));
        assert!(!alerts.try_recv().unwrap().resolved);

        // 긴 공백 후의 첫 리포트 — 윈도우가 완전히 갈린 뒤 해소됩니다
        state.store(&report(2, 1000, 1));
        let resolved = alerts.try_recv().unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.observed_in_window_requests, 1);
    }
}
