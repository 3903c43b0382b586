//! 트래픽 집계 스토리지 — 레코드를 고정 길이 사이클로 버킷팅합니다.
//!
//! [`CycleStorage::store`]는 동시 호출에 안전하지 않습니다. 워처 태스크만
//! 호출하는 단일 라이터 계약을 전제합니다.
//!
//! # 사이클 경계
//! 사이클 오프셋은 `unix_time / cycle_duration_seconds`(정수 나눗셈)로
//! 정해집니다. 오프셋이 달라지는 레코드가 오면 — 시간이 역행하는 경우를
//! 포함해서 — 현재 사이클을 닫아 리포트 큐로 내보내고 새 사이클을
//! 시작합니다. 과거 사이클로의 병합은 시도하지 않으며, 다운스트림은
//! 비단조 오프셋을 허용해야 합니다. 레코드가 없었던 사이클은 리포트를
//! 내보내지 않습니다.

use tracing::{debug, warn};

use tailstat_core::types::{Record, Report};

use crate::error::MonitorError;
use crate::ring::{RingReceiver, RingSender, ring_channel};

/// 사이클 집계 스토리지
///
/// 닫힌 리포트는 drop-oldest 정책의 유계 큐로 내보내며, 느린 소비자가
/// 있어도 store 호출은 블로킹되지 않습니다.
pub struct CycleStorage {
    cycle_duration_seconds: i64,
    current_cycle: Option<Report>,
    reports_tx: RingSender<Report>,
}

impl CycleStorage {
    /// 새 스토리지와 리포트 수신측을 생성합니다.
    pub fn new(
        cycle_duration_seconds: i64,
        reports_ring_size: usize,
    ) -> Result<(Self, RingReceiver<Report>), MonitorError> {
        if cycle_duration_seconds < 1 {
            return Err(MonitorError::config(
                "stat.cycle_seconds",
                "must be at least 1",
            ));
        }
        if reports_ring_size < 1 {
            return Err(MonitorError::config(
                "stat.reports_ring_size",
                "must be at least 1",
            ));
        }

        let (reports_tx, reports_rx) = ring_channel(reports_ring_size);
        Ok((
            Self {
                cycle_duration_seconds,
                current_cycle: None,
                reports_tx,
            },
            reports_rx,
        ))
    }

    /// 레코드 하나를 집계에 반영합니다.
    ///
    /// 동시 호출에 안전하지 않습니다 — 호출자가 직렬화해야 합니다.
    pub fn store(&mut self, record: Record) {
        let cycle_offset = record.unix_time / self.cycle_duration_seconds;

        if let Some(report) = self.current_cycle.as_mut()
            && report.cycle_offset == cycle_offset
        {
            report.observe(&record);
            return;
        }

        // 오프셋이 달라짐 — 역행 포함 — 현재 사이클을 닫고 새로 시작합니다
        if let Some(closed) = self.current_cycle.take() {
            debug!(report = %closed, "closing traffic cycle");
            if let Some(dropped) = self.reports_tx.send(closed) {
                warn!(report = %dropped, "report wasn't consumed, dropping oldest");
            }
        }

        let mut report = Report::new(self.cycle_duration_seconds, cycle_offset);
        report.observe(&record);
        self.current_cycle = Some(report);
    }

    /// 아직 닫히지 않은 현재 사이클을 반환합니다.
    pub fn current_cycle(&self) -> Option<&Report> {
        self.current_cycle.as_ref()
    }

    /// 설정된 사이클 길이를 반환합니다.
    pub fn cycle_duration_seconds(&self) -> i64 {
        self.cycle_duration_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(unix_time: i64, section: &'static [u8], status: i32, size: i64) -> Record {
        Record {
            unix_time,
            section: Bytes::from_static(section),
            status_code: status,
            response_size: size,
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(CycleStorage::new(0, 10).is_err());
        assert!(CycleStorage::new(10, 0).is_err());
        assert!(CycleStorage::new(1, 1).is_ok());
    }

    #[test]
    fn aggregates_records_within_one_cycle() {
        let (mut storage, mut reports) = CycleStorage::new(10, 10).unwrap();
        storage.store(record(11, b"/first", 200, 100));
        storage.store(record(11, b"/first", 200, 50));
        storage.store(record(15, b"/first", 500, 25));
        storage.store(record(19, b"/second", 500, 25));

        // 사이클이 아직 열려 있으므로 리포트는 없습니다
        assert!(reports.try_recv().is_none());

        // 다음 사이클의 레코드가 현재 사이클을 닫습니다
        storage.store(record(20, b"/first", 200, 1));

        let report = reports.try_recv().expect("closed cycle report");
        assert_eq!(report.cycle_offset, 1);
        assert_eq!(report.cycle_start_unix_time, 10);
        assert_eq!(report.cycle_duration_seconds, 10);
        assert_eq!(report.total_requests, 4);
        assert_eq!(report.total_response_size_bytes, 200);
        assert_eq!(
            report.requests_per_section[&Bytes::from_static(b"/first")],
            3
        );
        assert_eq!(
            report.requests_per_section[&Bytes::from_static(b"/second")],
            1
        );
        assert_eq!(report.requests_per_status_code[&200], 2);
        assert_eq!(report.requests_per_status_code[&500], 2);
    }

    #[test]
    fn cycle_start_is_offset_times_duration() {
        let (mut storage, mut reports) = CycleStorage::new(10, 10).unwrap();
        storage.store(record(37, b"/a", 200, 1));
        storage.store(record(123, b"/a", 200, 1));

        let report = reports.try_recv().unwrap();
        assert_eq!(report.cycle_offset, 3);
        assert_eq!(report.cycle_start_unix_time, 30);
    }

    #[test]
    fn silent_cycles_emit_no_reports() {
        let (mut storage, mut reports) = CycleStorage::new(10, 10).unwrap();
        storage.store(record(5, b"/a", 200, 1));
        // 사이클 1~4는 레코드가 없습니다
        storage.store(record(55, b"/a", 200, 1));

        let report = reports.try_recv().unwrap();
        assert_eq!(report.cycle_offset, 0);
        // 빈 사이클의 리포트는 생성되지 않습니다
        assert!(reports.try_recv().is_none());
    }

    #[test]
    fn backwards_time_closes_current_and_opens_earlier_cycle() {
        let (mut storage, mut reports) = CycleStorage::new(10, 10).unwrap();
        storage.store(record(25, b"/a", 200, 1));
        storage.store(record(5, b"/a", 200, 1));
        storage.store(record(26, b"/a", 200, 1));

        let first = reports.try_recv().unwrap();
        let second = reports.try_recv().unwrap();
        // 리포트 스트림은 비단조일 수 있습니다
        assert_eq!(first.cycle_offset, 2);
        assert_eq!(second.cycle_offset, 0);
        assert_eq!(storage.current_cycle().unwrap().cycle_offset, 2);
    }

    #[test]
    fn no_record_is_lost_across_cycles() {
        let (mut storage, mut reports) = CycleStorage::new(10, 100).unwrap();
        let times = [1, 2, 11, 12, 13, 25, 26, 27, 28, 5, 41];
        for &t in &times {
            storage.store(record(t, b"/a", 200, 1));
        }

        let mut emitted = 0;
        while let Some(report) = reports.try_recv() {
            emitted += report.total_requests;
        }
        let pending = storage.current_cycle().map_or(0, |r| r.total_requests);
        assert_eq!(emitted + pending, times.len() as u64);
    }

    #[test]
    fn full_reports_queue_drops_oldest() {
        let (mut storage, mut reports) = CycleStorage::new(10, 2).unwrap();
        // 사이클 0, 1, 2를 차례로 닫고 3을 엽니다
        storage.store(record(5, b"/a", 200, 1));
        storage.store(record(15, b"/a", 200, 1));
        storage.store(record(25, b"/a", 200, 1));
        storage.store(record(35, b"/a", 200, 1));

        // 용량 2 큐에는 최신 2개만 남습니다
        assert_eq!(reports.try_recv().unwrap().cycle_offset, 1);
        assert_eq!(reports.try_recv().unwrap().cycle_offset, 2);
        assert!(reports.try_recv().is_none());
    }
}
