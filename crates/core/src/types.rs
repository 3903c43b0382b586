//! 도메인 타입 — 트래픽 모니터링 전반에서 공유되는 값 타입
//!
//! 모든 모듈 간 데이터 교환은 이 타입들의 값 전달로 수행됩니다.
//! [`Record`]는 파서가 생성하고 집계 스토리지가 소비하며,
//! [`Report`]와 [`TrafficAlert`]는 출력 스트림의 단위입니다.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

/// 파싱된 액세스 로그 한 줄
///
/// `section`은 인터닝된 공유 바이트 문자열입니다. 원본 라인 버퍼는
/// 파서 호출이 끝나면 재사용되므로, 레코드가 라인 버퍼를 참조하는
/// 필드는 이 하나뿐이며 복사본(또는 캐시 핸들)만 담습니다.
/// 섹션은 UTF-8이 아닐 수 있으므로 문자열이 아닌 바이트로 유지합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 이벤트 발생 시각 (unix epoch 초)
    pub unix_time: i64,
    /// 요청 경로의 첫 세그먼트 (선행 `/` 포함, 예: `/api`)
    pub section: Bytes,
    /// HTTP 상태 코드
    pub status_code: i32,
    /// 응답 본문 크기 (바이트)
    pub response_size: i64,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record[t={} section={} status={} size={}]",
            self.unix_time,
            String::from_utf8_lossy(&self.section),
            self.status_code,
            self.response_size,
        )
    }
}

/// 닫힌 사이클 하나에 대한 트래픽 집계 리포트
///
/// 불변식:
/// - `cycle_start_unix_time == cycle_offset * cycle_duration_seconds`
/// - `total_requests == requests_per_section 값의 합 == requests_per_status_code 값의 합`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// 사이클 길이 (초)
    pub cycle_duration_seconds: i64,
    /// 사이클 식별자 (`unix_time / cycle_duration_seconds`)
    pub cycle_offset: i64,
    /// 사이클 시작 시각 (unix epoch 초)
    pub cycle_start_unix_time: i64,
    /// 사이클 내 총 요청 수
    pub total_requests: u64,
    /// 사이클 내 총 응답 크기 (바이트)
    pub total_response_size_bytes: u64,
    /// 섹션별 요청 수
    pub requests_per_section: HashMap<Bytes, u64>,
    /// 상태 코드별 요청 수
    pub requests_per_status_code: HashMap<i32, u64>,
}

impl Report {
    /// 지정한 사이클에 대한 빈 리포트를 생성합니다.
    pub fn new(cycle_duration_seconds: i64, cycle_offset: i64) -> Self {
        Self {
            cycle_duration_seconds,
            cycle_offset,
            cycle_start_unix_time: cycle_offset * cycle_duration_seconds,
            total_requests: 0,
            total_response_size_bytes: 0,
            requests_per_section: HashMap::new(),
            requests_per_status_code: HashMap::new(),
        }
    }

    /// 레코드 하나를 리포트에 누적합니다.
    ///
    /// 호출자는 레코드의 사이클 오프셋이 이 리포트와 일치함을 보장해야 합니다.
    pub fn observe(&mut self, record: &Record) {
        self.total_requests += 1;
        self.total_response_size_bytes += u64::try_from(record.response_size).unwrap_or(0);
        *self
            .requests_per_section
            .entry(record.section.clone())
            .or_insert(0) += 1;
        *self
            .requests_per_status_code
            .entry(record.status_code)
            .or_insert(0) += 1;
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Report[offset={} start={} requests={} bytes={}]",
            self.cycle_offset,
            self.cycle_start_unix_time,
            self.total_requests,
            self.total_response_size_bytes,
        )
    }
}

/// 알림 스트림의 단일 이벤트
///
/// `alert_id`는 단조 증가하며, resolve 이벤트는 자신이 해소하는
/// 발화 알림의 id를 그대로 담습니다.
/// 불변식: `window_end_unix_time - window_start_unix_time == 윈도우 길이`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficAlert {
    /// 알림 식별자 (발화마다 증가)
    pub alert_id: u64,
    /// 해소 이벤트 여부
    pub resolved: bool,
    /// 윈도우 내 허용 최대 요청 수 (임계값)
    pub max_allowed_requests: u64,
    /// 윈도우 내 관측된 요청 수
    pub observed_in_window_requests: u64,
    /// 윈도우 시작 시각 (unix epoch 초)
    pub window_start_unix_time: i64,
    /// 윈도우 종료 시각 (unix epoch 초)
    pub window_end_unix_time: i64,
}

impl fmt::Display for TrafficAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.resolved { "resolved" } else { "firing" };
        write!(
            f,
            "TrafficAlert[#{} {} observed={}/{} window={}..{}]",
            self.alert_id,
            state,
            self.observed_in_window_requests,
            self.max_allowed_requests,
            self.window_start_unix_time,
            self.window_end_unix_time,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(unix_time: i64, section: &'static [u8], status: i32, size: i64) -> Record {
        Record {
            unix_time,
            section: Bytes::from_static(section),
            status_code: status,
            response_size: size,
        }
    }

    #[test]
    fn report_new_derives_cycle_start() {
        let report = Report::new(10, 3);
        assert_eq!(report.cycle_start_unix_time, 30);
        assert_eq!(report.total_requests, 0);
        assert!(report.requests_per_section.is_empty());
    }

    #[test]
    fn report_observe_accumulates() {
        let mut report = Report::new(10, 0);
        report.observe(&sample_record(1, b"/api", 200, 100));
        report.observe(&sample_record(2, b"/api", 500, 20));
        report.observe(&sample_record(3, b"/report", 200, 5));

        assert_eq!(report.total_requests, 3);
        assert_eq!(report.total_response_size_bytes, 125);
        assert_eq!(
            report.requests_per_section[&Bytes::from_static(b"/api")],
            2
        );
        assert_eq!(
            report.requests_per_section[&Bytes::from_static(b"/report")],
            1
        );
        assert_eq!(report.requests_per_status_code[&200], 2);
        assert_eq!(report.requests_per_status_code[&500], 1);
    }

    #[test]
    fn report_counters_sum_to_total() {
        let mut report = Report::new(10, 0);
        for i in 0..20 {
            report.observe(&sample_record(i, b"/a", 200 + (i as i32 % 3), i));
        }
        let per_section: u64 = report.requests_per_section.values().sum();
        let per_status: u64 = report.requests_per_status_code.values().sum();
        assert_eq!(report.total_requests, per_section);
        assert_eq!(report.total_requests, per_status);
    }

    #[test]
    fn record_display_is_lossy_on_invalid_utf8() {
        let record = sample_record(0, b"/caf\xff", 200, 1);
        let display = record.to_string();
        assert!(display.contains("/caf"));
        assert!(display.contains("status=200"));
    }

    #[test]
    fn alert_display_distinguishes_states() {
        let mut alert = TrafficAlert {
            alert_id: 7,
            resolved: false,
            max_allowed_requests: 10,
            observed_in_window_requests: 12,
            window_start_unix_time: 0,
            window_end_unix_time: 120,
        };
        assert!(alert.to_string().contains("firing"));
        alert.resolved = true;
        assert!(alert.to_string().contains("resolved"));
    }
}
