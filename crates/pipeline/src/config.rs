//! 모니터 파이프라인 설정
//!
//! [`MonitorConfig`]는 core의 [`TailstatConfig`](tailstat_core::config::TailstatConfig)에서
//! 파이프라인이 실제로 사용하는 값만 뽑아낸 설정입니다.

use std::path::PathBuf;
use std::time::Duration;

use tailstat_core::config::{MAX_ALERT_SLOTS, TailstatConfig};

use crate::error::MonitorError;

/// 모니터 파이프라인 설정
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// 감시할 로그 파일 경로
    pub file_path: PathBuf,
    /// 리더의 읽기 버퍼 크기 (바이트)
    pub file_read_buf_size_bytes: usize,
    /// 새 라인이 없을 때의 폴링 주기
    pub file_read_poll_period: Duration,
    /// 섹션 인터닝 캐시 크기 (0이면 비활성화)
    pub section_cache_size: usize,
    /// 집계 사이클 길이 (초)
    pub stat_cycle_seconds: i64,
    /// 리포트 큐 용량
    pub stat_reports_ring_size: usize,
    /// 알림 윈도우 길이 (초)
    pub alert_window_seconds: i64,
    /// 초당 평균 최대 허용 요청 수
    pub alert_max_req_per_second: u64,
    /// 알림 큐 용량
    pub alert_ring_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_core(&TailstatConfig::default())
    }
}

impl MonitorConfig {
    /// core 통합 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &TailstatConfig) -> Self {
        Self {
            file_path: PathBuf::from(&core.file.path),
            file_read_buf_size_bytes: core.file.read_buf_size_bytes,
            file_read_poll_period: Duration::from_millis(core.file.poll_period_ms),
            section_cache_size: core.parser.section_cache_size,
            stat_cycle_seconds: core.stat.cycle_seconds,
            stat_reports_ring_size: core.stat.reports_ring_size,
            alert_window_seconds: core.alert.window_seconds,
            alert_max_req_per_second: core.alert.max_req_per_second,
            alert_ring_size: core.alert.ring_size,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.file_path.as_os_str().is_empty() {
            return Err(MonitorError::config("file.path", "must not be empty"));
        }
        if self.file_read_poll_period.is_zero() {
            return Err(MonitorError::config(
                "file.poll_period_ms",
                "must be at least 1",
            ));
        }
        if self.stat_cycle_seconds < 1 {
            return Err(MonitorError::config(
                "stat.cycle_seconds",
                "must be at least 1",
            ));
        }
        if self.stat_reports_ring_size < 1 {
            return Err(MonitorError::config(
                "stat.reports_ring_size",
                "must be at least 1",
            ));
        }
        if self.alert_ring_size < 1 {
            return Err(MonitorError::config(
                "alert.ring_size",
                "must be at least 1",
            ));
        }

        let slots = self.alert_window_seconds / self.stat_cycle_seconds;
        if slots < 1 {
            return Err(MonitorError::config(
                "alert.window_seconds",
                "must be at least stat.cycle_seconds",
            ));
        }
        if slots > MAX_ALERT_SLOTS {
            return Err(MonitorError::config(
                "alert.window_seconds",
                "too large for the configured stat.cycle_seconds",
            ));
        }
        Ok(())
    }
}
