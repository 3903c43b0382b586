//! 설정 관리 — tailstat.toml 파싱 및 검증
//!
//! [`TailstatConfig`]는 데몬과 파이프라인이 공유하는 통합 설정입니다.
//! TOML 파일에서 일부 섹션만 지정해도 나머지는 기본값으로 채워집니다.
//! 모든 수치 제약은 [`TailstatConfig::validate`]에서 한 번에 검증하며,
//! 검증 실패는 기동 중단 사유입니다.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tailstat 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TailstatConfig {
    /// 일반 설정 (로깅)
    pub general: GeneralConfig,
    /// 감시 대상 파일 설정
    pub file: FileConfig,
    /// 라인 파서 설정
    pub parser: ParserConfig,
    /// 트래픽 집계 설정
    pub stat: StatConfig,
    /// 알림 설정
    pub alert: AlertConfig,
    /// 콘솔 뷰 설정
    pub view: ViewConfig,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 디버그 모드 — 로그 레벨을 debug로 낮춥니다
    pub debug_mode: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            debug_mode: false,
        }
    }
}

/// 감시 대상 파일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// 감시할 로그 파일 경로
    pub path: String,
    /// 읽기 버퍼 크기 (바이트) — 리더에서 최소 4096으로 클램프됩니다
    pub read_buf_size_bytes: usize,
    /// 새 라인이 없을 때의 폴링 주기 (밀리초)
    pub poll_period_ms: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: "/tmp/access.log".to_owned(),
            read_buf_size_bytes: 16 * 1024,
            poll_period_ms: 100,
        }
    }
}

/// 라인 파서 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// 섹션 인터닝 캐시의 최대 엔트리 수 — 초과 시 통째로 버리고 재구축, 0이면 비활성화
    pub section_cache_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            section_cache_size: 16 * 1024,
        }
    }
}

/// 트래픽 집계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatConfig {
    /// 집계 사이클 길이 (초)
    pub cycle_seconds: i64,
    /// 리포트 출력 큐 용량
    pub reports_ring_size: usize,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            cycle_seconds: 10,
            reports_ring_size: 10,
        }
    }
}

/// 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// 슬라이딩 윈도우 길이 (초)
    pub window_seconds: i64,
    /// 초당 평균 최대 허용 요청 수 — 내부 임계값은 `max * window`
    pub max_req_per_second: u64,
    /// 알림 출력 큐 용량
    pub ring_size: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            window_seconds: 120,
            max_req_per_second: 10,
            ring_size: 10,
        }
    }
}

/// 콘솔 뷰 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// 유휴 상태에서 하트비트를 출력하는 주기 (초)
    pub refresh_period_secs: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            refresh_period_secs: 10,
        }
    }
}

/// 윈도우를 사이클로 나눈 슬롯 수의 상한
///
/// 알림 상태의 슬롯 링이 무한정 커지는 것을 막습니다.
pub const MAX_ALERT_SLOTS: i64 = 4096;

impl TailstatConfig {
    /// TOML 문자열에서 설정을 파싱합니다.
    ///
    /// 누락된 섹션과 필드는 기본값으로 채워집니다.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// 파일에서 설정을 읽어 파싱합니다.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_owned(),
        })?;
        Self::parse(&content)
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 실패는 기동 중단 사유이며, 첫 번째 위반 필드를 담은
    /// [`ConfigError::InvalidValue`]를 반환합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file.path.is_empty() {
            return Err(invalid("file.path", "must not be empty"));
        }
        if self.file.poll_period_ms == 0 {
            return Err(invalid("file.poll_period_ms", "must be at least 1"));
        }
        if self.stat.cycle_seconds < 1 {
            return Err(invalid("stat.cycle_seconds", "must be at least 1"));
        }
        if self.stat.reports_ring_size < 1 {
            return Err(invalid("stat.reports_ring_size", "must be at least 1"));
        }
        if self.alert.ring_size < 1 {
            return Err(invalid("alert.ring_size", "must be at least 1"));
        }

        // 윈도우는 사이클의 정수배 슬롯으로 나뉘어야 합니다
        let slots = self.alert.window_seconds / self.stat.cycle_seconds;
        if slots < 1 {
            return Err(invalid(
                "alert.window_seconds",
                "must be at least stat.cycle_seconds",
            ));
        }
        if slots > MAX_ALERT_SLOTS {
            return Err(invalid(
                "alert.window_seconds",
                "too large for the configured stat.cycle_seconds",
            ));
        }

        if self.view.refresh_period_secs == 0 {
            return Err(invalid("view.refresh_period_secs", "must be at least 1"));
        }

        match self.general.log_format.as_str() {
            "json" | "pretty" => {}
            other => {
                return Err(invalid(
                    "general.log_format",
                    &format!("unknown format '{other}', expected 'json' or 'pretty'"),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}
