//! 에러 타입 — 도메인별 에러 정의

/// Tailstat 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TailstatError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중인 파이프라인을 다시 시작함
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지함
    #[error("pipeline is not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "stat.cycle_seconds".to_owned(),
            reason: "must be at least 1".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stat.cycle_seconds"));
        assert!(msg.contains("must be at least 1"));
    }

    #[test]
    fn pipeline_error_display() {
        assert_eq!(
            PipelineError::AlreadyRunning.to_string(),
            "pipeline is already running"
        );
        assert_eq!(
            PipelineError::NotRunning.to_string(),
            "pipeline is not running"
        );
    }

    #[test]
    fn converts_into_tailstat_error() {
        let err: TailstatError = ConfigError::FileNotFound {
            path: "/etc/tailstat/tailstat.toml".to_owned(),
        }
        .into();
        assert!(matches!(err, TailstatError::Config(_)));
        assert!(err.to_string().contains("tailstat.toml"));
    }

    #[test]
    fn io_error_wraps() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TailstatError = io.into();
        assert!(matches!(err, TailstatError::Io(_)));
    }
}
