//! 파이프라인 에러 타입
//!
//! [`ReadError::EndOfFile`]은 에러라기보다 "지금은 읽을 새 데이터가 없다"는
//! 정상 신호입니다. 워처는 이를 폴링 대기로, 그 외 I/O 에러는 백오프로
//! 처리합니다. 파싱 에러는 라인 단위이며 파이프라인 상태에 영향을 주지
//! 않습니다.

use tailstat_core::error::{PipelineError, TailstatError};

/// 파일 리더 에러
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// 현재 읽을 새 라인이 없음 — 정상 상태이며 폴링 대기를 의미
    #[error("end of file")]
    EndOfFile,

    /// 파일 열기/stat/읽기 실패
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 라인 파싱 에러 — 라인 단위이며 비치명적
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 시각 필드 앞의 공백 구분 필드가 부족함
    #[error("malformed prefix: not enough space-separated fields before the time part")]
    MalformedPrefix,

    /// 시각 필드가 없거나 형식이 어긋남
    #[error("malformed time part: {reason}")]
    MalformedTime { reason: String },

    /// 요청 섹션을 찾을 수 없음
    #[error("malformed section: {reason}")]
    MalformedSection { reason: String },

    /// 상태 코드가 3자리 십진수가 아님
    #[error("malformed status code: {reason}")]
    MalformedStatusCode { reason: String },

    /// 십진수 필드가 비었거나 숫자가 아닌 바이트를 포함함
    #[error("malformed integer: {reason}")]
    MalformedInt { reason: String },
}

/// 파이프라인 조립/운영 에러
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<MonitorError> for TailstatError {
    fn from(err: MonitorError) -> Self {
        TailstatError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
