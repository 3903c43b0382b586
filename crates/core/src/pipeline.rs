//! 파이프라인 trait — 모듈 생명주기 정의
//!
//! [`Pipeline`] trait은 장수명 모듈이 구현하는 생명주기 인터페이스입니다.
//! `tailstat-daemon`에서 모듈을 시작/정지하고 상태를 확인하는 데 사용됩니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TailstatError;

/// 장수명 파이프라인 모듈이 구현하는 생명주기 trait
///
/// # 구현 예시
/// ```ignore
/// struct MonitorPipeline { /* ... */ }
///
/// impl Pipeline for MonitorPipeline {
///     async fn start(&mut self) -> Result<(), TailstatError> {
///         // 워커 스폰, 채널 연결 등
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<(), TailstatError> {
///         // 취소 시그널 전파, 큐 드레인
///         Ok(())
///     }
///
///     async fn health_check(&self) -> HealthStatus {
///         HealthStatus::Healthy
///     }
/// }
/// ```
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다.
    ///
    /// 리소스 초기화, 워커 스폰, 채널 연결 등을 수행합니다.
    /// 이미 실행 중인 경우 `PipelineError::AlreadyRunning`을 반환합니다.
    fn start(&mut self) -> impl std::future::Future<Output = Result<(), TailstatError>> + Send;

    /// 모듈을 정지합니다.
    ///
    /// Graceful shutdown을 수행합니다. 취소 시그널을 전파하고
    /// 출력 큐가 끝까지 드레인되도록 합니다.
    fn stop(&mut self) -> impl std::future::Future<Output = Result<(), TailstatError>> + Send;

    /// 모듈의 현재 상태를 확인합니다.
    fn health_check(&self) -> impl std::future::Future<Output = HealthStatus> + Send;
}

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 성능 저하 또는 부분적 장애 (서비스는 계속 동작)
    Degraded(String),
    /// 비정상 — 서비스 불가 상태
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}
