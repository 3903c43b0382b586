//! 파이프라인 오케스트레이션 — tail/파싱/집계/알림의 전체 흐름을 관리합니다.
//!
//! [`MonitorPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `tailstat-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! TailReader -> LogWatcher -> W3cParser -> CycleStorage
//!                                              | reports (drop-oldest)
//!                            Subscription -> [TrafficState, report listeners...]
//!                                              | alerts (drop-oldest)
//!                            Subscription -> [alert listeners...]
//! ```
//!
//! 정지 시에는 취소 토큰으로 워처를 내리고, 워처가 스토리지를 드롭하면
//! 리포트 큐가 닫히고, 리포트 구독이 끝나며 알림 상태가 드롭되어 알림
//! 큐까지 연쇄적으로 닫힙니다. 구독자들은 큐에 남은 엔트리를 끝까지
//! 드레인한 뒤 종료합니다.

use tokio_util::sync::CancellationToken;
use tracing::info;

use tailstat_core::error::{PipelineError, TailstatError};
use tailstat_core::pipeline::{HealthStatus, Pipeline};
use tailstat_core::types::{Report, TrafficAlert};

use crate::alert::TrafficState;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::parser::W3cParser;
use crate::stat::CycleStorage;
use crate::subscribe::{Listener, Subscription};
use crate::tail::TailReader;
use crate::watcher::LogWatcher;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 액세스 로그 모니터 파이프라인
///
/// # 사용 예시
/// ```ignore
/// let mut pipeline = MonitorPipelineBuilder::new()
///     .config(MonitorConfig::from_core(&config))
///     .report_listener(view.report_listener())
///     .alert_listener(view.alert_listener())
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct MonitorPipeline {
    config: MonitorConfig,
    state: PipelineState,
    token: Option<CancellationToken>,
    watcher: Option<LogWatcher>,
    report_subscription: Option<Subscription<Report>>,
    alert_subscription: Option<Subscription<TrafficAlert>>,
    // 정지 사이에 보관했다가 재시작 시 다시 구독에 넘깁니다
    report_listeners: Option<Vec<Listener<Report>>>,
    alert_listeners: Option<Vec<Listener<TrafficAlert>>>,
}

impl MonitorPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정을 반환합니다.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn spawn_tasks(&mut self) -> Result<(), MonitorError> {
        let token = CancellationToken::new();

        let reader = TailReader::new(&self.config.file_path, self.config.file_read_buf_size_bytes);
        let parser = W3cParser::new(self.config.section_cache_size);
        let (storage, reports_rx) = CycleStorage::new(
            self.config.stat_cycle_seconds,
            self.config.stat_reports_ring_size,
        )?;
        let (mut traffic_state, alerts_rx) = TrafficState::new(
            self.config.alert_window_seconds,
            self.config.stat_cycle_seconds,
            self.config.alert_max_req_per_second,
            self.config.alert_ring_size,
        )?;

        let watcher = LogWatcher::spawn(
            token.clone(),
            reader,
            parser,
            storage,
            self.config.file_read_poll_period,
        );

        // 알림 상태는 항상 첫 번째 리포트 리스너입니다
        let mut report_listeners: Vec<Listener<Report>> =
            vec![Box::new(move |report: &Report| traffic_state.store(report))];
        report_listeners.extend(self.report_listeners.take().unwrap_or_default());

        self.report_subscription = Some(Subscription::spawn(
            "reports",
            reports_rx,
            report_listeners,
        ));
        self.alert_subscription = Some(Subscription::spawn(
            "alerts",
            alerts_rx,
            self.alert_listeners.take().unwrap_or_default(),
        ));
        self.watcher = Some(watcher);
        self.token = Some(token);
        Ok(())
    }
}

impl Pipeline for MonitorPipeline {
    async fn start(&mut self) -> Result<(), TailstatError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(
            file = %self.config.file_path.display(),
            cycle_seconds = self.config.stat_cycle_seconds,
            window_seconds = self.config.alert_window_seconds,
            "starting monitor pipeline"
        );
        self.spawn_tasks().map_err(TailstatError::from)?;

        self.state = PipelineState::Running;
        info!("monitor pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TailstatError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping monitor pipeline");

        // 1. 워처를 내립니다 — 스토리지가 드롭되며 리포트 큐가 닫힙니다
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.join().await;
        }

        // 2. 리포트 구독이 드레인을 마치면 리스너를 돌려받습니다.
        //    첫 리스너(알림 상태)를 드롭해야 알림 큐가 닫힙니다.
        if let Some(subscription) = self.report_subscription.take() {
            let mut listeners = subscription.join().await;
            if !listeners.is_empty() {
                listeners.remove(0);
            }
            self.report_listeners = Some(listeners);
        }

        // 3. 알림 구독은 남은 알림을 모두 전달한 뒤 끝납니다
        if let Some(subscription) = self.alert_subscription.take() {
            self.alert_listeners = Some(subscription.join().await);
        }

        self.state = PipelineState::Stopped;
        info!("monitor pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => match &self.watcher {
                Some(watcher) if !watcher.is_finished() => HealthStatus::Healthy,
                _ => HealthStatus::Unhealthy("watcher task exited".to_owned()),
            },
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 모니터 파이프라인 빌더
pub struct MonitorPipelineBuilder {
    config: MonitorConfig,
    report_listeners: Vec<Listener<Report>>,
    alert_listeners: Vec<Listener<TrafficAlert>>,
}

impl MonitorPipelineBuilder {
    /// 기본 설정의 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            report_listeners: Vec::new(),
            alert_listeners: Vec::new(),
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// 리포트 리스너를 추가합니다. 등록 순서대로 호출됩니다.
    pub fn report_listener(mut self, listener: impl FnMut(&Report) + Send + Sync + 'static) -> Self {
        self.report_listeners.push(Box::new(listener));
        self
    }

    /// 알림 리스너를 추가합니다. 등록 순서대로 호출됩니다.
    pub fn alert_listener(
        mut self,
        listener: impl FnMut(&TrafficAlert) + Send + Sync + 'static,
    ) -> Self {
        self.alert_listeners.push(Box::new(listener));
        self
    }

    /// 설정을 검증하고 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<MonitorPipeline, MonitorError> {
        self.config.validate()?;
        Ok(MonitorPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            token: None,
            watcher: None,
            report_subscription: None,
            alert_subscription: None,
            report_listeners: Some(self.report_listeners),
            alert_listeners: Some(self.alert_listeners),
        })
    }
}

impl Default for MonitorPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> (PathBuf, MonitorConfig) {
        let path = dir.path().join("access.log");
        std::fs::write(&path, b"").unwrap();
        let config = MonitorConfig {
            file_path: path.clone(),
            file_read_poll_period: Duration::from_millis(10),
            ..Default::default()
        };
        (path, config)
    }

    #[test]
    fn builder_creates_initialized_pipeline() {
        let pipeline = MonitorPipelineBuilder::new().build().unwrap();
        assert_eq!(pipeline.state_name(), "initialized");
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = MonitorConfig {
            stat_cycle_seconds: 0,
            ..Default::default()
        };
        assert!(MonitorPipelineBuilder::new().config(config).build().is_err());
    }

    #[tokio::test]
    async fn health_is_unhealthy_before_start() {
        let pipeline = MonitorPipelineBuilder::new().build().unwrap();
        assert!(pipeline.health_check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn stop_before_start_fails() {
        let mut pipeline = MonitorPipelineBuilder::new().build().unwrap();
        assert!(pipeline.stop().await.is_err());
    }

    #[tokio::test]
    async fn lifecycle_start_stop_restart() {
        let dir = TempDir::new().unwrap();
        let (_path, config) = test_config(&dir);

        let mut pipeline = MonitorPipelineBuilder::new().config(config).build().unwrap();

        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        assert!(pipeline.health_check().await.is_healthy());

        // 중복 시작은 거부됩니다
        assert!(pipeline.start().await.is_err());

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.health_check().await.is_unhealthy());

        // 정지 후 재시작이 가능합니다
        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        pipeline.stop().await.unwrap();
    }
}
