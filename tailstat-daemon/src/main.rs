use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use tailstat_core::pipeline::Pipeline;
use tailstat_pipeline::{MonitorConfig, MonitorPipelineBuilder};

mod cli;
mod logging;
mod view;

use cli::DaemonCli;
use view::ConsoleView;

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonCli::parse();

    // 설정 해석: 파일 -> 플래그 오버라이드 -> 검증
    let config = args
        .resolve_config()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if args.validate {
        println!("configuration ok");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(file = %config.file.path, "tailstat starting");

    // 콘솔 뷰 — 리포트/알림 스트림의 기본 리스너
    let view_token = CancellationToken::new();
    let (console_view, view_task) = ConsoleView::spawn(
        view_token.clone(),
        Duration::from_secs(config.view.refresh_period_secs),
        std::io::stdout(),
    );

    // 파이프라인 조립 및 시작
    let mut pipeline = MonitorPipelineBuilder::new()
        .config(MonitorConfig::from_core(&config))
        .report_listener(console_view.report_listener())
        .alert_listener(console_view.alert_listener())
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build monitor pipeline: {}", e))?;

    pipeline
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start monitor pipeline: {}", e))?;
    tracing::info!("tailstat running — press Ctrl-C to stop");

    // 종료 시그널 대기
    shutdown_signal().await?;
    tracing::info!("shutdown signal received");

    // 우아한 종료: 워처부터 내리고 큐가 드레인될 때까지 기다립니다
    if let Err(e) = pipeline.stop().await {
        tracing::error!(error = %e, "failed to stop monitor pipeline");
    }
    view_token.cancel();
    drop(console_view);
    if let Err(e) = view_task.await {
        tracing::error!(error = %e, "view task terminated abnormally");
    }

    tracing::info!("tailstat shut down");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
