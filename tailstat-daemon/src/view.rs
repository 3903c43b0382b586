//! Console view — renders traffic reports and alerts to a `Write` sink.
//!
//! The view is a pair of pipeline listeners backed by small internal
//! channels and a renderer task. Listener calls never block: when the
//! renderer falls behind, entries are dropped (the pipeline's own queues
//! already favour recency over completeness). When idle for the refresh
//! period, a heartbeat line is emitted.

use std::io::Write;
use std::time::Duration;

use chrono::DateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use tailstat_core::types::{Report, TrafficAlert};
use tailstat_pipeline::Listener;

const VIEW_CHANNEL_CAPACITY: usize = 8;

/// Console view handle.
///
/// Dropping the view closes its internal channels; the renderer task also
/// exits when the cancellation token fires.
pub struct ConsoleView {
    reports_tx: mpsc::Sender<Report>,
    alerts_tx: mpsc::Sender<TrafficAlert>,
}

impl ConsoleView {
    /// Spawn the renderer task writing to `output`.
    pub fn spawn<W: Write + Send + 'static>(
        token: CancellationToken,
        refresh_period: Duration,
        output: W,
    ) -> (Self, JoinHandle<()>) {
        let (reports_tx, reports_rx) = mpsc::channel(VIEW_CHANNEL_CAPACITY);
        let (alerts_tx, alerts_rx) = mpsc::channel(VIEW_CHANNEL_CAPACITY);
        let handle = tokio::spawn(run(token, refresh_period, reports_rx, alerts_rx, output));
        (
            Self {
                reports_tx,
                alerts_tx,
            },
            handle,
        )
    }

    /// Pipeline listener feeding reports into the view.
    pub fn report_listener(&self) -> Listener<Report> {
        let tx = self.reports_tx.clone();
        Box::new(move |report: &Report| {
            if tx.try_send(report.clone()).is_err() {
                debug!("view reports channel full, dropping report");
            }
        })
    }

    /// Pipeline listener feeding alerts into the view.
    pub fn alert_listener(&self) -> Listener<TrafficAlert> {
        let tx = self.alerts_tx.clone();
        Box::new(move |alert: &TrafficAlert| {
            if tx.try_send(alert.clone()).is_err() {
                debug!("view alerts channel full, dropping alert");
            }
        })
    }
}

async fn run<W: Write + Send + 'static>(
    token: CancellationToken,
    refresh_period: Duration,
    mut reports_rx: mpsc::Receiver<Report>,
    mut alerts_rx: mpsc::Receiver<TrafficAlert>,
    mut output: W,
) {
    loop {
        let written = tokio::select! {
            maybe_alert = alerts_rx.recv() => match maybe_alert {
                Some(alert) => print_traffic_alert(&mut output, &alert),
                None => break,
            },
            maybe_report = reports_rx.recv() => match maybe_report {
                Some(report) => print_report(&mut output, &report),
                None => break,
            },
            _ = tokio::time::sleep(refresh_period) => print_no_traffic(&mut output),
            _ = token.cancelled() => break,
        };
        if let Err(err) = written {
            error!(error = %err, "failed to write to view output");
        }
    }
    debug!("console view stopped");
}

fn print_report<W: Write>(out: &mut W, report: &Report) -> std::io::Result<()> {
    print_report_summary(out, report)?;
    print_section_top(out, report)?;
    print_status_code_top(out, report)
}

fn print_report_summary<W: Write>(out: &mut W, report: &Report) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "|")?;
    writeln!(out, "| Report Summary")?;
    writeln!(
        out,
        "| {:<26} {:>16} {:>21}",
        "Server Time", "Total requests", "Total response size"
    )?;
    writeln!(
        out,
        "| {:<26} {:>16} {:>21}",
        format_server_time(report.cycle_start_unix_time),
        report.total_requests,
        report.total_response_size_bytes,
    )
}

fn print_section_top<W: Write>(out: &mut W, report: &Report) -> std::io::Result<()> {
    if report.requests_per_section.is_empty() {
        return Ok(());
    }
    let mut section_hits: Vec<_> = report.requests_per_section.iter().collect();
    section_hits.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    writeln!(out, "|")?;
    writeln!(out, "| Section TOP")?;
    writeln!(out, "| {:<26} {:>16}", "Section", "Requests")?;
    for (section, requests) in section_hits {
        writeln!(
            out,
            "| {:<26} {:>16}",
            String::from_utf8_lossy(section),
            requests
        )?;
    }
    Ok(())
}

fn print_status_code_top<W: Write>(out: &mut W, report: &Report) -> std::io::Result<()> {
    if report.requests_per_status_code.is_empty() {
        return Ok(());
    }
    let mut code_hits: Vec<_> = report.requests_per_status_code.iter().collect();
    code_hits.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    writeln!(out, "|")?;
    writeln!(out, "| Status Code TOP")?;
    writeln!(out, "| {:<26} {:>16}", "Status Code", "Requests")?;
    for (code, requests) in code_hits {
        writeln!(out, "| {:<26} {:>16}", code, requests)?;
    }
    Ok(())
}

fn print_traffic_alert<W: Write>(out: &mut W, alert: &TrafficAlert) -> std::io::Result<()> {
    if alert.resolved {
        writeln!(out, "[RESOLVED] {alert}")
    } else {
        writeln!(out, "[ALERT] {alert}")
    }
}

fn print_no_traffic<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "| Report Summary: no traffic")
}

fn format_server_time(unix_time: i64) -> String {
    match DateTime::from_timestamp(unix_time, 0) {
        Some(timestamp) => timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => unix_time.to_string(),
    }
}
