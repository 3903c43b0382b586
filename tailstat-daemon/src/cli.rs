//! CLI argument definitions for tailstat-daemon.
//!
//! Uses `clap` v4 derive macros. Flags override values from the optional
//! TOML config file, which in turn overrides built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use tailstat_core::config::TailstatConfig;
use tailstat_core::error::ConfigError;

/// Streaming HTTP access-log monitor.
///
/// Tails a growing access-log file, aggregates traffic into fixed-width
/// cycles and raises an alert when the average request rate over a sliding
/// window exceeds the configured threshold.
#[derive(Parser, Debug)]
#[command(name = "tailstat")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to a tailstat.toml configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log file to monitor.
    #[arg(long)]
    pub file_name: Option<String>,

    /// Size of the buffer used to read lines from the log (bytes).
    #[arg(long)]
    pub file_read_buf_size_bytes: Option<usize>,

    /// Period of file polling when there are no new lines to read (ms).
    #[arg(long)]
    pub file_read_poll_period_ms: Option<u64>,

    /// Size of the cache that eliminates allocation of parsed sections.
    /// Make it bigger than the estimated count of sections; 0 disables it.
    #[arg(long)]
    pub section_cache_size: Option<usize>,

    /// Cycle width in seconds for traffic report aggregation.
    #[arg(long)]
    pub stat_cycle_seconds: Option<i64>,

    /// Capacity of the ring buffer with aggregated traffic reports.
    #[arg(long)]
    pub stat_reports_ring_size: Option<usize>,

    /// Window size in seconds for alert traffic aggregation.
    #[arg(long)]
    pub alert_window_seconds: Option<i64>,

    /// Throughput limit in requests per second that triggers an alert.
    #[arg(long)]
    pub alert_max_req_per_second: Option<u64>,

    /// Capacity of the ring buffer with emitted alerts.
    #[arg(long)]
    pub alert_ring_size: Option<usize>,

    /// Period of the idle heartbeat emitted by the console view (seconds).
    #[arg(long)]
    pub view_refresh_period_secs: Option<u64>,

    /// Enable verbose diagnostic logging.
    #[arg(long)]
    pub debug: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate the configuration and exit without starting the monitor.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Resolve the effective configuration: file (if given), then flag
    /// overrides, then validation.
    pub fn resolve_config(&self) -> Result<TailstatConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => TailstatConfig::load(&path.to_string_lossy())?,
            None => TailstatConfig::default(),
        };

        if let Some(file_name) = &self.file_name {
            config.file.path = file_name.clone();
        }
        if let Some(size) = self.file_read_buf_size_bytes {
            config.file.read_buf_size_bytes = size;
        }
        if let Some(period) = self.file_read_poll_period_ms {
            config.file.poll_period_ms = period;
        }
        if let Some(size) = self.section_cache_size {
            config.parser.section_cache_size = size;
        }
        if let Some(seconds) = self.stat_cycle_seconds {
            config.stat.cycle_seconds = seconds;
        }
        if let Some(size) = self.stat_reports_ring_size {
            config.stat.reports_ring_size = size;
        }
        if let Some(seconds) = self.alert_window_seconds {
            config.alert.window_seconds = seconds;
        }
        if let Some(limit) = self.alert_max_req_per_second {
            config.alert.max_req_per_second = limit;
        }
        if let Some(size) = self.alert_ring_size {
            config.alert.ring_size = size;
        }
        if let Some(period) = self.view_refresh_period_secs {
            config.view.refresh_period_secs = period;
        }
        if self.debug {
            config.general.debug_mode = true;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
