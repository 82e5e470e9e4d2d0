//! 日志初始化
//! 结构化日志（text/json）、EnvFilter 级别控制、可选的按天滚动文件输出

use std::path::{Path, PathBuf};

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "globepayx.log";

/// 持有文件写入线程；drop 时刷新剩余日志
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// 日志文件目录：`log_file_path` 的父目录，默认 `./logs`
pub fn log_dir(config: &LoggingConfig) -> PathBuf {
    config
        .log_file_path
        .as_deref()
        .and_then(|p| Path::new(p).parent())
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("./logs"))
        .to_path_buf()
}

/// 初始化全局 subscriber
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let json = config.format.eq_ignore_ascii_case("json");

    let stdout_layer = if json {
        fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .boxed()
    } else {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .boxed()
    };

    let (file_layer, guard) = if config.enable_file_logging {
        let dir = log_dir(config);
        std::fs::create_dir_all(&dir)?;
        let (writer, guard) = non_blocking(rolling::daily(&dir, LOG_FILE_PREFIX));

        let layer = if json {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_timer(ChronoUtc::rfc_3339())
                .boxed()
        } else {
            fmt::layer()
                .with_writer(writer)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(false)
                .boxed()
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LoggingGuard { _file: guard })
}

/// 使用默认配置初始化，失败时回退到最基本的 fmt subscriber
pub fn init_default_logging() -> Option<LoggingGuard> {
    let config = LoggingConfig::default();
    match init_logging(&config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            let _ = tracing_subscriber::fmt().try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_from_file_path() {
        let mut config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            enable_file_logging: true,
            log_file_path: Some("/var/log/globepayx/app.log".to_string()),
        };
        assert_eq!(log_dir(&config), PathBuf::from("/var/log/globepayx"));

        config.log_file_path = Some("app.log".to_string());
        assert_eq!(log_dir(&config), PathBuf::from("./logs"));

        config.log_file_path = None;
        assert_eq!(log_dir(&config), PathBuf::from("./logs"));
    }
}
