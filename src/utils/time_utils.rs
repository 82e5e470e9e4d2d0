//! 时间工具模块
//! 提供时间处理相关的工具函数

use chrono::{DateTime, TimeZone, Utc};

/// 格式化时间戳为RFC3339格式
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// 链上微秒时间戳 → UTC 时间，越界时返回 None
pub fn from_ledger_micros(micros: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_micros(micros).single()
}

/// 格式化持续时间
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
