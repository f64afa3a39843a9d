//! 时间工具函数
//!
//! 全栈统一使用 Unix millis (`i64`)：repository 层只接收/返回毫秒时间戳，
//! 格式化留给调用方。

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 当前时间 + 秒数 → Unix millis
pub fn millis_after_secs(secs: u64) -> i64 {
    now_millis() + (secs as i64) * 1000
}

/// 当前时间 + 天数 → Unix millis
pub fn millis_after_days(days: u32) -> i64 {
    now_millis() + (days as i64) * 86_400_000
}
