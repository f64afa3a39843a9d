use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::orders::TimerPolicy;

/// 服务器配置 - 订单服务的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/marketplace/orders | 工作目录 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | JWT_SECRET | (必填) | JWT 验证密钥 |
/// | CASH_CONFIRM_TIMEOUT_SECS | 86400 | 现金单自动确认窗口 (24h) |
/// | DIGITAL_PAYMENT_TIMEOUT_SECS | 900 | 数字单支付倒计时 (15min) |
/// | RECONCILE_INTERVAL_SECS | 60 | 调度器轮询间隔 |
/// | TIMER_TTL_MARGIN_SECS | 600 | 定时器 TTL 安全余量 |
/// | DELIVERY_VAT_RATE | 0.05 | 运费占商品价的比例 |
/// | SHIPMENT_DELIVERY_OFFSET_DAYS | 4 | 预计送达偏移天数 |
/// | PAYMENT_GATEWAY_URL | (无) | 支付网关地址，缺省禁用跳转 |
/// | LOG_LEVEL | info | 日志级别 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/orders HTTP_PORT=8080 JWT_SECRET=... cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、定时器存储和日志
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// JWT 验证密钥（签发在认证服务侧）
    pub jwt_secret: String,
    /// 现金单自动确认窗口（秒）
    pub cash_confirm_timeout_secs: u64,
    /// 数字单支付倒计时（秒）
    pub digital_payment_timeout_secs: u64,
    /// 调度器轮询间隔（秒）
    pub reconcile_interval_secs: u64,
    /// 定时器 TTL 安全余量（秒）
    pub timer_ttl_margin_secs: u64,
    /// 运费比例（商品价的分数）
    pub delivery_vat_rate: Decimal,
    /// 预计送达偏移（天）
    pub shipment_delivery_offset_days: u32,
    /// 支付网关地址（可选）
    pub payment_gateway_url: Option<String>,
    /// 日志级别
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            work_dir: env_or("WORK_DIR", "/var/lib/marketplace/orders"),
            http_port: env_parse("HTTP_PORT", 3000),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| {
                tracing::warn!("JWT_SECRET not set, using development default");
                "dev-only-secret-change-in-production".to_string()
            }),
            cash_confirm_timeout_secs: env_parse("CASH_CONFIRM_TIMEOUT_SECS", 86_400),
            digital_payment_timeout_secs: env_parse("DIGITAL_PAYMENT_TIMEOUT_SECS", 900),
            reconcile_interval_secs: env_parse("RECONCILE_INTERVAL_SECS", 60),
            timer_ttl_margin_secs: env_parse("TIMER_TTL_MARGIN_SECS", 600),
            delivery_vat_rate: std::env::var("DELIVERY_VAT_RATE")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or_else(|| Decimal::new(5, 2)),
            shipment_delivery_offset_days: env_parse("SHIPMENT_DELIVERY_OFFSET_DAYS", 4),
            payment_gateway_url: std::env::var("PAYMENT_GATEWAY_URL").ok(),
            log_level: env_or("LOG_LEVEL", "info"),
        }
    }

    /// 定时器超时策略
    pub fn timer_policy(&self) -> TimerPolicy {
        TimerPolicy {
            cash_confirm_timeout_secs: self.cash_confirm_timeout_secs,
            digital_payment_timeout_secs: self.digital_payment_timeout_secs,
            ttl_margin_secs: self.timer_ttl_margin_secs,
        }
    }

    /// SurrealDB 数据目录
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// redb 定时器存储文件
    pub fn timer_store_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("timers.redb")
    }

    /// 日志目录
    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_path())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
