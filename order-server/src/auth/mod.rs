//! 认证模块
//!
//! 令牌由外部认证服务签发；这里只做验证和提取。

pub mod extractor;
pub mod jwt;

pub use jwt::{Claims, CurrentUser, JwtError, JwtService};
