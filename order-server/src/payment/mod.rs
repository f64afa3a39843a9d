//! Payment Gateway Collaborator
//!
//! 订单核心对支付网关只有一个调用：用订单号和总价换一个跳转 URL。
//! 签名构造、回调验签等协议细节都在网关服务侧，不进核心。

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Gateway request failed: {0}")]
    Request(String),

    #[error("Gateway rejected the request: {0}")]
    Rejected(String),

    #[error("No payment gateway configured")]
    NotConfigured,
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Request(err.to_string())
    }
}

/// What the gateway hands back for a digital order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRedirect {
    /// URL the customer is sent to for payment
    pub redirect_url: String,
    /// Provider-side transaction id
    pub transaction_id: String,
}

/// The single call the order core makes against a payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_redirect(
        &self,
        order_id: &str,
        amount: Decimal,
    ) -> Result<PaymentRedirect, PaymentError>;
}

#[derive(Debug, Serialize)]
struct RedirectRequest<'a> {
    order_id: &'a str,
    amount: Decimal,
}

/// HTTP-backed gateway client (VNPay/ZaloPay adapter service)
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_redirect(
        &self,
        order_id: &str,
        amount: Decimal,
    ) -> Result<PaymentRedirect, PaymentError> {
        let url = format!("{}/redirect", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&RedirectRequest { order_id, amount })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Rejected(format!(
                "HTTP {}",
                response.status()
            )));
        }

        Ok(response.json::<PaymentRedirect>().await?)
    }
}

/// Gateway used when no provider is configured.
///
/// Digital orders still go through the normal lifecycle; the customer just
/// gets no redirect URL and the countdown timer eventually cancels the order.
pub struct DisabledPaymentGateway;

#[async_trait]
impl PaymentGateway for DisabledPaymentGateway {
    async fn create_redirect(
        &self,
        _order_id: &str,
        _amount: Decimal,
    ) -> Result<PaymentRedirect, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}
