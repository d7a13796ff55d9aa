//! Outbound message delivery. The campaign engine only sees the
//! `MessageSender` trait; which transport backs it is decided at startup.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use outreach_types::models::DeliveryStatus;

/// One message bound for one phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub phone_number: String,
    pub body: String,
    pub image_url: Option<String>,
}

pub trait MessageSender: Send + Sync {
    /// Attempts delivery. Transport problems are reported as `Failed`,
    /// never as an error.
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, DeliveryStatus>;
}

// ── Simulated ───────────────────────────────────────────────────────────

/// Independent per-message outcome with a fixed success probability.
pub struct SimulatedSender {
    success_rate: f64,
}

impl SimulatedSender {
    pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;

    /// Out-of-range rates are clamped; NaN never succeeds.
    pub fn new(success_rate: f64) -> Self {
        let success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self { success_rate }
    }
}

impl Default for SimulatedSender {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SUCCESS_RATE)
    }
}

impl MessageSender for SimulatedSender {
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, DeliveryStatus> {
        let status = if rand::rng().random_bool(self.success_rate) {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Failed
        };
        debug!("Simulated send to {}: {}", message.phone_number, status);
        ready(status).boxed()
    }
}

// ── HTTP gateway ────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GatewayPayload<'a> {
    to: &'a str,
    body: &'a str,
    image_url: Option<&'a str>,
}

/// Posts each message as JSON to an SMS/WhatsApp gateway.
pub struct HttpSender {
    client: reqwest::Client,
    url: String,
}

impl HttpSender {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl MessageSender for HttpSender {
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, DeliveryStatus> {
        async move {
            let payload = GatewayPayload {
                to: &message.phone_number,
                body: &message.body,
                image_url: message.image_url.as_deref(),
            };
            match self.client.post(&self.url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => DeliveryStatus::Sent,
                Ok(resp) => {
                    warn!(
                        "Gateway rejected message to {}: HTTP {}",
                        message.phone_number,
                        resp.status()
                    );
                    DeliveryStatus::Failed
                }
                Err(e) => {
                    warn!("Gateway request for {} failed: {}", message.phone_number, e);
                    DeliveryStatus::Failed
                }
            }
        }
        .boxed()
    }
}

// ── Scripted ────────────────────────────────────────────────────────────

/// Replays a fixed sequence of outcomes, then `fallback` once the script
/// runs out. Records every message it was asked to send.
pub struct ScriptedSender {
    script: Mutex<VecDeque<DeliveryStatus>>,
    fallback: DeliveryStatus,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl ScriptedSender {
    pub fn new(script: impl IntoIterator<Item = DeliveryStatus>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: DeliveryStatus::Sent,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn always(status: DeliveryStatus) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: status,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Messages handed to `send` so far, in call order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl MessageSender for ScriptedSender {
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, DeliveryStatus> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        let status = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(self.fallback);
        ready(status).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(phone: &str) -> OutboundMessage {
        OutboundMessage {
            phone_number: phone.into(),
            body: "Hello".into(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn scripted_sender_replays_then_falls_back() {
        let sender = ScriptedSender::new([DeliveryStatus::Failed, DeliveryStatus::Sent]);
        let m = message("9876543210");
        assert_eq!(sender.send(&m).await, DeliveryStatus::Failed);
        assert_eq!(sender.send(&m).await, DeliveryStatus::Sent);
        assert_eq!(sender.send(&m).await, DeliveryStatus::Sent);
        assert_eq!(sender.sent().len(), 3);
    }

    #[tokio::test]
    async fn simulated_sender_honours_extreme_rates() {
        let m = message("9876543210");
        let always = SimulatedSender::new(1.0);
        let never = SimulatedSender::new(0.0);
        for _ in 0..20 {
            assert_eq!(always.send(&m).await, DeliveryStatus::Sent);
            assert_eq!(never.send(&m).await, DeliveryStatus::Failed);
        }
    }

    #[test]
    fn simulated_rate_is_clamped() {
        assert_eq!(SimulatedSender::new(4.0).success_rate, 1.0);
        assert_eq!(SimulatedSender::new(-1.0).success_rate, 0.0);
    }

    #[tokio::test]
    async fn nan_rate_fails_instead_of_panicking() {
        let sender = SimulatedSender::new(f64::NAN);
        assert_eq!(sender.send(&message("9876543210")).await, DeliveryStatus::Failed);
    }

    #[test]
    fn gateway_payload_uses_camel_case() {
        let json = serde_json::to_value(GatewayPayload {
            to: "9876543210",
            body: "Hi",
            image_url: Some("https://cdn.example.com/a.png"),
        })
        .unwrap();
        assert_eq!(json["to"], "9876543210");
        assert_eq!(json["imageUrl"], "https://cdn.example.com/a.png");
    }
}
