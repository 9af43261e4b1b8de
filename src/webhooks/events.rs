//! Webhook event envelope and delivery log.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A provider event, as delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Event types the academy acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaid,
    InvoicePaymentFailed,
    PaymentSucceeded,
    Other,
}

impl WebhookEventKind {
    pub fn classify(event_type: &str) -> Self {
        match event_type {
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.paid" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "payment_intent.succeeded" => Self::PaymentSucceeded,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubscriptionCreated => "subscription_created",
            Self::SubscriptionUpdated => "subscription_updated",
            Self::SubscriptionDeleted => "subscription_deleted",
            Self::InvoicePaid => "invoice_paid",
            Self::InvoicePaymentFailed => "invoice_payment_failed",
            Self::PaymentSucceeded => "payment_succeeded",
            Self::Other => "other",
        }
    }
}

/// Summary kept for each received event.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEventSummary {
    pub event_type: String,
    pub kind: &'static str,
    pub received_at: u64,
}

/// Received events keyed by provider event id.
///
/// Providers redeliver on timeouts, so the same event id may arrive more than once.
#[derive(Debug, Default)]
pub struct WebhookLog {
    events: DashMap<String, WebhookEventSummary>,
}

impl WebhookLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Returns false if this id was seen before.
    pub fn record(&self, event: &WebhookEvent, kind: WebhookEventKind) -> bool {
        let received_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let mut first = false;
        self.events.entry(event.id.clone()).or_insert_with(|| {
            first = true;
            WebhookEventSummary {
                event_type: event.event_type.clone(),
                kind: kind.as_str(),
                received_at,
            }
        });
        first
    }

    pub fn get(&self, id: &str) -> Option<WebhookEventSummary> {
        self.events.get(id).map(|r| r.value().clone())
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }
}
