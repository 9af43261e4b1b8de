//! Payment endpoints backed by an in-memory ledger.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::AppState;
use crate::http::middleware::Principal;
use crate::http::response::ApiError;

/// A recorded payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub id: String,
    pub owner: String,
    pub amount: i64,
    pub currency: String,
}

/// Request body for creating a payment.
#[derive(Debug, Deserialize)]
pub struct CreatePayment {
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Ledger of payments. Every successful create adds exactly one row.
#[derive(Debug)]
pub struct Ledger {
    next_id: AtomicU64,
    payments: DashMap<String, Payment>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            payments: DashMap::new(),
        }
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner: &str, amount: i64, currency: String) -> Payment {
        let id = format!("pay_{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let payment = Payment {
            id: id.clone(),
            owner: owner.to_string(),
            amount,
            currency,
        };
        self.payments.insert(id, payment.clone());
        payment
    }

    pub fn get(&self, id: &str) -> Option<Payment> {
        self.payments.get(id).map(|r| r.value().clone())
    }

    /// Payments of one owner, oldest first.
    pub fn list(&self, owner: &str) -> Vec<Payment> {
        let mut rows: Vec<Payment> = self
            .payments
            .iter()
            .filter(|r| r.value().owner == owner)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|p| p.id.trim_start_matches("pay_").parse::<u64>().unwrap_or(u64::MAX));
        rows
    }

    pub fn count(&self) -> usize {
        self.payments.len()
    }
}

pub async fn create_payment(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CreatePayment>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    if body.amount <= 0 {
        return Err(ApiError::Validation("amount must be greater than zero".into()));
    }
    let currency = body
        .currency
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "NOK".to_string());
    if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ApiError::Validation("currency must be a three-letter code".into()));
    }

    let payment = state.ledger.insert(&principal.id, body.amount, currency);
    tracing::info!(payment = %payment.id, owner = %payment.owner, amount = payment.amount, "Payment recorded");
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    state
        .ledger
        .get(&id)
        .filter(|p| p.owner == principal.id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("payment {}", id)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    principal: Principal,
) -> Json<Vec<Payment>> {
    Json(state.ledger.list(&principal.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger() {
        let ledger = Ledger::new();
        let a = ledger.insert("user_a", 100, "NOK".into());
        let b = ledger.insert("user_b", 50, "EUR".into());
        let c = ledger.insert("user_a", 75, "NOK".into());

        assert_eq!(a.id, "pay_1");
        assert_eq!(b.id, "pay_2");
        assert_eq!(ledger.count(), 3);
        assert_eq!(ledger.get("pay_2").unwrap().owner, "user_b");

        let ids: Vec<_> = ledger.list("user_a").into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }
}
