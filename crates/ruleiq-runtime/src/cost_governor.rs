//! Cost Governor (C3).
//!
//! Generalizes `ruleiq_kernel::budget::BudgetEnforcer` (keyed by a single
//! `agent_id`, checked only after the fact) into a reservation-based governor
//! keyed by `(scope, window)` pairs, supporting pre-call admission control:
//! `reserve` holds estimated cost against the budget before a model call is
//! dispatched, `commit` replaces the estimate with the call's actual cost,
//! and `cancel` releases a reservation that was never used (call failed
//! before reaching the provider).

use ruleiq_kernel::pricing::{ModelPricing, SharedPricingRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// The billing scope a reservation is held against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Tenant(String),
    User(String),
}

/// The rolling window a limit applies over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BudgetKey {
    scope: Scope,
    window: Window,
}

#[derive(Debug, Clone, Default)]
struct Limit {
    max_cost: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct Usage {
    committed: f64,
    reserved: f64,
    period: String,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CostGovernorError {
    #[error("budget exceeded for {scope:?}/{window:?}: requested ${requested:.4}, only ${available:.4} available")]
    Exceeded {
        scope: Scope,
        window: Window,
        requested: f64,
        available: f64,
    },

    #[error("unknown reservation {0}")]
    UnknownReservation(Uuid),

    #[error("no pricing found for {provider}/{model}")]
    UnknownPricing { provider: String, model: String },
}

struct Reservation {
    key: BudgetKey,
    amount: f64,
}

/// Async, thread-safe cost governor. One instance is shared across the
/// orchestrator; every model call routes `reserve` -> call -> `commit`/`cancel`.
pub struct CostGovernor {
    limits: RwLock<HashMap<BudgetKey, Limit>>,
    usage: RwLock<HashMap<BudgetKey, Usage>>,
    reservations: RwLock<HashMap<Uuid, Reservation>>,
    pricing: SharedPricingRegistry,
}

impl CostGovernor {
    pub fn new(pricing: SharedPricingRegistry) -> Self {
        Self {
            limits: RwLock::new(HashMap::new()),
            usage: RwLock::new(HashMap::new()),
            reservations: RwLock::new(HashMap::new()),
            pricing,
        }
    }

    pub async fn set_limit(&self, scope: Scope, window: Window, max_cost: f64) {
        let key = BudgetKey { scope, window };
        self.limits.write().await.insert(key, Limit { max_cost: Some(max_cost) });
    }

    pub fn pricing_for(&self, provider: &str, model: &str) -> Result<ModelPricing, CostGovernorError> {
        self.pricing
            .get_pricing(provider, model)
            .ok_or_else(|| CostGovernorError::UnknownPricing {
                provider: provider.to_string(),
                model: model.to_string(),
            })
    }

    /// Hold `amount` USD against `scope`'s daily and monthly budgets. Returns
    /// a reservation id to later `commit` or `cancel`. Fails atomically: if
    /// any window is over budget, no reservation is recorded.
    pub async fn reserve(&self, scope: Scope, amount: f64) -> Result<Uuid, CostGovernorError> {
        let windows = [Window::Daily, Window::Monthly];
        let limits = self.limits.read().await;
        let mut usage = self.usage.write().await;

        for window in windows {
            let key = BudgetKey { scope: scope.clone(), window };
            let period = period_key(window);
            let current = usage.entry(key.clone()).or_default();
            if current.period != period {
                current.committed = 0.0;
                current.reserved = 0.0;
                current.period = period;
            }
            if let Some(limit) = limits.get(&key).and_then(|l| l.max_cost) {
                let in_use = current.committed + current.reserved;
                if in_use + amount > limit {
                    return Err(CostGovernorError::Exceeded {
                        scope: scope.clone(),
                        window,
                        requested: amount,
                        available: (limit - in_use).max(0.0),
                    });
                }
            }
        }

        for window in windows {
            let key = BudgetKey { scope: scope.clone(), window };
            usage.entry(key).or_default().reserved += amount;
        }

        let id = Uuid::new_v4();
        // Daily and monthly share one reservation id; store the daily key,
        // `commit`/`cancel` walk both windows off the id's amount.
        self.reservations.write().await.insert(
            id,
            Reservation {
                key: BudgetKey { scope, window: Window::Daily },
                amount,
            },
        );
        Ok(id)
    }

    /// Replace a reservation's held estimate with the actual cost incurred.
    pub async fn commit(&self, reservation_id: Uuid, actual_cost: f64) -> Result<(), CostGovernorError> {
        let reservation = self
            .reservations
            .write()
            .await
            .remove(&reservation_id)
            .ok_or(CostGovernorError::UnknownReservation(reservation_id))?;

        let mut usage = self.usage.write().await;
        for window in [Window::Daily, Window::Monthly] {
            let key = BudgetKey { scope: reservation.key.scope.clone(), window };
            let entry = usage.entry(key).or_default();
            entry.reserved = (entry.reserved - reservation.amount).max(0.0);
            entry.committed += actual_cost;
        }
        Ok(())
    }

    /// Release a reservation that was never used.
    pub async fn cancel(&self, reservation_id: Uuid) -> Result<(), CostGovernorError> {
        let reservation = self
            .reservations
            .write()
            .await
            .remove(&reservation_id)
            .ok_or(CostGovernorError::UnknownReservation(reservation_id))?;

        let mut usage = self.usage.write().await;
        for window in [Window::Daily, Window::Monthly] {
            let key = BudgetKey { scope: reservation.key.scope.clone(), window };
            let entry = usage.entry(key).or_default();
            entry.reserved = (entry.reserved - reservation.amount).max(0.0);
        }
        Ok(())
    }

    pub async fn spent(&self, scope: Scope, window: Window) -> f64 {
        let key = BudgetKey { scope, window };
        self.usage.read().await.get(&key).map(|u| u.committed).unwrap_or(0.0)
    }
}

/// Calendar-aligned period bucket: daily windows roll over at midnight UTC,
/// monthly windows roll over on the first of the month UTC.
fn period_key(window: Window) -> String {
    let now = chrono::Utc::now();
    match window {
        Window::Daily => format!("d-{}", now.format("%Y-%m-%d")),
        Window::Monthly => format!("m-{}", now.format("%Y-%m")),
    }
}
