//! Order creation and the order state machine.
//!
//! Cost is resolved from the price table at creation time (subscriber price
//! while an active, unexpired subscription is held) and never changes
//! afterwards. The debit and the order insert are one atomic store operation;
//! cancellation and refund exits credit the original cost back exactly once.
//! The state graph rules out a second refund structurally (the refunding
//! states have no edges between them or back), and the store's
//! compare-and-set on the stored status rules out two racing writers both
//! taking the same edge.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use tokdesk_core::{AccountId, Order, OrderId, OrderStatus, PackageKey, PriceTable, ProfileId};
use tokdesk_store::{NewOrder, Store};

use crate::error::{EngineError, Result};
use crate::notify::{NotificationEvent, Notifier};

/// Parameters for creating an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// The paying account.
    pub account_id: AccountId,
    /// The customer profile the order is for.
    pub profile_id: ProfileId,
    /// The package to purchase.
    pub package: PackageKey,
    /// Priority handling.
    pub priority: bool,
    /// Include the verification add-on.
    pub verification: bool,
}

/// Order creation, transitions, and reruns over one store.
pub struct OrderEngine {
    store: Arc<dyn Store>,
    prices: PriceTable,
    notifier: Arc<dyn Notifier>,
}

impl OrderEngine {
    /// Create an order engine.
    pub fn new(store: Arc<dyn Store>, prices: PriceTable, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            prices,
            notifier,
        }
    }

    /// The price table this engine resolves costs from.
    #[must_use]
    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Create an order: resolve the cost, debit it, and enqueue, atomically.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` for a missing account or profile.
    /// - `EngineError::Forbidden` if the profile belongs to another account.
    /// - `EngineError::UnknownPackage` for a key not in the price table.
    /// - `StoreError::InsufficientTokens` if the balance can't cover the
    ///   cost; no order row and no balance change.
    pub fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        let account = self.require_account(&request.account_id)?;

        let profile = self
            .store
            .get_profile(&request.profile_id)?
            .ok_or_else(|| tokdesk_store::StoreError::NotFound {
                entity: "profile",
                id: request.profile_id.to_string(),
            })?;
        if profile.account_id != request.account_id {
            return Err(EngineError::Forbidden("profile belongs to another account"));
        }

        let package = self
            .prices
            .get(request.package)
            .ok_or(EngineError::UnknownPackage(request.package))?;

        let mut cost = if account.is_subscriber(Utc::now()) {
            package.subscriber_cost
        } else {
            package.base_cost
        };
        if request.verification {
            cost += self.prices.add_ons.verification;
        }

        let (order, debit) = self.store.create_order(&NewOrder {
            account_id: request.account_id,
            profile_id: request.profile_id,
            package: request.package,
            cost_tokens: cost,
            priority: request.priority,
            rerun_of: None,
            description: format!("{} package ({})", package.label, package.key),
        })?;

        tracing::info!(
            order_id = %order.id,
            account_id = %order.account_id,
            package = %order.package,
            cost_tokens = order.cost_tokens,
            queue_position = order.queue_position,
            balance_after = debit.balance_after_tokens,
            "order created"
        );
        Ok(order)
    }

    /// Move an order to a new status.
    ///
    /// Stamps `assigned_at`/`completed_at`, replaces the operator notes, and
    /// credits the original cost back when the new status is a refunding
    /// exit. Returns the updated order and whether a notification was
    /// emitted.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` for a missing order.
    /// - `EngineError::IllegalTransition` when the state graph has no such
    ///   edge, or when a concurrent transition moved the order first;
    ///   nothing is mutated.
    pub fn transition(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
        notes: Option<String>,
    ) -> Result<(Order, bool)> {
        let mut order = self
            .store
            .get_order(order_id)?
            .ok_or_else(|| tokdesk_store::StoreError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;

        let from = order.status;
        if !from.can_transition(new_status) {
            return Err(EngineError::IllegalTransition {
                from,
                to: new_status,
            });
        }

        order.status = new_status;
        order.notes = notes.clone();
        match new_status {
            OrderStatus::Assigned => order.assigned_at = Some(Utc::now()),
            OrderStatus::Completed => order.completed_at = Some(Utc::now()),
            _ => {}
        }

        // The store re-checks the stored status under the account lock; a
        // concurrent transition that committed after our read above makes
        // this write lose instead of applying twice.
        let written = if new_status.triggers_refund() {
            self.store
                .update_order_with_refund(
                    &order,
                    from,
                    &format!("refund for order {} ({:?})", order.id, new_status),
                )
                .map(Some)
        } else {
            self.store.update_order(&order, from).map(|()| None)
        };
        match written {
            Ok(Some(refund)) => {
                tracing::info!(
                    order_id = %order.id,
                    amount_tokens = refund.amount_tokens,
                    balance_after = refund.balance_after_tokens,
                    "order refunded"
                );
            }
            Ok(None) => {}
            Err(tokdesk_store::StoreError::OrderStatusConflict { actual, .. }) => {
                return Err(EngineError::IllegalTransition {
                    from: actual,
                    to: new_status,
                });
            }
            Err(err) => return Err(err.into()),
        }

        let emitted = self.notify_status_change(&order, from, notes);
        Ok((order, emitted))
    }

    /// Create a new order referencing an earlier completed one, at the
    /// package's rerun cost.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` for a missing original order.
    /// - `EngineError::InvalidRequest` if the original is not completed.
    /// - `EngineError::UnknownPackage` if the package left the price table.
    /// - `StoreError::InsufficientTokens` if the balance can't cover the
    ///   rerun cost.
    pub fn rerun(&self, order_id: &OrderId, priority: bool) -> Result<Order> {
        let original = self
            .store
            .get_order(order_id)?
            .ok_or_else(|| tokdesk_store::StoreError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;

        if original.status != OrderStatus::Completed {
            return Err(EngineError::InvalidRequest(
                "only completed orders can be rerun",
            ));
        }

        let package = self
            .prices
            .get(original.package)
            .ok_or(EngineError::UnknownPackage(original.package))?;

        let (order, _) = self.store.create_order(&NewOrder {
            account_id: original.account_id,
            profile_id: original.profile_id,
            package: original.package,
            cost_tokens: package.rerun_cost,
            priority,
            rerun_of: Some(original.id),
            description: format!("rerun of order {} ({})", original.id, package.key),
        })?;

        tracing::info!(
            order_id = %order.id,
            rerun_of = %original.id,
            cost_tokens = order.cost_tokens,
            "rerun created"
        );
        Ok(order)
    }

    /// The open-order queue in dequeue order: priority first, then ascending
    /// queue position.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn queue(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_open_orders()?)
    }

    /// An account's orders, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn orders_for_account(&self, account_id: &AccountId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_by_account(account_id)?)
    }

    fn require_account(&self, account_id: &AccountId) -> Result<tokdesk_core::Account> {
        Ok(self.store.get_account(account_id)?.ok_or_else(|| {
            tokdesk_store::StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            }
        })?)
    }

    /// Emit the status-change event. Returns false only when the owning
    /// account can't be resolved, which is logged rather than failing the
    /// already-committed transition.
    fn notify_status_change(&self, order: &Order, from: OrderStatus, notes: Option<String>) -> bool {
        match self.store.get_account(&order.account_id) {
            Ok(Some(account)) => {
                self.notifier.notify(&NotificationEvent::OrderStatusChanged {
                    order_id: order.id,
                    account_id: order.account_id,
                    chat_id: account.chat_id,
                    from,
                    to: order.status,
                    notes,
                });
                true
            }
            Ok(None) => {
                tracing::warn!(order_id = %order.id, "order owner missing, notification skipped");
                false
            }
            Err(err) => {
                tracing::warn!(order_id = %order.id, error = %err, "notification lookup failed");
                false
            }
        }
    }
}
