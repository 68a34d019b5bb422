//! Account types for tokdesk.
//!
//! An account is the owner of a token balance and of customer profiles. The
//! cached `balance_tokens` must always equal the running sum of settled token
//! transactions; all balance changes go through the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// An account holder, keyed by internal id and linked to a chat identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Internal account id.
    pub id: AccountId,

    /// Chat-platform identity of the account holder.
    pub chat_id: i64,

    /// Cached token balance. Derived from the transaction log; never mutated
    /// outside a ledger operation.
    pub balance_tokens: i64,

    /// Whether the account holder is an operator.
    pub is_admin: bool,

    /// Current subscription, if any.
    pub subscription: Option<Subscription>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(chat_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::generate(),
            chat_id,
            balance_tokens: 0,
            is_admin: false,
            subscription: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the account can cover a debit of `amount_tokens`.
    #[must_use]
    pub fn has_sufficient_tokens(&self, amount_tokens: i64) -> bool {
        self.balance_tokens >= amount_tokens
    }

    /// Check whether the account holds an active, unexpired subscription.
    ///
    /// Subscriber pricing applies only while this returns `true`.
    #[must_use]
    pub fn is_subscriber(&self, now: DateTime<Utc>) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| s.status == SubscriptionStatus::Active && s.expires_at > now)
    }
}

/// A subscription granting discounted package pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// The subscription tier.
    pub tier: SubscriptionTier,

    /// Current status of the subscription.
    pub status: SubscriptionStatus,

    /// When the subscription expires. An expired subscription grants no
    /// discount regardless of status.
    pub expires_at: DateTime<Utc>,

    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

/// Available subscription tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// Standard subscriber tier.
    Standard,

    /// Priority tier: standard discounts plus priority queue handling.
    Priority,
}

/// Status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active.
    Active,

    /// Subscription was cancelled by the holder.
    Cancelled,

    /// Renewal payment failed.
    PastDue,
}
