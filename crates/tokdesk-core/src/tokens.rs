//! Token transaction types.
//!
//! Every balance change appends exactly one transaction carrying the signed
//! amount and the balance after the change. Rows are append-only; the only
//! permitted mutation is the one-time payment-status settlement of a pending
//! purchase (Pending -> Completed or Pending -> Failed), which also fixes the
//! final `balance_after_tokens`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, TransactionId};

/// A token transaction representing one balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransaction {
    /// Unique transaction id (ULID, time-ordered).
    pub id: TransactionId,

    /// The account whose balance is affected.
    pub account_id: AccountId,

    /// Signed token amount. Positive = credit, negative = debit.
    pub amount_tokens: i64,

    /// Type of transaction.
    pub kind: TransactionKind,

    /// Balance after this transaction settled. Provisional (balance at
    /// initiation) while a purchase is still pending.
    pub balance_after_tokens: i64,

    /// External payment id assigned by the gateway. Set only for purchases;
    /// unique across all transactions when present.
    pub external_payment_id: Option<String>,

    /// Settlement status. Non-purchase transactions settle immediately.
    pub payment_status: PaymentStatus,

    /// Human-readable description.
    pub description: String,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl TokenTransaction {
    /// Create a pending purchase awaiting gateway confirmation.
    ///
    /// The amount is the token quantity expected once the payment completes;
    /// the balance is not credited until settlement.
    #[must_use]
    pub fn purchase_pending(
        account_id: AccountId,
        amount_tokens: i64,
        balance_at_initiation: i64,
        external_payment_id: String,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount_tokens,
            kind: TransactionKind::Purchase,
            balance_after_tokens: balance_at_initiation,
            external_payment_id: Some(external_payment_id),
            payment_status: PaymentStatus::Pending,
            description,
            created_at: Utc::now(),
        }
    }

    /// Create a spend (debit) transaction. The stored amount is negative.
    #[must_use]
    pub fn spend(
        account_id: AccountId,
        amount_tokens: i64,
        balance_after_tokens: i64,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount_tokens: -amount_tokens.abs(),
            kind: TransactionKind::Spend,
            balance_after_tokens,
            external_payment_id: None,
            payment_status: PaymentStatus::Completed,
            description,
            created_at: Utc::now(),
        }
    }

    /// Create a refund credit compensating a cancelled or refunded order.
    #[must_use]
    pub fn refund(
        account_id: AccountId,
        amount_tokens: i64,
        balance_after_tokens: i64,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount_tokens: amount_tokens.abs(),
            kind: TransactionKind::Refund,
            balance_after_tokens,
            external_payment_id: None,
            payment_status: PaymentStatus::Completed,
            description,
            created_at: Utc::now(),
        }
    }

    /// Create an operator adjustment. Positive amounts are recorded as
    /// `AdminCredit`, negative as `AdminDebit`.
    #[must_use]
    pub fn admin_adjustment(
        account_id: AccountId,
        amount_tokens: i64,
        balance_after_tokens: i64,
        description: String,
    ) -> Self {
        let kind = if amount_tokens >= 0 {
            TransactionKind::AdminCredit
        } else {
            TransactionKind::AdminDebit
        };
        Self {
            id: TransactionId::generate(),
            account_id,
            amount_tokens,
            kind,
            balance_after_tokens,
            external_payment_id: None,
            payment_status: PaymentStatus::Completed,
            description,
            created_at: Utc::now(),
        }
    }

    /// Whether this transaction contributes to the account balance.
    ///
    /// The balance invariant ranges over settled transactions only: a pending
    /// or failed purchase never moves the balance.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self.payment_status, PaymentStatus::Completed)
    }
}

/// Type of token transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Tokens purchased through the payment gateway.
    Purchase,

    /// Tokens spent on an order.
    Spend,

    /// Operator-issued credit.
    AdminCredit,

    /// Operator-issued debit.
    AdminDebit,

    /// Compensating credit for a cancelled or refunded order.
    Refund,
}

/// Settlement status of a transaction.
///
/// Transitions exactly once: `Pending -> Completed` or `Pending -> Failed`.
/// Non-purchase transactions are created `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting confirmation from the payment gateway.
    Pending,

    /// Settled; the amount is reflected in the balance.
    Completed,

    /// The payment expired or failed; the amount was never credited.
    Failed,
}
