//! Token ledger operations.
//!
//! Every balance change goes through the store's atomic primitives, so the
//! ledger here is a thin policy layer: sign checks, transaction construction,
//! and the idempotent credit funnel that all payment settlement paths share.

use std::sync::Arc;

use tokdesk_core::{AccountId, PaymentStatus, TokenTransaction, TransactionKind};
use tokdesk_store::{SettleOutcome, Store};

use crate::error::{EngineError, Result};

/// Outcome of the idempotent credit funnel.
#[derive(Debug, Clone)]
pub enum CreditOutcome {
    /// This call settled the payment and credited the balance.
    Applied(TokenTransaction),

    /// An earlier call already settled or failed the payment; this call
    /// changed nothing.
    AlreadyApplied(PaymentStatus),
}

/// Balance reads and ledger mutations for one store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current token balance of an account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    pub fn balance(&self, account_id: &AccountId) -> Result<i64> {
        let account = self
            .store
            .get_account(account_id)?
            .ok_or_else(|| tokdesk_store::StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })?;
        Ok(account.balance_tokens)
    }

    /// Credit tokens to an account immediately.
    ///
    /// Covers the credit kinds that settle on the spot (refunds, operator
    /// credits). Gateway purchases never come through here; they settle
    /// through [`Ledger::credit_idempotent`].
    ///
    /// # Errors
    ///
    /// `EngineError::InvalidRequest` if `amount` is not positive or `kind`
    /// is not an immediate credit kind.
    pub fn credit(
        &self,
        account_id: AccountId,
        amount: i64,
        kind: TransactionKind,
        description: String,
    ) -> Result<TokenTransaction> {
        if amount <= 0 {
            return Err(EngineError::InvalidRequest(
                "credit amount must be positive",
            ));
        }
        let transaction = match kind {
            TransactionKind::Refund => TokenTransaction::refund(account_id, amount, 0, description),
            TransactionKind::AdminCredit => {
                TokenTransaction::admin_adjustment(account_id, amount, 0, description)
            }
            _ => {
                return Err(EngineError::InvalidRequest(
                    "kind does not settle immediately",
                ))
            }
        };
        Ok(self.store.apply_transaction(&transaction)?)
    }

    /// Debit tokens from an account. Fails atomically when the balance can't
    /// cover the amount.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidRequest` if `amount` is not positive.
    /// - `StoreError::InsufficientTokens` if the balance is too low; nothing
    ///   is written.
    pub fn debit(
        &self,
        account_id: AccountId,
        amount: i64,
        description: String,
    ) -> Result<TokenTransaction> {
        if amount <= 0 {
            return Err(EngineError::InvalidRequest("debit amount must be positive"));
        }
        let transaction = TokenTransaction::spend(account_id, amount, 0, description);
        Ok(self.store.apply_transaction(&transaction)?)
    }

    /// Apply an operator adjustment. Positive credits, negative debits; a
    /// negative adjustment still may not drive the balance below zero.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidRequest` if `amount` is zero.
    /// - `StoreError::InsufficientTokens` for an uncovered negative amount.
    pub fn admin_adjustment(
        &self,
        account_id: AccountId,
        amount: i64,
        description: String,
    ) -> Result<TokenTransaction> {
        if amount == 0 {
            return Err(EngineError::InvalidRequest(
                "adjustment amount must be non-zero",
            ));
        }
        let transaction = TokenTransaction::admin_adjustment(account_id, amount, 0, description);
        Ok(self.store.apply_transaction(&transaction)?)
    }

    /// Settle the pending payment recorded for this external id, crediting
    /// the balance at most once across any number of calls.
    ///
    /// Both the webhook path and manual approval funnel through here, so a
    /// race between them resolves to one `Applied` and one `AlreadyApplied`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no payment was recorded for this
    /// external id.
    pub fn credit_idempotent(&self, external_payment_id: &str) -> Result<CreditOutcome> {
        match self.store.settle_payment(external_payment_id)? {
            SettleOutcome::Applied(tx) => Ok(CreditOutcome::Applied(tx)),
            SettleOutcome::AlreadySettled(status) => Ok(CreditOutcome::AlreadyApplied(status)),
        }
    }

    /// List an account's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn history(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TokenTransaction>> {
        Ok(self
            .store
            .list_transactions_by_account(account_id, limit, offset)?)
    }
}
