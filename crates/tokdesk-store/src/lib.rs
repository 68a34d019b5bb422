//! `RocksDB` storage layer for tokdesk.
//!
//! This crate persists accounts, customer profiles, orders, and the token
//! transaction log, using `RocksDB` column families for indexing. The
//! invariant-bearing operations (order creation, payment settlement, ledger
//! mutation) are compound: a single atomic `WriteBatch` per call, serialized
//! per account so concurrent writers cannot interleave a read-modify-write on
//! the same balance.
//!
//! # Example
//!
//! ```no_run
//! use tokdesk_store::{RocksStore, Store};
//! use tokdesk_core::Account;
//!
//! let store = RocksStore::open("/tmp/tokdesk-db").unwrap();
//!
//! let account = Account::new(42);
//! store.put_account(&account).unwrap();
//!
//! let retrieved = store.get_account(&account.id).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tokdesk_core::{
    Account, AccountId, CustomerProfile, Order, OrderId, OrderStatus, PackageKey, PaymentStatus,
    ProfileId, TokenTransaction, TransactionId,
};

/// The ingredients of a new order, priced by the caller.
///
/// The store assigns the order id and queue position, debits the cost, and
/// inserts the order in one atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// The paying account.
    pub account_id: AccountId,
    /// The customer profile the order is for.
    pub profile_id: ProfileId,
    /// The purchased package.
    pub package: PackageKey,
    /// Token cost, resolved at creation time.
    pub cost_tokens: i64,
    /// Priority flag.
    pub priority: bool,
    /// Set when rerunning an earlier order.
    pub rerun_of: Option<OrderId>,
    /// Description recorded on the debit transaction.
    pub description: String,
}

/// Outcome of settling or failing a pending payment.
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// The status flipped and (for settlement) the balance was credited.
    /// Carries the finalized transaction.
    Applied(TokenTransaction),

    /// The payment had already left `Pending`; nothing was mutated.
    AlreadySettled(PaymentStatus),
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing different backends
/// behind the engines.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert or update an account record and its chat-identity index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Get an account by chat identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account_by_chat(&self, chat_id: i64) -> Result<Option<Account>>;

    // =========================================================================
    // Profile Operations
    // =========================================================================

    /// Insert or update a customer profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_profile(&self, profile: &CustomerProfile) -> Result<()>;

    /// Get a profile by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_profile(&self, profile_id: &ProfileId) -> Result<Option<CustomerProfile>>;

    /// List an account's profiles, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_profiles_by_account(&self, account_id: &AccountId) -> Result<Vec<CustomerProfile>>;

    /// Delete a profile.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the profile doesn't exist.
    fn delete_profile(&self, profile_id: &ProfileId) -> Result<()>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Get a transaction by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<TokenTransaction>>;

    /// Get the transaction recorded for an external payment id, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_payment(&self, external_payment_id: &str) -> Result<Option<TokenTransaction>>;

    /// List an account's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TokenTransaction>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Apply a settled transaction: update the balance and append the row
    /// atomically. The transaction's `balance_after_tokens` is recomputed
    /// under the account lock; the finalized row is returned.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientTokens` if a debit would drive the balance
    ///   negative; nothing is written.
    /// - `StoreError::InvalidTransaction` if the transaction is not settled.
    fn apply_transaction(&self, transaction: &TokenTransaction) -> Result<TokenTransaction>;

    /// Record a pending purchase awaiting gateway confirmation. No balance
    /// change. The external payment id becomes the idempotency key for the
    /// whole credit path.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicatePayment` if the external id was already
    ///   recorded.
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InvalidTransaction` if the transaction is not a
    ///   pending purchase with an external id.
    fn record_pending_payment(&self, transaction: &TokenTransaction) -> Result<()>;

    /// Settle a pending payment: credit the balance and flip the status to
    /// `Completed`, atomically, exactly once. Safe to call any number of
    /// times for the same external id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no payment was ever recorded for
    /// this external id.
    fn settle_payment(&self, external_payment_id: &str) -> Result<SettleOutcome>;

    /// Mark a pending payment failed. No balance change.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no payment was ever recorded for
    /// this external id.
    fn fail_payment(&self, external_payment_id: &str) -> Result<SettleOutcome>;

    /// List payments still pending that were created before `cutoff`,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_pending_payments_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TokenTransaction>>;

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Create an order: debit the cost, assign the next queue position, and
    /// insert the order, all in one atomic unit. If the debit fails no order
    /// row is created.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientTokens` if the balance can't cover the
    ///   cost.
    fn create_order(&self, new_order: &NewOrder) -> Result<(Order, TokenTransaction)>;

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// Overwrite an order record (status transitions without a refund). The
    /// write only happens while the stored status still equals
    /// `expected_status`; the re-check runs under the owning account's lock,
    /// so concurrent transitions serialize and exactly one writer wins.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the order no longer exists.
    /// - `StoreError::OrderStatusConflict` if the stored status moved since
    ///   the caller's read; nothing is written.
    fn update_order(&self, order: &Order, expected_status: OrderStatus) -> Result<()>;

    /// Write an order record and credit a compensating refund of its cost in
    /// one atomic unit. Used for the cancelled/refunded side exits. Same
    /// compare-and-set as [`Store::update_order`]: the stored status must
    /// still equal `expected_status` under the account lock, so two racing
    /// cancellations produce exactly one refund.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the order or account doesn't exist.
    /// - `StoreError::OrderStatusConflict` if the stored status moved since
    ///   the caller's read; nothing is written.
    fn update_order_with_refund(
        &self,
        order: &Order,
        expected_status: OrderStatus,
        description: &str,
    ) -> Result<TokenTransaction>;

    /// List an account's orders, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_orders_by_account(&self, account_id: &AccountId) -> Result<Vec<Order>>;

    /// List open orders (pending/processing/assigned) in dequeue order:
    /// priority first, then ascending queue position.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_open_orders(&self) -> Result<Vec<Order>>;
}
