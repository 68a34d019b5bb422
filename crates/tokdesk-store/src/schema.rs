//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Index: account id by chat identity, keyed by big-endian `chat_id`.
    pub const ACCOUNTS_BY_CHAT: &str = "accounts_by_chat";

    /// Customer profiles, keyed by `profile_id` (ULID).
    pub const PROFILES: &str = "profiles";

    /// Index: profiles by account, keyed by `account_id || profile_id`.
    /// Value is empty (index only).
    pub const PROFILES_BY_ACCOUNT: &str = "profiles_by_account";

    /// Orders, keyed by `order_id` (ULID).
    pub const ORDERS: &str = "orders";

    /// Index: orders by account, keyed by `account_id || order_id`.
    pub const ORDERS_BY_ACCOUNT: &str = "orders_by_account";

    /// Token transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by account, keyed by
    /// `account_id || transaction_id`.
    pub const TRANSACTIONS_BY_ACCOUNT: &str = "transactions_by_account";

    /// Idempotency index: external payment id -> transaction id. One entry
    /// per payment ever initiated; never deleted.
    pub const PAYMENTS: &str = "payments";

    /// Scan set for the fallback poller: external payment id -> transaction
    /// id for payments still pending. Entries are removed in the same write
    /// batch that settles or fails the payment.
    pub const PENDING_PAYMENTS: &str = "pending_payments";

    /// Singleton metadata (queue position counter).
    pub const META: &str = "meta";
}

/// Key of the queue position counter inside the `meta` column family.
pub const META_QUEUE_POSITION: &[u8] = b"queue_position";

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_CHAT,
        cf::PROFILES,
        cf::PROFILES_BY_ACCOUNT,
        cf::ORDERS,
        cf::ORDERS_BY_ACCOUNT,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_ACCOUNT,
        cf::PAYMENTS,
        cf::PENDING_PAYMENTS,
        cf::META,
    ]
}
