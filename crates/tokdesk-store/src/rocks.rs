//! `RocksDB` storage implementation.
//!
//! Atomicity comes from `WriteBatch`; per-account mutual exclusion for
//! read-modify-write sequences comes from a lock stripe keyed by account id.
//! The queue position counter is persisted in the `meta` column family and
//! advanced inside the order-creation batch, so positions are never reused.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use tokdesk_core::{
    Account, AccountId, CustomerProfile, Order, OrderId, OrderStatus, PaymentStatus, ProfileId,
    TokenTransaction, TransactionId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, META_QUEUE_POSITION};
use crate::{NewOrder, SettleOutcome, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    account_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    queue_position: Mutex<u64>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self {
            db: Arc::new(db),
            account_locks: Mutex::new(HashMap::new()),
            queue_position: Mutex::new(0),
        };

        let position = store.load_queue_position()?;
        *store.lock(&store.queue_position) = position;

        Ok(store)
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Lock a mutex, recovering the guard if a previous holder panicked.
    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Per-account serialization boundary for balance mutations.
    fn account_lock(&self, account_id: &AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.lock(&self.account_locks);
        locks
            .entry(*account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load_queue_position(&self) -> Result<u64> {
        let cf = self.cf(cf::META)?;
        let raw = self
            .db
            .get_cf(&cf, META_QUEUE_POSITION)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match raw {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::Serialization("bad queue counter".into()))?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn require_account(&self, account_id: &AccountId) -> Result<Account> {
        self.get_account(account_id)?
            .ok_or_else(|| StoreError::not_found("account", account_id.to_string()))
    }

    /// Stage an account write into a batch.
    fn stage_account(&self, batch: &mut WriteBatch, account: &Account) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_by_chat = self.cf(cf::ACCOUNTS_BY_CHAT)?;
        batch.put_cf(
            &cf_accounts,
            keys::account_key(&account.id),
            Self::serialize(account)?,
        );
        batch.put_cf(
            &cf_by_chat,
            keys::chat_key(account.chat_id),
            account.id.as_bytes(),
        );
        Ok(())
    }

    /// Stage a transaction write (primary row plus account index).
    fn stage_transaction(
        &self,
        batch: &mut WriteBatch,
        transaction: &TokenTransaction,
    ) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_account = self.cf(cf::TRANSACTIONS_BY_ACCOUNT)?;
        batch.put_cf(
            &cf_tx,
            keys::transaction_key(&transaction.id),
            Self::serialize(transaction)?,
        );
        batch.put_cf(
            &cf_by_account,
            keys::account_index_key(&transaction.account_id, transaction.id.to_bytes()),
            [],
        );
        Ok(())
    }

    /// Stage an order write (primary row plus account index).
    fn stage_order(&self, batch: &mut WriteBatch, order: &Order) -> Result<()> {
        let cf_orders = self.cf(cf::ORDERS)?;
        let cf_by_account = self.cf(cf::ORDERS_BY_ACCOUNT)?;
        batch.put_cf(&cf_orders, keys::order_key(&order.id), Self::serialize(order)?);
        batch.put_cf(
            &cf_by_account,
            keys::account_index_key(&order.account_id, order.id.to_bytes()),
            [],
        );
        Ok(())
    }

    /// Collect ULID suffixes of an account's composite index entries, in
    /// chronological order.
    fn scan_account_index(&self, cf_name: &str, account_id: &AccountId) -> Result<Vec<[u8; 16]>> {
        let cf = self.cf(cf_name)?;
        let prefix = keys::account_prefix(account_id);

        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            out.push(keys::extract_ulid_bytes(&key));
        }
        Ok(out)
    }

    /// Settle or fail a pending payment. The status flips at most once; the
    /// caller gets told when someone else won the race.
    fn resolve_payment(
        &self,
        external_payment_id: &str,
        to: PaymentStatus,
    ) -> Result<SettleOutcome> {
        debug_assert!(to != PaymentStatus::Pending);

        let transaction = self
            .get_payment(external_payment_id)?
            .ok_or_else(|| StoreError::not_found("payment", external_payment_id))?;

        let lock = self.account_lock(&transaction.account_id);
        let _guard = self.lock(&lock);

        // Re-read under the lock: a concurrent webhook/manual approval for
        // the same external id may have settled it between the lookup above
        // and acquiring the lock. First writer wins.
        let mut transaction = self
            .get_payment(external_payment_id)?
            .ok_or_else(|| StoreError::not_found("payment", external_payment_id))?;

        if transaction.payment_status != PaymentStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled(transaction.payment_status));
        }

        let mut batch = WriteBatch::default();

        transaction.payment_status = to;
        if to == PaymentStatus::Completed {
            let mut account = self.require_account(&transaction.account_id)?;
            account.balance_tokens += transaction.amount_tokens;
            account.updated_at = Utc::now();
            transaction.balance_after_tokens = account.balance_tokens;
            self.stage_account(&mut batch, &account)?;
        }

        self.stage_transaction(&mut batch, &transaction)?;

        let cf_pending = self.cf(cf::PENDING_PAYMENTS)?;
        batch.delete_cf(&cf_pending, keys::payment_key(external_payment_id));

        self.write(batch)?;
        Ok(SettleOutcome::Applied(transaction))
    }

    /// Confirm the stored order still carries the status the caller read.
    /// Must run under the owning account's lock; without the re-read two
    /// writers that both saw the old status could each apply their write.
    fn check_order_status(&self, order_id: &OrderId, expected: OrderStatus) -> Result<()> {
        let stored = self
            .get_order(order_id)?
            .ok_or_else(|| StoreError::not_found("order", order_id.to_string()))?;
        if stored.status != expected {
            return Err(StoreError::OrderStatusConflict {
                id: order_id.to_string(),
                expected,
                actual: stored.status,
            });
        }
        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn put_account(&self, account: &Account) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, account)?;
        self.write(batch)
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        self.db
            .get_cf(&cf, keys::account_key(account_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_account_by_chat(&self, chat_id: i64) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS_BY_CHAT)?;
        let raw = self
            .db
            .get_cf(&cf, keys::chat_key(chat_id))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("bad chat index entry".into()))?;
        let account_id = AccountId::from_uuid(uuid::Uuid::from_bytes(bytes));
        self.get_account(&account_id)
    }

    // =========================================================================
    // Profile Operations
    // =========================================================================

    fn put_profile(&self, profile: &CustomerProfile) -> Result<()> {
        let cf_profiles = self.cf(cf::PROFILES)?;
        let cf_by_account = self.cf(cf::PROFILES_BY_ACCOUNT)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_profiles,
            keys::profile_key(&profile.id),
            Self::serialize(profile)?,
        );
        batch.put_cf(
            &cf_by_account,
            keys::account_index_key(&profile.account_id, profile.id.to_bytes()),
            [],
        );
        self.write(batch)
    }

    fn get_profile(&self, profile_id: &ProfileId) -> Result<Option<CustomerProfile>> {
        let cf = self.cf(cf::PROFILES)?;
        self.db
            .get_cf(&cf, keys::profile_key(profile_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_profiles_by_account(&self, account_id: &AccountId) -> Result<Vec<CustomerProfile>> {
        let mut profiles = Vec::new();
        for bytes in self.scan_account_index(cf::PROFILES_BY_ACCOUNT, account_id)? {
            let profile_id = ProfileId::from_bytes(bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(profile) = self.get_profile(&profile_id)? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    fn delete_profile(&self, profile_id: &ProfileId) -> Result<()> {
        let profile = self
            .get_profile(profile_id)?
            .ok_or_else(|| StoreError::not_found("profile", profile_id.to_string()))?;

        let cf_profiles = self.cf(cf::PROFILES)?;
        let cf_by_account = self.cf(cf::PROFILES_BY_ACCOUNT)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_profiles, keys::profile_key(profile_id));
        batch.delete_cf(
            &cf_by_account,
            keys::account_index_key(&profile.account_id, profile_id.to_bytes()),
        );
        self.write(batch)
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<TokenTransaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        self.db
            .get_cf(&cf, keys::transaction_key(transaction_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_payment(&self, external_payment_id: &str) -> Result<Option<TokenTransaction>> {
        let cf = self.cf(cf::PAYMENTS)?;
        let raw = self
            .db
            .get_cf(&cf, keys::payment_key(external_payment_id))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("bad payment index entry".into()))?;
        let transaction_id = TransactionId::from_bytes(bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.get_transaction(&transaction_id)
    }

    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TokenTransaction>> {
        // ULID suffixes scan oldest-first; reverse for newest-first listing.
        let mut all = self.scan_account_index(cf::TRANSACTIONS_BY_ACCOUNT, account_id)?;
        all.reverse();

        let mut transactions = Vec::new();
        for bytes in all.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }
            let transaction_id = TransactionId::from_bytes(bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(tx) = self.get_transaction(&transaction_id)? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn apply_transaction(&self, transaction: &TokenTransaction) -> Result<TokenTransaction> {
        if transaction.payment_status != PaymentStatus::Completed {
            return Err(StoreError::InvalidTransaction(
                "apply_transaction requires a settled transaction",
            ));
        }

        let lock = self.account_lock(&transaction.account_id);
        let _guard = self.lock(&lock);

        let mut account = self.require_account(&transaction.account_id)?;

        let new_balance = account.balance_tokens + transaction.amount_tokens;
        if new_balance < 0 {
            return Err(StoreError::InsufficientTokens {
                balance: account.balance_tokens,
                required: transaction.amount_tokens.abs(),
            });
        }

        account.balance_tokens = new_balance;
        account.updated_at = Utc::now();

        let mut finalized = transaction.clone();
        finalized.balance_after_tokens = new_balance;

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, &account)?;
        self.stage_transaction(&mut batch, &finalized)?;
        self.write(batch)?;

        Ok(finalized)
    }

    fn record_pending_payment(&self, transaction: &TokenTransaction) -> Result<()> {
        if transaction.payment_status != PaymentStatus::Pending {
            return Err(StoreError::InvalidTransaction(
                "record_pending_payment requires a pending transaction",
            ));
        }
        let Some(external_id) = transaction.external_payment_id.as_deref() else {
            return Err(StoreError::InvalidTransaction(
                "record_pending_payment requires an external payment id",
            ));
        };

        let lock = self.account_lock(&transaction.account_id);
        let _guard = self.lock(&lock);

        self.require_account(&transaction.account_id)?;

        if self.get_payment(external_id)?.is_some() {
            return Err(StoreError::DuplicatePayment {
                external_payment_id: external_id.to_string(),
            });
        }

        let cf_payments = self.cf(cf::PAYMENTS)?;
        let cf_pending = self.cf(cf::PENDING_PAYMENTS)?;

        let mut batch = WriteBatch::default();
        self.stage_transaction(&mut batch, transaction)?;
        batch.put_cf(
            &cf_payments,
            keys::payment_key(external_id),
            transaction.id.to_bytes(),
        );
        batch.put_cf(
            &cf_pending,
            keys::payment_key(external_id),
            transaction.id.to_bytes(),
        );
        self.write(batch)
    }

    fn settle_payment(&self, external_payment_id: &str) -> Result<SettleOutcome> {
        self.resolve_payment(external_payment_id, PaymentStatus::Completed)
    }

    fn fail_payment(&self, external_payment_id: &str) -> Result<SettleOutcome> {
        self.resolve_payment(external_payment_id, PaymentStatus::Failed)
    }

    fn list_pending_payments_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TokenTransaction>> {
        let cf = self.cf(cf::PENDING_PAYMENTS)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);

        let mut stuck = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let bytes: [u8; 16] = value
                .as_ref()
                .try_into()
                .map_err(|_| StoreError::Serialization("bad pending payment entry".into()))?;
            let transaction_id = TransactionId::from_bytes(bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            if let Some(tx) = self.get_transaction(&transaction_id)? {
                if tx.payment_status == PaymentStatus::Pending && tx.created_at < cutoff {
                    stuck.push(tx);
                }
            }
        }
        stuck.sort_by_key(|tx| tx.created_at);
        Ok(stuck)
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    fn create_order(&self, new_order: &NewOrder) -> Result<(Order, TokenTransaction)> {
        let lock = self.account_lock(&new_order.account_id);
        let _guard = self.lock(&lock);

        let mut account = self.require_account(&new_order.account_id)?;

        if !account.has_sufficient_tokens(new_order.cost_tokens) {
            return Err(StoreError::InsufficientTokens {
                balance: account.balance_tokens,
                required: new_order.cost_tokens,
            });
        }

        account.balance_tokens -= new_order.cost_tokens;
        account.updated_at = Utc::now();

        let debit = TokenTransaction::spend(
            new_order.account_id,
            new_order.cost_tokens,
            account.balance_tokens,
            new_order.description.clone(),
        );

        // The counter lock is held across the batch write so two concurrent
        // creations can't claim the same position.
        let mut queue = self.lock(&self.queue_position);
        let position = *queue + 1;

        let order = Order {
            id: OrderId::generate(),
            account_id: new_order.account_id,
            profile_id: new_order.profile_id,
            package: new_order.package,
            cost_tokens: new_order.cost_tokens,
            status: OrderStatus::Pending,
            queue_position: position,
            priority: new_order.priority,
            rerun_of: new_order.rerun_of,
            notes: None,
            created_at: Utc::now(),
            assigned_at: None,
            completed_at: None,
        };

        let cf_meta = self.cf(cf::META)?;

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, &account)?;
        self.stage_transaction(&mut batch, &debit)?;
        self.stage_order(&mut batch, &order)?;
        batch.put_cf(&cf_meta, META_QUEUE_POSITION, position.to_be_bytes());
        self.write(batch)?;

        *queue = position;
        Ok((order, debit))
    }

    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let cf = self.cf(cf::ORDERS)?;
        self.db
            .get_cf(&cf, keys::order_key(order_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn update_order(&self, order: &Order, expected_status: OrderStatus) -> Result<()> {
        let lock = self.account_lock(&order.account_id);
        let _guard = self.lock(&lock);

        self.check_order_status(&order.id, expected_status)?;

        let mut batch = WriteBatch::default();
        self.stage_order(&mut batch, order)?;
        self.write(batch)
    }

    fn update_order_with_refund(
        &self,
        order: &Order,
        expected_status: OrderStatus,
        description: &str,
    ) -> Result<TokenTransaction> {
        let lock = self.account_lock(&order.account_id);
        let _guard = self.lock(&lock);

        self.check_order_status(&order.id, expected_status)?;

        let mut account = self.require_account(&order.account_id)?;
        account.balance_tokens += order.cost_tokens;
        account.updated_at = Utc::now();

        let refund = TokenTransaction::refund(
            order.account_id,
            order.cost_tokens,
            account.balance_tokens,
            description.to_string(),
        );

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, &account)?;
        self.stage_transaction(&mut batch, &refund)?;
        self.stage_order(&mut batch, order)?;
        self.write(batch)?;

        Ok(refund)
    }

    fn list_orders_by_account(&self, account_id: &AccountId) -> Result<Vec<Order>> {
        let mut orders = Vec::new();
        for bytes in self.scan_account_index(cf::ORDERS_BY_ACCOUNT, account_id)? {
            let order_id =
                OrderId::from_bytes(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(order) = self.get_order(&order_id)? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    fn list_open_orders(&self) -> Result<Vec<Order>> {
        let cf = self.cf(cf::ORDERS)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);

        let mut orders = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let order: Order = Self::deserialize(&value)?;
            if order.status.is_open() {
                orders.push(order);
            }
        }

        // Priority affects dequeue order only, never position numbering.
        orders.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.queue_position.cmp(&b.queue_position))
        });
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokdesk_core::PackageKey;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn funded_account(store: &RocksStore, balance: i64) -> Account {
        let mut account = Account::new(7001);
        account.balance_tokens = balance;
        store.put_account(&account).unwrap();
        account
    }

    fn sample_profile(account_id: AccountId) -> CustomerProfile {
        CustomerProfile {
            id: ProfileId::generate(),
            account_id,
            first_name: "Ada".into(),
            middle_name: None,
            last_name: "Lovelace".into(),
            phone: "5551234567".into(),
            email: "ada@example.com".into(),
            gender: "female".into(),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
            address: "12 Analytical Way".into(),
            apartment: None,
            city: "London".into(),
            state: "LN".into(),
            postal_code: "12345".into(),
            password: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn new_order(account_id: AccountId, profile_id: ProfileId, cost: i64) -> NewOrder {
        NewOrder {
            account_id,
            profile_id,
            package: PackageKey(1),
            cost_tokens: cost,
            priority: false,
            rerun_of: None,
            description: "1-site package".into(),
        }
    }

    #[test]
    fn account_roundtrip_and_chat_index() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 500);

        let by_id = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(by_id.balance_tokens, 500);

        let by_chat = store.get_account_by_chat(7001).unwrap().unwrap();
        assert_eq!(by_chat.id, account.id);

        assert!(store.get_account_by_chat(9999).unwrap().is_none());
    }

    #[test]
    fn apply_transaction_updates_balance_and_appends_row() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 0);

        let credit =
            TokenTransaction::admin_adjustment(account.id, 300, 0, "initial grant".into());
        let finalized = store.apply_transaction(&credit).unwrap();
        assert_eq!(finalized.balance_after_tokens, 300);

        let updated = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(updated.balance_tokens, 300);

        let listed = store.list_transactions_by_account(&account.id, 10, 0).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount_tokens, 300);
    }

    #[test]
    fn apply_transaction_rejects_overdraft() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 100);

        let debit = TokenTransaction::spend(account.id, 150, 0, "too big".into());
        let result = store.apply_transaction(&debit);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientTokens {
                balance: 100,
                required: 150
            })
        ));

        // Nothing written.
        let updated = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(updated.balance_tokens, 100);
        assert!(store
            .list_transactions_by_account(&account.id, 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn transaction_listing_is_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 0);

        let tx1 = TokenTransaction::admin_adjustment(account.id, 100, 0, "first".into());
        store.apply_transaction(&tx1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2)); // Distinct ULID timestamps
        let tx2 = TokenTransaction::admin_adjustment(account.id, 50, 0, "second".into());
        store.apply_transaction(&tx2).unwrap();

        let all = store.list_transactions_by_account(&account.id, 10, 0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].description, "second");
        assert_eq!(all[1].description, "first");

        let page2 = store.list_transactions_by_account(&account.id, 1, 1).unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].description, "first");
    }

    #[test]
    fn pending_payment_roundtrip_and_duplicate_rejection() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 0);

        let pending = TokenTransaction::purchase_pending(
            account.id,
            100,
            0,
            "pay_1".into(),
            "100 tokens - Starter".into(),
        );
        store.record_pending_payment(&pending).unwrap();

        let found = store.get_payment("pay_1").unwrap().unwrap();
        assert_eq!(found.payment_status, PaymentStatus::Pending);

        // Balance untouched until settlement.
        let unchanged = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(unchanged.balance_tokens, 0);

        let duplicate = TokenTransaction::purchase_pending(
            account.id,
            100,
            0,
            "pay_1".into(),
            "100 tokens - Starter".into(),
        );
        assert!(matches!(
            store.record_pending_payment(&duplicate),
            Err(StoreError::DuplicatePayment { .. })
        ));
    }

    #[test]
    fn settle_payment_credits_exactly_once() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 0);

        let pending = TokenTransaction::purchase_pending(
            account.id,
            100,
            0,
            "pay_2".into(),
            "100 tokens - Starter".into(),
        );
        store.record_pending_payment(&pending).unwrap();

        let first = store.settle_payment("pay_2").unwrap();
        assert!(matches!(first, SettleOutcome::Applied(_)));

        let second = store.settle_payment("pay_2").unwrap();
        assert!(matches!(
            second,
            SettleOutcome::AlreadySettled(PaymentStatus::Completed)
        ));

        let updated = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(updated.balance_tokens, 100);
    }

    #[test]
    fn settle_unknown_payment_is_not_found() {
        let (store, _dir) = create_test_store();
        assert!(matches!(
            store.settle_payment("pay_missing"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn fail_payment_leaves_balance_unchanged() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 0);

        let pending = TokenTransaction::purchase_pending(
            account.id,
            100,
            0,
            "pay_3".into(),
            "100 tokens - Starter".into(),
        );
        store.record_pending_payment(&pending).unwrap();

        let outcome = store.fail_payment("pay_3").unwrap();
        assert!(matches!(outcome, SettleOutcome::Applied(_)));

        let updated = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(updated.balance_tokens, 0);

        // A Paid webhook arriving after failure must not credit.
        let late = store.settle_payment("pay_3").unwrap();
        assert!(matches!(
            late,
            SettleOutcome::AlreadySettled(PaymentStatus::Failed)
        ));
    }

    #[test]
    fn stuck_payment_scan_respects_cutoff_and_settlement() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 0);

        let pending = TokenTransaction::purchase_pending(
            account.id,
            100,
            0,
            "pay_4".into(),
            "100 tokens - Starter".into(),
        );
        store.record_pending_payment(&pending).unwrap();

        // Older cutoff: nothing is stuck yet.
        let past = Utc::now() - chrono::Duration::minutes(10);
        assert!(store.list_pending_payments_before(past).unwrap().is_empty());

        // Future cutoff: the payment shows up.
        let future = Utc::now() + chrono::Duration::minutes(1);
        let stuck = store.list_pending_payments_before(future).unwrap();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].external_payment_id.as_deref(), Some("pay_4"));

        // Settled payments drop out of the scan set.
        store.settle_payment("pay_4").unwrap();
        assert!(store.list_pending_payments_before(future).unwrap().is_empty());
    }

    #[test]
    fn create_order_debits_and_assigns_increasing_positions() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 1000);
        let profile = sample_profile(account.id);
        store.put_profile(&profile).unwrap();

        let (order1, debit1) = store
            .create_order(&new_order(account.id, profile.id, 100))
            .unwrap();
        let (order2, _) = store
            .create_order(&new_order(account.id, profile.id, 100))
            .unwrap();

        assert_eq!(order1.status, OrderStatus::Pending);
        assert_eq!(debit1.amount_tokens, -100);
        assert!(order2.queue_position > order1.queue_position);

        let updated = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(updated.balance_tokens, 800);
    }

    #[test]
    fn create_order_insufficient_leaves_nothing_behind() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 50);
        let profile = sample_profile(account.id);
        store.put_profile(&profile).unwrap();

        let result = store.create_order(&new_order(account.id, profile.id, 100));
        assert!(matches!(result, Err(StoreError::InsufficientTokens { .. })));

        let updated = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(updated.balance_tokens, 50);
        assert!(store.list_orders_by_account(&account.id).unwrap().is_empty());
        assert!(store
            .list_transactions_by_account(&account.id, 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn queue_positions_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let last_position;
        {
            let store = RocksStore::open(dir.path()).unwrap();
            let account = funded_account(&store, 1000);
            let profile = sample_profile(account.id);
            store.put_profile(&profile).unwrap();
            let (order, _) = store
                .create_order(&new_order(account.id, profile.id, 100))
                .unwrap();
            last_position = order.queue_position;
        }

        let store = RocksStore::open(dir.path()).unwrap();
        let account = store.get_account_by_chat(7001).unwrap().unwrap();
        let profile = &store.list_profiles_by_account(&account.id).unwrap()[0];
        let (order, _) = store
            .create_order(&new_order(account.id, profile.id, 100))
            .unwrap();
        assert!(order.queue_position > last_position);
    }

    #[test]
    fn refund_update_is_atomic_with_order_write() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 300);
        let profile = sample_profile(account.id);
        store.put_profile(&profile).unwrap();

        let (mut order, _) = store
            .create_order(&new_order(account.id, profile.id, 250))
            .unwrap();
        order.status = OrderStatus::Cancelled;

        let refund = store
            .update_order_with_refund(&order, OrderStatus::Pending, "order cancelled")
            .unwrap();
        assert_eq!(refund.amount_tokens, 250);
        assert_eq!(refund.balance_after_tokens, 300);

        let updated = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(updated.balance_tokens, 300);

        let stored = store.get_order(&order.id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[test]
    fn stale_order_write_is_rejected_without_refund() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 300);
        let profile = sample_profile(account.id);
        store.put_profile(&profile).unwrap();

        let (mut order, _) = store
            .create_order(&new_order(account.id, profile.id, 250))
            .unwrap();
        order.status = OrderStatus::Cancelled;

        store
            .update_order_with_refund(&order, OrderStatus::Pending, "order cancelled")
            .unwrap();

        // A second writer that read the order before the first one committed
        // replays the same expected status and must lose.
        let result = store.update_order_with_refund(&order, OrderStatus::Pending, "order cancelled");
        assert!(matches!(
            result,
            Err(StoreError::OrderStatusConflict {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Cancelled,
                ..
            })
        ));

        let updated = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(updated.balance_tokens, 300);
        assert_eq!(
            store
                .list_transactions_by_account(&account.id, 10, 0)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn open_orders_sort_priority_then_position() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 1000);
        let profile = sample_profile(account.id);
        store.put_profile(&profile).unwrap();

        let (first, _) = store
            .create_order(&new_order(account.id, profile.id, 100))
            .unwrap();
        let mut priority_order = new_order(account.id, profile.id, 100);
        priority_order.priority = true;
        let (second, _) = store.create_order(&priority_order).unwrap();

        let open = store.list_open_orders().unwrap();
        assert_eq!(open.len(), 2);
        // The later priority order dequeues first but keeps its own position.
        assert_eq!(open[0].id, second.id);
        assert_eq!(open[1].id, first.id);
        assert!(open[0].queue_position > open[1].queue_position);
    }

    #[test]
    fn profile_crud() {
        let (store, _dir) = create_test_store();
        let account = funded_account(&store, 0);
        let profile = sample_profile(account.id);

        store.put_profile(&profile).unwrap();
        assert_eq!(
            store.list_profiles_by_account(&account.id).unwrap().len(),
            1
        );

        store.delete_profile(&profile.id).unwrap();
        assert!(store.get_profile(&profile.id).unwrap().is_none());
        assert!(store.list_profiles_by_account(&account.id).unwrap().is_empty());

        assert!(matches!(
            store.delete_profile(&profile.id),
            Err(StoreError::NotFound { .. })
        ));
    }
}
