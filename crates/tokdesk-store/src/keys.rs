//! Key encoding utilities for `RocksDB`.
//!
//! Composite index keys are `account_id (16 bytes) || ulid (16 bytes)`; since
//! ULIDs are time-ordered, a prefix scan yields chronological order.

use tokdesk_core::{AccountId, OrderId, ProfileId, TransactionId};

/// Create an account key from an account id.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a chat-identity index key (big-endian for stable ordering).
#[must_use]
pub fn chat_key(chat_id: i64) -> [u8; 8] {
    chat_id.to_be_bytes()
}

/// Create a profile key from a profile id.
#[must_use]
pub fn profile_key(profile_id: &ProfileId) -> Vec<u8> {
    profile_id.to_bytes().to_vec()
}

/// Create an order key from an order id.
#[must_use]
pub fn order_key(order_id: &OrderId) -> Vec<u8> {
    order_id.to_bytes().to_vec()
}

/// Create a transaction key from a transaction id.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a payment key from an external payment id.
#[must_use]
pub fn payment_key(external_payment_id: &str) -> Vec<u8> {
    external_payment_id.as_bytes().to_vec()
}

/// Create an `account_id || ulid` composite index key.
#[must_use]
pub fn account_index_key(account_id: &AccountId, ulid_bytes: [u8; 16]) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&ulid_bytes);
    key
}

/// Create a prefix for iterating an account's index entries.
#[must_use]
pub fn account_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the trailing 16 ULID bytes from a composite index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_ulid_bytes(key: &[u8]) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_key_length() {
        let account_id = AccountId::generate();
        assert_eq!(account_key(&account_id).len(), 16);
    }

    #[test]
    fn composite_index_key_format() {
        let account_id = AccountId::generate();
        let tx_id = TransactionId::generate();
        let key = account_index_key(&account_id, tx_id.to_bytes());

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], account_id.as_bytes());
        assert_eq!(extract_ulid_bytes(&key), tx_id.to_bytes());
    }

    #[test]
    fn chat_key_orders_numerically() {
        assert!(chat_key(1) < chat_key(2));
        assert!(chat_key(255) < chat_key(256));
    }
}
