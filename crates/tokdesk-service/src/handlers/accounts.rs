//! Account management handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tokdesk_core::{
    Account, AccountId, CustomerProfile, PaymentStatus, TokenTransaction, TransactionKind,
};
use tokdesk_store::Store;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::orders::OrderView;
use crate::state::AppState;

/// Request to create (or look up) an account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    /// Chat id of the end user.
    pub chat_id: i64,
}

/// Account representation returned by the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    /// Account id.
    pub id: AccountId,
    /// Chat id of the end user.
    pub chat_id: i64,
    /// Current token balance.
    pub balance_tokens: i64,
    /// Whether this account has operator rights.
    pub is_admin: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            chat_id: account.chat_id,
            balance_tokens: account.balance_tokens,
            is_admin: account.is_admin,
            created_at: account.created_at,
        }
    }
}

/// Transaction representation returned by the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    /// Transaction id.
    pub id: String,
    /// Owning account.
    pub account_id: AccountId,
    /// Signed token amount.
    pub amount_tokens: i64,
    /// Transaction kind.
    pub kind: TransactionKind,
    /// Balance after settlement.
    pub balance_after_tokens: i64,
    /// Gateway payment id, for purchases.
    pub external_payment_id: Option<String>,
    /// Settlement status.
    pub payment_status: PaymentStatus,
    /// Description.
    pub description: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<TokenTransaction> for TransactionView {
    fn from(tx: TokenTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            account_id: tx.account_id,
            amount_tokens: tx.amount_tokens,
            kind: tx.kind,
            balance_after_tokens: tx.balance_after_tokens,
            external_payment_id: tx.external_payment_id,
            payment_status: tx.payment_status,
            description: tx.description,
            created_at: tx.created_at,
        }
    }
}

/// Customer profile representation. The stored password never leaves the
/// service; only whether one was set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    /// Profile id.
    pub id: String,
    /// Owning account.
    pub account_id: AccountId,
    /// First name.
    pub first_name: String,
    /// Middle name.
    pub middle_name: Option<String>,
    /// Last name.
    pub last_name: String,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// Gender.
    pub gender: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Street address.
    pub address: String,
    /// Apartment / unit.
    pub apartment: Option<String>,
    /// City.
    pub city: String,
    /// State or region.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
    /// Whether a password was provided during intake.
    pub has_password: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<CustomerProfile> for ProfileView {
    fn from(profile: CustomerProfile) -> Self {
        Self {
            id: profile.id.to_string(),
            account_id: profile.account_id,
            first_name: profile.first_name,
            middle_name: profile.middle_name,
            last_name: profile.last_name,
            phone: profile.phone,
            email: profile.email,
            gender: profile.gender,
            date_of_birth: profile.date_of_birth,
            address: profile.address,
            apartment: profile.apartment,
            city: profile.city,
            state: profile.state,
            postal_code: profile.postal_code,
            has_password: profile.password.is_some(),
            created_at: profile.created_at,
        }
    }
}

/// Request to adjust an account balance.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBalanceRequest {
    /// Signed token amount. Positive credits, negative debits.
    pub amount_tokens: i64,
    /// Reason for the adjustment, recorded on the transaction.
    pub reason: String,
}

/// Pagination parameters.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of rows to skip.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction listing response.
#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    /// Transactions, newest first.
    pub transactions: Vec<TransactionView>,
}

/// Create an account for a chat id, or return the existing one.
pub async fn create_account(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let account = get_or_create_account(&state, request.chat_id)?;
    Ok(Json(account.into()))
}

/// Fetch an account by id.
pub async fn get_account(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<AccountView>, ApiError> {
    let account = state
        .store
        .get_account(&account_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account: {account_id}")))?;
    Ok(Json(account.into()))
}

/// Apply an operator balance adjustment.
pub async fn adjust_balance(
    auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<AccountId>,
    Json(request): Json<AdjustBalanceRequest>,
) -> Result<Json<TransactionView>, ApiError> {
    let description = format!("{} (by {})", request.reason, auth.admin_id);
    let transaction = state
        .ledger
        .admin_adjustment(account_id, request.amount_tokens, description)?;

    tracing::info!(
        %account_id,
        amount_tokens = request.amount_tokens,
        admin_id = auth.admin_id,
        "Balance adjusted"
    );
    Ok(Json(transaction.into()))
}

/// List an account's transactions, newest first.
pub async fn list_transactions(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<AccountId>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let transactions = state
        .ledger
        .history(&account_id, pagination.limit, pagination.offset)?;
    Ok(Json(TransactionListResponse {
        transactions: transactions.into_iter().map(Into::into).collect(),
    }))
}

/// List an account's customer profiles.
pub async fn list_profiles(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Vec<ProfileView>>, ApiError> {
    let profiles = state.store.list_profiles_by_account(&account_id)?;
    Ok(Json(profiles.into_iter().map(Into::into).collect()))
}

/// List an account's orders.
pub async fn list_orders(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let orders = state.orders.orders_for_account(&account_id)?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

pub(crate) fn get_or_create_account(state: &AppState, chat_id: i64) -> Result<Account, ApiError> {
    if let Some(account) = state.store.get_account_by_chat(chat_id)? {
        return Ok(account);
    }

    let account = Account::new(chat_id);
    state.store.put_account(&account)?;
    tracing::info!(account_id = %account.id, chat_id, "Account created");
    Ok(account)
}
