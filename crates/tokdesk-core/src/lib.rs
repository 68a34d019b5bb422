//! Core types and utilities for tokdesk.
//!
//! This crate provides the foundational types used throughout the tokdesk
//! order-intake and token-economy engine:
//!
//! - **Identifiers**: `AccountId`, `ProfileId`, `OrderId`, `TransactionId`
//! - **Accounts**: `Account`, `Subscription`, `SubscriptionTier`
//! - **Profiles**: `CustomerProfile`, `ProfileField`
//! - **Tokens**: `TokenTransaction`, `TransactionKind`, `PaymentStatus`
//! - **Orders**: `Order`, `OrderStatus`
//! - **Pricing**: `PriceTable`, `Package`, `PackageKey`
//! - **Intake**: `IntakeState`, `IntakeDraft`, field validators
//!
//! # Token Unit
//!
//! The token is the internal spendable unit of account balance. Balances and
//! amounts are stored as `i64` whole tokens; transaction amounts are signed
//! (positive = credit, negative = debit).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod ids;
pub mod intake;
pub mod order;
pub mod pricing;
pub mod profile;
pub mod tokens;

pub use account::{Account, Subscription, SubscriptionStatus, SubscriptionTier};
pub use error::{CoreError, Result};
pub use ids::{AccountId, IdError, OrderId, ProfileId, TransactionId};
pub use intake::{IntakeDraft, IntakeState, ValidationError};
pub use order::{Order, OrderStatus};
pub use pricing::{AddOnPrices, Package, PackageKey, PriceTable};
pub use profile::{CustomerProfile, ProfileField};
pub use tokens::{PaymentStatus, TokenTransaction, TransactionKind};
