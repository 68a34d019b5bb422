//! HTTP request handlers.

pub mod accounts;
pub mod health;
pub mod intake;
pub mod orders;
pub mod payments;
pub mod webhooks;
