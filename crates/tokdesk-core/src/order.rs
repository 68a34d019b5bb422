//! Order types and the order state graph.
//!
//! An order's token cost is fixed at creation and debited atomically with the
//! insert. Queue positions come from a monotonically increasing counter and
//! are never reused; priority affects read-time ordering only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, OrderId, PackageKey, ProfileId};

/// A service order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order id.
    pub id: OrderId,

    /// The paying account.
    pub account_id: AccountId,

    /// The customer profile the order is for.
    pub profile_id: ProfileId,

    /// The purchased package.
    pub package: PackageKey,

    /// Token cost, fixed at creation.
    pub cost_tokens: i64,

    /// Current status.
    pub status: OrderStatus,

    /// Queue position (strictly increasing, never reused).
    pub queue_position: u64,

    /// Priority orders are dequeued ahead of later non-priority positions.
    pub priority: bool,

    /// Set when this order reruns an earlier one.
    pub rerun_of: Option<OrderId>,

    /// Operator notes from the latest transition.
    pub notes: Option<String>,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// When the order was assigned.
    pub assigned_at: Option<DateTime<Utc>>,

    /// When the order was completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Order lifecycle states.
///
/// ```text
/// pending -> processing -> assigned -> completed -> refunded
///    |           |            |
///    +-----------+------------+--> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created and queued.
    Pending,

    /// Work has started.
    Processing,

    /// Assigned for delivery.
    Assigned,

    /// Finished; terminal except for the refund side exit.
    Completed,

    /// Cancelled before completion. Terminal; triggers a compensating refund.
    Cancelled,

    /// Refunded after completion. Terminal.
    Refunded,
}

impl OrderStatus {
    /// Whether a transition from `self` to `to` is legal.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Assigned | Self::Cancelled)
                | (Self::Assigned, Self::Completed | Self::Cancelled)
                | (Self::Completed, Self::Refunded)
        )
    }

    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether the order still occupies the work queue.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Assigned)
    }

    /// Whether entering this state returns the order's cost to the account.
    #[must_use]
    pub const fn triggers_refund(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}
