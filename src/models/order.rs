use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::constants::OrderState;

/// Sequential order identifier allocated by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order represents one unit of kitchen work
///
/// Orders are never destroyed. They live in the pending collection of the
/// dispatch queue until a worker completes them, then move to the completed
/// collection exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub is_vip: bool,
    pub content: String,
    pub is_processing: bool,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new pending order
    pub fn new(id: OrderId, is_vip: bool, content: impl Into<String>) -> Self {
        Self {
            id,
            is_vip,
            content: content.into(),
            is_processing: false,
            is_complete: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Current lifecycle state derived from the processing and completion flags
    pub fn state(&self) -> OrderState {
        if self.is_complete {
            OrderState::Complete
        } else if self.is_processing {
            OrderState::InFlight
        } else {
            OrderState::Pending
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == OrderState::Pending
    }

    /// Priority comparator: VIP orders sort first, everything else compares equal
    ///
    /// Used with a stable sort so orders of equal priority keep insertion order.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        other.is_vip.cmp(&self.is_vip)
    }
}
