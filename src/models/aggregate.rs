//! Derived per-entity and per-category summaries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Totals derived from an entity's contract associations.
///
/// `is_fresh` holds only while the values match a recomputation from the
/// current association set; any association change clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAggregate {
    pub entity_id: i64,
    /// Sum of prices (cents) of contracts where the entity was contracted.
    pub total_earned: i64,
    /// Sum of prices (cents) of contracts where the entity was a contractor.
    pub total_expended: i64,
    pub last_activity: Option<NaiveDate>,
    pub is_fresh: bool,
}

impl EntityAggregate {
    pub fn stale(entity_id: i64) -> Self {
        Self {
            entity_id,
            total_earned: 0,
            total_expended: 0,
            last_activity: None,
            is_fresh: false,
        }
    }
}

/// Contracts classified directly under one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAggregate {
    pub count: i64,
    pub price_sum: i64,
}
