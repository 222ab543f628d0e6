//! Dashboard statistics

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Library-wide counters shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LibraryStats {
    pub user_count: i64,
    /// Number of distinct titles
    pub book_count: i64,
    pub total_copies: i64,
    pub borrowed_copies: i64,
    pub available_copies: i64,
    pub open_assignments: i64,
    pub overdue_assignments: i64,
}
