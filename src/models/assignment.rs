//! Assignment (borrow record) model and circulation requests

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Lifecycle of an assignment. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Open,
    Closed,
}

/// A borrow event: `quantity_borrowed` copies of one book lent to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Assignment {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub quantity_borrowed: i32,
    /// Copies not yet returned
    pub quantity_outstanding: i32,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Set when the last copy comes back
    pub returned_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn status(&self) -> AssignmentStatus {
        if self.quantity_outstanding > 0 {
            AssignmentStatus::Open
        } else {
            AssignmentStatus::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == AssignmentStatus::Open
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.due_date < today
    }

    /// Record `qty` returned copies, closing the assignment when none remain
    pub fn apply_return(&mut self, qty: i32, now: DateTime<Utc>) -> AppResult<()> {
        if qty <= 0 || qty > self.quantity_outstanding {
            return Err(AppError::InvalidReturnQuantity(format!(
                "Cannot return {} copies on assignment {} ({} outstanding)",
                qty, self.id, self.quantity_outstanding
            )));
        }
        self.quantity_outstanding -= qty;
        if self.quantity_outstanding == 0 {
            self.returned_at = Some(now);
        }
        Ok(())
    }
}

/// Fields for a new assignment row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub user_id: i32,
    pub book_id: i32,
    pub quantity: i32,
    pub due_date: NaiveDate,
}

/// Assignment joined with the borrowed book, as shown on the borrowed books screen
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignmentDetails {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub book_name: String,
    pub quantity_borrowed: i32,
    pub quantity_outstanding: i32,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
    pub is_overdue: bool,
}

impl AssignmentDetails {
    pub fn new(assignment: Assignment, book_name: String, today: NaiveDate) -> Self {
        Self {
            status: assignment.status(),
            is_overdue: assignment.is_overdue(today),
            id: assignment.id,
            user_id: assignment.user_id,
            book_id: assignment.book_id,
            book_name,
            quantity_borrowed: assignment.quantity_borrowed,
            quantity_outstanding: assignment.quantity_outstanding,
            due_date: assignment.due_date,
            created_at: assignment.created_at,
            returned_at: assignment.returned_at,
        }
    }
}

/// One line of a borrow request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BorrowItem {
    pub book_id: i32,
    pub quantity: i32,
}

/// Borrow request as received on the wire
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub user_id: Option<i32>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<BorrowItem>,
}

/// Borrow request with its required fields present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowOrder {
    pub user_id: i32,
    pub due_date: NaiveDate,
    pub items: Vec<BorrowItem>,
}

impl BorrowRequest {
    /// Check the request shape. Stock is checked later against locked rows.
    pub fn validate(self, max_items: usize) -> AppResult<BorrowOrder> {
        let user_id = self
            .user_id
            .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;
        let due_date = self
            .due_date
            .ok_or_else(|| AppError::Validation("due_date is required".to_string()))?;

        if self.items.is_empty() {
            return Err(AppError::Validation(
                "At least one book is required".to_string(),
            ));
        }
        if self.items.len() > max_items {
            return Err(AppError::Validation(format!(
                "A borrow request accepts at most {} books",
                max_items
            )));
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity <= 0) {
            return Err(AppError::InvalidQuantity(format!(
                "Quantity for book {} must be positive, got {}",
                item.book_id, item.quantity
            )));
        }

        Ok(BorrowOrder {
            user_id,
            due_date,
            items: self.items,
        })
    }
}

/// Return request for one assignment
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnRequest {
    pub user_id: i32,
    pub book_id: i32,
    pub quantity: i32,
}
