//! Assignment ledger: borrow records and their returns

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    error::AppResult,
    models::assignment::{Assignment, AssignmentDetails, NewAssignment},
    repository::{LibraryStore, StoreTx},
};

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LibraryStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// Open assignments of a user, oldest first
    pub async fn list_open_assignments(&self, user_id: i32) -> AppResult<Vec<Assignment>> {
        self.list_assignments(user_id, false).await
    }

    /// Assignments of a user in creation order, optionally with closed history
    pub async fn list_assignments(
        &self,
        user_id: i32,
        include_closed: bool,
    ) -> AppResult<Vec<Assignment>> {
        // Verify user exists
        self.store.get_user(user_id).await?;
        self.store.list_assignments(user_id, !include_closed).await
    }

    /// Assignments joined with book names for display
    pub async fn assignment_details(
        &self,
        user_id: i32,
        include_closed: bool,
    ) -> AppResult<Vec<AssignmentDetails>> {
        let assignments = self.list_assignments(user_id, include_closed).await?;
        let today = Utc::now().date_naive();

        let mut names: HashMap<i32, String> = HashMap::new();
        let mut details = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let name = match names.get(&assignment.book_id) {
                Some(name) => name.clone(),
                None => {
                    let book = self.store.get_book(assignment.book_id).await?;
                    names.insert(book.id, book.name.clone());
                    book.name
                }
            };
            details.push(AssignmentDetails::new(assignment, name, today));
        }
        Ok(details)
    }
}

/// Record a new borrow inside `tx`; all copies start outstanding
pub async fn create_assignment(
    tx: &mut dyn StoreTx,
    user_id: i32,
    book_id: i32,
    qty: i32,
    due_date: NaiveDate,
    now: DateTime<Utc>,
) -> AppResult<Assignment> {
    let new = NewAssignment {
        user_id,
        book_id,
        quantity: qty,
        due_date,
    };
    tx.insert_assignment(&new, now).await
}

/// Record `qty` returned copies on an assignment inside `tx`
pub async fn apply_return(
    tx: &mut dyn StoreTx,
    assignment_id: i32,
    qty: i32,
    now: DateTime<Utc>,
) -> AppResult<Assignment> {
    let mut assignment = tx.assignment_for_update(assignment_id).await?;
    assignment.apply_return(qty, now)?;
    tx.save_assignment(&assignment).await?;
    Ok(assignment)
}
