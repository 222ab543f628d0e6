//! Borrow/return coordinator.
//!
//! Each request runs in a single store transaction: the rows it touches are
//! locked, validated, mutated, and committed together, or nothing is written.
//! Books are always locked in ascending id order.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use super::{inventory, ledger};
use crate::{
    error::{AppError, AppResult},
    models::assignment::{Assignment, BorrowOrder, BorrowRequest, ReturnRequest},
    repository::{LibraryStore, StoreTx},
};

#[derive(Clone)]
pub struct CirculationService {
    store: Arc<dyn LibraryStore>,
    max_items_per_request: usize,
}

impl CirculationService {
    pub fn new(store: Arc<dyn LibraryStore>, max_items_per_request: usize) -> Self {
        Self {
            store,
            max_items_per_request,
        }
    }

    /// Lend every requested item or none of them
    pub async fn borrow_many(&self, request: BorrowRequest) -> AppResult<Vec<Assignment>> {
        let result = match request.validate(self.max_items_per_request) {
            Ok(order) => self.commit_borrow(order).await,
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            tracing::debug!(error = %e, "Borrow rejected");
        }
        result
    }

    async fn commit_borrow(&self, order: BorrowOrder) -> AppResult<Vec<Assignment>> {
        let mut requested: BTreeMap<i32, i32> = BTreeMap::new();
        for item in &order.items {
            let total = requested.entry(item.book_id).or_insert(0);
            *total = total.checked_add(item.quantity).ok_or_else(|| {
                AppError::InvalidQuantity(format!("Quantity for book {} is too large", item.book_id))
            })?;
        }

        let mut tx = self.store.begin().await?;

        let user = tx.user_for_update(order.user_id).await?;
        if !user.is_active() {
            return Err(AppError::Conflict(format!(
                "User {} is inactive and cannot borrow",
                user.id
            )));
        }

        // Check every book before touching any of them
        for (&book_id, &qty) in &requested {
            let book = tx.book_for_update(book_id).await?;
            if qty > book.available_quantity {
                return Err(AppError::InsufficientStock {
                    book_id,
                    requested: qty,
                    available: book.available_quantity,
                });
            }
        }

        for (&book_id, &qty) in &requested {
            inventory::decrement_available(tx.as_mut(), book_id, qty).await?;
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let assignment = ledger::create_assignment(
                tx.as_mut(),
                order.user_id,
                item.book_id,
                item.quantity,
                order.due_date,
                now,
            )
            .await?;
            created.push(assignment);
        }

        tx.commit().await?;

        tracing::info!(
            user_id = order.user_id,
            assignments = created.len(),
            copies = requested.values().sum::<i32>(),
            due_date = %order.due_date,
            "Borrow committed"
        );
        Ok(created)
    }

    /// Return copies against one assignment
    pub async fn return_books(
        &self,
        assignment_id: i32,
        request: ReturnRequest,
    ) -> AppResult<Assignment> {
        let result = self.commit_return(assignment_id, &request).await;

        if let Err(ref e) = result {
            tracing::debug!(assignment_id, error = %e, "Return rejected");
        }
        result
    }

    async fn commit_return(&self, assignment_id: i32, request: &ReturnRequest) -> AppResult<Assignment> {
        if request.quantity <= 0 {
            return Err(AppError::InvalidReturnQuantity(format!(
                "Returned quantity must be positive, got {}",
                request.quantity
            )));
        }

        let mut tx = self.store.begin().await?;

        let assignment = tx.assignment_for_update(assignment_id).await?;
        if assignment.user_id != request.user_id || assignment.book_id != request.book_id {
            return Err(AppError::NotFound(format!(
                "Assignment {} not found for user {} and book {}",
                assignment_id, request.user_id, request.book_id
            )));
        }
        if request.quantity > assignment.quantity_outstanding {
            return Err(AppError::OverReturn(format!(
                "Cannot return {} copies, only {} outstanding on assignment {}",
                request.quantity, assignment.quantity_outstanding, assignment_id
            )));
        }

        let updated = ledger::apply_return(tx.as_mut(), assignment_id, request.quantity, Utc::now()).await?;
        inventory::increment_available(tx.as_mut(), assignment.book_id, request.quantity).await?;

        tx.commit().await?;

        tracing::info!(
            assignment_id,
            user_id = request.user_id,
            book_id = request.book_id,
            returned = request.quantity,
            outstanding = updated.quantity_outstanding,
            "Return committed"
        );
        Ok(updated)
    }
}
