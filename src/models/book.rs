//! Book (inventory) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book record with its copy counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub book_type: String,
    pub language: String,
    /// Copies owned by the library
    pub total_quantity: i32,
    /// Copies currently on the shelf
    pub available_quantity: i32,
}

impl Book {
    /// Copies currently held by borrowers
    pub fn outstanding_quantity(&self) -> i32 {
        self.total_quantity - self.available_quantity
    }

    /// Take `qty` copies off the shelf
    pub fn take_copies(&mut self, qty: i32) -> AppResult<()> {
        if qty <= 0 {
            return Err(AppError::InvalidQuantity(format!(
                "Quantity for book {} must be positive, got {}",
                self.id, qty
            )));
        }
        if qty > self.available_quantity {
            return Err(AppError::InsufficientStock {
                book_id: self.id,
                requested: qty,
                available: self.available_quantity,
            });
        }
        self.available_quantity -= qty;
        Ok(())
    }

    /// Put `qty` returned copies back on the shelf
    pub fn restore_copies(&mut self, qty: i32) -> AppResult<()> {
        if qty <= 0 {
            return Err(AppError::InvalidReturnQuantity(format!(
                "Returned quantity must be positive, got {}",
                qty
            )));
        }
        if self.available_quantity + qty > self.total_quantity {
            return Err(AppError::OverReturn(format!(
                "Returning {} copies of book {} would exceed its total of {}",
                qty, self.id, self.total_quantity
            )));
        }
        self.available_quantity += qty;
        Ok(())
    }

    /// Apply catalog edits. A new total keeps the borrowed copies outstanding.
    pub fn apply_update(&mut self, update: &UpdateBook) -> AppResult<()> {
        if let Some(total) = update.total_quantity {
            let outstanding = self.outstanding_quantity();
            if total < outstanding {
                return Err(AppError::Conflict(format!(
                    "Total quantity {} is below the {} copies currently borrowed",
                    total, outstanding
                )));
            }
            self.total_quantity = total;
            self.available_quantity = total - outstanding;
        }
        if let Some(ref name) = update.name {
            self.name = name.clone();
        }
        if let Some(ref book_type) = update.book_type {
            self.book_type = book_type.clone();
        }
        if let Some(ref language) = update.language {
            self.language = language.clone();
        }
        Ok(())
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Type is required"))]
    pub book_type: String,
    #[validate(length(min = 1, message = "Language is required"))]
    pub language: String,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub total_quantity: i32,
}

/// Update book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Type cannot be empty"))]
    pub book_type: Option<String>,
    #[validate(length(min = 1, message = "Language cannot be empty"))]
    pub language: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub total_quantity: Option<i32>,
}

/// Book query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive match on name or type
    pub search: Option<String>,
    pub language: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl BookQuery {
    /// Does `book` pass the search and language filters
    pub fn matches(&self, book: &Book) -> bool {
        let search_ok = self.search.as_deref().map_or(true, |term| {
            let term = term.to_lowercase();
            book.name.to_lowercase().contains(&term)
                || book.book_type.to_lowercase().contains(&term)
        });
        let language_ok = self
            .language
            .as_deref()
            .map_or(true, |lang| book.language.eq_ignore_ascii_case(lang));
        search_ok && language_ok
    }
}
