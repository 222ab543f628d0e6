//! Inventory store: books and their copy counts

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::{LibraryStore, StoreTx},
};
use validator::Validate;

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn LibraryStore>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// Get a book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.store.get_book(id).await
    }

    /// Search books by name/type and language
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.store.search_books(query).await
    }

    /// Add a title to the catalog, all copies on the shelf
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let created = self.store.create_book(&book).await?;
        tracing::info!(book_id = created.id, total = created.total_quantity, "Book created");
        Ok(created)
    }

    /// Edit catalog fields. A total change is reconciled with borrowed copies.
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        update.validate()?;

        let mut tx = self.store.begin().await?;
        let mut book = tx.book_for_update(id).await?;
        book.apply_update(&update)?;
        tx.save_book(&book).await?;
        tx.commit().await?;

        tracing::info!(book_id = id, "Book updated");
        Ok(book)
    }

    /// Remove a title, refused while copies are out
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let book = tx.book_for_update(id).await?;

        let outstanding = book.outstanding_quantity();
        if outstanding > 0 {
            return Err(AppError::Conflict(format!(
                "Book {} still has {} borrowed copies",
                id, outstanding
            )));
        }

        tx.delete_book(id).await?;
        tx.commit().await?;

        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}

/// Take `qty` copies of a book off the shelf inside `tx`
pub async fn decrement_available(tx: &mut dyn StoreTx, id: i32, qty: i32) -> AppResult<Book> {
    let mut book = tx.book_for_update(id).await?;
    book.take_copies(qty)?;
    tx.save_book(&book).await?;
    Ok(book)
}

/// Put `qty` copies of a book back on the shelf inside `tx`
pub async fn increment_available(tx: &mut dyn StoreTx, id: i32, qty: i32) -> AppResult<Book> {
    let mut book = tx.book_for_update(id).await?;
    book.restore_copies(qty)?;
    tx.save_book(&book).await?;
    Ok(book)
}
