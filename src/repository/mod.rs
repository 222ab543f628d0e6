//! Repository layer: storage traits and their backends

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        assignment::{Assignment, NewAssignment},
        book::{Book, BookQuery, CreateBook},
        stats::LibraryStats,
        user::{NewUser, User, UserChanges, UserQuery},
    },
};

pub use memory::MemoryRepository;
pub use postgres::Repository;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Resolve optional paging parameters into (page, per_page, offset)
pub fn page_bounds(page: Option<i64>, per_page: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page, (page - 1).saturating_mul(per_page))
}

/// Persistence collaborator for the whole server.
///
/// Reads outside a transaction see committed state only. Every mutation of
/// copy counts goes through [`StoreTx`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Start a unit of work. Dropping the returned transaction without
    /// calling [`StoreTx::commit`] discards its writes.
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    /// Cheap reachability probe
    async fn ping(&self) -> AppResult<()>;

    async fn get_book(&self, id: i32) -> AppResult<Book>;
    async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)>;
    async fn create_book(&self, book: &CreateBook) -> AppResult<Book>;

    async fn get_user(&self, id: i32) -> AppResult<User>;
    async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)>;
    async fn create_user(&self, user: &NewUser) -> AppResult<User>;
    async fn update_user(&self, id: i32, changes: &UserChanges) -> AppResult<User>;

    async fn get_assignment(&self, id: i32) -> AppResult<Assignment>;
    /// Assignments of a user in creation order
    async fn list_assignments(&self, user_id: i32, open_only: bool) -> AppResult<Vec<Assignment>>;

    async fn stats(&self) -> AppResult<LibraryStats>;
}

/// One atomic unit of work. Rows read through the `*_for_update` methods
/// stay locked against other transactions until commit or drop.
#[async_trait]
pub trait StoreTx: Send {
    async fn book_for_update(&mut self, id: i32) -> AppResult<Book>;
    /// Persist name, type, language and both quantities of `book`
    async fn save_book(&mut self, book: &Book) -> AppResult<()>;
    async fn delete_book(&mut self, id: i32) -> AppResult<()>;

    async fn user_for_update(&mut self, id: i32) -> AppResult<User>;
    async fn delete_user(&mut self, id: i32) -> AppResult<()>;

    async fn assignment_for_update(&mut self, id: i32) -> AppResult<Assignment>;
    async fn insert_assignment(
        &mut self,
        assignment: &NewAssignment,
        created_at: DateTime<Utc>,
    ) -> AppResult<Assignment>;
    /// Persist `quantity_outstanding` and `returned_at`
    async fn save_assignment(&mut self, assignment: &Assignment) -> AppResult<()>;
    async fn count_open_assignments(&mut self, user_id: i32) -> AppResult<i64>;

    async fn commit(&mut self) -> AppResult<()>;
}
