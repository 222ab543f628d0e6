//! In-memory backend for development and tests.
//!
//! Transactions run one at a time: `begin` takes the store lock and works on a
//! copy of the state, `commit` swaps the copy in, dropping discards it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

use super::{page_bounds, LibraryStore, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        assignment::{Assignment, NewAssignment},
        book::{Book, BookQuery, CreateBook},
        stats::LibraryStats,
        user::{NewUser, User, UserChanges, UserQuery},
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: BTreeMap<i32, Book>,
    users: BTreeMap<i32, User>,
    assignments: BTreeMap<i32, Assignment>,
    last_book_id: i32,
    last_user_id: i32,
    last_assignment_id: i32,
}

impl MemoryState {
    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn user(&self, id: i32) -> AppResult<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    fn assignment(&self, id: i32) -> AppResult<&Assignment> {
        self.assignments
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Assignment with id {} not found", id)))
    }

    fn ensure_username_free(&self, username: &str, except: Option<i32>) -> AppResult<()> {
        let taken = self
            .users
            .values()
            .any(|u| u.username == username && Some(u.id) != except);
        if taken {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        Ok(())
    }
}

/// Repository keeping all records in process memory
#[derive(Clone)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl MemoryRepository {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            lock_timeout,
        }
    }

    async fn read(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        tokio::time::timeout(self.lock_timeout, self.state.lock())
            .await
            .map_err(|_| AppError::Busy("Store is busy, retry later".to_string()))
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

fn paginate<T>(items: Vec<T>, page: Option<i64>, per_page: Option<i64>) -> (Vec<T>, i64) {
    let (_, per_page, offset) = page_bounds(page, per_page);
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(per_page as usize)
        .collect();
    (page, total)
}

#[async_trait]
impl LibraryStore for MemoryRepository {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| AppError::Busy("Store is busy, retry later".to_string()))?;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            committed: false,
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        self.read().await.map(|_| ())
    }

    async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.read().await?.book(id).cloned()
    }

    async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let state = self.read().await?;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        books.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(books, query.page, query.per_page))
    }

    async fn create_book(&self, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.read().await?;
        state.last_book_id += 1;
        let created = Book {
            id: state.last_book_id,
            name: book.name.clone(),
            book_type: book.book_type.clone(),
            language: book.language.clone(),
            total_quantity: book.total_quantity,
            available_quantity: book.total_quantity,
        };
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: i32) -> AppResult<User> {
        self.read().await?.user(id).cloned()
    }

    async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let state = self.read().await?;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| query.search.as_deref().map_or(true, |term| u.matches(term)))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(users, query.page, query.per_page))
    }

    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.read().await?;
        state.ensure_username_free(&user.username, None)?;
        state.last_user_id += 1;
        let created = User {
            id: state.last_user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            status: user.status,
            password_hash: Some(user.password_hash.clone()),
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i32, changes: &UserChanges) -> AppResult<User> {
        let mut state = self.read().await?;
        state.user(id)?;
        if let Some(ref username) = changes.username {
            state.ensure_username_free(username, Some(id))?;
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        changes.apply(user);
        Ok(user.clone())
    }

    async fn get_assignment(&self, id: i32) -> AppResult<Assignment> {
        self.read().await?.assignment(id).cloned()
    }

    async fn list_assignments(&self, user_id: i32, open_only: bool) -> AppResult<Vec<Assignment>> {
        let state = self.read().await?;
        Ok(state
            .assignments
            .values()
            .filter(|a| a.user_id == user_id && (!open_only || a.is_open()))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> AppResult<LibraryStats> {
        let state = self.read().await?;
        let today = Utc::now().date_naive();
        let sum = |f: fn(&Book) -> i32| state.books.values().map(|b| f(b) as i64).sum::<i64>();

        Ok(LibraryStats {
            user_count: state.users.len() as i64,
            book_count: state.books.len() as i64,
            total_copies: sum(|b| b.total_quantity),
            borrowed_copies: sum(|b| b.outstanding_quantity()),
            available_copies: sum(|b| b.available_quantity),
            open_assignments: state.assignments.values().filter(|a| a.is_open()).count() as i64,
            overdue_assignments: state
                .assignments
                .values()
                .filter(|a| a.is_overdue(today))
                .count() as i64,
        })
    }
}

/// Exclusive transaction over a working copy of the store
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    committed: bool,
}

impl MemoryTx {
    fn ensure_active(&self) -> AppResult<()> {
        if self.committed {
            return Err(AppError::Internal("Transaction already committed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn book_for_update(&mut self, id: i32) -> AppResult<Book> {
        self.ensure_active()?;
        self.working.book(id).cloned()
    }

    async fn save_book(&mut self, book: &Book) -> AppResult<()> {
        self.ensure_active()?;
        self.working.book(book.id)?;
        self.working.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn delete_book(&mut self, id: i32) -> AppResult<()> {
        self.ensure_active()?;
        self.working.book(id)?;
        self.working.books.remove(&id);
        self.working.assignments.retain(|_, a| a.book_id != id);
        Ok(())
    }

    async fn user_for_update(&mut self, id: i32) -> AppResult<User> {
        self.ensure_active()?;
        self.working.user(id).cloned()
    }

    async fn delete_user(&mut self, id: i32) -> AppResult<()> {
        self.ensure_active()?;
        self.working.user(id)?;
        self.working.users.remove(&id);
        self.working.assignments.retain(|_, a| a.user_id != id);
        Ok(())
    }

    async fn assignment_for_update(&mut self, id: i32) -> AppResult<Assignment> {
        self.ensure_active()?;
        self.working.assignment(id).cloned()
    }

    async fn insert_assignment(
        &mut self,
        assignment: &NewAssignment,
        created_at: DateTime<Utc>,
    ) -> AppResult<Assignment> {
        self.ensure_active()?;
        self.working.user(assignment.user_id)?;
        self.working.book(assignment.book_id)?;
        if assignment.quantity <= 0 {
            return Err(AppError::InvalidQuantity(format!(
                "Quantity must be positive, got {}",
                assignment.quantity
            )));
        }

        self.working.last_assignment_id += 1;
        let created = Assignment {
            id: self.working.last_assignment_id,
            user_id: assignment.user_id,
            book_id: assignment.book_id,
            quantity_borrowed: assignment.quantity,
            quantity_outstanding: assignment.quantity,
            due_date: assignment.due_date,
            created_at,
            returned_at: None,
        };
        self.working.assignments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_assignment(&mut self, assignment: &Assignment) -> AppResult<()> {
        self.ensure_active()?;
        let stored = self
            .working
            .assignments
            .get_mut(&assignment.id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Assignment with id {} not found", assignment.id))
            })?;
        stored.quantity_outstanding = assignment.quantity_outstanding;
        stored.returned_at = assignment.returned_at;
        Ok(())
    }

    async fn count_open_assignments(&mut self, user_id: i32) -> AppResult<i64> {
        self.ensure_active()?;
        Ok(self
            .working
            .assignments
            .values()
            .filter(|a| a.user_id == user_id && a.is_open())
            .count() as i64)
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.ensure_active()?;
        *self.guard = std::mem::take(&mut self.working);
        self.committed = true;
        Ok(())
    }
}
