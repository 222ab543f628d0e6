//! PostgreSQL backend

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, Transaction};

use super::{page_bounds, LibraryStore, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        assignment::{Assignment, NewAssignment},
        book::{Book, BookQuery, CreateBook},
        stats::LibraryStats,
        user::{NewUser, User, UserChanges, UserQuery, UserRow},
    },
};

const BOOK_COLUMNS: &str = "id, name, book_type, language, total_quantity, available_quantity";
const USER_COLUMNS: &str = "id, name, email, username, role, status, password_hash";
const ASSIGNMENT_COLUMNS: &str =
    "id, user_id, book_id, quantity_borrowed, quantity_outstanding, due_date, created_at, returned_at";

/// Repository backed by a Postgres connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    lock_timeout: Duration,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

fn book_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

fn user_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("User with id {} not found", id))
}

fn assignment_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Assignment with id {} not found", id))
}

#[async_trait]
impl LibraryStore for Repository {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let mut tx = self.pool.begin().await?;

        // SET LOCAL does not take bind parameters
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;

        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_book(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| book_not_found(id))
    }

    async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let (_, per_page, offset) = page_bounds(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            conditions.push(format!(
                "(LOWER(name) LIKE ${} OR LOWER(book_type) LIKE ${})",
                params.len(),
                params.len()
            ));
        }

        if let Some(ref language) = query.language {
            params.push(language.to_lowercase());
            conditions.push(format!("LOWER(language) = ${}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT {} FROM books {} ORDER BY name, id LIMIT {} OFFSET {}",
            BOOK_COLUMNS, where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    async fn create_book(&self, book: &CreateBook) -> AppResult<Book> {
        let row = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (name, book_type, language, total_quantity, available_quantity)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.name)
        .bind(&book.book_type)
        .bind(&book.language)
        .bind(book.total_quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_user(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| user_not_found(id))?
            .try_into()
    }

    async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let (_, per_page, offset) = page_bounds(query.page, query.per_page);

        let (where_clause, param) = match query.search {
            Some(ref search) => (
                "WHERE LOWER(name) LIKE $1 OR LOWER(email) LIKE $1 OR LOWER(username) LIKE $1 \
                 OR role LIKE $1 OR status LIKE $1",
                Some(format!("%{}%", search.to_lowercase())),
            ),
            None => ("", None),
        };

        let count_query = format!("SELECT COUNT(*) FROM users {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(ref param) = param {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT {} FROM users {} ORDER BY name, id LIMIT {} OFFSET {}",
            USER_COLUMNS, where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, UserRow>(&select_query);
        if let Some(ref param) = param {
            select_builder = select_builder.bind(param);
        }
        let users = select_builder
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((users, total))
    }

    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, username, password_hash, role, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn update_user(&self, id: i32, changes: &UserChanges) -> AppResult<User> {
        let role = changes.role.map(|r| r.as_str());
        let status = changes.status.map(|s| s.as_str());

        let mut sets = Vec::new();
        let mut idx = 1;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(changes.name, "name");
        add_field!(changes.email, "email");
        add_field!(changes.username, "username");
        add_field!(changes.password_hash, "password_hash");
        add_field!(role, "role");
        add_field!(status, "status");

        if sets.is_empty() {
            return self.get_user(id).await;
        }

        let query = format!(
            "UPDATE users SET {} WHERE id = ${} RETURNING {}",
            sets.join(", "),
            idx,
            USER_COLUMNS
        );

        let mut builder = sqlx::query_as::<_, UserRow>(&query);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(val) = &$field {
                    builder = builder.bind(val.clone());
                }
            };
        }

        bind_field!(changes.name);
        bind_field!(changes.email);
        bind_field!(changes.username);
        bind_field!(changes.password_hash);
        bind_field!(role);
        bind_field!(status);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| user_not_found(id))?
            .try_into()
    }

    async fn get_assignment(&self, id: i32) -> AppResult<Assignment> {
        sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {} FROM assignments WHERE id = $1",
            ASSIGNMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| assignment_not_found(id))
    }

    async fn list_assignments(&self, user_id: i32, open_only: bool) -> AppResult<Vec<Assignment>> {
        let filter = if open_only {
            "AND quantity_outstanding > 0"
        } else {
            ""
        };

        let rows = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {} FROM assignments WHERE user_id = $1 {} ORDER BY id",
            ASSIGNMENT_COLUMNS, filter
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn stats(&self) -> AppResult<LibraryStats> {
        let stats = sqlx::query_as::<_, LibraryStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS user_count,
                (SELECT COUNT(*) FROM books) AS book_count,
                (SELECT COALESCE(SUM(total_quantity), 0)::bigint FROM books) AS total_copies,
                (SELECT COALESCE(SUM(total_quantity - available_quantity), 0)::bigint FROM books)
                    AS borrowed_copies,
                (SELECT COALESCE(SUM(available_quantity), 0)::bigint FROM books) AS available_copies,
                (SELECT COUNT(*) FROM assignments WHERE quantity_outstanding > 0) AS open_assignments,
                (SELECT COUNT(*) FROM assignments
                    WHERE quantity_outstanding > 0 AND due_date < CURRENT_DATE) AS overdue_assignments
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

/// Transaction over one pooled connection
pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn book_for_update(&mut self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1 FOR UPDATE",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| book_not_found(id))
    }

    async fn save_book(&mut self, book: &Book) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET name = $1, book_type = $2, language = $3,
                total_quantity = $4, available_quantity = $5
            WHERE id = $6
            "#,
        )
        .bind(&book.name)
        .bind(&book.book_type)
        .bind(&book.language)
        .bind(book.total_quantity)
        .bind(book.available_quantity)
        .bind(book.id)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(book_not_found(book.id));
        }
        Ok(())
    }

    async fn delete_book(&mut self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(book_not_found(id));
        }
        Ok(())
    }

    async fn user_for_update(&mut self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| user_not_found(id))?
        .try_into()
    }

    async fn delete_user(&mut self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(user_not_found(id));
        }
        Ok(())
    }

    async fn assignment_for_update(&mut self, id: i32) -> AppResult<Assignment> {
        sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {} FROM assignments WHERE id = $1 FOR UPDATE",
            ASSIGNMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| assignment_not_found(id))
    }

    async fn insert_assignment(
        &mut self,
        assignment: &NewAssignment,
        created_at: DateTime<Utc>,
    ) -> AppResult<Assignment> {
        let row = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            INSERT INTO assignments
                (user_id, book_id, quantity_borrowed, quantity_outstanding, due_date, created_at)
            VALUES ($1, $2, $3, $3, $4, $5)
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment.user_id)
        .bind(assignment.book_id)
        .bind(assignment.quantity)
        .bind(assignment.due_date)
        .bind(created_at)
        .fetch_one(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn save_assignment(&mut self, assignment: &Assignment) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE assignments SET quantity_outstanding = $1, returned_at = $2 WHERE id = $3",
        )
        .bind(assignment.quantity_outstanding)
        .bind(assignment.returned_at)
        .bind(assignment.id)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(assignment_not_found(assignment.id));
        }
        Ok(())
    }

    async fn count_open_assignments(&mut self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM assignments WHERE user_id = $1 AND quantity_outstanding > 0",
        )
        .bind(user_id)
        .fetch_one(self.conn()?)
        .await?;
        Ok(count)
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}
