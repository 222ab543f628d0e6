//! User management service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, NewUser, UpdateUser, User, UserChanges, UserQuery},
    repository::LibraryStore,
};

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn LibraryStore>,
}

impl UsersService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.store.get_user(id).await
    }

    /// Search users
    pub async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        self.store.search_users(query).await
    }

    /// Create a new user
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;

        let new_user = NewUser {
            password_hash: self.hash_password(&user.password)?,
            name: user.name,
            email: user.email,
            username: user.username,
            role: user.role.unwrap_or_default(),
            status: user.status.unwrap_or_default(),
        };

        let created = self.store.create_user(&new_user).await?;
        tracing::info!(user_id = created.id, username = %created.username, "User created");
        Ok(created)
    }

    /// Update an existing user
    pub async fn update_user(&self, id: i32, user: UpdateUser) -> AppResult<User> {
        user.validate()?;

        let password_hash = match user.password {
            Some(ref password) => Some(self.hash_password(password)?),
            None => None,
        };

        let changes = UserChanges {
            name: user.name,
            email: user.email,
            username: user.username,
            password_hash,
            role: user.role,
            status: user.status,
        };

        self.store.update_user(id, &changes).await
    }

    /// Delete a user and their closed history, refused while copies are out
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        tx.user_for_update(id).await?;

        let open = tx.count_open_assignments(id).await?;
        if open > 0 {
            return Err(AppError::Conflict(format!(
                "User {} has {} open assignments",
                id, open
            )));
        }

        tx.delete_user(id).await?;
        tx.commit().await?;

        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}
