//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{assignments, books, health, stats, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "1.0.0",
        description = "Library borrow/return REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Assignments
        assignments::get_user_assignments,
        assignments::borrow_books,
        assignments::return_books,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            books::BookList,
            // Users
            crate::models::user::User,
            crate::models::user::UserRole,
            crate::models::user::UserStatus,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            users::UserList,
            // Assignments
            crate::models::assignment::Assignment,
            crate::models::assignment::AssignmentStatus,
            crate::models::assignment::AssignmentDetails,
            crate::models::assignment::BorrowItem,
            crate::models::assignment::BorrowRequest,
            crate::models::assignment::ReturnRequest,
            // Stats
            crate::models::stats::LibraryStats,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book inventory management"),
        (name = "users", description = "User management"),
        (name = "assignments", description = "Borrowing and returning books"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
