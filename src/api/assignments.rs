//! Borrow and return endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::AppJson;
use crate::{
    error::AppResult,
    models::assignment::{Assignment, AssignmentDetails, BorrowRequest, ReturnRequest},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssignmentsQuery {
    /// Also list fully returned assignments
    pub include_closed: Option<bool>,
}

/// Assignments held by a user, with book names
#[utoipa::path(
    get,
    path = "/users/{id}/assignments",
    tag = "assignments",
    params(
        ("id" = i32, Path, description = "User ID"),
        AssignmentsQuery
    ),
    responses(
        (status = 200, description = "User's assignments in creation order", body = Vec<AssignmentDetails>),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user_assignments(
    State(state): State<crate::AppState>,
    Path(user_id): Path<i32>,
    Query(query): Query<AssignmentsQuery>,
) -> AppResult<Json<Vec<AssignmentDetails>>> {
    let details = state
        .services
        .ledger
        .assignment_details(user_id, query.include_closed.unwrap_or(false))
        .await?;
    Ok(Json(details))
}

/// Borrow one or more books for a user, all or nothing
#[utoipa::path(
    post,
    path = "/assignments",
    tag = "assignments",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Assignments created, one per requested line", body = Vec<Assignment>),
        (status = 400, description = "Malformed request or non-positive quantity", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Not enough copies available or user inactive", body = crate::error::ErrorResponse),
        (status = 503, description = "Rows locked by another request", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_books(
    State(state): State<crate::AppState>,
    AppJson(request): AppJson<BorrowRequest>,
) -> AppResult<(StatusCode, Json<Vec<Assignment>>)> {
    let assignments = state.services.circulation.borrow_many(request).await?;
    Ok((StatusCode::CREATED, Json(assignments)))
}

/// Return copies against an assignment
#[utoipa::path(
    post,
    path = "/assignments/{id}/return",
    tag = "assignments",
    params(
        ("id" = i32, Path, description = "Assignment ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Copies returned", body = Assignment),
        (status = 400, description = "Non-positive quantity", body = crate::error::ErrorResponse),
        (status = 404, description = "Assignment not found for this user and book", body = crate::error::ErrorResponse),
        (status = 409, description = "More copies than outstanding", body = crate::error::ErrorResponse),
        (status = 503, description = "Rows locked by another request", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_books(
    State(state): State<crate::AppState>,
    Path(assignment_id): Path<i32>,
    AppJson(request): AppJson<ReturnRequest>,
) -> AppResult<Json<Assignment>> {
    let assignment = state
        .services
        .circulation
        .return_books(assignment_id, request)
        .await?;
    Ok(Json(assignment))
}
