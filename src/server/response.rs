//! JSON response shapes and HTTP error mapping

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::store::Page;

/// Error returned by a route handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ApiMessage::failure(self.to_string()))).into_response()
    }
}

/// `{success, message}` body used by clear endpoints and every error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiMessage {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// One page of history
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    /// Records retained at the time of the read
    pub total: usize,
    pub offset: usize,
    /// Requested page size; 0 means everything after `offset`
    pub limit: usize,
}

impl<T> PageResponse<T> {
    pub fn new(page: Page<T>, query: PageQuery) -> Self {
        Self {
            items: page.items,
            total: page.total,
            offset: query.offset,
            limit: query.limit,
        }
    }
}

impl<T: Serialize> IntoResponse for PageResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Pagination window parsed from a query string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub offset: usize,
    /// 0 means no limit
    pub limit: usize,
}

impl PageQuery {
    /// Read `offset` and `limit` without ever rejecting the request
    ///
    /// Missing or unparsable values use the defaults, a negative offset is
    /// treated as 0 and a non-positive limit means "all remaining".
    pub fn from_params(params: &HashMap<String, String>, default_limit: usize) -> Self {
        let parse = |key: &str| params.get(key).and_then(|v| v.trim().parse::<i64>().ok());

        let offset = parse("offset")
            .map(|o| usize::try_from(o).unwrap_or(0))
            .unwrap_or(0);
        let limit = match parse("limit") {
            Some(l) if l > 0 => usize::try_from(l).unwrap_or(usize::MAX),
            Some(_) => 0,
            None => default_limit,
        };

        Self { offset, limit }
    }
}
