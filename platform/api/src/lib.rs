use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use serde::Serialize;
use thiserror::Error;

/// Shared result type for resolver internals.
pub type ApiResult<T> = Result<T, ApiError>;

/// One rejected input field, surfaced under the `fields` extension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("login required")]
    Unauthenticated,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation failed")]
    Validation(Vec<FieldIssue>),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotImplemented(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::NotImplemented(_) => "NOT_IMPLEMENTED",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldIssue {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            ApiError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(source) = self {
            tracing::error!(error = ?source, "internal error while resolving request");
        }
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::Validation(issues) = self {
            let fields = async_graphql::to_value(issues).unwrap_or(async_graphql::Value::Null);
            err = err.extend_with(|_err, e| {
                e.set("fields", fields);
            });
        }
        err
    }
}

/// Lift an [`ApiResult`] into a resolver result, keeping the error code.
pub trait IntoGraphql<T> {
    fn into_graphql(self) -> async_graphql::Result<T>;
}

impl<T> IntoGraphql<T> for ApiResult<T> {
    fn into_graphql(self) -> async_graphql::Result<T> {
        self.map_err(|err| err.extend())
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}
