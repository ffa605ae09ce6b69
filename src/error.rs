//! Error types for the render pipeline, the VM, and app-handler startup.
//!
//! ## Error Hierarchy
//!
//! - **Domain errors**: [`AppError`] covers every failure named in the
//!   error taxonomy, from config validation through VM execution.
//! - **HTTP boundary**: [`AppError`] implements `actix_web::ResponseError`
//!   directly; every variant except [`AppError::Config`] downgrades to a
//!   503 response. The app handler never tries to recover past a render
//!   failure other than a single resource load — see [`AppError::Store`].
//! - `Config` errors are fatal at `Init`/`Start` and are never turned
//!   into an HTTP response; they surface as a plain `Result` from those
//!   calls instead.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Domain error type for the render pipeline, the VM, and the app handler.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid/missing configuration, an uncompilable rule regex, or an
    /// index/bundle path that can't be opened, stat'd, or is a directory.
    /// Fatal at `Init`.
    #[error("configuration error: {0}")]
    Config(String),

    /// Index or bundle stat/read failed after startup.
    #[error("read error: {0}")]
    Read(String),

    /// Host-API wiring or per-request VM binding failed.
    #[error("vm configure error: {0}")]
    VmConfigure(String),

    /// The bundle threw a JS exception.
    #[error("vm execute error")]
    VmExecute {
        /// Logged at debug level only; never surfaced to the client.
        stack: String,
    },

    /// Execution exceeded `config.timeout`.
    #[error("vm execution timed out")]
    VmTimeout,

    /// `container`/`body`/`head` not found in the index template, or
    /// HTML serialization failed.
    #[error("render error: {0}")]
    Render(String),

    /// A rule's resource failed to load. Recovered locally: the
    /// offending state entry becomes `{"error":"unknown resource"}` and
    /// the request's `valid` flag clears, downgrading the final status
    /// to 503 — this variant itself never aborts the render.
    #[error("unknown resource")]
    Store,
}

impl AppError {
    /// True for the single error kind the rule engine recovers from
    /// locally instead of aborting the whole render.
    pub fn is_store(&self) -> bool {
        matches!(self, AppError::Store)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::VmExecute { stack } = self {
            tracing::debug!(stack = %stack, "vm execute error");
        }
        HttpResponse::build(self.status_code()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_500_everything_else_is_503() {
        assert_eq!(
            AppError::Config("bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        for err in [
            AppError::Read("x".into()),
            AppError::VmConfigure("x".into()),
            AppError::VmExecute { stack: "x".into() },
            AppError::VmTimeout,
            AppError::Render("x".into()),
            AppError::Store,
        ] {
            assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[test]
    fn only_store_is_locally_recoverable() {
        assert!(AppError::Store.is_store());
        assert!(!AppError::VmTimeout.is_store());
    }
}
