//! Error types for the REST API.
//!
//! Every failure leaves the server as `{"code": "...", "message": "..."}`
//! with a status from this table:
//!
//! ```text
//! ┌──────────────────────────────┬────────┐
//! │ Kind                         │ Status │
//! ├──────────────────────────────┼────────┤
//! │ validation, bad input        │ 400    │
//! │ missing/invalid token        │ 401    │
//! │ not allowed                  │ 403    │
//! │ unknown resource             │ 404    │
//! │ state conflict               │ 409    │
//! │ insufficient resources       │ 422    │
//! │ storage / internal           │ 500    │
//! └──────────────────────────────┴────────┘
//! ```
//!
//! Storage messages are logged and never sent to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use bazaar_core::CoreError;
use bazaar_db::DbError;
use bazaar_market::MarketError;

/// Stable, machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400
    ValidationError,
    BadRequest,
    EmptyCart,
    CartTooLarge,
    InvalidAmount,
    ProductNotInOrder,
    ProofRequired,
    YearRequiredForMonthFilter,
    AmountMismatch,
    // 401 / 403
    Unauthorized,
    Forbidden,
    AccessDenied,
    // 404
    NotFound,
    ProductNotFound,
    CartItemNotFound,
    OrderNotFound,
    OrdersNotFound,
    ReportNotFound,
    WithdrawalNotFound,
    BankCardNotFound,
    NoDefaultBankCard,
    WalletNotFound,
    PaymentNotFound,
    NotificationNotFound,
    // 409
    Conflict,
    ProductUnavailable,
    AlreadyPurchased,
    OrderStateConflict,
    OrderNotCompleted,
    ReportWindowExpired,
    AlreadyReported,
    ReportAlreadyResolved,
    ReportNotAwaitingInfo,
    IneligibleOrders,
    AlreadyProcessed,
    PaymentAlreadySettled,
    // 422
    InsufficientBalance,
    ZeroAmount,
    // 500
    InternalError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        use ErrorCode::*;
        match self {
            ValidationError | BadRequest | EmptyCart | CartTooLarge | InvalidAmount | ProductNotInOrder
            | ProofRequired | YearRequiredForMonthFilter | AmountMismatch => StatusCode::BAD_REQUEST,

            Unauthorized => StatusCode::UNAUTHORIZED,
            Forbidden | AccessDenied => StatusCode::FORBIDDEN,

            NotFound | ProductNotFound | CartItemNotFound | OrderNotFound | OrdersNotFound | ReportNotFound
            | WithdrawalNotFound | BankCardNotFound | NoDefaultBankCard | WalletNotFound | PaymentNotFound
            | NotificationNotFound => StatusCode::NOT_FOUND,

            Conflict | ProductUnavailable | AlreadyPurchased | OrderStateConflict | OrderNotCompleted
            | ReportWindowExpired | AlreadyReported | ReportAlreadyResolved | ReportNotAwaitingInfo
            | IneligibleOrders | AlreadyProcessed | PaymentAlreadySettled => StatusCode::CONFLICT,

            InsufficientBalance | ZeroAmount => StatusCode::UNPROCESSABLE_ENTITY,

            InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// ApiError
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    /// Per-item detail (e.g. which orders were ineligible).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    pub fn internal() -> Self {
        ApiError::new(ErrorCode::InternalError, "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::EmptyCart => ErrorCode::EmptyCart,
            CoreError::CartItemNotFound(_) => ErrorCode::CartItemNotFound,
            CoreError::CartTooLarge { .. } => ErrorCode::CartTooLarge,
            CoreError::ProductNotFound(_) => ErrorCode::ProductNotFound,
            CoreError::ProductUnavailable { .. } => ErrorCode::ProductUnavailable,
            CoreError::AlreadyPurchased { .. } => ErrorCode::AlreadyPurchased,
            CoreError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            CoreError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            CoreError::OrderStateConflict { .. } => ErrorCode::OrderStateConflict,
            CoreError::OrderNotCompleted { .. } => ErrorCode::OrderNotCompleted,
            CoreError::ReportWindowExpired { .. } => ErrorCode::ReportWindowExpired,
            CoreError::AlreadyReported { .. } => ErrorCode::AlreadyReported,
            CoreError::ProductNotInOrder { .. } => ErrorCode::ProductNotInOrder,
            CoreError::ReportNotFound(_) => ErrorCode::ReportNotFound,
            CoreError::ReportAlreadyResolved { .. } => ErrorCode::ReportAlreadyResolved,
            CoreError::ReportNotAwaitingInfo { .. } => ErrorCode::ReportNotAwaitingInfo,
            CoreError::BankCardNotFound(_) => ErrorCode::BankCardNotFound,
            CoreError::NoDefaultBankCard => ErrorCode::NoDefaultBankCard,
            CoreError::OrdersNotFound { .. } => ErrorCode::OrdersNotFound,
            CoreError::IneligibleOrders(_) => ErrorCode::IneligibleOrders,
            CoreError::ZeroAmount => ErrorCode::ZeroAmount,
            CoreError::WithdrawalNotFound(_) => ErrorCode::WithdrawalNotFound,
            CoreError::AlreadyProcessed { .. } => ErrorCode::AlreadyProcessed,
            CoreError::ProofRequired => ErrorCode::ProofRequired,
            CoreError::YearRequiredForMonthFilter => ErrorCode::YearRequiredForMonthFilter,
            CoreError::WalletNotFound(_) => ErrorCode::WalletNotFound,
            CoreError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
            CoreError::PaymentNotFound(_) => ErrorCode::PaymentNotFound,
            CoreError::PaymentAlreadySettled { .. } => ErrorCode::PaymentAlreadySettled,
            CoreError::AmountMismatch { .. } => ErrorCode::AmountMismatch,
            CoreError::NotificationNotFound(_) => ErrorCode::NotificationNotFound,
            CoreError::AccessDenied { .. } => ErrorCode::AccessDenied,
            CoreError::Validation(_) => ErrorCode::ValidationError,
        };

        let details = match &err {
            CoreError::IneligibleOrders(items) => serde_json::to_value(items).ok(),
            CoreError::OrdersNotFound { missing } => Some(serde_json::json!({ "missing": missing })),
            _ => None,
        };

        ApiError {
            code,
            message: err.to_string(),
            details,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),
            DbError::UniqueViolation { .. } => ApiError::new(ErrorCode::Conflict, "Resource already exists"),
            other => {
                error!(error = %other, "Database error");
                ApiError::internal()
            }
        }
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::Core(e) => e.into(),
            MarketError::Db(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{Ineligibility, OrderIneligibility, OrderStatus, ValidationError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::EmptyCart, StatusCode::BAD_REQUEST),
            (
                CoreError::InsufficientBalance {
                    required: 10,
                    available: 5,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CoreError::AlreadyReported {
                    order_id: "o1".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::ReportNotFound("r1".to_string()), StatusCode::NOT_FOUND),
            (
                CoreError::AccessDenied {
                    resource: "report r1".to_string(),
                },
                StatusCode::FORBIDDEN,
            ),
            (CoreError::ProofRequired, StatusCode::BAD_REQUEST),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_validation_code() {
        let err = ApiError::from(CoreError::Validation(ValidationError::Required {
            field: "reason".to_string(),
        }));
        assert_eq!(err.code, ErrorCode::ValidationError);
        let body = serde_json::to_value(&err).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["message"], "Validation error: reason is required");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_ineligible_orders_carry_details() {
        let err = ApiError::from(CoreError::IneligibleOrders(vec![OrderIneligibility {
            order_id: "o1".to_string(),
            reason: Ineligibility::OrderNotReady {
                status: OrderStatus::Completed,
            },
        }]));
        let body = serde_json::to_value(&err).unwrap();
        assert_eq!(body["code"], "INELIGIBLE_ORDERS");
        assert_eq!(body["details"][0]["orderId"], "o1");
    }

    #[test]
    fn test_storage_errors_are_generic() {
        let err = ApiError::from(MarketError::Db(DbError::QueryFailed("no such table: orders".to_string())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
