use service_core::error::AppError;
use thiserror::Error;

/// Failure kinds surfaced by the purchase workflow.
#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("promo code not applicable: {0}")]
    NotApplicable(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid payment signature")]
    SignatureInvalid,

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("{0}")]
    PaymentFailed(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("{0}")]
    PreconditionFailed(String),
}

impl PurchaseError {
    /// Stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PurchaseError::Validation(_) => "validation",
            PurchaseError::NotFound(_) => "not_found",
            PurchaseError::NotApplicable(_) => "not_applicable",
            PurchaseError::Unauthorized(_) => "unauthorized",
            PurchaseError::Forbidden(_) => "forbidden",
            PurchaseError::Conflict(_) => "conflict",
            PurchaseError::SignatureInvalid => "signature_invalid",
            PurchaseError::Gateway(_) => "gateway",
            PurchaseError::PaymentFailed(_) => "payment_failed",
            PurchaseError::Persistence(_) => "persistence",
            PurchaseError::PreconditionFailed(_) => "precondition_failed",
        }
    }
}

impl From<sqlx::Error> for PurchaseError {
    fn from(err: sqlx::Error) -> Self {
        PurchaseError::Persistence(err.to_string())
    }
}

impl From<PurchaseError> for AppError {
    fn from(err: PurchaseError) -> Self {
        match err {
            PurchaseError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            PurchaseError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            e @ PurchaseError::NotApplicable(_) => {
                AppError::UnprocessableEntity(anyhow::anyhow!(e.to_string()))
            }
            PurchaseError::Unauthorized(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
            PurchaseError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            PurchaseError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            PurchaseError::SignatureInvalid => {
                AppError::Unauthorized(anyhow::anyhow!("invalid payment signature"))
            }
            PurchaseError::Gateway(msg) => AppError::BadGateway(msg),
            PurchaseError::PaymentFailed(msg) => AppError::PaymentRequired(anyhow::anyhow!(msg)),
            PurchaseError::Persistence(msg) => AppError::DatabaseError(anyhow::anyhow!(msg)),
            PurchaseError::PreconditionFailed(msg) => {
                AppError::PreconditionFailed(anyhow::anyhow!(msg))
            }
        }
    }
}
