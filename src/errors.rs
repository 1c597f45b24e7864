use thiserror::Error;

use crate::decimal::Money;
use crate::types::AdmNo;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid response: {message}")]
    InvalidResponse {
        message: String,
    },

    #[error("api reported failure: {message}")]
    ApiFailure {
        message: String,
    },

    #[error("invalid payment amount for {fee_head}: {amount}")]
    InvalidPayment {
        fee_head: String,
        amount: Money,
    },

    #[error("payment exceeds balance for {fee_head}: balance {balance}, requested {requested}")]
    PaymentExceedsBalance {
        fee_head: String,
        balance: Money,
        requested: Money,
    },

    #[error("fine above assessed for {fee_head}: assessed {assessed}, requested {requested}")]
    FineExceedsAssessed {
        fee_head: String,
        assessed: Money,
        requested: Money,
    },

    #[error("fee head {fee_head} is not payable for student {adm_no}")]
    FeeHeadNotPayable {
        adm_no: AdmNo,
        fee_head: String,
    },

    #[error("payment batch for {adm_no} has no items")]
    EmptyBatch {
        adm_no: AdmNo,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// stable code for surfacing the error in the console
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::ApiFailure { .. } => "API_FAILURE",
            Self::InvalidPayment { .. } => "INVALID_PAYMENT",
            Self::PaymentExceedsBalance { .. } => "PAYMENT_EXCEEDS_BALANCE",
            Self::FineExceedsAssessed { .. } => "FINE_EXCEEDS_ASSESSED",
            Self::FeeHeadNotPayable { .. } => "FEE_HEAD_NOT_PAYABLE",
            Self::EmptyBatch { .. } => "EMPTY_BATCH",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
