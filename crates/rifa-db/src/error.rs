use thiserror::Error;

use rifa_types::models::PaymentStatus;

#[derive(Debug, Error)]
pub enum ReserveError {
    /// Numbers with a live hold or a sale.
    #[error("numbers already taken: {numbers:?}")]
    Conflict { numbers: Vec<u32> },

    /// Numbers the buyer does not currently hold.
    #[error("numbers not held by this buyer: {numbers:?}")]
    NotHeld { numbers: Vec<u32> },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for ReserveError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.into())
    }
}

#[derive(Debug, Error)]
pub enum SettleError {
    #[error("payment not found")]
    NotFound,

    #[error("cannot move payment from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Completing would sell a number that another payment already bought.
    #[error("numbers already sold: {numbers:?}")]
    AlreadySold { numbers: Vec<u32> },

    /// Payment numbers with no number row attached to the payment.
    #[error("numbers not attached to this payment: {numbers:?}")]
    Unlinked { numbers: Vec<u32> },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for SettleError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.into())
    }
}
