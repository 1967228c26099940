use crate::record::Status;

/// Phone number validation failures, detected after normalization.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number is required")]
    Empty,
    #[error("Phone number must contain only digits")]
    NonNumeric,
    #[error("Phone number must be at least 10 digits")]
    TooShort,
    #[error("Phone number cannot exceed 15 digits")]
    TooLong,
    #[error("Bangladesh phone number must be 13 digits (880 + 10 digits)")]
    BadCountryLength,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Storage failure: {0}")]
    Sled(#[from] sled::Error),
    #[error("Failed to decode stored record: {0}")]
    Codec(String),
}

/// Failures on the payment-claim submission path.
#[derive(thiserror::Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    InvalidPhone(#[from] PhoneError),
    #[error("Transaction reference is required")]
    MissingReference,
    #[error("Either course or book must be selected")]
    NoTarget,
    #[error("Transaction ID already used")]
    DuplicateReference,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures on the admin decision path.
#[derive(thiserror::Error, Debug)]
pub enum DecisionError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Transaction not found")]
    NotFound,
    #[error("Invalid decision: {0:?}")]
    InvalidStatus(Status),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum ListError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures when an operator attaches a user to an ownerless transaction.
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Transaction not found")]
    NotFound,
    #[error("No user matches the transaction's phone number")]
    NoMatchingUser,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum RegisterError {
    #[error(transparent)]
    InvalidPhone(#[from] PhoneError),
    #[error("Display name is required")]
    MissingName,
    #[error(transparent)]
    Store(#[from] StoreError),
}
