//! Application error types with proper error chaining.

use thiserror::Error;

/// Anchor's custom error code for `UnauthorizedUpdater` (6000).
pub const UNAUTHORIZED_UPDATER_CODE: u32 = 6000;

/// Anchor framework code for `AccountNotInitialized` (3012).
pub const ACCOUNT_NOT_INITIALIZED_CODE: u32 = 3012;

#[derive(Error, Debug, Clone)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query execution failed: {0}")]
    Query(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),
    #[error("Migration failed: {0}")]
    Migration(String),
}

#[derive(Error, Debug, Clone)]
pub enum BlockchainError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("RPC call failed: {0}")]
    RpcError(String),
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),
    #[error("Insufficient funds for transaction")]
    InsufficientFunds,
    #[error("Timeout waiting for confirmation: {0}")]
    Timeout(String),
}

/// Failures reported back to users of the supplychain program.
///
/// The messages are what a person operating the wallet sees, so they are
/// phrased as instructions rather than diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("Please connect your wallet first.")]
    WalletNotConnected,
    #[error("Invalid address '{0}'. Please provide a valid Solana address.")]
    InvalidAddress(String),
    #[error(
        "You are not authorized to update this product. Only the designated updater can update the product status."
    )]
    UnauthorizedUpdater,
    #[error(
        "Product not found at {0}. Check the address, that the product was registered on this network, and that the account hasn't been closed."
    )]
    ProductNotFound(String),
    #[error("Only the program admin can assign roles.")]
    NotAdmin,
    #[error("Program rejected the transaction: {0}")]
    Rejected(String),
}

impl ProgramError {
    /// Maps the text of a remote failure onto a user-facing error.
    ///
    /// The program's error strings are matched by name, by Anchor's hex
    /// representation (`custom program error: 0x1770`), by decimal code, and
    /// by the `{"Custom":6000}` form found in signature status errors.
    /// `address` names the account for the not-found case when it is known.
    #[must_use]
    pub fn classify(message: &str, address: Option<&str>) -> Self {
        let has_code = |code: u32| {
            message.contains(&format!("0x{:x}", code))
                || message.contains(&format!("Error Number: {}", code))
                || message.contains(&format!("\"Custom\":{}", code))
        };

        if message.contains("UnauthorizedUpdater") || has_code(UNAUTHORIZED_UPDATER_CODE) {
            return ProgramError::UnauthorizedUpdater;
        }

        if message.contains("AccountNotInitialized")
            || message.contains("Account does not exist")
            || message.contains("could not find account")
            || has_code(ACCOUNT_NOT_INITIALIZED_CODE)
        {
            return ProgramError::ProductNotFound(address.unwrap_or("this address").to_string());
        }

        ProgramError::Rejected(message.to_string())
    }

    /// Returns true when the remote text is a program-level rejection rather
    /// than a transport problem.
    #[must_use]
    pub fn is_program_failure(message: &str) -> bool {
        message.contains("custom program error")
            || message.contains("Program log: AnchorError")
            || message.contains("UnauthorizedUpdater")
            || message.contains("AccountNotInitialized")
            || message.contains("Account does not exist")
            || message.contains("\"Custom\":")
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Validation failed: {0}")]
    Multiple(String),
}

/// Failures talking to third-party HTTP services such as EmailJS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalServiceError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    ExternalService(#[from] ExternalServiceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Unauthorized: {0}")]
    Authorization(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures worth another attempt against the RPC node.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Blockchain(
                BlockchainError::Connection(_)
                    | BlockchainError::RpcError(_)
                    | BlockchainError::Timeout(_)
            )
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(ValidationError::Multiple(err.to_string()))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted("Pool timed out".to_string()),
            sqlx::Error::Database(db_err) => DatabaseError::Query(db_err.message().to_string()),
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(DatabaseError::from(err))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(DatabaseError::Migration(err.to_string()))
    }
}
