//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    AppError, BlockchainError, ConfigError, DatabaseError, ExternalServiceError, ProgramError,
    ValidationError,
};
pub use traits::{EmailNotifier, ProductRegistry, SupplyChainProgram, TransactionSigner};
pub use types::{
    AssignRoleRequest, EmailOutcome, ErrorDetail, ErrorResponse, HealthResponse, HealthStatus,
    MAX_SEED_LEN, OverviewResponse, Product, ProductListResponse, ProductStatus, Pubkey,
    RateLimitResponse, RegisterProductRequest, RegisterProductResponse, RegistrationEmail,
    RegistryEntry, Role, RoleResponse, TransactionResponse, TransactionSignature,
    UpdateProductRequest, UpdateProductResponse, VerifyQuery, VerifyResponse, parse_address,
    verification_link,
};
