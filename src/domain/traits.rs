//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use solana_signature::Signature;

use super::error::{AppError, BlockchainError};
use super::types::{
    EmailOutcome, Product, Pubkey, RegistrationEmail, RegistryEntry, Role, TransactionSignature,
};

/// The supplychain program, reached over RPC.
///
/// Every authorization rule and state transition is enforced remotely;
/// implementations only build, sign and submit instructions and decode the
/// resulting accounts.
#[async_trait]
pub trait SupplyChainProgram: Send + Sync {
    /// Check RPC connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Address of the connected wallet, if one is configured
    fn wallet(&self) -> Option<Pubkey>;

    /// Address of the program being called
    fn program_id(&self) -> Pubkey;

    /// Set up the admin authority account with the wallet as admin
    async fn initialize(&self) -> Result<TransactionSignature, AppError>;

    /// Register a product under the wallet as manufacturer.
    /// Returns the product's derived address and the transaction signature.
    async fn register_product(
        &self,
        product_id: &str,
        location: &str,
        updater: &Pubkey,
    ) -> Result<(Pubkey, TransactionSignature), AppError>;

    /// Append a location update; only the designated updater may do this
    async fn update_product(
        &self,
        address: &Pubkey,
        location: &str,
        delivered: bool,
    ) -> Result<TransactionSignature, AppError>;

    /// Run the program's verification instruction against a product
    async fn verify_product(&self, address: &Pubkey) -> Result<TransactionSignature, AppError>;

    /// Grant a role to a user; requires the wallet to hold the admin authority
    async fn assign_role(&self, user: &Pubkey, role: Role)
    -> Result<TransactionSignature, AppError>;

    /// Fetch and decode a single product account
    async fn fetch_product(&self, address: &Pubkey) -> Result<Option<Product>, AppError>;

    /// Look up the role assigned to a user
    async fn fetch_role(&self, user: &Pubkey) -> Result<Option<Role>, AppError>;

    /// Scan every program account and keep the ones that decode as products
    async fn all_products(&self) -> Result<Vec<Product>, AppError>;
}

/// Transaction signing strategy, decoupled from the RPC client so raw keys
/// need not live alongside network code.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign a serialized message
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, BlockchainError>;

    /// Public key of the signing wallet
    fn public_key(&self) -> Pubkey;
}

/// Local cache of product name → address mappings
#[async_trait]
pub trait ProductRegistry: Send + Sync {
    /// Check storage connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Remember the address a product name was registered under
    async fn record(&self, name: &str, address: &Pubkey) -> Result<RegistryEntry, AppError>;

    /// Resolve a product name
    async fn lookup(&self, name: &str) -> Result<Option<RegistryEntry>, AppError>;

    /// All known mappings, most recent first
    async fn list(&self) -> Result<Vec<RegistryEntry>, AppError>;
}

/// Transactional email. Never fails: problems are reported in the outcome.
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send_registration(&self, email: &RegistrationEmail) -> EmailOutcome;
}
