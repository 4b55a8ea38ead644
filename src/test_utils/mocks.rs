//! Mock implementations for testing.
//!
//! `MockProgram` emulates the supplychain program's rules in memory so the
//! service and router can be exercised without a ledger node.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::domain::{
    AppError, BlockchainError, DatabaseError, EmailNotifier, EmailOutcome, Product,
    ProductRegistry, ProgramError, Pubkey, RegistrationEmail, RegistryEntry, Role,
    SupplyChainProgram, TransactionSignature,
};
use crate::infra::blockchain::pda::product_address;

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            latency_ms: None,
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(ms) = self.latency_ms {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
    }
}

pub const MOCK_PROGRAM_ID: Pubkey = Pubkey::new_from_array([42u8; 32]);

/// In-memory stand-in for the on-chain program.
///
/// # Example
///
/// ```
/// use supplychain_gateway::domain::Pubkey;
/// use supplychain_gateway::test_utils::{MockProgram, MockConfig};
///
/// // Read-only gateway: no wallet connected
/// let program = MockProgram::new();
///
/// // Gateway operating a wallet
/// let program = MockProgram::new().with_wallet(Pubkey::new_from_array([1u8; 32]));
///
/// // RPC node down
/// let failing = MockProgram::with_config(MockConfig::failure("node unreachable"));
/// ```
pub struct MockProgram {
    wallet: Option<Pubkey>,
    admin_address: Option<Pubkey>,
    products: Mutex<HashMap<Pubkey, Product>>,
    roles: Mutex<HashMap<Pubkey, Role>>,
    initialized_by: Mutex<Option<Pubkey>>,
    verified: Mutex<Vec<Pubkey>>,
    config: MockConfig,
    call_count: AtomicU64,
    signatures: AtomicU64,
    is_healthy: AtomicBool,
    reads_failing: AtomicBool,
}

impl MockProgram {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            wallet: None,
            admin_address: None,
            products: Mutex::new(HashMap::new()),
            roles: Mutex::new(HashMap::new()),
            initialized_by: Mutex::new(None),
            verified: Mutex::new(Vec::new()),
            config,
            call_count: AtomicU64::new(0),
            signatures: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
            reads_failing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Connects a wallet.
    #[must_use]
    pub fn with_wallet(mut self, wallet: Pubkey) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Configures the address that is always reported as admin.
    #[must_use]
    pub fn with_admin_address(mut self, admin: Pubkey) -> Self {
        self.admin_address = Some(admin);
        self
    }

    /// Seeds a product account.
    pub fn insert_product(&self, product: Product) {
        self.products
            .lock()
            .unwrap()
            .insert(product.address, product);
    }

    /// Seeds a user role account.
    pub fn set_role(&self, user: Pubkey, role: Role) {
        self.roles.lock().unwrap().insert(user, role);
    }

    pub fn product(&self, address: &Pubkey) -> Option<Product> {
        self.products.lock().unwrap().get(address).cloned()
    }

    /// Addresses `verify_product` was called on, in order.
    pub fn verified(&self) -> Vec<Pubkey> {
        self.verified.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Makes `fetch_product` fail while writes keep succeeding.
    pub fn set_reads_failing(&self, failing: bool) {
        self.reads_failing.store(failing, Ordering::Relaxed);
    }

    async fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.config.simulate_latency().await;
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock RPC error".to_string());
            return Err(AppError::Blockchain(BlockchainError::RpcError(msg)));
        }
        Ok(())
    }

    fn require_wallet(&self) -> Result<Pubkey, AppError> {
        self.wallet
            .ok_or(AppError::Program(ProgramError::WalletNotConnected))
    }

    fn next_signature(&self) -> TransactionSignature {
        let n = self.signatures.fetch_add(1, Ordering::Relaxed) + 1;
        format!("mock_sig_{}", n)
    }
}

impl Default for MockProgram {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SupplyChainProgram for MockProgram {
    async fn health_check(&self) -> Result<(), AppError> {
        self.enter().await?;
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Blockchain(BlockchainError::Connection(
                "Mock unhealthy".to_string(),
            )));
        }
        Ok(())
    }

    fn wallet(&self) -> Option<Pubkey> {
        self.wallet
    }

    fn program_id(&self) -> Pubkey {
        MOCK_PROGRAM_ID
    }

    async fn initialize(&self) -> Result<TransactionSignature, AppError> {
        self.enter().await?;
        let wallet = self.require_wallet()?;
        let mut admin = self.initialized_by.lock().unwrap();
        if admin.is_some() {
            return Err(AppError::Program(ProgramError::Rejected(
                "Allocate: account already in use".to_string(),
            )));
        }
        *admin = Some(wallet);
        Ok(self.next_signature())
    }

    async fn register_product(
        &self,
        product_id: &str,
        location: &str,
        updater: &Pubkey,
    ) -> Result<(Pubkey, TransactionSignature), AppError> {
        self.enter().await?;
        let manufacturer = self.require_wallet()?;
        let (address, bump) = product_address(&manufacturer, product_id, &MOCK_PROGRAM_ID)?;

        let mut products = self.products.lock().unwrap();
        if products.contains_key(&address) {
            return Err(AppError::Program(ProgramError::Rejected(
                "Allocate: account already in use".to_string(),
            )));
        }
        products.insert(
            address,
            Product {
                address,
                product_id: product_id.to_string(),
                manufacturer,
                updater: *updater,
                location: location.to_string(),
                delivered: false,
                bump,
            },
        );
        Ok((address, self.next_signature()))
    }

    async fn update_product(
        &self,
        address: &Pubkey,
        location: &str,
        delivered: bool,
    ) -> Result<TransactionSignature, AppError> {
        self.enter().await?;
        let wallet = self.require_wallet()?;
        let mut products = self.products.lock().unwrap();
        let product = products
            .get_mut(address)
            .ok_or_else(|| AppError::Program(ProgramError::ProductNotFound(address.to_string())))?;
        if !product.is_updatable_by(&wallet) {
            return Err(AppError::Program(ProgramError::UnauthorizedUpdater));
        }
        product.location = location.to_string();
        product.delivered = delivered;
        Ok(self.next_signature())
    }

    async fn verify_product(&self, address: &Pubkey) -> Result<TransactionSignature, AppError> {
        self.enter().await?;
        self.require_wallet()?;
        if !self.products.lock().unwrap().contains_key(address) {
            return Err(AppError::Program(ProgramError::ProductNotFound(
                address.to_string(),
            )));
        }
        self.verified.lock().unwrap().push(*address);
        Ok(self.next_signature())
    }

    async fn assign_role(
        &self,
        user: &Pubkey,
        role: Role,
    ) -> Result<TransactionSignature, AppError> {
        self.enter().await?;
        let wallet = self.require_wallet()?;
        let is_admin = *self.initialized_by.lock().unwrap() == Some(wallet)
            || self.admin_address == Some(wallet);
        if !is_admin {
            return Err(AppError::Program(ProgramError::NotAdmin));
        }
        self.roles.lock().unwrap().insert(*user, role);
        Ok(self.next_signature())
    }

    async fn fetch_product(&self, address: &Pubkey) -> Result<Option<Product>, AppError> {
        self.enter().await?;
        if self.reads_failing.load(Ordering::Relaxed) {
            return Err(AppError::Blockchain(BlockchainError::RpcError(
                "Mock read failure".to_string(),
            )));
        }
        Ok(self.product(address))
    }

    async fn fetch_role(&self, user: &Pubkey) -> Result<Option<Role>, AppError> {
        self.enter().await?;
        if self.admin_address.as_ref() == Some(user) {
            return Ok(Some(Role::Admin));
        }
        Ok(self.roles.lock().unwrap().get(user).copied())
    }

    async fn all_products(&self) -> Result<Vec<Product>, AppError> {
        self.enter().await?;
        Ok(self.products.lock().unwrap().values().cloned().collect())
    }
}

/// Mock registry with configurable failure.
pub struct MockRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn get_all_entries(&self) -> Vec<RegistryEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    async fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.config.simulate_latency().await;
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock database error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductRegistry for MockRegistry {
    async fn health_check(&self) -> Result<(), AppError> {
        self.enter().await?;
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Mock unhealthy".to_string(),
            )));
        }
        Ok(())
    }

    async fn record(&self, name: &str, address: &Pubkey) -> Result<RegistryEntry, AppError> {
        self.enter().await?;
        let entry = RegistryEntry {
            name: name.to_string(),
            address: *address,
            recorded_at: Utc::now(),
        };
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), entry.clone());
        Ok(entry)
    }

    async fn lookup(&self, name: &str) -> Result<Option<RegistryEntry>, AppError> {
        self.enter().await?;
        Ok(self.entries.lock().unwrap().get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<RegistryEntry>, AppError> {
        self.enter().await?;
        let mut entries = self.get_all_entries();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(entries)
    }
}

/// Records every email instead of sending it.
pub struct MockNotifier {
    outcome: EmailOutcome,
    sent: Mutex<Vec<RegistrationEmail>>,
}

impl MockNotifier {
    /// A notifier that reports every email as sent.
    #[must_use]
    pub fn new() -> Self {
        Self::with_outcome(EmailOutcome::Sent)
    }

    #[must_use]
    pub fn with_outcome(outcome: EmailOutcome) -> Self {
        Self {
            outcome,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<RegistrationEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailNotifier for MockNotifier {
    async fn send_registration(&self, email: &RegistrationEmail) -> EmailOutcome {
        self.sent.lock().unwrap().push(email.clone());
        self.outcome.clone()
    }
}
