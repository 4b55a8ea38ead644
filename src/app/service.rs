//! Application service layer.
//!
//! Orchestrates the program client, the local registry and the email
//! notifier. Each public method is one user-facing operation.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, AssignRoleRequest, DatabaseError, EmailNotifier, HealthResponse, HealthStatus,
    OverviewResponse, Product, ProductListResponse, ProductRegistry, ProductStatus, ProgramError,
    Pubkey,
    RegisterProductRequest, RegisterProductResponse, RegistrationEmail, RegistryEntry, Role,
    RoleResponse, SupplyChainProgram, TransactionResponse, UpdateProductRequest,
    UpdateProductResponse, VerifyResponse, parse_address, verification_link,
};
use crate::infra::observability::record_email_outcome;
use crate::infra::qr::verification_qr_svg;

/// Routes listed on the landing page.
pub const ROUTES: &[&str] = &[
    "GET /",
    "POST /register",
    "GET /verify?address=",
    "GET /update",
    "POST /update",
    "GET /products",
    "GET /products/{address}/qr",
    "GET /registry",
    "GET /registry/{name}",
    "GET /role",
    "POST /admin/initialize",
    "POST /admin/roles",
    "GET /health",
    "GET /metrics",
];

/// Side-channel settings the use-cases need besides their ports.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Origin used to build shareable verification links.
    pub public_base_url: String,
    /// RPC endpoint, reported on the landing page.
    pub rpc_url: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            rpc_url: "https://api.devnet.solana.com".to_string(),
        }
    }
}

fn validate<T: Validate>(request: &T, what: &str) -> Result<(), AppError> {
    request.validate().map_err(|e| {
        warn!(error = %e, request = what, "Validation failed");
        AppError::from(e)
    })
}

pub struct AppService {
    program: Arc<dyn SupplyChainProgram>,
    registry: Arc<dyn ProductRegistry>,
    notifier: Arc<dyn EmailNotifier>,
    settings: ServiceSettings,
}

impl AppService {
    #[must_use]
    pub fn new(
        program: Arc<dyn SupplyChainProgram>,
        registry: Arc<dyn ProductRegistry>,
        notifier: Arc<dyn EmailNotifier>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            program,
            registry,
            notifier,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn require_wallet(&self) -> Result<Pubkey, AppError> {
        self.program
            .wallet()
            .ok_or(AppError::Program(ProgramError::WalletNotConnected))
    }

    /// Landing data: which program, which cluster, who is connected.
    #[instrument(skip(self))]
    pub async fn overview(&self) -> OverviewResponse {
        let role = self.current_role().await.map(|r| r.role).unwrap_or_else(|e| {
            warn!(error = %e, "Could not read wallet role");
            None
        });

        OverviewResponse {
            program_id: self.program.program_id(),
            rpc_url: self.settings.rpc_url.clone(),
            wallet: self.program.wallet(),
            role,
            routes: ROUTES.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    /// Registers a product with the wallet as manufacturer.
    ///
    /// The chain write is the only step that can fail the request. The
    /// registry entry and the customer email are best-effort.
    #[instrument(skip(self, request), fields(product = %request.name))]
    pub async fn register_product(
        &self,
        request: &RegisterProductRequest,
    ) -> Result<RegisterProductResponse, AppError> {
        validate(request, "register_product")?;
        let updater = parse_address(&request.updater_address)?;

        let (address, signature) = self
            .program
            .register_product(&request.name, &request.location, &updater)
            .await?;
        metrics::counter!("products_registered_total").increment(1);
        info!(address = %address, signature = %signature, "Product registered");

        if let Err(e) = self.registry.record(&request.name, &address).await {
            warn!(error = %e, "Failed to record product in registry");
        }

        let link = verification_link(&self.settings.public_base_url, &address);
        let email = self
            .notifier
            .send_registration(&RegistrationEmail {
                to_email: request.customer_email.clone(),
                product_name: request.name.clone(),
                product_make: request.make.clone(),
                product_id: address.to_string(),
                verification_link: link.clone(),
            })
            .await;
        record_email_outcome(email.label());

        Ok(RegisterProductResponse {
            address,
            signature,
            verification_link: link,
            email,
            message: "Product registered successfully!".to_string(),
        })
    }

    /// Appends a location update as the product's designated updater.
    #[instrument(skip(self, request), fields(address = %request.address))]
    pub async fn update_product(
        &self,
        request: &UpdateProductRequest,
    ) -> Result<UpdateProductResponse, AppError> {
        validate(request, "update_product")?;
        let address = parse_address(&request.address)?;

        let signature = self
            .program
            .update_product(&address, &request.location, request.delivered)
            .await?;
        metrics::counter!("products_updated_total").increment(1);

        let status = if request.delivered {
            ProductStatus::Delivered
        } else {
            ProductStatus::InTransit
        };
        Ok(UpdateProductResponse {
            product: self.read_back(&address).await,
            status,
            signature,
            message: format!(
                "Product updated to location: \"{}\" ({})",
                request.location.trim(),
                status
            ),
        })
    }

    /// Runs the program's verification instruction, then reads the product.
    #[instrument(skip(self))]
    pub async fn verify_product(&self, address: &str) -> Result<VerifyResponse, AppError> {
        let address = parse_address(address)?;

        let signature = self.program.verify_product(&address).await?;
        metrics::counter!("products_verified_total").increment(1);

        let product = self.read_back(&address).await;
        let message = match &product {
            Some(product) => format!("Product {} is authentic", product.product_id),
            None => format!("Product at {} is authentic", address),
        };
        Ok(VerifyResponse {
            status: product.as_ref().map(Product::status),
            product,
            signature,
            message,
        })
    }

    /// Reads a product after a confirmed write. The write already succeeded,
    /// so a failed read only drops the product from the response.
    async fn read_back(&self, address: &Pubkey) -> Option<Product> {
        match self.program.fetch_product(address).await {
            Ok(Some(product)) => Some(product),
            Ok(None) => {
                warn!(address = %address, "Product not visible yet after confirmed write");
                None
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Could not read product after confirmed write");
                None
            }
        }
    }

    /// Every product account of the program.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<ProductListResponse, AppError> {
        Ok(ProductListResponse::new(self.program.all_products().await?))
    }

    /// Products the connected wallet may update.
    #[instrument(skip(self))]
    pub async fn updater_products(&self) -> Result<ProductListResponse, AppError> {
        let wallet = self.require_wallet()?;
        let products = self
            .program
            .all_products()
            .await?
            .into_iter()
            .filter(|p| p.is_updatable_by(&wallet))
            .collect();
        Ok(ProductListResponse::new(products))
    }

    pub async fn registry_entries(&self) -> Result<Vec<RegistryEntry>, AppError> {
        self.registry.list().await
    }

    #[instrument(skip(self))]
    pub async fn lookup_registry(&self, name: &str) -> Result<RegistryEntry, AppError> {
        self.registry.lookup(name).await?.ok_or_else(|| {
            AppError::Database(DatabaseError::NotFound(format!(
                "No product named '{}' in the registry",
                name
            )))
        })
    }

    /// Makes the wallet the program admin.
    #[instrument(skip(self))]
    pub async fn initialize_program(&self) -> Result<TransactionResponse, AppError> {
        let signature = self.program.initialize().await?;
        Ok(TransactionResponse {
            signature,
            message: "Program initialized successfully! You are now the admin.".to_string(),
        })
    }

    /// Grants a role. The wallet must currently hold the Admin role.
    #[instrument(skip(self, request), fields(user = %request.user, role = %request.role))]
    pub async fn assign_role(
        &self,
        request: &AssignRoleRequest,
    ) -> Result<TransactionResponse, AppError> {
        validate(request, "assign_role")?;
        let user = parse_address(&request.user)?;
        let wallet = self.require_wallet()?;

        if self.program.fetch_role(&wallet).await? != Some(Role::Admin) {
            return Err(AppError::Program(ProgramError::NotAdmin));
        }

        let signature = self.program.assign_role(&user, request.role).await?;
        Ok(TransactionResponse {
            signature,
            message: format!("Assigned {} role to {}", request.role, user),
        })
    }

    /// Role of the connected wallet; `None` fields when read-only.
    #[instrument(skip(self))]
    pub async fn current_role(&self) -> Result<RoleResponse, AppError> {
        let Some(wallet) = self.program.wallet() else {
            return Ok(RoleResponse {
                wallet: None,
                role: None,
            });
        };
        let role = self.program.fetch_role(&wallet).await?;
        Ok(RoleResponse {
            wallet: Some(wallet),
            role,
        })
    }

    /// SVG QR code of a product's verification link.
    pub fn product_qr(&self, address: &str, size: u32) -> Result<String, AppError> {
        let address = parse_address(address)?;
        verification_qr_svg(
            &verification_link(&self.settings.public_base_url, &address),
            size,
        )
    }

    /// Health of the RPC node and the registry store.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let blockchain_health = match self.program.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Blockchain health check failed");
                HealthStatus::Unhealthy
            }
        };

        let registry_health = match self.registry.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Registry health check failed");
                HealthStatus::Unhealthy
            }
        };

        HealthResponse::new(blockchain_health, registry_health)
    }
}
