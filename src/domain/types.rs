use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ProgramError;

pub use solana_pubkey::{MAX_SEED_LEN, Pubkey};

/// Represents a transaction signature from the blockchain (base58).
pub type TransactionSignature = String;

/// Parses a base58 account address supplied by a user.
pub fn parse_address(value: &str) -> Result<Pubkey, ProgramError> {
    let trimmed = value.trim();
    Pubkey::from_str(trimmed).map_err(|_| ProgramError::InvalidAddress(trimmed.to_string()))
}

/// Serde adapter writing addresses as base58 strings instead of byte arrays.
pub mod base58 {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::{Pubkey, parse_address};

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_address(&s).map_err(de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer, de};

        use super::super::{Pubkey, parse_address};

        pub fn serialize<S: Serializer>(
            key: &Option<Pubkey>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match key {
                Some(key) => serializer.collect_str(key),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Pubkey>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| parse_address(&s).map_err(de::Error::custom))
                .transpose()
        }
    }
}

/// Shipping state of a product as tracked by the program.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    InTransit,
    Delivered,
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductStatus::InTransit => f.write_str("In Transit"),
            ProductStatus::Delivered => f.write_str("Delivered"),
        }
    }
}

/// A product account read from the chain, keyed by its program-derived address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    #[serde(with = "base58")]
    pub address: Pubkey,
    pub product_id: String,
    #[serde(with = "base58")]
    pub manufacturer: Pubkey,
    #[serde(with = "base58")]
    pub updater: Pubkey,
    pub location: String,
    pub delivered: bool,
    pub bump: u8,
}

impl Product {
    #[must_use]
    pub fn status(&self) -> ProductStatus {
        if self.delivered {
            ProductStatus::Delivered
        } else {
            ProductStatus::InTransit
        }
    }

    #[must_use]
    pub fn is_updatable_by(&self, wallet: &Pubkey) -> bool {
        &self.updater == wallet
    }
}

/// Access tiers enforced by the program. Serialized on-chain by ordinal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Manufacturer,
    Updater,
    Verifier,
}

impl Role {
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Role::Admin => 0,
            Role::Manufacturer => 1,
            Role::Updater => 2,
            Role::Verifier => 3,
        }
    }

    #[must_use]
    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(Role::Admin),
            1 => Some(Role::Manufacturer),
            2 => Some(Role::Updater),
            3 => Some(Role::Verifier),
            _ => None,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manufacturer" => Ok(Role::Manufacturer),
            "updater" => Ok(Role::Updater),
            "verifier" => Ok(Role::Verifier),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "Admin",
            Role::Manufacturer => "Manufacturer",
            Role::Updater => "Updater",
            Role::Verifier => "Verifier",
        };
        f.write_str(name)
    }
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

fn fits_seed(value: &str) -> Result<(), validator::ValidationError> {
    not_blank(value)?;
    if value.len() > MAX_SEED_LEN {
        return Err(validator::ValidationError::new("seed_too_long"));
    }
    Ok(())
}

fn looks_like_email(value: &str) -> Result<(), validator::ValidationError> {
    not_blank(value)?;
    if !value.contains('@') {
        return Err(validator::ValidationError::new("email"));
    }
    Ok(())
}

/// Form submitted by a manufacturer registering a new product.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterProductRequest {
    /// Product name; doubles as the on-chain product id and a PDA seed.
    #[validate(custom(function = "fits_seed"))]
    pub name: String,
    #[validate(custom(function = "not_blank"))]
    pub make: String,
    #[validate(custom(function = "not_blank"))]
    pub location: String,
    #[validate(custom(function = "looks_like_email"))]
    pub customer_email: String,
    #[validate(custom(function = "not_blank"))]
    pub updater_address: String,
}

impl RegisterProductRequest {
    pub fn new(
        name: impl Into<String>,
        make: impl Into<String>,
        location: impl Into<String>,
        customer_email: impl Into<String>,
        updater_address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            make: make.into(),
            location: location.into(),
            customer_email: customer_email.into(),
            updater_address: updater_address.into(),
        }
    }
}

/// Status update appended by the designated updater.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(custom(function = "not_blank"))]
    pub address: String,
    #[validate(custom(function = "not_blank"))]
    pub location: String,
    #[serde(default)]
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssignRoleRequest {
    #[validate(custom(function = "not_blank"))]
    pub user: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyQuery {
    pub address: Option<String>,
}

/// Result of the best-effort registration email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmailOutcome {
    Sent,
    Skipped { reason: String },
    Failed { reason: String },
}

impl EmailOutcome {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            EmailOutcome::Sent => "sent",
            EmailOutcome::Skipped { .. } => "skipped",
            EmailOutcome::Failed { .. } => "failed",
        }
    }
}

/// Parameters of the registration email template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationEmail {
    pub to_email: String,
    pub product_name: String,
    pub product_make: String,
    pub product_id: String,
    pub verification_link: String,
}

impl RegistrationEmail {
    /// Name of the first blank template parameter, if any.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("to_email", &self.to_email),
            ("product_name", &self.product_name),
            ("product_make", &self.product_make),
            ("product_id", &self.product_id),
            ("verification_link", &self.verification_link),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Entry in the local name → address cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(with = "base58")]
    pub address: Pubkey,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProductResponse {
    #[serde(with = "base58")]
    pub address: Pubkey,
    pub signature: TransactionSignature,
    pub verification_link: String,
    pub email: EmailOutcome,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProductResponse {
    /// Account state read after confirmation; absent when that read failed.
    pub product: Option<Product>,
    pub status: ProductStatus,
    pub signature: TransactionSignature,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub product: Option<Product>,
    pub status: Option<ProductStatus>,
    pub signature: TransactionSignature,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub total: usize,
}

impl ProductListResponse {
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        let total = products.len();
        Self { products, total }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub signature: TransactionSignature,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleResponse {
    #[serde(default, with = "base58::option")]
    pub wallet: Option<Pubkey>,
    pub role: Option<Role>,
}

/// Landing data for `/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewResponse {
    #[serde(with = "base58")]
    pub program_id: Pubkey,
    pub rpc_url: String,
    #[serde(default, with = "base58::option")]
    pub wallet: Option<Pubkey>,
    pub role: Option<Role>,
    pub routes: Vec<String>,
}

/// Builds the shareable link printed in emails and QR codes.
#[must_use]
pub fn verification_link(base_url: &str, address: &Pubkey) -> String {
    format!("{}/verify?address={}", base_url.trim_end_matches('/'), address)
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub blockchain: HealthStatus,
    pub registry: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    /// The RPC node is required; a broken registry only degrades service.
    pub fn new(blockchain: HealthStatus, registry: HealthStatus) -> Self {
        let status = match (&blockchain, &registry) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };

        Self {
            status,
            blockchain,
            registry,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResponse {
    pub error: ErrorDetail,
    pub retry_after: u64,
}
