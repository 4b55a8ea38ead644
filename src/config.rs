//! Environment-driven configuration.

use std::env;
use std::io::Write;
use std::net::SocketAddr;

use rand::{RngCore, rngs::OsRng};
use secrecy::SecretString;

use crate::domain::{ConfigError, Pubkey};

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";
pub const DEFAULT_PROGRAM_ID: &str = "GTWXVtN4JSHbF4syxcov4chVmod6EKYTFd9yyKmoKqML";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Everything `main` needs to wire the gateway.
#[derive(Debug)]
pub struct AppConfig {
    pub rpc_url: String,
    pub program_id: Pubkey,
    pub commitment: String,
    /// Operator wallet. Without it the gateway is read-only.
    pub wallet_private_key: Option<SecretString>,
    pub admin_address: Option<Pubkey>,
    pub public_base_url: String,
    pub database_url: Option<SecretString>,
    pub emailjs_public_key: Option<SecretString>,
    pub emailjs_service_id: Option<String>,
    pub emailjs_template_id: Option<String>,
    pub api_auth_key: Option<SecretString>,
    pub host: String,
    pub port: u16,
    pub log_json: bool,
    pub enable_rate_limiting: bool,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup, so tests need not
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let program_id = parse_pubkey(
            "PROGRAM_ID",
            &get("PROGRAM_ID").unwrap_or_else(|| DEFAULT_PROGRAM_ID.to_string()),
        )?;
        let admin_address = get("ADMIN_ADDRESS")
            .map(|v| parse_pubkey("ADMIN_ADDRESS", &v))
            .transpose()?;

        let commitment = get("SOLANA_COMMITMENT").unwrap_or_else(|| "confirmed".to_string());
        if !matches!(commitment.as_str(), "processed" | "confirmed" | "finalized") {
            return Err(ConfigError::InvalidValue {
                key: "SOLANA_COMMITMENT".to_string(),
                message: format!("expected processed, confirmed or finalized, got {}", commitment),
            });
        }

        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("not a port number: {}", v),
            })?,
            None => 3000,
        };

        Ok(Self {
            rpc_url: get("SOLANA_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            program_id,
            commitment,
            wallet_private_key: get("WALLET_PRIVATE_KEY").map(SecretString::from),
            admin_address,
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
            database_url: get("DATABASE_URL").map(SecretString::from),
            emailjs_public_key: get("EMAILJS_PUBLIC_KEY").map(SecretString::from),
            emailjs_service_id: get("EMAILJS_SERVICE_ID"),
            emailjs_template_id: get("EMAILJS_TEMPLATE_ID"),
            api_auth_key: get("API_AUTH_KEY").map(SecretString::from),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            log_json: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            enable_rate_limiting: get("ENABLE_RATE_LIMITING")
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "HOST".to_string(),
                message: format!("not an IP address: {}", self.host),
            })
    }

    /// True when all three EmailJS settings are present.
    #[must_use]
    pub fn email_configured(&self) -> bool {
        self.emailjs_public_key.is_some()
            && self.emailjs_service_id.is_some()
            && self.emailjs_template_id.is_some()
    }

    /// Takes the configured API key, or generates one for this run.
    ///
    /// A generated key is written once to `notice` and nowhere else, so it
    /// never reaches the log pipeline.
    pub fn take_api_auth_key<W: Write>(&mut self, notice: &mut W) -> SecretString {
        if let Some(key) = self.api_auth_key.take() {
            return key;
        }
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let generated = bs58::encode(bytes).into_string();
        let _ = writeln!(
            notice,
            "API_AUTH_KEY not set, generated key for this run: {}",
            generated
        );
        SecretString::from(generated)
    }
}

fn parse_pubkey(key: &str, value: &str) -> Result<Pubkey, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("not a base58 address: {}", value),
    })
}
