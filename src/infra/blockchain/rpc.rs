//! JSON-RPC client for a Solana ledger node.

use std::time::{Duration, Instant};

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use solana_hash::Hash;
use tracing::{debug, info, instrument, warn};

use crate::domain::{AppError, BlockchainError, ProgramError, Pubkey, parse_address};

use super::transaction::parse_blockhash;

/// Configuration for the RPC client
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    /// `processed`, `confirmed` or `finalized`
    pub commitment: String,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            confirmation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            commitment: "confirmed".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcError {
    /// Program logs attached to a failed simulation, if any.
    fn logs(&self) -> Vec<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("logs"))
            .and_then(Value::as_array)
            .map(|logs| logs.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    fn into_app_error(self) -> AppError {
        let mut text = self.message.clone();
        for line in self.logs() {
            text.push('\n');
            text.push_str(line);
        }

        if ProgramError::is_program_failure(&text) {
            return AppError::Program(ProgramError::classify(&text, None));
        }
        if text.contains("insufficient") || text.contains("no record of a prior credit") {
            return AppError::Blockchain(BlockchainError::InsufficientFunds);
        }
        AppError::Blockchain(BlockchainError::RpcError(format!(
            "{}: {}",
            self.code, self.message
        )))
    }
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

/// `data` is `[payload, encoding]` for base64 requests.
#[derive(Debug, Deserialize)]
struct EncodedAccount {
    data: (String, String),
}

impl EncodedAccount {
    fn decode(&self) -> Result<Vec<u8>, AppError> {
        STANDARD.decode(&self.data.0).map_err(|e| {
            AppError::Blockchain(BlockchainError::InvalidAccountData(format!(
                "Account data is not base64: {}",
                e
            )))
        })
    }
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: EncodedAccount,
}

#[derive(Debug, Deserialize)]
struct SignatureStatus {
    err: Option<Value>,
    #[serde(rename = "confirmationStatus")]
    confirmation_status: Option<String>,
}

fn commitment_rank(level: &str) -> u8 {
    match level {
        "finalized" => 2,
        "confirmed" => 1,
        _ => 0,
    }
}

/// Solana JSON-RPC client with retries
pub struct RpcClient {
    http_client: Client,
    rpc_url: String,
    config: RpcClientConfig,
}

impl RpcClient {
    /// Create a new RPC client with custom configuration
    pub fn new(rpc_url: &str, config: RpcClientConfig) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Blockchain(BlockchainError::Connection(e.to_string())))?;
        info!(rpc_url = %rpc_url, commitment = %config.commitment, "Created RPC client");
        Ok(Self {
            http_client,
            rpc_url: rpc_url.to_string(),
            config,
        })
    }

    /// Create a new RPC client with default configuration
    pub fn with_defaults(rpc_url: &str) -> Result<Self, AppError> {
        Self::new(rpc_url, RpcClientConfig::default())
    }

    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    #[must_use]
    pub fn config(&self) -> &RpcClientConfig {
        &self.config
    }

    /// Make an RPC call, retrying transport-level failures
    #[instrument(skip(self, params))]
    async fn rpc_call<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, AppError> {
        metrics::counter!("rpc_requests_total", "method" => method.to_string()).increment(1);

        let mut attempt = 0;
        loop {
            match self.do_rpc_call(method, &params).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    warn!(attempt = attempt, error = ?e, method = %method, "RPC call failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    metrics::counter!("rpc_errors_total", "method" => method.to_string())
                        .increment(1);
                    warn!(attempt = attempt, error = ?e, method = %method, "RPC call failed");
                    return Err(e);
                }
            }
        }
    }

    /// Execute a single RPC call
    async fn do_rpc_call<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<R, AppError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Blockchain(BlockchainError::Timeout(e.to_string()))
                } else if e.is_connect() {
                    AppError::Blockchain(BlockchainError::Connection(e.to_string()))
                } else {
                    AppError::Blockchain(BlockchainError::RpcError(e.to_string()))
                }
            })?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| AppError::Blockchain(BlockchainError::RpcError(e.to_string())))?;

        if let Some(error) = rpc_response.error {
            return Err(error.into_app_error());
        }

        rpc_response.result.ok_or_else(|| {
            AppError::Blockchain(BlockchainError::RpcError("Empty response".to_string()))
        })
    }

    #[instrument(skip(self))]
    pub async fn get_slot(&self) -> Result<u64, AppError> {
        self.rpc_call("getSlot", Vec::<()>::new()).await
    }

    #[instrument(skip(self))]
    pub async fn get_latest_blockhash(&self) -> Result<Hash, AppError> {
        let params = json!([{ "commitment": self.config.commitment }]);
        let result: WithContext<BlockhashValue> =
            self.rpc_call("getLatestBlockhash", params).await?;
        Ok(parse_blockhash(&result.value.blockhash)?)
    }

    /// Raw data of an account, or `None` when the account does not exist.
    #[instrument(skip(self, address), fields(address = %address))]
    pub async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, AppError> {
        let params = json!([
            address.to_string(),
            { "encoding": "base64", "commitment": self.config.commitment }
        ]);
        let result: WithContext<Option<EncodedAccount>> =
            self.rpc_call("getAccountInfo", params).await?;
        result.value.map(|account| account.decode()).transpose()
    }

    /// Every account owned by `program_id`, undecoded.
    #[instrument(skip(self, program_id), fields(program_id = %program_id))]
    pub async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, AppError> {
        let params = json!([
            program_id.to_string(),
            { "encoding": "base64", "commitment": self.config.commitment }
        ]);
        let accounts: Vec<KeyedAccount> = self.rpc_call("getProgramAccounts", params).await?;
        debug!(count = accounts.len(), "Fetched program accounts");

        accounts
            .into_iter()
            .map(|keyed| -> Result<(Pubkey, Vec<u8>), AppError> {
                let address = parse_address(&keyed.pubkey)?;
                Ok((address, keyed.account.decode()?))
            })
            .collect()
    }

    /// Submit a signed transaction. Preflight runs at the configured commitment.
    #[instrument(skip(self, transaction), fields(size = transaction.len()))]
    pub async fn send_transaction(&self, transaction: &[u8]) -> Result<String, AppError> {
        let params = json!([
            STANDARD.encode(transaction),
            { "encoding": "base64", "preflightCommitment": self.config.commitment }
        ]);
        let signature: String = self.rpc_call("sendTransaction", params).await?;
        info!(signature = %signature, "Transaction sent");
        Ok(signature)
    }

    /// True once the transaction reached the configured commitment.
    #[instrument(skip(self))]
    pub async fn get_transaction_status(&self, signature: &str) -> Result<bool, AppError> {
        let params = json!([[signature], { "searchTransactionHistory": true }]);
        let result: WithContext<Vec<Option<SignatureStatus>>> =
            self.rpc_call("getSignatureStatuses", params).await?;

        match result.value.first() {
            Some(Some(status)) => {
                if let Some(err) = &status.err {
                    let text = err.to_string();
                    if ProgramError::is_program_failure(&text) {
                        return Err(AppError::Program(ProgramError::classify(&text, None)));
                    }
                    return Err(AppError::Blockchain(BlockchainError::TransactionFailed(
                        text,
                    )));
                }
                Ok(status
                    .confirmation_status
                    .as_deref()
                    .is_some_and(|level| {
                        commitment_rank(level) >= commitment_rank(&self.config.commitment)
                    }))
            }
            _ => Ok(false),
        }
    }

    #[instrument(skip(self))]
    pub async fn wait_for_confirmation(&self, signature: &str) -> Result<(), AppError> {
        let timeout = self.config.confirmation_timeout;
        let start = Instant::now();

        while start.elapsed() < timeout {
            match self.get_transaction_status(signature).await {
                Ok(true) => {
                    info!(signature = %signature, "Transaction confirmed");
                    return Ok(());
                }
                Ok(false) => {
                    debug!(signature = %signature, "Transaction not yet confirmed");
                }
                Err(
                    e @ (AppError::Program(_)
                    | AppError::Blockchain(BlockchainError::TransactionFailed(_))),
                ) => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(signature = %signature, error = ?e, "Error checking transaction status");
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        Err(AppError::Blockchain(BlockchainError::Timeout(format!(
            "Transaction {} not confirmed within {}s",
            signature,
            timeout.as_secs()
        ))))
    }
}
