//! Client for the supplychain program.
//!
//! Writes are compiled into legacy transactions paid for and signed by the
//! configured wallet; reads decode raw account data fetched over RPC.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::domain::{
    AppError, Product, ProgramError, Pubkey, Role, SupplyChainProgram,
    TransactionSignature, TransactionSigner,
};

use super::anchor::{ProgramInstruction, decode_product, decode_user_role};
use super::pda::{admin_authority_address, product_address, user_role_address};
use super::rpc::RpcClient;
use super::transaction::{
    AccountMeta, SYSTEM_PROGRAM_ID, compile_message, encode_signed,
};
use solana_instruction::Instruction;

/// `SupplyChainProgram` over a Solana RPC node.
pub struct SupplyChainClient {
    rpc: RpcClient,
    program_id: Pubkey,
    signer: Option<Arc<dyn TransactionSigner>>,
    admin_address: Option<Pubkey>,
}

impl SupplyChainClient {
    #[must_use]
    pub fn new(
        rpc: RpcClient,
        program_id: Pubkey,
        signer: Option<Arc<dyn TransactionSigner>>,
        admin_address: Option<Pubkey>,
    ) -> Self {
        info!(
            program_id = %program_id,
            wallet = ?signer.as_ref().map(|s| s.public_key().to_string()),
            "Created supplychain client"
        );
        Self {
            rpc,
            program_id,
            signer,
            admin_address,
        }
    }

    #[must_use]
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn signer(&self) -> Result<&Arc<dyn TransactionSigner>, AppError> {
        self.signer
            .as_ref()
            .ok_or(AppError::Program(ProgramError::WalletNotConnected))
    }

    fn instruction(
        &self,
        ix: &ProgramInstruction,
        accounts: Vec<AccountMeta>,
    ) -> Result<Instruction, AppError> {
        Ok(Instruction::new_with_bytes(
            self.program_id,
            &ix.data()?,
            accounts,
        ))
    }

    /// Compile, sign, send and confirm a single instruction.
    #[instrument(skip(self, instruction), fields(program_id = %self.program_id))]
    async fn submit(&self, instruction: Instruction) -> Result<TransactionSignature, AppError> {
        let signer = self.signer()?;
        let payer = signer.public_key();

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let message = compile_message(&payer, &[instruction], blockhash);
        let message_bytes = message.serialize();
        debug!(
            accounts = message.account_keys.len(),
            bytes = message_bytes.len(),
            "Compiled transaction"
        );

        let signature = signer.sign_message(&message_bytes).await?;
        let transaction = encode_signed(message, vec![signature])?;

        let tx_signature = self.rpc.send_transaction(&transaction).await?;
        self.rpc.wait_for_confirmation(&tx_signature).await?;
        Ok(tx_signature)
    }
}

/// Replaces the placeholder address in a not-found error with the real one.
fn with_address(err: AppError, address: &Pubkey) -> AppError {
    match err {
        AppError::Program(ProgramError::ProductNotFound(_)) => {
            AppError::Program(ProgramError::ProductNotFound(address.to_string()))
        }
        other => other,
    }
}

#[async_trait]
impl SupplyChainProgram for SupplyChainClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        self.rpc.get_slot().await?;
        Ok(())
    }

    fn wallet(&self) -> Option<Pubkey> {
        self.signer.as_ref().map(|s| s.public_key())
    }

    fn program_id(&self) -> Pubkey {
        self.program_id
    }

    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<TransactionSignature, AppError> {
        let wallet = self.signer()?.public_key();
        let ix = self.instruction(
            &ProgramInstruction::Initialize,
            vec![
                AccountMeta::new(wallet, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
        )?;
        let signature = self.submit(ix).await?;
        info!(signature = %signature, admin = %wallet, "Program initialized");
        Ok(signature)
    }

    #[instrument(skip(self, updater), fields(updater = %updater))]
    async fn register_product(
        &self,
        product_id: &str,
        location: &str,
        updater: &Pubkey,
    ) -> Result<(Pubkey, TransactionSignature), AppError> {
        let manufacturer = self.signer()?.public_key();
        let (address, _bump) = product_address(&manufacturer, product_id, &self.program_id)?;

        let ix = self.instruction(
            &ProgramInstruction::RegisterProduct {
                product_id: product_id.to_string(),
                location: location.to_string(),
            },
            vec![
                AccountMeta::new(address, false),
                AccountMeta::new(manufacturer, true),
                AccountMeta::new_readonly(*updater, false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
        )?;

        let signature = self.submit(ix).await?;
        info!(address = %address, signature = %signature, "Product registered");
        Ok((address, signature))
    }

    #[instrument(skip(self, address), fields(address = %address))]
    async fn update_product(
        &self,
        address: &Pubkey,
        location: &str,
        delivered: bool,
    ) -> Result<TransactionSignature, AppError> {
        let wallet = self.signer()?.public_key();

        let product = self
            .fetch_product(address)
            .await?
            .ok_or_else(|| AppError::Program(ProgramError::ProductNotFound(address.to_string())))?;
        if !product.is_updatable_by(&wallet) {
            return Err(AppError::Program(ProgramError::UnauthorizedUpdater));
        }

        let ix = self.instruction(
            &ProgramInstruction::UpdateProduct {
                location: location.to_string(),
                delivered,
            },
            vec![
                AccountMeta::new(*address, false),
                AccountMeta::new(wallet, true),
            ],
        )?;

        let signature = self
            .submit(ix)
            .await
            .map_err(|e| with_address(e, address))?;
        info!(signature = %signature, delivered = delivered, "Product updated");
        Ok(signature)
    }

    #[instrument(skip(self, address), fields(address = %address))]
    async fn verify_product(&self, address: &Pubkey) -> Result<TransactionSignature, AppError> {
        let ix = self.instruction(
            &ProgramInstruction::VerifyProduct,
            vec![AccountMeta::new_readonly(*address, false)],
        )?;
        self.submit(ix).await.map_err(|e| with_address(e, address))
    }

    #[instrument(skip(self, user), fields(user = %user))]
    async fn assign_role(
        &self,
        user: &Pubkey,
        role: Role,
    ) -> Result<TransactionSignature, AppError> {
        let admin = self.signer()?.public_key();
        let (user_role, _) = user_role_address(user, &self.program_id)?;
        let (admin_authority, _) = admin_authority_address(&self.program_id)?;

        let ix = self.instruction(
            &ProgramInstruction::AssignRole { role },
            vec![
                AccountMeta::new(user_role, false),
                AccountMeta::new_readonly(*user, false),
                AccountMeta::new_readonly(admin_authority, false),
                AccountMeta::new(admin, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
        )?;

        let signature = self.submit(ix).await?;
        info!(signature = %signature, role = %role, "Role assigned");
        Ok(signature)
    }

    #[instrument(skip(self, address), fields(address = %address))]
    async fn fetch_product(&self, address: &Pubkey) -> Result<Option<Product>, AppError> {
        let Some(data) = self.rpc.get_account_data(address).await? else {
            return Ok(None);
        };
        match decode_product(*address, &data) {
            Ok(product) => Ok(Some(product)),
            Err(e) => {
                debug!(error = %e, "Account at address is not a product");
                Err(AppError::Program(ProgramError::ProductNotFound(
                    address.to_string(),
                )))
            }
        }
    }

    #[instrument(skip(self, user), fields(user = %user))]
    async fn fetch_role(&self, user: &Pubkey) -> Result<Option<Role>, AppError> {
        if self.admin_address.as_ref() == Some(user) {
            return Ok(Some(Role::Admin));
        }

        let (user_role, _) = user_role_address(user, &self.program_id)?;
        match self.rpc.get_account_data(&user_role).await? {
            Some(data) => Ok(Some(decode_user_role(&data)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn all_products(&self) -> Result<Vec<Product>, AppError> {
        let accounts = self.rpc.get_program_accounts(&self.program_id).await?;
        let total = accounts.len();

        let products: Vec<Product> = accounts
            .into_iter()
            .filter_map(|(address, data)| match decode_product(address, &data) {
                Ok(product) => Some(product),
                Err(e) => {
                    debug!(address = %address, error = %e, "Skipping undecodable account");
                    None
                }
            })
            .collect();

        debug!(total = total, products = products.len(), "Scanned program accounts");
        Ok(products)
    }
}
