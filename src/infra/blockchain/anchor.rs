//! Anchor wire format for the supplychain program.
//!
//! Instructions are an 8-byte discriminator, `sha256("global:<name>")[..8]`,
//! followed by borsh-encoded arguments. Accounts start with
//! `sha256("account:<Name>")[..8]` and may carry trailing padding.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

use crate::domain::{BlockchainError, Product, Pubkey, Role};

pub const DISCRIMINATOR_LEN: usize = 8;

#[must_use]
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    discriminator("global", name)
}

#[must_use]
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    discriminator("account", name)
}

fn discriminator(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let hash = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&hash[..DISCRIMINATOR_LEN]);
    out
}

/// Instructions exposed by the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramInstruction {
    Initialize,
    RegisterProduct { product_id: String, location: String },
    UpdateProduct { location: String, delivered: bool },
    VerifyProduct,
    AssignRole { role: Role },
}

#[derive(BorshSerialize)]
struct RegisterProductArgs<'a> {
    product_id: &'a str,
    location: &'a str,
}

#[derive(BorshSerialize)]
struct UpdateProductArgs<'a> {
    location: &'a str,
    delivered: bool,
}

#[derive(BorshSerialize)]
struct AssignRoleArgs {
    role: u8,
}

impl ProgramInstruction {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ProgramInstruction::Initialize => "initialize",
            ProgramInstruction::RegisterProduct { .. } => "register_product",
            ProgramInstruction::UpdateProduct { .. } => "update_product",
            ProgramInstruction::VerifyProduct => "verify_product",
            ProgramInstruction::AssignRole { .. } => "assign_role",
        }
    }

    /// Serializes discriminator and arguments.
    pub fn data(&self) -> Result<Vec<u8>, BlockchainError> {
        let mut data = instruction_discriminator(self.name()).to_vec();
        let args = match self {
            ProgramInstruction::Initialize | ProgramInstruction::VerifyProduct => Ok(Vec::new()),
            ProgramInstruction::RegisterProduct {
                product_id,
                location,
            } => borsh::to_vec(&RegisterProductArgs {
                product_id,
                location,
            }),
            ProgramInstruction::UpdateProduct {
                location,
                delivered,
            } => borsh::to_vec(&UpdateProductArgs {
                location,
                delivered: *delivered,
            }),
            ProgramInstruction::AssignRole { role } => borsh::to_vec(&AssignRoleArgs {
                role: role.ordinal(),
            }),
        }
        .map_err(|e| BlockchainError::InvalidAccountData(e.to_string()))?;
        data.extend_from_slice(&args);
        Ok(data)
    }
}

/// Body of a `Product` account after the discriminator.
#[derive(Debug, BorshSerialize, BorshDeserialize)]
struct ProductAccount {
    product_id: String,
    manufacturer: Pubkey,
    updater: Pubkey,
    location: String,
    delivered: bool,
    bump: u8,
}

/// Body of a `UserRole` account after the discriminator.
#[derive(Debug, BorshSerialize, BorshDeserialize)]
struct UserRoleAccount {
    user: Pubkey,
    role: u8,
    bump: u8,
}

fn strip_discriminator<'a>(
    account: &str,
    data: &'a [u8],
) -> Result<&'a [u8], BlockchainError> {
    let expected = account_discriminator(account);
    match data.split_at_checked(DISCRIMINATOR_LEN) {
        Some((head, body)) if head == expected.as_slice() => Ok(body),
        Some(_) => Err(BlockchainError::InvalidAccountData(format!(
            "Account is not a {}",
            account
        ))),
        None => Err(BlockchainError::InvalidAccountData(format!(
            "Account data too short for a {}: {} bytes",
            account,
            data.len()
        ))),
    }
}

fn encode_account<T: BorshSerialize>(account: &str, body: &T) -> Result<Vec<u8>, BlockchainError> {
    let mut data = account_discriminator(account).to_vec();
    body.serialize(&mut data)
        .map_err(|e| BlockchainError::InvalidAccountData(e.to_string()))?;
    Ok(data)
}

/// Decodes a `Product` account found at `address`.
pub fn decode_product(address: Pubkey, data: &[u8]) -> Result<Product, BlockchainError> {
    let mut body = strip_discriminator("Product", data)?;
    let account = ProductAccount::deserialize(&mut body)
        .map_err(|e| BlockchainError::InvalidAccountData(e.to_string()))?;

    Ok(Product {
        address,
        product_id: account.product_id,
        manufacturer: account.manufacturer,
        updater: account.updater,
        location: account.location,
        delivered: account.delivered,
        bump: account.bump,
    })
}

/// Decodes the role stored in a `UserRole` account.
pub fn decode_user_role(data: &[u8]) -> Result<Role, BlockchainError> {
    let mut body = strip_discriminator("UserRole", data)?;
    let account = UserRoleAccount::deserialize(&mut body)
        .map_err(|e| BlockchainError::InvalidAccountData(e.to_string()))?;
    Role::from_ordinal(account.role).ok_or_else(|| {
        BlockchainError::InvalidAccountData(format!(
            "Unknown role ordinal {} for {}",
            account.role, account.user
        ))
    })
}

/// Encodes a product account the way the program stores it.
pub fn encode_product(product: &Product) -> Result<Vec<u8>, BlockchainError> {
    encode_account(
        "Product",
        &ProductAccount {
            product_id: product.product_id.clone(),
            manufacturer: product.manufacturer,
            updater: product.updater,
            location: product.location.clone(),
            delivered: product.delivered,
            bump: product.bump,
        },
    )
}

/// Encodes a user role account the way the program stores it.
pub fn encode_user_role(user: &Pubkey, role: Role, bump: u8) -> Result<Vec<u8>, BlockchainError> {
    encode_account(
        "UserRole",
        &UserRoleAccount {
            user: *user,
            role: role.ordinal(),
            bump,
        },
    )
}
