//! Program-derived addresses of the supplychain accounts.

use crate::domain::{BlockchainError, MAX_SEED_LEN, Pubkey};

pub const PRODUCT_SEED: &[u8] = b"product";
pub const ADMIN_AUTHORITY_SEED: &[u8] = b"admin_authority";
pub const USER_ROLE_SEED: &[u8] = b"user_role";

/// Canonical PDA and bump for `seeds`.
fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), BlockchainError> {
    Pubkey::try_find_program_address(seeds, program_id).ok_or_else(|| {
        BlockchainError::InvalidAccountData(format!(
            "No program address for {} seeds (each at most {} bytes)",
            seeds.len(),
            MAX_SEED_LEN
        ))
    })
}

/// Product accounts are keyed by manufacturer and product name.
pub fn product_address(
    manufacturer: &Pubkey,
    product_id: &str,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), BlockchainError> {
    find_program_address(
        &[PRODUCT_SEED, manufacturer.as_ref(), product_id.as_bytes()],
        program_id,
    )
}

pub fn admin_authority_address(program_id: &Pubkey) -> Result<(Pubkey, u8), BlockchainError> {
    find_program_address(&[ADMIN_AUTHORITY_SEED], program_id)
}

pub fn user_role_address(
    user: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), BlockchainError> {
    find_program_address(&[USER_ROLE_SEED, user.as_ref()], program_id)
}
