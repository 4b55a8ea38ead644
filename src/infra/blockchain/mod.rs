//! Solana plumbing: RPC transport, transaction codec, address derivation
//! and the supplychain program client built on top of them.

pub mod anchor;
pub mod pda;
pub mod rpc;
pub mod signer;
pub mod solana;
pub mod transaction;

pub use rpc::{RpcClient, RpcClientConfig};
pub use signer::{LocalSigner, signing_key_from_base58};
pub use solana::SupplyChainClient;
