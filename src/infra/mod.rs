//! Infrastructure layer implementations.

pub mod blockchain;
pub mod email;
pub mod observability;
pub mod qr;
pub mod registry;

pub use blockchain::{
    LocalSigner, RpcClient, RpcClientConfig, SupplyChainClient, signing_key_from_base58,
};
pub use email::{DisabledNotifier, EmailJsConfig, EmailJsNotifier};
pub use qr::verification_qr_svg;
pub use registry::{InMemoryRegistry, PostgresConfig, PostgresRegistry};
