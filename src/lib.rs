//! Supplychain Gateway
//!
//! HTTP gateway for the supplychain product-traceability program on Solana.
//! Manufacturers register products, designated updaters append location
//! updates, and anyone can verify a product by its program-derived address.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │   HTTP handlers, routing, API key, limits    │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │    Use-cases over the program and registry   │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │         Ports, types, user-facing errors     │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  JSON-RPC, transactions, Postgres, EmailJS   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every external system sits behind a trait in [`domain::traits`], so the
//! service layer is tested against the mocks in `test_utils`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use supplychain_gateway::api::create_router;
//! use supplychain_gateway::app::{AppState, ServiceSettings};
//! use supplychain_gateway::infra::{DisabledNotifier, InMemoryRegistry, RpcClient, SupplyChainClient};
//!
//! let rpc = RpcClient::with_defaults("https://api.devnet.solana.com")?;
//! let program = Arc::new(SupplyChainClient::new(rpc, program_id, None, None));
//! let state = AppState::new(
//!     program,
//!     Arc::new(InMemoryRegistry::new()),
//!     Arc::new(DisabledNotifier),
//!     ServiceSettings::default(),
//!     api_key,
//! );
//! axum::serve(listener, create_router(Arc::new(state))).await?;
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
