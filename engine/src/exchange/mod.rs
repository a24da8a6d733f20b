//! Spot exchange client contract and implementations

pub mod client;
pub mod mock;
pub mod okx;
pub mod types;

pub use client::SpotExchangeApi;
pub use mock::MockExchange;
pub use okx::{OkxCredentials, OkxRest};
pub use types::*;
