//! Bookkeeping core of the INSSats retirement tracker.
//!
//! The crate is organised around one small state machine and the pure helpers
//! the wallet screens lean on:
//!
//! * [`ledger`]: the planned-withdrawal vault, which reserves funds with
//!   `initiate` and settles them with `execute`.
//! * [`signature`]: the verification seam consulted before a reservation is
//!   accepted, with an Ed25519 implementation.
//! * [`controller`]: an observable state holder that feeds raw form input
//!   into the ledger and publishes the outcome to subscribers.
//! * [`format`]: sats, fiat and BTC formatting.
//! * [`projection`]: retirement curve transforms.
//! * [`statement`]: purchase history aggregation and withdrawal vetoes.
//! * [`config`]: vault settings loaded from JSON.

pub mod config;
pub mod controller;
pub mod format;
pub mod ledger;
pub mod projection;
pub mod signature;
pub mod statement;

pub use ledger::{LedgerError, PendingOperation, Sats, SharedLedger, VaultConfig, VaultLedger};
