//! Business layer of the PC sample backend.
//! - `storage`: the JSON key-value "database" behind an injectable trait.
//! - `transactions`: transaction status bookkeeping on top of the store.
//! - `callback`: validation of PC transaction callbacks.
//! - `alias` and `qr`: user provisioning by alias or by scanned QR code.
//! - `auth`: the authentication round trip.

pub mod errors;
pub mod storage;
pub mod transactions;
pub mod callback;
pub mod alias;
pub mod qr;
pub mod auth;
pub mod metrics;
