//! Voucher Engine - Discount vouchers for a multi-vendor services marketplace
//!
//! Vendors define coupon codes for their services; end-users redeem them at
//! checkout. Redemption is linearized per voucher by a row lock so global
//! and per-user limits hold under concurrent checkouts. Administrators get a
//! separate control surface that goes through the same locking path.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;

pub use engine::{EngineError, VoucherEngine};
