//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, caller identity, errors)
//! - `voucher` - Voucher aggregate, discount calculator, eligibility evaluator and redemption records

pub mod foundation;
pub mod voucher;
