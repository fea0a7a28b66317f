//! Voucher catalog, redemption and read-side handlers.
//!
//! Catalog operations (create, update, delete, toggle) are scoped to the
//! owning vendor. `ApplyVoucherHandler` is the redemption coordinator and
//! `ValidateVoucherHandler` its read-only preview. The `Get*`/`List*`
//! handlers are queries and never take row locks.

mod apply_voucher;
mod create_voucher;
mod delete_voucher;
mod get_usage_history;
mod get_voucher;
mod get_voucher_stats;
mod list_vendor_vouchers;
mod toggle_voucher_status;
mod update_voucher;
mod validate_voucher;

pub use apply_voucher::{ApplyVoucherCommand, ApplyVoucherHandler};
pub use create_voucher::{CreateVoucherCommand, CreateVoucherHandler};
pub use delete_voucher::{DeleteVoucherCommand, DeleteVoucherHandler};
pub use get_usage_history::{
    GetUserUsageHistoryHandler, GetUserUsageHistoryQuery, GetVoucherUsageHistoryHandler,
    GetVoucherUsageHistoryQuery, UsageRecord,
};
pub use get_voucher::{GetVoucherHandler, GetVoucherQuery};
pub use get_voucher_stats::{GetVoucherStatsHandler, GetVoucherStatsQuery, VoucherStats};
pub use list_vendor_vouchers::{ListVendorVouchersHandler, ListVendorVouchersQuery};
pub use toggle_voucher_status::{ToggleVoucherStatusCommand, ToggleVoucherStatusHandler};
pub use update_voucher::{UpdateVoucherCommand, UpdateVoucherHandler};
pub use validate_voucher::{ValidateVoucherHandler, ValidateVoucherQuery, VoucherValidation};
