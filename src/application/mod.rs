//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).

pub mod handlers;

pub use handlers::voucher::{
    ApplyVoucherCommand, ApplyVoucherHandler, CreateVoucherCommand, CreateVoucherHandler,
    DeleteVoucherCommand, DeleteVoucherHandler, GetUserUsageHistoryHandler,
    GetUserUsageHistoryQuery, GetVoucherHandler, GetVoucherQuery, GetVoucherStatsHandler,
    GetVoucherStatsQuery, GetVoucherUsageHistoryHandler, GetVoucherUsageHistoryQuery,
    ListVendorVouchersHandler, ListVendorVouchersQuery, ToggleVoucherStatusCommand,
    ToggleVoucherStatusHandler, UpdateVoucherCommand, UpdateVoucherHandler, UsageRecord,
    ValidateVoucherHandler, ValidateVoucherQuery, VoucherStats, VoucherValidation,
};

pub use handlers::voucher_admin::{
    BulkDeactivateCommand, BulkDeactivateHandler, BulkUpdateCommand, BulkUpdateHandler,
    CleanupExpiredCommand, CleanupExpiredHandler, CreateSystemPromotionCommand,
    CreateSystemPromotionHandler, EmergencyToggleCommand, EmergencyToggleHandler,
    ForceDeleteCommand, ForceDeleteHandler, ForceDeleteResult, MarkUsageFraudulentCommand,
    MarkUsageFraudulentHandler, OverrideLimitsCommand, OverrideLimitsHandler,
    ReconcileCounterResult, ReconcileUsageCounterCommand, ReconcileUsageCounterHandler,
    RestoreVendorCommand, RestoreVendorHandler, SuspendVendorCommand, SuspendVendorHandler,
    SystemPromotionResult,
};
