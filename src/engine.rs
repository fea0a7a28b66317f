//! Composition root.
//!
//! `VoucherEngine` holds the shared port implementations and builds
//! handlers on demand. It is cheap to clone; every clone shares the same
//! store and publisher.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::adapters::{
    InMemoryEventBus, InMemoryVoucherStore, PostgresAdminAuditLog, PostgresUsageLedger,
    PostgresVoucherRepository, TracingEventPublisher,
};
use crate::application::handlers::voucher::{
    ApplyVoucherHandler, CreateVoucherHandler, DeleteVoucherHandler, GetUserUsageHistoryHandler,
    GetVoucherHandler, GetVoucherStatsHandler, GetVoucherUsageHistoryHandler,
    ListVendorVouchersHandler, ToggleVoucherStatusHandler, UpdateVoucherHandler,
    ValidateVoucherHandler,
};
use crate::application::handlers::voucher_admin::{
    BulkDeactivateHandler, BulkUpdateHandler, CleanupExpiredHandler,
    CreateSystemPromotionHandler, EmergencyToggleHandler, ForceDeleteHandler,
    MarkUsageFraudulentHandler, OverrideLimitsHandler, ReconcileUsageCounterHandler,
    RestoreVendorHandler, SuspendVendorHandler,
};
use crate::config::{AppConfig, ConfigError, VoucherPolicyConfig};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger, VoucherRepository};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Shared dependencies for every voucher handler.
#[derive(Clone)]
pub struct VoucherEngine {
    pub repository: Arc<dyn VoucherRepository>,
    pub ledger: Arc<dyn UsageLedger>,
    pub audit_log: Arc<dyn AdminAuditLog>,
    pub event_publisher: Arc<dyn EventPublisher>,
    pub policy: VoucherPolicyConfig,
}

impl VoucherEngine {
    /// Process-local engine backed by a single in-memory store.
    ///
    /// Returns the event bus as well so callers can inspect published events.
    pub fn in_memory(policy: VoucherPolicyConfig) -> (Self, Arc<InMemoryEventBus>) {
        let store = Arc::new(InMemoryVoucherStore::with_lock_timeout(policy.lock_timeout()));
        let bus = Arc::new(InMemoryEventBus::new());
        let engine = Self {
            repository: store.clone(),
            ledger: store.clone(),
            audit_log: store,
            event_publisher: bus.clone(),
            policy,
        };
        (engine, bus)
    }

    /// PostgreSQL-backed engine. Lifecycle events go to the log.
    pub async fn connect_postgres(config: &AppConfig) -> Result<Self, EngineError> {
        config.validate().map_err(ConfigError::from)?;

        let pool = config.database.pool_options().connect(&config.database.url).await?;
        if config.database.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("voucher migrations applied");
        }

        Ok(Self {
            repository: Arc::new(PostgresVoucherRepository::new(pool.clone())),
            ledger: Arc::new(PostgresUsageLedger::new(
                pool.clone(),
                config.vouchers.lock_timeout(),
            )),
            audit_log: Arc::new(PostgresAdminAuditLog::new(pool)),
            event_publisher: Arc::new(TracingEventPublisher::new()),
            policy: config.vouchers.clone(),
        })
    }

    // Catalog, redemption and queries

    pub fn create_voucher_handler(&self) -> CreateVoucherHandler {
        CreateVoucherHandler::new(self.repository.clone(), self.event_publisher.clone())
    }

    pub fn update_voucher_handler(&self) -> UpdateVoucherHandler {
        UpdateVoucherHandler::new(
            self.repository.clone(),
            self.ledger.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn delete_voucher_handler(&self) -> DeleteVoucherHandler {
        DeleteVoucherHandler::new(self.ledger.clone(), self.event_publisher.clone())
    }

    pub fn toggle_voucher_status_handler(&self) -> ToggleVoucherStatusHandler {
        ToggleVoucherStatusHandler::new(self.ledger.clone(), self.event_publisher.clone())
    }

    pub fn apply_voucher_handler(&self) -> ApplyVoucherHandler {
        ApplyVoucherHandler::new(self.ledger.clone(), self.event_publisher.clone())
    }

    pub fn validate_voucher_handler(&self) -> ValidateVoucherHandler {
        ValidateVoucherHandler::new(self.repository.clone(), self.ledger.clone())
    }

    pub fn get_voucher_handler(&self) -> GetVoucherHandler {
        GetVoucherHandler::new(self.repository.clone())
    }

    pub fn list_vendor_vouchers_handler(&self) -> ListVendorVouchersHandler {
        ListVendorVouchersHandler::new(self.repository.clone())
    }

    pub fn user_usage_history_handler(&self) -> GetUserUsageHistoryHandler {
        GetUserUsageHistoryHandler::new(self.ledger.clone())
    }

    pub fn voucher_usage_history_handler(&self) -> GetVoucherUsageHistoryHandler {
        GetVoucherUsageHistoryHandler::new(self.repository.clone(), self.ledger.clone())
    }

    pub fn voucher_stats_handler(&self) -> GetVoucherStatsHandler {
        GetVoucherStatsHandler::new(self.repository.clone(), self.ledger.clone())
    }

    // Administrative surface

    pub fn bulk_update_handler(&self) -> BulkUpdateHandler {
        BulkUpdateHandler::new(
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
        .with_max_bulk_size(self.policy.max_bulk_size)
    }

    pub fn bulk_deactivate_handler(&self) -> BulkDeactivateHandler {
        BulkDeactivateHandler::new(
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
        .with_max_bulk_size(self.policy.max_bulk_size)
    }

    pub fn suspend_vendor_handler(&self) -> SuspendVendorHandler {
        SuspendVendorHandler::new(
            self.repository.clone(),
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn restore_vendor_handler(&self) -> RestoreVendorHandler {
        RestoreVendorHandler::new(
            self.repository.clone(),
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn override_limits_handler(&self) -> OverrideLimitsHandler {
        OverrideLimitsHandler::new(
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn mark_usage_fraudulent_handler(&self) -> MarkUsageFraudulentHandler {
        MarkUsageFraudulentHandler::new(
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn cleanup_expired_handler(&self) -> CleanupExpiredHandler {
        CleanupExpiredHandler::new(
            self.repository.clone(),
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
        .with_min_age_days(self.policy.cleanup_min_age_days)
        .with_batch_size(self.policy.max_bulk_size)
    }

    pub fn force_delete_handler(&self) -> ForceDeleteHandler {
        ForceDeleteHandler::new(
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn system_promotion_handler(&self) -> CreateSystemPromotionHandler {
        CreateSystemPromotionHandler::new(
            self.repository.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
        .with_code_prefix(self.policy.promotion_code_prefix.clone())
        .with_max_bulk_size(self.policy.max_bulk_size)
    }

    pub fn emergency_toggle_handler(&self) -> EmergencyToggleHandler {
        EmergencyToggleHandler::new(
            self.repository.clone(),
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
        .with_max_bulk_size(self.policy.max_bulk_size)
    }

    pub fn reconcile_counter_handler(&self) -> ReconcileUsageCounterHandler {
        ReconcileUsageCounterHandler::new(
            self.ledger.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        )
    }
}
