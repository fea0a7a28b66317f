//! Usage history queries.
//!
//! A user sees their own redemptions across every vendor. A vendor sees the
//! redemptions of its own vouchers, together with any fraud flags an
//! administrator has raised on them. Administrators may read either view.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{CommandMetadata, OwnedByVendor, UserId, VoucherId};
use crate::domain::voucher::{FraudFlag, VoucherError, VoucherUsage};
use crate::ports::{UsageLedger, VoucherRepository};

#[derive(Debug, Clone)]
pub struct GetUserUsageHistoryQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct GetVoucherUsageHistoryQuery {
    pub voucher_id: VoucherId,
}

/// A usage row with its fraud flag, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    #[serde(flatten)]
    pub usage: VoucherUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraud_flag: Option<FraudFlag>,
}

pub struct GetUserUsageHistoryHandler {
    ledger: Arc<dyn UsageLedger>,
}

impl GetUserUsageHistoryHandler {
    pub fn new(ledger: Arc<dyn UsageLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        query: GetUserUsageHistoryQuery,
        metadata: CommandMetadata,
    ) -> Result<Vec<VoucherUsage>, VoucherError> {
        let caller = metadata.caller()?;
        if !caller.is_admin() && caller.as_user().as_ref() != Some(&query.user_id) {
            return Err(VoucherError::unauthorized(
                "caller may only read its own usage history",
            ));
        }
        Ok(self.ledger.list_usages_for_user(&query.user_id).await?)
    }
}

pub struct GetVoucherUsageHistoryHandler {
    repository: Arc<dyn VoucherRepository>,
    ledger: Arc<dyn UsageLedger>,
}

impl GetVoucherUsageHistoryHandler {
    pub fn new(repository: Arc<dyn VoucherRepository>, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { repository, ledger }
    }

    pub async fn handle(
        &self,
        query: GetVoucherUsageHistoryQuery,
        metadata: CommandMetadata,
    ) -> Result<Vec<UsageRecord>, VoucherError> {
        let caller = metadata.caller()?;
        let voucher = self
            .repository
            .find_by_id(&query.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(query.voucher_id))?;
        voucher.check_access(caller)?;

        let mut flags: HashMap<_, FraudFlag> = self
            .ledger
            .list_fraud_flags(&voucher.id)
            .await?
            .into_iter()
            .map(|flag| (flag.usage_id, flag))
            .collect();

        Ok(self
            .ledger
            .list_usages_for_voucher(&voucher.id)
            .await?
            .into_iter()
            .map(|usage| UsageRecord {
                fraud_flag: flags.remove(&usage.id),
                usage,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{
        admin_meta, user_id, user_meta, vendor_meta, Fixture,
    };
    use crate::domain::foundation::Timestamp;

    #[tokio::test]
    async fn user_sees_own_history_across_vendors() {
        let fx = Fixture::new();
        fx.seed_default("vendor-1", "SUMMER25").await;
        fx.seed_default("vendor-2", "WINTER25").await;
        fx.redeem("vendor-1", "SUMMER25", "user-1", 10_000).await;
        fx.redeem("vendor-2", "WINTER25", "user-1", 5_000).await;
        fx.redeem("vendor-2", "WINTER25", "user-2", 5_000).await;

        let handler = GetUserUsageHistoryHandler::new(fx.store.clone());
        let history = handler
            .handle(
                GetUserUsageHistoryQuery {
                    user_id: user_id("user-1"),
                },
                user_meta("user-1"),
            )
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|u| u.user_id == user_id("user-1")));
    }

    #[tokio::test]
    async fn other_users_history_is_private() {
        let fx = Fixture::new();
        let handler = GetUserUsageHistoryHandler::new(fx.store.clone());
        let query = GetUserUsageHistoryQuery {
            user_id: user_id("user-1"),
        };

        let peek = handler.handle(query.clone(), user_meta("user-2")).await;
        assert!(matches!(peek, Err(VoucherError::Unauthorized(_))));
        assert!(handler.handle(query, admin_meta()).await.is_ok());
    }

    #[tokio::test]
    async fn voucher_history_carries_fraud_flags() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;
        let flagged = fx.redeem("vendor-1", "SUMMER25", "user-1", 10_000).await;
        let clean = fx.redeem("vendor-1", "SUMMER25", "user-2", 10_000).await;
        fx.store
            .flag_usage(&FraudFlag {
                usage_id: flagged.id,
                voucher_id: voucher.id,
                reason: "chargeback".to_string(),
                flagged_by: "ops-1".to_string(),
                flagged_at: Timestamp::now(),
            })
            .await
            .unwrap();

        let handler = GetVoucherUsageHistoryHandler::new(fx.store.clone(), fx.store.clone());
        let records = handler
            .handle(
                GetVoucherUsageHistoryQuery {
                    voucher_id: voucher.id,
                },
                vendor_meta("vendor-1"),
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        let by_id = |id| records.iter().find(|r| r.usage.id == id).unwrap();
        assert_eq!(by_id(flagged.id).fraud_flag.as_ref().unwrap().reason, "chargeback");
        assert!(by_id(clean.id).fraud_flag.is_none());

        let foreign = handler
            .handle(
                GetVoucherUsageHistoryQuery {
                    voucher_id: voucher.id,
                },
                vendor_meta("vendor-2"),
            )
            .await;
        assert!(matches!(foreign, Err(VoucherError::Unauthorized(_))));
    }
}
