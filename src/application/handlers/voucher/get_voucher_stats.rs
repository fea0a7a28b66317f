//! GetVoucherStatsHandler - Redemption statistics for one voucher.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::foundation::{CommandMetadata, Money, OwnedByVendor, VoucherId};
use crate::domain::voucher::{VoucherError, VoucherUsage};
use crate::ports::{UsageLedger, VoucherRepository};

#[derive(Debug, Clone)]
pub struct GetVoucherStatsQuery {
    pub voucher_id: VoucherId,
}

/// Aggregates computed from the usage rows, not from the cached counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoucherStats {
    pub voucher_id: VoucherId,
    pub redemption_count: u64,
    pub distinct_users: u64,
    pub total_discount: Money,
    /// `None` when the voucher has no global limit.
    pub remaining_capacity: Option<u32>,
    pub flagged_count: u64,
}

impl VoucherStats {
    fn from_usages(voucher_id: VoucherId, usages: &[VoucherUsage]) -> Self {
        let distinct: HashSet<_> = usages.iter().map(|u| &u.user_id).collect();
        let total_cents = usages
            .iter()
            .fold(0i64, |acc, u| acc.saturating_add(u.discount_amount.cents()));
        Self {
            voucher_id,
            redemption_count: usages.len() as u64,
            distinct_users: distinct.len() as u64,
            total_discount: Money::from_cents(total_cents),
            remaining_capacity: None,
            flagged_count: 0,
        }
    }
}

pub struct GetVoucherStatsHandler {
    repository: Arc<dyn VoucherRepository>,
    ledger: Arc<dyn UsageLedger>,
}

impl GetVoucherStatsHandler {
    pub fn new(repository: Arc<dyn VoucherRepository>, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { repository, ledger }
    }

    pub async fn handle(
        &self,
        query: GetVoucherStatsQuery,
        metadata: CommandMetadata,
    ) -> Result<VoucherStats, VoucherError> {
        let caller = metadata.caller()?;
        let voucher = self
            .repository
            .find_by_id(&query.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(query.voucher_id))?;
        voucher.check_access(caller)?;

        let usages = self.ledger.list_usages_for_voucher(&voucher.id).await?;
        let flags = self.ledger.list_fraud_flags(&voucher.id).await?;

        let mut stats = VoucherStats::from_usages(voucher.id, &usages);
        stats.remaining_capacity = voucher.remaining_capacity();
        stats.flagged_count = flags.len() as u64;
        Ok(stats)
    }
}
