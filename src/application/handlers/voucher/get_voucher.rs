//! GetVoucherHandler - Query handler for a single voucher.

use std::sync::Arc;

use crate::domain::foundation::{CommandMetadata, OwnedByVendor, VoucherId};
use crate::domain::voucher::{Voucher, VoucherError};
use crate::ports::VoucherRepository;

/// Query for one voucher by id. Owner or administrator only.
#[derive(Debug, Clone)]
pub struct GetVoucherQuery {
    pub voucher_id: VoucherId,
}

pub struct GetVoucherHandler {
    repository: Arc<dyn VoucherRepository>,
}

impl GetVoucherHandler {
    pub fn new(repository: Arc<dyn VoucherRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(
        &self,
        query: GetVoucherQuery,
        metadata: CommandMetadata,
    ) -> Result<Voucher, VoucherError> {
        let caller = metadata.caller()?;
        let voucher = self
            .repository
            .find_by_id(&query.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(query.voucher_id))?;
        voucher.check_access(caller)?;
        Ok(voucher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{admin_meta, user_meta, vendor_meta, Fixture};

    #[tokio::test]
    async fn owner_and_admin_can_read() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;
        let handler = GetVoucherHandler::new(fx.store.clone());
        let query = GetVoucherQuery {
            voucher_id: voucher.id,
        };

        let as_owner = handler.handle(query.clone(), vendor_meta("vendor-1")).await.unwrap();
        assert_eq!(as_owner, voucher);
        assert!(handler.handle(query, admin_meta()).await.is_ok());
    }

    #[tokio::test]
    async fn others_are_rejected() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;
        let handler = GetVoucherHandler::new(fx.store.clone());
        let query = GetVoucherQuery {
            voucher_id: voucher.id,
        };

        let foreign = handler.handle(query.clone(), vendor_meta("vendor-2")).await;
        assert!(matches!(foreign, Err(VoucherError::Unauthorized(_))));
        let user = handler.handle(query, user_meta("user-1")).await;
        assert!(matches!(user, Err(VoucherError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn missing_voucher_is_not_found() {
        let fx = Fixture::new();
        let id = VoucherId::new();
        let result = GetVoucherHandler::new(fx.store.clone())
            .handle(GetVoucherQuery { voucher_id: id }, admin_meta())
            .await;
        assert_eq!(result.unwrap_err(), VoucherError::NotFound(id.to_string()));
    }
}
