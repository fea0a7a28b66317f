//! ListVendorVouchersHandler - Query handler for a vendor's catalog.

use std::sync::Arc;

use crate::domain::foundation::{CommandMetadata, VendorId};
use crate::domain::voucher::{Voucher, VoucherError};
use crate::ports::VoucherRepository;

/// Lists every voucher a vendor owns, newest first. Not paginated.
#[derive(Debug, Clone)]
pub struct ListVendorVouchersQuery {
    pub vendor_id: VendorId,
}

pub struct ListVendorVouchersHandler {
    repository: Arc<dyn VoucherRepository>,
}

impl ListVendorVouchersHandler {
    pub fn new(repository: Arc<dyn VoucherRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(
        &self,
        query: ListVendorVouchersQuery,
        metadata: CommandMetadata,
    ) -> Result<Vec<Voucher>, VoucherError> {
        let caller = metadata.caller()?;
        if !caller.is_admin() && caller.as_vendor().as_ref() != Some(&query.vendor_id) {
            return Err(VoucherError::unauthorized(
                "caller may only list its own vouchers",
            ));
        }
        Ok(self.repository.list_by_vendor(&query.vendor_id).await?)
    }
}
