//! Voucher aggregate entity.
//!
//! A Voucher is a discount definition owned by exactly one vendor. The
//! catalog creates and edits it; the redemption path only ever touches
//! `current_usage_count`, and only while holding the voucher's row lock.
//!
//! # Design Decisions
//!
//! - **Money in minor units**: amounts are `Money` (i64 cents), never floats
//! - **Validated on every write**: `create` and `apply_changes` rebuild the
//!   value objects from merged raw input, so a failed update leaves the
//!   aggregate untouched
//! - **Counter under lock**: `record_redemption` and `reconcile_count` are
//!   called by ledger adapters while the row is locked

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    Money, OwnedByVendor, Timestamp, ValidationError, VendorId, VoucherId,
};

use super::{
    Applicability, CouponCode, DiscountRule, DiscountType, IneligibleReason, UsageLimits,
    ValidityWindow, VoucherError,
};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;

/// Days added to `valid_from` when an administrator removes a voucher's expiry.
pub const NO_EXPIRY_DAYS: i64 = 365 * 100;

/// Voucher aggregate.
///
/// # Invariants
///
/// - `validity.valid_from < validity.valid_until`
/// - `discount.value() > 0`
/// - `(vendor_id, coupon_code)` is unique (enforced by the repository)
/// - `current_usage_count <= limits.total()` whenever a total is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,

    /// Owning vendor. Immutable after creation.
    pub vendor_id: VendorId,

    pub coupon_code: CouponCode,
    pub title: String,
    pub description: Option<String>,
    pub discount: DiscountRule,

    /// Orders below this amount are not eligible.
    pub min_order_value: Option<Money>,

    pub applicability: Applicability,
    pub limits: UsageLimits,

    /// Successful redemptions so far.
    pub current_usage_count: u32,

    pub validity: ValidityWindow,

    /// Manual on/off switch, independent of the validity window.
    pub is_active: bool,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Raw input for a new voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherDraft {
    pub coupon_code: String,
    pub title: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount_amount: Option<Money>,
    pub min_order_value: Option<Money>,
    pub applicability: Applicability,
    pub total_usage_limit: Option<u32>,
    pub usage_per_user: Option<u32>,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
}

/// Partial update to a voucher's definition.
///
/// `None` leaves a field unchanged. For optional fields, `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherChanges {
    pub coupon_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<i64>,
    pub max_discount_amount: Option<Option<Money>>,
    pub min_order_value: Option<Option<Money>>,
    pub applicability: Option<Applicability>,
    pub total_usage_limit: Option<Option<u32>>,
    pub usage_per_user: Option<u32>,
    pub valid_from: Option<Timestamp>,
    pub valid_until: Option<Timestamp>,
    pub is_active: Option<bool>,
}

impl VoucherChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// How an administrator changes a voucher's expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "valid_until", rename_all = "snake_case")]
pub enum ExpiryOverride {
    /// Move `valid_until` to the given instant.
    ExtendTo(Timestamp),
    /// Push `valid_until` out by [`NO_EXPIRY_DAYS`].
    Remove,
}

/// Administrative limit override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOverride {
    pub total_usage_limit: Option<Option<u32>>,
    pub usage_per_user: Option<u32>,
    pub max_discount_amount: Option<Option<Money>>,
    pub expiry: Option<ExpiryOverride>,
}

impl Voucher {
    /// Creates a new active voucher with a zero usage counter.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for a malformed code, empty title or negative minimum
    /// - `InvalidDateRange` when `valid_from >= valid_until`
    /// - `InvalidDiscountValue` when the discount is not positive
    /// - `InvalidUsageLimit` when a limit is zero
    pub fn create(
        vendor_id: VendorId,
        draft: VoucherDraft,
        now: Timestamp,
    ) -> Result<Self, VoucherError> {
        let coupon_code = CouponCode::try_new(&draft.coupon_code)?;
        let title = validate_title(&draft.title)?;
        let description = validate_description(draft.description)?;
        let validity = ValidityWindow::try_new(draft.valid_from, draft.valid_until)?;
        let discount = DiscountRule::try_new(
            draft.discount_type,
            draft.discount_value,
            draft.max_discount_amount,
        )?;
        let min_order_value = validate_min_order(draft.min_order_value)?;
        let limits = UsageLimits::try_new(draft.total_usage_limit, draft.usage_per_user)?;

        Ok(Self {
            id: VoucherId::new(),
            vendor_id,
            coupon_code,
            title,
            description,
            discount,
            min_order_value,
            applicability: draft.applicability,
            limits,
            current_usage_count: 0,
            validity,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Merges `changes` into this voucher and re-validates the result.
    ///
    /// Returns `true` when the coupon code changed, so the caller can
    /// re-check per-vendor uniqueness. On error nothing is modified.
    pub fn apply_changes(
        &mut self,
        changes: VoucherChanges,
        now: Timestamp,
    ) -> Result<bool, VoucherError> {
        let coupon_code = match changes.coupon_code {
            Some(raw) => CouponCode::try_new(&raw)?,
            None => self.coupon_code.clone(),
        };
        let title = match changes.title {
            Some(raw) => validate_title(&raw)?,
            None => self.title.clone(),
        };
        let description = match changes.description {
            Some(raw) => validate_description(raw)?,
            None => self.description.clone(),
        };
        let validity = ValidityWindow::try_new(
            changes.valid_from.unwrap_or(self.validity.valid_from()),
            changes.valid_until.unwrap_or(self.validity.valid_until()),
        )?;
        let discount = DiscountRule::try_new(
            changes.discount_type.unwrap_or(self.discount.kind()),
            changes.discount_value.unwrap_or(self.discount.value()),
            changes
                .max_discount_amount
                .unwrap_or(self.discount.max_discount()),
        )?;
        let min_order_value = match changes.min_order_value {
            Some(raw) => validate_min_order(raw)?,
            None => self.min_order_value,
        };
        let limits = UsageLimits::try_new(
            changes.total_usage_limit.unwrap_or(self.limits.total()),
            Some(changes.usage_per_user.unwrap_or(self.limits.per_user())),
        )?;
        self.check_limit_covers_usage(&limits)?;

        let code_changed = coupon_code != self.coupon_code;
        self.coupon_code = coupon_code;
        self.title = title;
        self.description = description;
        self.validity = validity;
        self.discount = discount;
        self.min_order_value = min_order_value;
        if let Some(applicability) = changes.applicability {
            self.applicability = applicability;
        }
        self.limits = limits;
        if let Some(active) = changes.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
        Ok(code_changed)
    }

    /// Applies an administrative limit override.
    ///
    /// Lowering the total below the redemptions already made is rejected
    /// with `InvalidUsageLimit`.
    pub fn override_limits(
        &mut self,
        overrides: LimitOverride,
        now: Timestamp,
    ) -> Result<(), VoucherError> {
        let limits = UsageLimits::try_new(
            overrides.total_usage_limit.unwrap_or(self.limits.total()),
            Some(overrides.usage_per_user.unwrap_or(self.limits.per_user())),
        )?;
        self.check_limit_covers_usage(&limits)?;

        let discount = match overrides.max_discount_amount {
            Some(cap) => self.discount.with_max_discount(cap)?,
            None => self.discount,
        };

        let validity = match overrides.expiry {
            Some(ExpiryOverride::ExtendTo(until)) => {
                ValidityWindow::try_new(self.validity.valid_from(), until)?
            }
            Some(ExpiryOverride::Remove) => ValidityWindow::try_new(
                self.validity.valid_from(),
                self.validity.valid_from().add_days(NO_EXPIRY_DAYS),
            )?,
            None => self.validity,
        };

        self.limits = limits;
        self.discount = discount;
        self.validity = validity;
        self.updated_at = now;
        Ok(())
    }

    /// Sets the active flag. Returns true if it changed.
    pub fn set_active(&mut self, active: bool, now: Timestamp) -> bool {
        if self.is_active == active {
            return false;
        }
        self.is_active = active;
        self.updated_at = now;
        true
    }

    /// Flips the active flag and returns the new value.
    pub fn toggle_active(&mut self, now: Timestamp) -> bool {
        self.set_active(!self.is_active, now);
        self.is_active
    }

    /// Returns true once `valid_until` has passed.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        self.validity.has_ended(now)
    }

    /// Redemptions left before the global cap, or `None` when unlimited.
    pub fn remaining_capacity(&self) -> Option<u32> {
        self.limits
            .total()
            .map(|limit| limit.saturating_sub(self.current_usage_count))
    }

    /// Consumes one unit of global capacity.
    ///
    /// Must only be called while the voucher row is locked.
    pub fn record_redemption(&mut self) -> Result<u32, IneligibleReason> {
        if !self.limits.has_capacity(self.current_usage_count) {
            return Err(IneligibleReason::GlobalLimitExceeded);
        }
        self.current_usage_count += 1;
        Ok(self.current_usage_count)
    }

    /// Replaces the counter with the authoritative usage-row count.
    ///
    /// Returns the previous value. Must only be called while the voucher row
    /// is locked.
    pub fn reconcile_count(&mut self, actual: u32, now: Timestamp) -> u32 {
        let previous = self.current_usage_count;
        if previous != actual {
            self.current_usage_count = actual;
            self.updated_at = now;
        }
        previous
    }

    fn check_limit_covers_usage(&self, limits: &UsageLimits) -> Result<(), VoucherError> {
        match limits.total() {
            Some(total) if total < self.current_usage_count => {
                Err(VoucherError::invalid_usage_limit(format!(
                    "total usage limit {} is below the {} redemption(s) already made",
                    total, self.current_usage_count
                )))
            }
            _ => Ok(()),
        }
    }
}

impl OwnedByVendor for Voucher {
    fn owner_vendor_id(&self) -> &VendorId {
        &self.vendor_id
    }
}

fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ValidationError::empty_field("title"));
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::out_of_range(
            "title",
            1,
            MAX_TITLE_LEN as i64,
            len as i64,
        ));
    }
    Ok(title.to_string())
}

fn validate_description(raw: Option<String>) -> Result<Option<String>, ValidationError> {
    match raw.map(|d| d.trim().to_string()) {
        Some(d) if d.is_empty() => Ok(None),
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(ValidationError::out_of_range(
            "description",
            0,
            MAX_DESCRIPTION_LEN as i64,
            d.chars().count() as i64,
        )),
        other => Ok(other),
    }
}

fn validate_min_order(raw: Option<Money>) -> Result<Option<Money>, ValidationError> {
    match raw {
        Some(amount) if amount.is_negative() => Err(ValidationError::out_of_range(
            "min_order_value",
            0,
            i64::MAX,
            amount.cents(),
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn draft(code: &str) -> VoucherDraft {
        let now = Timestamp::now();
        VoucherDraft {
            coupon_code: code.to_string(),
            title: "Summer sale".to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            max_discount_amount: None,
            min_order_value: None,
            applicability: Applicability::AllServices,
            total_usage_limit: None,
            usage_per_user: None,
            valid_from: now.minus_days(1),
            valid_until: now.add_days(30),
        }
    }

    pub fn voucher(vendor: &str, code: &str) -> Voucher {
        Voucher::create(
            VendorId::new(vendor).unwrap(),
            draft(code),
            Timestamp::now(),
        )
        .unwrap()
    }
}
