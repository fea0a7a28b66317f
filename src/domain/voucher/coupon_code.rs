//! Coupon code value object.
//!
//! Codes are what customers type at checkout, so they are normalized before
//! storage and lookup: surrounding whitespace is trimmed and letters are
//! upper-cased. Uniqueness is scoped to the owning vendor, not global.
//!
//! # Validation Rules
//!
//! - Length: 4-32 characters after trimming
//! - Characters: `A-Z`, `0-9`, `-`, `_`
//!
//! Generated codes use the `PREFIX-RANDOM` shape (e.g. `PROMO-A7K9M3`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{ValidationError, VendorId};

const MIN_LEN: usize = 4;
const MAX_LEN: usize = 32;
const RANDOM_SUFFIX_LEN: usize = 6;

/// A validated, normalized coupon code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Creates a CouponCode from user input, normalizing it.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - Code is empty after trimming
    /// - Length is outside 4-32 characters
    /// - Code contains characters other than letters, digits, `-` or `_`
    pub fn try_new(code: &str) -> Result<Self, ValidationError> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("coupon_code"));
        }

        let normalized = trimmed.to_uppercase();
        let len = normalized.chars().count();
        if !(MIN_LEN..=MAX_LEN).contains(&len) {
            return Err(ValidationError::out_of_range(
                "coupon_code",
                MIN_LEN as i64,
                MAX_LEN as i64,
                len as i64,
            ));
        }

        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::invalid_format(
                "coupon_code",
                "letters, digits, '-' and '_' only",
            ));
        }

        Ok(Self(normalized))
    }

    /// Generates a fresh `PREFIX-RANDOM` code.
    pub fn generate(prefix: &str) -> Result<Self, ValidationError> {
        Self::try_new(&format!("{}-{}", sanitize(prefix), random_suffix()))
    }

    /// Expands a code template for a specific vendor.
    ///
    /// `{VENDOR}` is replaced by the vendor identifier (alphanumerics only) and
    /// `{RANDOM}` by a fresh six-character suffix. Placeholders are matched
    /// case-insensitively.
    pub fn from_template(template: &str, vendor_id: &VendorId) -> Result<Self, ValidationError> {
        let upper = template.trim().to_uppercase();
        let expanded = upper
            .replace("{VENDOR}", &sanitize(vendor_id.as_str()))
            .replace("{RANDOM}", &random_suffix());
        Self::try_new(&expanded)
    }

    /// Returns the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

fn random_suffix() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(RANDOM_SUFFIX_LEN)
        .collect()
}

impl std::fmt::Display for CouponCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for CouponCode {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl TryFrom<String> for CouponCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(&value)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> String {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_code_parses_successfully() {
        let code = CouponCode::try_new("SUMMER25").unwrap();
        assert_eq!(code.as_str(), "SUMMER25");
    }

    #[test]
    fn input_is_trimmed_and_upper_cased() {
        let code = CouponCode::try_new("  summer-25 ").unwrap();
        assert_eq!(code.as_str(), "SUMMER-25");
    }

    #[test]
    fn empty_code_fails() {
        assert!(matches!(
            CouponCode::try_new("   "),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn too_short_code_fails() {
        assert!(matches!(
            CouponCode::try_new("AB1"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn too_long_code_fails() {
        let long = "A".repeat(33);
        assert!(CouponCode::try_new(&long).is_err());
    }

    #[test]
    fn special_characters_fail() {
        assert!(matches!(
            CouponCode::try_new("SAVE@20"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(CouponCode::try_new("SAVE 20").is_err());
    }

    #[test]
    fn generated_code_has_prefix_and_random_suffix() {
        let code = CouponCode::generate("promo").unwrap();
        let (prefix, suffix) = code.as_str().split_once('-').unwrap();
        assert_eq!(prefix, "PROMO");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_codes_differ() {
        let a = CouponCode::generate("PROMO").unwrap();
        let b = CouponCode::generate("PROMO").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn template_expands_vendor_placeholder() {
        let vendor = VendorId::new("vendor-42").unwrap();
        let code = CouponCode::from_template("diwali-{vendor}", &vendor).unwrap();
        assert_eq!(code.as_str(), "DIWALI-VENDOR42");
    }

    #[test]
    fn template_expands_random_placeholder() {
        let vendor = VendorId::new("v1").unwrap();
        let code = CouponCode::from_template("NY-{RANDOM}", &vendor).unwrap();
        assert!(code.as_str().starts_with("NY-"));
        assert_eq!(code.as_str().len(), 9);
    }

    #[test]
    fn deserialization_normalizes() {
        let code: CouponCode = serde_json::from_str(r#""save10""#).unwrap();
        assert_eq!(code.as_str(), "SAVE10");
    }
}
