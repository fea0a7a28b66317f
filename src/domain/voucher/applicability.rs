//! Which services a voucher can be applied to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::foundation::{ServiceId, ValidationError};

/// A service-type tag such as `VENUE`, `FARMHOUSE`, `CATERING` or `PHOTOGRAPHY`.
///
/// Tags are normalized to upper case so matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceType(String);

impl ServiceType {
    pub fn new(tag: impl AsRef<str>) -> Result<Self, ValidationError> {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            return Err(ValidationError::empty_field("service_type"));
        }
        Ok(Self(tag.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ServiceType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServiceType> for String {
    fn from(tag: ServiceType) -> String {
        tag.0
    }
}

/// Scope of services a voucher applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "applicable_for", rename_all = "snake_case")]
pub enum Applicability {
    /// Every service offered by the vendor.
    AllServices,

    /// Only services matching either set. A match on type OR on id qualifies.
    SpecificServices {
        service_types: BTreeSet<ServiceType>,
        service_ids: BTreeSet<ServiceId>,
    },
}

impl Applicability {
    /// Builds a specific-services scope.
    ///
    /// # Errors
    ///
    /// Fails when both sets are empty, since such a voucher could never apply.
    pub fn specific(
        service_types: impl IntoIterator<Item = ServiceType>,
        service_ids: impl IntoIterator<Item = ServiceId>,
    ) -> Result<Self, ValidationError> {
        let service_types: BTreeSet<_> = service_types.into_iter().collect();
        let service_ids: BTreeSet<_> = service_ids.into_iter().collect();
        if service_types.is_empty() && service_ids.is_empty() {
            return Err(ValidationError::empty_field("applicable_services"));
        }
        Ok(Applicability::SpecificServices {
            service_types,
            service_ids,
        })
    }

    /// Returns true if a booking for the given service qualifies.
    pub fn matches(&self, service_type: &ServiceType, service_id: &ServiceId) -> bool {
        match self {
            Applicability::AllServices => true,
            Applicability::SpecificServices {
                service_types,
                service_ids,
            } => service_types.contains(service_type) || service_ids.contains(service_id),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Applicability::AllServices => "all_services",
            Applicability::SpecificServices { .. } => "specific_services",
        }
    }
}

impl Default for Applicability {
    fn default() -> Self {
        Applicability::AllServices
    }
}
