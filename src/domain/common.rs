use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ReportError;

const OBJECT_ID_LEN: usize = 24;

/// Opaque merchant identity, stored as a 24 hex digit object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MerchantId(String);

impl MerchantId {
    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        let trimmed = raw.trim();
        if trimmed.len() != OBJECT_ID_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ReportError::Validation(format!(
                "Not a valid merchant ID: {raw}"
            )));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MerchantId {
    type Error = ReportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MerchantId> for String {
    fn from(value: MerchantId) -> Self {
        value.0
    }
}

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which slice of the record set a report or rebuild covers.
///
/// Global rows are persisted without any merchant field; the tenant variant
/// is translated to a `merchantId` field only at the storage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TenantScope {
    #[default]
    Global,
    Tenant(MerchantId),
}

impl TenantScope {
    pub fn from_optional(raw: Option<&str>) -> Result<Self, ReportError> {
        match raw {
            Some(value) => Ok(Self::Tenant(MerchantId::parse(value)?)),
            None => Ok(Self::Global),
        }
    }

    pub fn merchant(&self) -> Option<&MerchantId> {
        match self {
            Self::Global => None,
            Self::Tenant(id) => Some(id),
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("ALL"),
            Self::Tenant(id) => write!(f, "{id}"),
        }
    }
}
