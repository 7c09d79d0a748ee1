//! KIS Stream Credentials
//!
//! The real-time stream authenticates every registration frame with an
//! approval key issued out of band, plus a customer type. There is no
//! handshake; the key simply rides in each request header.

/// Errors building credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Approval key was empty.
    #[error("approval key cannot be empty")]
    EmptyApprovalKey,

    /// Customer type was not `P` or `B`.
    #[error("invalid customer type '{0}': expected P or B")]
    InvalidCustType(String),
}

/// Customer type sent as `custtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustType {
    /// Individual account.
    #[default]
    Personal,
    /// Corporate account.
    Business,
}

impl CustType {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "P",
            Self::Business => "B",
        }
    }
}

impl std::str::FromStr for CustType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "P" => Ok(Self::Personal),
            "B" => Ok(Self::Business),
            other => Err(AuthError::InvalidCustType(other.to_string())),
        }
    }
}

/// Approval key and customer type.
///
/// The `Debug` implementation redacts the key for safe logging.
#[derive(Clone)]
pub struct Credentials {
    approval_key: String,
    custtype: CustType,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the approval key is empty.
    pub fn new(approval_key: impl Into<String>, custtype: CustType) -> Result<Self, AuthError> {
        let approval_key = approval_key.into();
        if approval_key.trim().is_empty() {
            return Err(AuthError::EmptyApprovalKey);
        }
        Ok(Self {
            approval_key,
            custtype,
        })
    }

    /// Get the approval key.
    #[must_use]
    pub fn approval_key(&self) -> &str {
        &self.approval_key
    }

    /// Get the customer type.
    #[must_use]
    pub const fn custtype(&self) -> CustType {
        self.custtype
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("approval_key", &"[REDACTED]")
            .field("custtype", &self.custtype)
            .finish()
    }
}
