//! Field kinds and their live validation status.

use serde::{Deserialize, Serialize};

/// A field whose value must be unique across existing accounts.
///
/// Each kind owns exactly one validation slot in a `DebouncedValidator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Email,
    Phone,
    Username,
    BusinessName,
    LicenseNumber,
}

impl FieldKind {
    pub const ALL: [FieldKind; 5] = [
        Self::Email,
        Self::Phone,
        Self::Username,
        Self::BusinessName,
        Self::LicenseNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Username => "username",
            Self::BusinessName => "business_name",
            Self::LicenseNumber => "license_number",
        }
    }

    /// Human-readable label used in status messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "email address",
            Self::Phone => "phone number",
            Self::Username => "username",
            Self::BusinessName => "business name",
            Self::LicenseNumber => "license number",
        }
    }

    /// Shortest value worth sending to the availability service.
    pub fn default_min_length(&self) -> usize {
        match self {
            Self::Email => 5,
            Self::Phone => 7,
            Self::Username => 3,
            Self::BusinessName => 2,
            Self::LicenseNumber => 5,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown field kind: {s}"))
    }
}

/// Live status of a single field slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FieldValidationStatus {
    /// Nothing to check (empty or too short).
    Idle,
    /// A check is debouncing or in flight.
    Checking,
    /// The value is available.
    Valid,
    /// The value is taken, or the check could not be completed.
    Invalid { reason: String },
}

impl FieldValidationStatus {
    /// Whether the status is final for the value that produced it.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Checking)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Generic status for a check that errored or timed out.
    pub fn retry_later(kind: FieldKind) -> Self {
        Self::Invalid {
            reason: format!(
                "We couldn't verify your {} right now. Please try again.",
                kind.label()
            ),
        }
    }

    /// Status for a value that already belongs to another account.
    pub fn taken(kind: FieldKind) -> Self {
        Self::Invalid {
            reason: format!("This {} is already registered.", kind.label()),
        }
    }
}

impl Default for FieldValidationStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for FieldValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Checking => write!(f, "checking"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid { reason } => write!(f, "invalid: {reason}"),
        }
    }
}
