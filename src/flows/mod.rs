//! Registration flows for the three account types.
//!
//! Each flow is a `StepRegistry` whose steps validate with `FieldRules`;
//! uniqueness rules share one `DebouncedValidator` so the live field status a
//! host shows and the check that gates `advance` are the same slot.

pub mod customer;
pub mod delivery;
pub mod restaurant;
pub mod rules;

pub use rules::{FieldRules, Rule};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::{DebouncedValidator, FieldKind};
use crate::workflow::{StepDefinition, StepRegistry};

pub(crate) const PHONE_PATTERN: &str = r"^\+?[0-9][0-9 ()-]{5,18}[0-9]$";
pub(crate) const POSTAL_CODE_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9 -]{1,8}[A-Za-z0-9]$";
pub(crate) const IBAN_PATTERN: &str = r"^[A-Z]{2}[0-9]{2}[A-Z0-9 ]{11,34}$";

/// The kinds of account a user can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationKind {
    Customer,
    Restaurant,
    DeliveryAgent,
}

impl RegistrationKind {
    pub const ALL: [RegistrationKind; 3] = [Self::Customer, Self::Restaurant, Self::DeliveryAgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Restaurant => "restaurant",
            Self::DeliveryAgent => "delivery_agent",
        }
    }

    /// Build the step registry for this kind.
    pub fn registry(&self, validator: &DebouncedValidator) -> Result<StepRegistry, ConfigError> {
        match self {
            Self::Customer => customer::registry(validator),
            Self::Restaurant => restaurant::registry(validator),
            Self::DeliveryAgent => delivery::registry(validator),
        }
    }
}

impl std::fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RegistrationKind {
    type Err = ConfigError;

    /// Accepts `delivery-agent` as well as `delivery_agent`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownKind(s.to_string()))
    }
}

/// The uniqueness slot a form field is checked against, if any.
pub fn unique_field_kind(field: &str) -> Option<FieldKind> {
    match field {
        "email" => Some(FieldKind::Email),
        "phone" => Some(FieldKind::Phone),
        "username" => Some(FieldKind::Username),
        "restaurant_name" => Some(FieldKind::BusinessName),
        "license_number" => Some(FieldKind::LicenseNumber),
        _ => None,
    }
}

/// Street/city/postal code step shared by customers and restaurants.
pub(crate) fn address_step(id: &str, title: &str) -> Result<StepDefinition, ConfigError> {
    let rules = FieldRules::new()
        .required("street")
        .required("city")
        .required("postal_code")
        .pattern("postal_code", POSTAL_CODE_PATTERN, "Enter a valid postal code")?;
    Ok(StepDefinition::new(id, title)
        .fields(["street", "city", "postal_code"])
        .with_validator(rules))
}

/// Bank details step shared by restaurants and delivery agents.
pub(crate) fn payout_step() -> Result<StepDefinition, ConfigError> {
    let rules = FieldRules::new()
        .required("account_holder")
        .required("iban")
        .pattern("iban", IBAN_PATTERN, "Enter a valid IBAN")?;
    Ok(StepDefinition::new("payout", "Payout details")
        .fields(["account_holder", "iban"])
        .with_validator(rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::validation::{InMemoryUniquenessChecker, UniquenessChecker};
    use crate::workflow::FormData;
    use serde_json::json;
    use std::sync::Arc;

    fn validator() -> DebouncedValidator {
        DebouncedValidator::new(
            Arc::new(InMemoryUniquenessChecker::new()) as Arc<dyn UniquenessChecker>,
            ValidatorConfig::default(),
        )
    }

    #[test]
    fn kind_parses_cli_spellings() {
        assert_eq!(
            "delivery-agent".parse::<RegistrationKind>().unwrap(),
            RegistrationKind::DeliveryAgent
        );
        assert_eq!(
            "Customer".parse::<RegistrationKind>().unwrap(),
            RegistrationKind::Customer
        );
        let err = "courier".parse::<RegistrationKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKind(ref s) if s == "courier"));
    }

    #[test]
    fn every_kind_builds_a_registry_named_after_it() {
        let v = validator();
        for kind in RegistrationKind::ALL {
            let registry = kind.registry(&v).unwrap();
            assert_eq!(registry.kind(), kind.as_str());
            assert!(registry.len() >= 4);
        }
    }

    #[test]
    fn unique_fields_map_to_slots() {
        assert_eq!(unique_field_kind("email"), Some(FieldKind::Email));
        assert_eq!(
            unique_field_kind("restaurant_name"),
            Some(FieldKind::BusinessName)
        );
        assert_eq!(unique_field_kind("city"), None);
    }

    #[tokio::test]
    async fn payout_rejects_malformed_iban() {
        let step = payout_step().unwrap();
        let bad: FormData = json!({"account_holder": "Ana", "iban": "12345"})
            .as_object()
            .cloned()
            .unwrap();
        let result = step.validate(&bad).await;
        assert_eq!(result.errors["iban"], "Enter a valid IBAN");

        let good: FormData = json!({"account_holder": "Ana", "iban": "PT50000201231234567890154"})
            .as_object()
            .cloned()
            .unwrap();
        assert!(step.validate(&good).await.is_valid);
    }

    #[tokio::test]
    async fn address_requires_all_fields() {
        let step = address_step("address", "Address").unwrap();
        let result = step.validate(&FormData::new()).await;
        assert_eq!(result.errors.len(), 3);

        let ok: FormData = json!({"street": "Rua Augusta 1", "city": "Lisbon", "postal_code": "1100-053"})
            .as_object()
            .cloned()
            .unwrap();
        assert!(step.validate(&ok).await.is_valid);
    }
}
