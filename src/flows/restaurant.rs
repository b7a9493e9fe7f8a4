//! Restaurant partner sign-up.

use super::{FieldRules, PHONE_PATTERN, RegistrationKind, address_step, payout_step};
use crate::error::ConfigError;
use crate::validation::{DebouncedValidator, FieldKind};
use crate::workflow::{StepDefinition, StepRegistry};

pub fn registry(validator: &DebouncedValidator) -> Result<StepRegistry, ConfigError> {
    let owner = FieldRules::with_uniqueness(validator.clone())
        .required("owner_name")
        .required("email")
        .required("phone")
        .email("email")
        .pattern("phone", PHONE_PATTERN, "Enter a valid phone number")?
        .unique("email", FieldKind::Email)
        .unique("phone", FieldKind::Phone);

    let business = FieldRules::with_uniqueness(validator.clone())
        .required("restaurant_name")
        .required("cuisine")
        .unique("restaurant_name", FieldKind::BusinessName);

    // Documents are optional, but a license number that is given must be free.
    let documents = FieldRules::with_uniqueness(validator.clone())
        .min_length("license_number", FieldKind::LicenseNumber.default_min_length())
        .unique("license_number", FieldKind::LicenseNumber);

    StepRegistry::new(
        RegistrationKind::Restaurant.as_str(),
        vec![
            StepDefinition::new("owner", "About you")
                .fields(["owner_name", "email", "phone"])
                .with_validator(owner),
            StepDefinition::new("business", "Your restaurant")
                .fields(["restaurant_name", "cuisine", "description"])
                .with_validator(business),
            address_step("location", "Where are you located?")?,
            StepDefinition::new("documents", "Licenses and photos")
                .optional()
                .depends_on(["business"])
                .fields(["license_number", "license_document", "photos"])
                .with_validator(documents),
            StepDefinition::new("menu", "Menu")
                .optional()
                .depends_on(["business"])
                .fields(["menu_items"]),
            payout_step()?,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::validation::{InMemoryUniquenessChecker, UniquenessChecker};
    use crate::workflow::FormData;
    use serde_json::json;
    use std::sync::Arc;

    fn data(value: serde_json::Value) -> FormData {
        value.as_object().cloned().unwrap()
    }

    async fn registry_with(checker: Arc<InMemoryUniquenessChecker>) -> StepRegistry {
        let validator = DebouncedValidator::new(
            checker as Arc<dyn UniquenessChecker>,
            ValidatorConfig::default(),
        );
        registry(&validator).unwrap()
    }

    #[tokio::test]
    async fn step_layout_and_dependencies() {
        let registry = registry_with(Arc::new(InMemoryUniquenessChecker::new())).await;
        assert_eq!(
            registry.step_order(),
            vec!["owner", "business", "location", "documents", "menu", "payout"]
        );
        for optional in ["documents", "menu"] {
            let step = &registry.steps()[registry.position(optional).unwrap()];
            assert!(step.is_optional);
            assert!(step.depends_on.contains("business"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn business_name_must_be_unique() {
        let checker = Arc::new(InMemoryUniquenessChecker::new());
        checker.reserve(FieldKind::BusinessName, "Tasca do Zé").await;
        let registry = registry_with(checker).await;
        let business = registry.get(1).unwrap();

        let taken = business
            .validate(&data(json!({"restaurant_name": "tasca do zé", "cuisine": "Portuguese"})))
            .await;
        assert_eq!(
            taken.errors["restaurant_name"],
            "This business name is already registered."
        );
    }

    #[tokio::test]
    async fn documents_may_be_left_empty() {
        let registry = registry_with(Arc::new(InMemoryUniquenessChecker::new())).await;
        let documents = &registry.steps()[registry.position("documents").unwrap()];
        assert!(documents.validate(&FormData::new()).await.is_valid);

        let short = documents.validate(&data(json!({"license_number": "A1"}))).await;
        assert!(!short.is_valid);
    }
}
