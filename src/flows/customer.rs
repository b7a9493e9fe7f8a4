//! Customer sign-up: account, contact, address, preferences.

use super::{FieldRules, PHONE_PATTERN, RegistrationKind, address_step};
use crate::error::ConfigError;
use crate::validation::{DebouncedValidator, FieldKind};
use crate::workflow::{StepDefinition, StepRegistry};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn registry(validator: &DebouncedValidator) -> Result<StepRegistry, ConfigError> {
    let account = FieldRules::with_uniqueness(validator.clone())
        .required("name")
        .required("email")
        .required("password")
        .email("email")
        .min_length("password", MIN_PASSWORD_LENGTH)
        .unique("email", FieldKind::Email);

    let contact = FieldRules::with_uniqueness(validator.clone())
        .required("phone")
        .pattern("phone", PHONE_PATTERN, "Enter a valid phone number")?
        .unique("phone", FieldKind::Phone);

    StepRegistry::new(
        RegistrationKind::Customer.as_str(),
        vec![
            StepDefinition::new("account", "Create your account")
                .fields(["name", "email", "password"])
                .with_validator(account),
            StepDefinition::new("contact", "How can we reach you?")
                .fields(["phone"])
                .with_validator(contact),
            address_step("address", "Delivery address")?,
            StepDefinition::new("preferences", "Food preferences")
                .optional()
                .fields(["favorite_cuisines", "dietary_restrictions", "marketing_opt_in"]),
        ],
    )
}
