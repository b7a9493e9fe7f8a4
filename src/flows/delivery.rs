//! Delivery agent sign-up.

use super::{FieldRules, PHONE_PATTERN, RegistrationKind, payout_step};
use crate::error::ConfigError;
use crate::validation::{DebouncedValidator, FieldKind};
use crate::workflow::{StepDefinition, StepRegistry};

pub const VEHICLE_TYPES: [&str; 3] = ["bicycle", "scooter", "car"];

const PLATE_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9 -]{1,10}[A-Za-z0-9]$";

pub fn registry(validator: &DebouncedValidator) -> Result<StepRegistry, ConfigError> {
    let personal = FieldRules::with_uniqueness(validator.clone())
        .required("name")
        .required("email")
        .required("phone")
        .email("email")
        .pattern("phone", PHONE_PATTERN, "Enter a valid phone number")?
        .unique("email", FieldKind::Email)
        .unique("phone", FieldKind::Phone);

    let vehicle = FieldRules::new()
        .required("vehicle_type")
        .one_of("vehicle_type", &VEHICLE_TYPES)
        .required_unless("plate", "vehicle_type", "bicycle")
        .pattern("plate", PLATE_PATTERN, "Enter a valid license plate")?;

    // Cyclists need no driving license; everyone else registers one.
    let documents = FieldRules::with_uniqueness(validator.clone())
        .required_unless("license_number", "vehicle_type", "bicycle")
        .unique("license_number", FieldKind::LicenseNumber);

    StepRegistry::new(
        RegistrationKind::DeliveryAgent.as_str(),
        vec![
            StepDefinition::new("personal", "About you")
                .fields(["name", "email", "phone"])
                .with_validator(personal),
            StepDefinition::new("vehicle", "Your vehicle")
                .fields(["vehicle_type", "plate"])
                .with_validator(vehicle),
            StepDefinition::new("documents", "Driving license")
                .depends_on(["vehicle"])
                .fields(["license_number", "license_document"])
                .with_validator(documents),
            StepDefinition::new("availability", "When can you ride?")
                .optional()
                .fields(["shifts", "zones"]),
            payout_step()?,
        ],
    )
}
