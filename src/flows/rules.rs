//! Declarative field rules for registration steps.
//!
//! A `FieldRules` list is evaluated in order against the accumulated form
//! data. Each field keeps only its first failure, and later rules for a
//! field that already failed are not evaluated, so a malformed email never
//! reaches the availability service.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::ConfigError;
use crate::validation::{DebouncedValidator, FieldKind, FieldValidationStatus};
use crate::workflow::{FormData, StepValidator, ValidationResult};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// A single check against one field.
#[derive(Debug, Clone)]
pub enum Rule {
    Required {
        field: String,
    },
    Email {
        field: String,
    },
    MinLength {
        field: String,
        min: usize,
    },
    Pattern {
        field: String,
        regex: Regex,
        message: String,
    },
    OneOf {
        field: String,
        values: Vec<String>,
    },
    /// Value must be available according to the uniqueness checker.
    Unique {
        field: String,
        kind: FieldKind,
    },
    /// Required unless `other` currently equals `equals`.
    RequiredUnless {
        field: String,
        other: String,
        equals: String,
    },
}

impl Rule {
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::Email { field }
            | Self::MinLength { field, .. }
            | Self::Pattern { field, .. }
            | Self::OneOf { field, .. }
            | Self::Unique { field, .. }
            | Self::RequiredUnless { field, .. } => field,
        }
    }
}

/// Ordered rule list usable as a step validator.
#[derive(Clone, Default)]
pub struct FieldRules {
    rules: Vec<Rule>,
    uniqueness: Option<DebouncedValidator>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules whose `Unique` checks go through `validator`.
    pub fn with_uniqueness(validator: DebouncedValidator) -> Self {
        Self {
            rules: Vec::new(),
            uniqueness: Some(validator),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn required(self, field: &str) -> Self {
        self.rule(Rule::Required {
            field: field.into(),
        })
    }

    pub fn email(self, field: &str) -> Self {
        self.rule(Rule::Email {
            field: field.into(),
        })
    }

    pub fn min_length(self, field: &str, min: usize) -> Self {
        self.rule(Rule::MinLength {
            field: field.into(),
            min,
        })
    }

    /// Match `field` against `pattern`. Fails on an invalid regex.
    pub fn pattern(self, field: &str, pattern: &str, message: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
            key: format!("pattern for {field}"),
            message: e.to_string(),
        })?;
        Ok(self.rule(Rule::Pattern {
            field: field.into(),
            regex,
            message: message.into(),
        }))
    }

    pub fn one_of(self, field: &str, values: &[&str]) -> Self {
        self.rule(Rule::OneOf {
            field: field.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        })
    }

    pub fn unique(self, field: &str, kind: FieldKind) -> Self {
        self.rule(Rule::Unique {
            field: field.into(),
            kind,
        })
    }

    pub fn required_unless(self, field: &str, other: &str, equals: &str) -> Self {
        self.rule(Rule::RequiredUnless {
            field: field.into(),
            other: other.into(),
            equals: equals.into(),
        })
    }

    /// Error message for `rule`, or `None` if it passes.
    ///
    /// Rules other than the required ones pass when the field is absent.
    async fn check(&self, rule: &Rule, data: &FormData) -> Option<String> {
        match rule {
            Rule::Required { field } => {
                (!is_present(data.get(field))).then(|| format!("{} is required", humanize(field)))
            }
            Rule::RequiredUnless {
                field,
                other,
                equals,
            } => {
                let exempt = text(data, other) == Some(equals.as_str());
                (!exempt && !is_present(data.get(field)))
                    .then(|| format!("{} is required", humanize(field)))
            }
            Rule::Email { field } => {
                let value = text(data, field)?;
                (!EMAIL_RE.is_match(value)).then(|| "Enter a valid email address".to_string())
            }
            Rule::MinLength { field, min } => {
                let value = text(data, field)?;
                (value.chars().count() < *min)
                    .then(|| format!("{} must be at least {min} characters", humanize(field)))
            }
            Rule::Pattern {
                field,
                regex,
                message,
            } => {
                let value = text(data, field)?;
                (!regex.is_match(value)).then(|| message.clone())
            }
            Rule::OneOf { field, values } => {
                let value = text(data, field)?;
                (!values.iter().any(|v| v == value))
                    .then(|| format!("{} must be one of: {}", humanize(field), values.join(", ")))
            }
            Rule::Unique { field, kind } => {
                let value = text(data, field)?;
                let Some(validator) = &self.uniqueness else {
                    warn!(field = %field, kind = %kind, "Unique rule without a validator, skipping");
                    return None;
                };
                match validator.verify(*kind, value).await {
                    FieldValidationStatus::Valid => None,
                    FieldValidationStatus::Invalid { reason } => Some(reason),
                    FieldValidationStatus::Checking => {
                        Some(format!("Your {} is still being verified", kind.label()))
                    }
                    FieldValidationStatus::Idle => Some(format!("Enter a complete {}", kind.label())),
                }
            }
        }
    }
}

#[async_trait]
impl StepValidator for FieldRules {
    async fn validate(&self, data: &FormData) -> ValidationResult {
        let mut result = ValidationResult::valid();
        for rule in &self.rules {
            if result.errors.contains_key(rule.field()) {
                continue;
            }
            if let Some(message) = self.check(rule, data).await {
                result.add_error(rule.field(), message);
            }
        }
        result
    }
}

impl std::fmt::Debug for FieldRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRules")
            .field("rules", &self.rules)
            .field("uniqueness", &self.uniqueness.is_some())
            .finish()
    }
}

/// Trimmed, non-empty string value of `field`.
fn text<'a>(data: &'a FormData, field: &str) -> Option<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

/// `postal_code` → `Postal code`
fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::validation::{InMemoryUniquenessChecker, UniquenessChecker};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn data(value: serde_json::Value) -> FormData {
        value.as_object().cloned().unwrap()
    }

    fn uniqueness(checker: Arc<InMemoryUniquenessChecker>) -> DebouncedValidator {
        DebouncedValidator::new(
            checker as Arc<dyn UniquenessChecker>,
            ValidatorConfig {
                debounce: Duration::from_millis(50),
                check_timeout: Duration::from_secs(1),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn required_reports_humanized_field() {
        let rules = FieldRules::new().required("postal_code").required("city");
        let result = rules.validate(&data(json!({"postal_code": "  ", "city": "Lisbon"}))).await;
        assert!(!result.is_valid);
        assert_eq!(result.errors["postal_code"], "Postal code is required");
        assert!(!result.errors.contains_key("city"));
    }

    #[tokio::test]
    async fn first_failure_per_field_wins() {
        let rules = FieldRules::new()
            .required("email")
            .email("email")
            .min_length("email", 50);
        let result = rules.validate(&data(json!({"email": "not-an-email"}))).await;
        assert_eq!(result.errors["email"], "Enter a valid email address");
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn format_rules_skip_absent_fields() {
        let rules = FieldRules::new()
            .email("email")
            .min_length("password", 8)
            .one_of("vehicle_type", &["bicycle", "car"]);
        assert!(rules.validate(&FormData::new()).await.is_valid);
    }

    #[tokio::test]
    async fn min_length_counts_characters() {
        let rules = FieldRules::new().min_length("password", 8);
        let short = rules.validate(&data(json!({"password": "çççç"}))).await;
        assert_eq!(short.errors["password"], "Password must be at least 8 characters");
        assert!(rules.validate(&data(json!({"password": "çççççççç"}))).await.is_valid);
    }

    #[tokio::test]
    async fn pattern_and_one_of() {
        let rules = FieldRules::new()
            .pattern("phone", r"^\+?[0-9 ]{7,15}$", "Enter a valid phone number")
            .unwrap()
            .one_of("vehicle_type", &["bicycle", "scooter", "car"]);
        let result = rules
            .validate(&data(json!({"phone": "call me", "vehicle_type": "boat"})))
            .await;
        assert_eq!(result.errors["phone"], "Enter a valid phone number");
        assert_eq!(
            result.errors["vehicle_type"],
            "Vehicle type must be one of: bicycle, scooter, car"
        );
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = FieldRules::new().pattern("x", "([", "bad").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn required_unless_exempts_matching_value() {
        let rules = FieldRules::new().required_unless("plate", "vehicle_type", "bicycle");
        assert!(rules.validate(&data(json!({"vehicle_type": "bicycle"}))).await.is_valid);
        let result = rules.validate(&data(json!({"vehicle_type": "car"}))).await;
        assert_eq!(result.errors["plate"], "Plate is required");
    }

    #[tokio::test(start_paused = true)]
    async fn unique_rule_uses_availability() {
        let checker = Arc::new(InMemoryUniquenessChecker::new());
        checker.reserve(FieldKind::Email, "taken@example.com").await;
        let rules = FieldRules::with_uniqueness(uniqueness(checker))
            .required("email")
            .email("email")
            .unique("email", FieldKind::Email);

        let taken = rules.validate(&data(json!({"email": "taken@example.com"}))).await;
        assert_eq!(
            taken.errors["email"],
            "This email address is already registered."
        );

        let free = rules.validate(&data(json!({"email": "free@example.com"}))).await;
        assert!(free.is_valid);
    }

    #[tokio::test]
    async fn unique_rule_skips_values_that_failed_format() {
        let checker = Arc::new(InMemoryUniquenessChecker::new());
        let validator = uniqueness(checker);
        let rules = FieldRules::with_uniqueness(validator.clone())
            .email("email")
            .unique("email", FieldKind::Email);

        let result = rules.validate(&data(json!({"email": "nope"}))).await;
        assert_eq!(result.errors["email"], "Enter a valid email address");
        assert_eq!(validator.status(FieldKind::Email), FieldValidationStatus::Idle);
    }

    #[tokio::test]
    async fn short_unique_value_asks_for_complete_value() {
        let rules = FieldRules::with_uniqueness(uniqueness(Arc::new(
            InMemoryUniquenessChecker::new(),
        )))
        .unique("phone", FieldKind::Phone);
        let result = rules.validate(&data(json!({"phone": "123"}))).await;
        assert_eq!(result.errors["phone"], "Enter a complete phone number");
    }

    #[test]
    fn humanize_field_names() {
        assert_eq!(humanize("postal_code"), "Postal code");
        assert_eq!(humanize("iban"), "Iban");
        assert_eq!(humanize(""), "");
    }
}
