//! Vehicle documentation validation.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::engine::RuleProvider;
use super::predicates::{days_after, is_present, parse_date};
use super::rules::{AutoFix, Severity, ValidationResult, ValidationRule};
use crate::config::EngineConfig;
use crate::types::DbId;

pub const CATEGORY_IDENTIFICATION: &str = "Identification";
pub const CATEGORY_DOCUMENTATION: &str = "Documentation";

/// Oldest model year accepted in the fleet register.
pub const MIN_MODEL_YEAR: i32 = 1980;

static PLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9][A-Z0-9 -]{2,10}[A-Z0-9]$")
        .unwrap_or_else(|e| panic!("plate pattern: {e}"))
});

// I, O and Q are never used in a VIN.
static VIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").unwrap_or_else(|e| panic!("vin pattern: {e}"))
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vehicle {
    pub id: Option<DbId>,
    pub plate: Option<String>,
    pub vin: Option<String>,
    pub model_year: Option<i32>,
    pub insurance_expiry: Option<String>,
    pub inspection_expiry: Option<String>,
    pub registration_expiry: Option<String>,
}

/// A dated document every vehicle must carry.
#[derive(Debug, Clone, Copy)]
struct Document {
    key: &'static str,
    label: &'static str,
    expiry: fn(&Vehicle) -> Option<&str>,
}

const DOCUMENTS: &[Document] = &[
    Document {
        key: "insurance",
        label: "Insurance",
        expiry: insurance_expiry,
    },
    Document {
        key: "inspection",
        label: "Technical inspection",
        expiry: inspection_expiry,
    },
    Document {
        key: "registration",
        label: "Registration",
        expiry: registration_expiry,
    },
];

fn insurance_expiry(v: &Vehicle) -> Option<&str> {
    v.insurance_expiry.as_deref()
}

fn inspection_expiry(v: &Vehicle) -> Option<&str> {
    v.inspection_expiry.as_deref()
}

fn registration_expiry(v: &Vehicle) -> Option<&str> {
    v.registration_expiry.as_deref()
}

/// Validates a vehicle's identification and document dates.
#[derive(Debug, Clone, Copy)]
pub struct VehicleValidator {
    as_of: NaiveDate,
    expiry_notice_days: i64,
}

impl VehicleValidator {
    pub fn new(as_of: NaiveDate) -> Self {
        Self::with_config(as_of, &EngineConfig::default())
    }

    pub fn with_config(as_of: NaiveDate, config: &EngineConfig) -> Self {
        Self {
            as_of,
            expiry_notice_days: config.expiry_notice_days,
        }
    }
}

impl RuleProvider<Vehicle> for VehicleValidator {
    fn validation_rules(&self) -> Vec<ValidationRule<Vehicle>> {
        let mut rules = identification_rules(self.as_of);
        for doc in DOCUMENTS {
            rules.extend(document_rules(*doc, self.as_of, self.expiry_notice_days));
        }
        rules
    }
}

fn identification_rules(as_of: NaiveDate) -> Vec<ValidationRule<Vehicle>> {
    vec![
        ValidationRule::new(
            "vehicle-plate",
            CATEGORY_IDENTIFICATION,
            "License plate",
            Severity::Error,
            |v: &Vehicle| {
                Ok(ValidationResult::check(
                    is_present(&v.plate),
                    "License plate is recorded",
                    "A license plate is required",
                ))
            },
        ),
        ValidationRule::new(
            "vehicle-plate-format",
            CATEGORY_IDENTIFICATION,
            "License plate format",
            Severity::Warning,
            |v: &Vehicle| {
                let Some(plate) = v.plate.as_deref().filter(|p| is_present(*p)) else {
                    return Ok(ValidationResult::pass("No plate to check"));
                };
                if PLATE.is_match(plate) {
                    return Ok(ValidationResult::pass("License plate is well formed"));
                }
                let normalized = plate.trim().to_uppercase();
                let mut result =
                    ValidationResult::fail(format!("License plate '{plate}' looks malformed"));
                if PLATE.is_match(&normalized) {
                    result = result.with_auto_fix(AutoFix {
                        field: "plate".into(),
                        value: serde_json::Value::String(normalized),
                        description: "Trim and uppercase the plate".into(),
                    });
                }
                Ok(result)
            },
        ),
        ValidationRule::new(
            "vehicle-vin",
            CATEGORY_IDENTIFICATION,
            "VIN",
            Severity::Warning,
            |v: &Vehicle| match v.vin.as_deref() {
                None => Ok(ValidationResult::fail("VIN not recorded")
                    .with_suggestion("Copy the VIN from the registration certificate.")),
                Some(vin) if VIN.is_match(vin) => Ok(ValidationResult::pass("VIN is well formed")),
                Some(vin) => Ok(ValidationResult::fail("VIN must be 17 characters without I, O or Q")
                    .with_detail(format!("Got '{vin}' ({} characters)", vin.chars().count()))),
            },
        ),
        ValidationRule::new(
            "vehicle-model-year",
            CATEGORY_IDENTIFICATION,
            "Model year",
            Severity::Error,
            move |v: &Vehicle| {
                let newest = as_of.year() + 1;
                match v.model_year {
                    Some(year) if !(MIN_MODEL_YEAR..=newest).contains(&year) => {
                        Ok(ValidationResult::fail(format!(
                            "Model year {year} is outside {MIN_MODEL_YEAR}-{newest}"
                        )))
                    }
                    _ => Ok(ValidationResult::pass("Model year is plausible")),
                }
            },
        ),
    ]
}

fn document_rules(doc: Document, as_of: NaiveDate, notice_days: i64) -> Vec<ValidationRule<Vehicle>> {
    vec![
        ValidationRule::new(
            format!("vehicle-{}-valid", doc.key),
            CATEGORY_DOCUMENTATION,
            format!("{} valid", doc.label),
            Severity::Error,
            move |v: &Vehicle| {
                let label = doc.label;
                let Some(raw) = (doc.expiry)(v) else {
                    return Ok(ValidationResult::fail(format!("{label} expiry date is missing"))
                        .with_suggestion("Record the expiry date printed on the document."));
                };
                match parse_date(raw) {
                    None => Ok(ValidationResult::fail(format!(
                        "{label} expiry date '{raw}' is not a valid date"
                    ))),
                    Some(expiry) if expiry < as_of => Ok(ValidationResult::fail(format!(
                        "{label} expired on {expiry}"
                    ))
                    .with_suggestion("Renew the document before dispatching this vehicle.")),
                    Some(_) => Ok(ValidationResult::pass(format!("{label} is current"))),
                }
            },
        ),
        ValidationRule::new(
            format!("vehicle-{}-expiring", doc.key),
            CATEGORY_DOCUMENTATION,
            format!("{} not expiring soon", doc.label),
            Severity::Warning,
            move |v: &Vehicle| {
                let label = doc.label;
                let horizon = days_after(as_of, notice_days);
                match (doc.expiry)(v).and_then(parse_date) {
                    Some(expiry)
                        if expiry >= as_of && horizon.map_or(true, |h| expiry <= h) =>
                    {
                        let days = (expiry - as_of).num_days();
                        Ok(ValidationResult::fail(format!(
                            "{label} expires in {days} day(s)"
                        ))
                        .with_detail(format!("Expiry {expiry}"))
                        .with_suggestion("Schedule the renewal."))
                    }
                    _ => Ok(ValidationResult::pass(format!(
                        "{label} is not due within {notice_days} days"
                    ))),
                }
            },
        ),
    ]
}
