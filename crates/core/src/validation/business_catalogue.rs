//! Default business rule catalogue for the back office collections.

use chrono::Datelike;
use serde_json::Value;
use validator::ValidateEmail;

use super::business::{BusinessRule, RecordCheck};
use super::dataset::{date_field, id_key, number_field, str_field};
use super::predicates::{days_after, is_present};
use super::rules::Severity;
use crate::config::DEFAULT_EXPIRY_NOTICE_DAYS;

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

pub const COLLECTION_CLIENTS: &str = "clients";
pub const COLLECTION_SITES: &str = "sites";
pub const COLLECTION_ROUTES: &str = "routes";
pub const COLLECTION_VEHICLES: &str = "vehicles";
pub const COLLECTION_PERSONNEL: &str = "personnel";
pub const COLLECTION_TRIPS: &str = "trips";
pub const COLLECTION_PURCHASE_ORDERS: &str = "purchase_orders";

// ---------------------------------------------------------------------------
// Context keys
// ---------------------------------------------------------------------------

/// Longest route (km) accepted without review.
pub const CTX_MAX_ROUTE_KM: &str = "max_route_km";
/// Oldest vehicle (years) accepted without review.
pub const CTX_MAX_VEHICLE_AGE_YEARS: &str = "max_vehicle_age_years";
/// Purchase order total above which an approver is needed.
pub const CTX_APPROVAL_THRESHOLD: &str = "po_approval_threshold";
/// Days ahead in which an expiring driver license is flagged.
pub const CTX_EXPIRY_NOTICE_DAYS: &str = "expiry_notice_days";

pub const DEFAULT_MAX_ROUTE_KM: f64 = 3000.0;
pub const DEFAULT_MAX_VEHICLE_AGE_YEARS: f64 = 15.0;
pub const DEFAULT_APPROVAL_THRESHOLD: f64 = 10_000.0;

/// Tolerance when comparing money amounts.
const AMOUNT_EPSILON: f64 = 0.01;

/// Trip statuses known to the dispatch board.
pub const VALID_TRIP_STATUSES: &[&str] = &[
    "planned",
    "dispatched",
    "in_transit",
    "delivered",
    "cancelled",
];

/// The full default catalogue, in display order.
pub fn default_business_rules() -> Vec<BusinessRule> {
    let mut rules = route_rules();
    rules.extend(vehicle_rules());
    rules.extend(personnel_rules());
    rules.extend(trip_rules());
    rules.extend(purchase_order_rules());
    rules
}

fn route_rules() -> Vec<BusinessRule> {
    vec![
        BusinessRule::new(
            "route-distance-positive",
            "Routes",
            "Route distance",
            COLLECTION_ROUTES,
            Severity::Error,
            |r, _| {
                let ok = number_field(r, "distance_km").is_some_and(|d| d.is_finite() && d > 0.0);
                RecordCheck::when(ok, "Route distance must be a positive number")
            },
        )
        .with_description("Every route has a positive planned distance."),
        BusinessRule::new(
            "route-distinct-endpoints",
            "Routes",
            "Distinct endpoints",
            COLLECTION_ROUTES,
            Severity::Error,
            |r, _| {
                let origin = r.get("origin_site_id").and_then(id_key);
                let destination = r.get("destination_site_id").and_then(id_key);
                match (origin, destination) {
                    (Some(o), Some(d)) if o == d => {
                        RecordCheck::fail("Origin and destination are the same site")
                            .with_detail(format!("Site {o}"))
                    }
                    _ => RecordCheck::pass(),
                }
            },
        ),
        BusinessRule::new(
            "route-max-distance",
            "Routes",
            "Route length review",
            COLLECTION_ROUTES,
            Severity::Warning,
            |r, ctx| {
                let max = ctx.number_or(CTX_MAX_ROUTE_KM, DEFAULT_MAX_ROUTE_KM);
                match number_field(r, "distance_km") {
                    Some(d) if d > max => {
                        RecordCheck::fail(format!("Route of {d} km exceeds the {max} km review limit"))
                    }
                    _ => RecordCheck::pass(),
                }
            },
        )
        .disabled_by_default(),
    ]
}

fn vehicle_rules() -> Vec<BusinessRule> {
    vec![
        BusinessRule::new(
            "vehicle-insurance-current",
            "Vehicles",
            "Insurance current",
            COLLECTION_VEHICLES,
            Severity::Error,
            |r, ctx| match date_field(r, "insurance_expiry") {
                Some(expiry) if expiry >= ctx.as_of() => RecordCheck::pass(),
                Some(expiry) => RecordCheck::fail(format!("Insurance expired on {expiry}")),
                None => RecordCheck::fail("Insurance expiry date missing or invalid"),
            },
        ),
        BusinessRule::new(
            "vehicle-max-age",
            "Vehicles",
            "Vehicle age",
            COLLECTION_VEHICLES,
            Severity::Warning,
            |r, ctx| {
                let max_age = ctx.number_or(CTX_MAX_VEHICLE_AGE_YEARS, DEFAULT_MAX_VEHICLE_AGE_YEARS);
                let current_year = f64::from(ctx.as_of().year());
                match number_field(r, "model_year") {
                    Some(year) if current_year - year > max_age => RecordCheck::fail(format!(
                        "Vehicle from {year} is older than {max_age} years"
                    )),
                    _ => RecordCheck::pass(),
                }
            },
        )
        .disabled_by_default(),
    ]
}

fn personnel_rules() -> Vec<BusinessRule> {
    vec![
        BusinessRule::new(
            "driver-license-current",
            "Personnel",
            "Driver license current",
            COLLECTION_PERSONNEL,
            Severity::Error,
            |r, ctx| {
                if str_field(r, "role") != Some("driver") {
                    return RecordCheck::pass();
                }
                match date_field(r, "license_expiry") {
                    Some(expiry) if expiry >= ctx.as_of() => RecordCheck::pass(),
                    Some(expiry) => RecordCheck::fail(format!("Driver license expired on {expiry}")),
                    None => RecordCheck::fail("Driver license expiry missing or invalid"),
                }
            },
        ),
        BusinessRule::new(
            "driver-license-expiring",
            "Personnel",
            "Driver license expiring soon",
            COLLECTION_PERSONNEL,
            Severity::Warning,
            |r, ctx| {
                if str_field(r, "role") != Some("driver") {
                    return RecordCheck::pass();
                }
                let Some(expiry) = date_field(r, "license_expiry") else {
                    return RecordCheck::pass();
                };
                let notice_days = ctx.number_or(CTX_EXPIRY_NOTICE_DAYS, DEFAULT_EXPIRY_NOTICE_DAYS as f64);
                let horizon = days_after(ctx.as_of(), notice_days as i64);
                if expiry >= ctx.as_of() && horizon.map_or(true, |h| expiry <= h) {
                    let days = (expiry - ctx.as_of()).num_days();
                    RecordCheck::fail(format!("Driver license expires in {days} days ({expiry})"))
                } else {
                    RecordCheck::pass()
                }
            },
        ),
        BusinessRule::new(
            "personnel-contact-email",
            "Personnel",
            "Contact email",
            COLLECTION_PERSONNEL,
            Severity::Info,
            |r, _| match str_field(r, "email") {
                Some(email) if email.validate_email() => RecordCheck::pass(),
                Some(email) => RecordCheck::fail(format!("'{email}' is not a valid email address")),
                None => RecordCheck::fail("No contact email on file"),
            },
        ),
    ]
}

fn trip_rules() -> Vec<BusinessRule> {
    vec![
        BusinessRule::new(
            "trip-crew-assigned",
            "Trips",
            "Crew assigned",
            COLLECTION_TRIPS,
            Severity::Error,
            |r, _| {
                let has_driver = r
                    .get("driver_ids")
                    .and_then(Value::as_array)
                    .is_some_and(|ids| !ids.is_empty());
                RecordCheck::when(has_driver, "Trip has no driver")
            },
        ),
        BusinessRule::new(
            "trip-status-known",
            "Trips",
            "Known status",
            COLLECTION_TRIPS,
            Severity::Warning,
            |r, _| match str_field(r, "status") {
                Some(status) if VALID_TRIP_STATUSES.contains(&status) => RecordCheck::pass(),
                Some(status) => RecordCheck::fail(format!("Unknown trip status '{status}'"))
                    .with_detail(format!("Expected one of: {}", VALID_TRIP_STATUSES.join(", "))),
                None => RecordCheck::fail("Trip status missing"),
            },
        ),
    ]
}

fn purchase_order_rules() -> Vec<BusinessRule> {
    vec![
        BusinessRule::new(
            "po-supplier-present",
            "Purchase Orders",
            "Supplier",
            COLLECTION_PURCHASE_ORDERS,
            Severity::Error,
            |r, _| {
                let ok = r.get("supplier").is_some_and(is_present);
                RecordCheck::when(ok, "Purchase order has no supplier")
            },
        ),
        BusinessRule::new(
            "po-total-matches-lines",
            "Purchase Orders",
            "Total matches lines",
            COLLECTION_PURCHASE_ORDERS,
            Severity::Error,
            |r, _| {
                let Some(total) = number_field(r, "total") else {
                    return RecordCheck::fail("Purchase order total missing");
                };
                let lines = r.get("lines").and_then(Value::as_array);
                let sum: f64 = lines
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_object)
                    .map(|line| {
                        number_field(line, "quantity").unwrap_or(0.0)
                            * number_field(line, "unit_price").unwrap_or(0.0)
                    })
                    .sum();
                if (sum - total).abs() < AMOUNT_EPSILON {
                    RecordCheck::pass()
                } else {
                    RecordCheck::fail("Order total does not match its lines")
                        .with_detail(format!("Total {total:.2}, lines sum to {sum:.2}"))
                }
            },
        ),
        BusinessRule::new(
            "po-approval-threshold",
            "Purchase Orders",
            "Approval above threshold",
            COLLECTION_PURCHASE_ORDERS,
            Severity::Warning,
            |r, ctx| {
                let threshold = ctx.number_or(CTX_APPROVAL_THRESHOLD, DEFAULT_APPROVAL_THRESHOLD);
                let total = number_field(r, "total").unwrap_or(0.0);
                let approved = r.get("approved_by").is_some_and(is_present);
                if total > threshold && !approved {
                    RecordCheck::fail(format!(
                        "Orders above {threshold:.2} need an approver"
                    ))
                } else {
                    RecordCheck::pass()
                }
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::config::EngineConfig;
    use crate::validation::business::{BusinessRuleValidator, RuleContext};
    use crate::validation::dataset::Dataset;

    fn ctx() -> RuleContext {
        RuleContext::new(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap())
    }

    fn dataset(value: serde_json::Value) -> Dataset {
        Dataset::from_value(value).unwrap()
    }

    fn result_for<'a>(
        results: &'a [crate::validation::business::BusinessRuleValidationResult],
        id: &str,
    ) -> &'a crate::validation::business::BusinessRuleValidationResult {
        results.iter().find(|r| r.rule_id == id).unwrap()
    }

    #[test]
    fn catalogue_is_well_formed() {
        let validator = BusinessRuleValidator::new(default_business_rules(), ctx()).unwrap();
        assert!(!validator.is_rule_enabled("route-max-distance"));
        assert!(!validator.is_rule_enabled("vehicle-max-age"));
        assert!(validator.is_rule_enabled("po-total-matches-lines"));
    }

    #[test]
    fn purchase_order_totals() {
        let validator = BusinessRuleValidator::new(default_business_rules(), ctx()).unwrap();
        let results = validator.evaluate(&dataset(json!({
            "purchase_orders": [
                { "id": 1, "supplier": "Fuel Co", "total": 30.0,
                  "lines": [{ "quantity": 2, "unit_price": 15.0 }] },
                { "id": 2, "supplier": "Tyres Ltd", "total": 100.0,
                  "lines": [{ "quantity": 1, "unit_price": 90.0 }] }
            ]
        })));
        let r = result_for(&results, "po-total-matches-lines");
        assert_eq!(r.affected_records, 1);
        assert_eq!(r.entity_details[0].details, ["Total 100.00, lines sum to 90.00"]);
    }

    #[test]
    fn large_orders_need_approver() {
        let validator = BusinessRuleValidator::new(
            default_business_rules(),
            ctx().with_value(CTX_APPROVAL_THRESHOLD, json!(500)),
        )
        .unwrap();
        let results = validator.evaluate(&dataset(json!({
            "purchase_orders": [
                { "id": 1, "supplier": "A", "total": 800.0, "lines": [{ "quantity": 1, "unit_price": 800.0 }] },
                { "id": 2, "supplier": "B", "total": 800.0, "approved_by": "ops", "lines": [{ "quantity": 1, "unit_price": 800.0 }] }
            ]
        })));
        assert_eq!(result_for(&results, "po-approval-threshold").affected_records, 1);
    }

    #[test]
    fn only_drivers_need_licenses() {
        let validator = BusinessRuleValidator::new(default_business_rules(), ctx()).unwrap();
        let results = validator.evaluate(&dataset(json!({
            "personnel": [
                { "id": 1, "role": "dispatcher", "email": "d@fleet.example" },
                { "id": 2, "role": "driver", "license_expiry": "2026-01-01", "email": "not-an-email" }
            ]
        })));
        let license = result_for(&results, "driver-license-current");
        assert_eq!(license.affected_records, 1);
        assert_eq!(license.entity_details[0].record["id"], json!(2));
        assert_eq!(result_for(&results, "personnel-contact-email").affected_records, 1);
    }

    #[test]
    fn contact_email_format() {
        let validator = BusinessRuleValidator::new(default_business_rules(), ctx()).unwrap();
        let results = validator.evaluate(&dataset(json!({
            "personnel": [
                { "id": 1, "email": "ops@fleet.example" },
                { "id": 2, "email": "ops@" },
                { "id": 3 }
            ]
        })));
        let email = result_for(&results, "personnel-contact-email");
        let ids: Vec<_> = email.entity_details.iter().map(|d| d.record["id"].clone()).collect();
        assert_eq!(ids, [json!(2), json!(3)]);
        assert_eq!(email.entity_details[0].message, "'ops@' is not a valid email address");
    }

    #[test]
    fn driver_license_expiring_within_notice() {
        let personnel = dataset(json!({
            "personnel": [
                { "id": 1, "role": "driver", "license_expiry": "2026-05-20" },
                { "id": 2, "role": "driver", "license_expiry": "2026-09-01" },
                { "id": 3, "role": "driver", "license_expiry": "2026-01-01" },
                { "id": 4, "role": "dispatcher", "license_expiry": "2026-05-10" }
            ]
        }));

        let validator = BusinessRuleValidator::new(default_business_rules(), ctx()).unwrap();
        let results = validator.evaluate(&personnel);
        let expiring = result_for(&results, "driver-license-expiring");
        assert_eq!(expiring.affected_records, 1);
        assert_eq!(expiring.entity_details[0].record["id"], json!(1));
        assert_eq!(
            expiring.entity_details[0].message,
            "Driver license expires in 16 days (2026-05-20)"
        );

        let config = EngineConfig {
            expiry_notice_days: 180,
            ..EngineConfig::default()
        };
        let wider = BusinessRuleValidator::new(default_business_rules(), ctx())
            .unwrap()
            .with_config(&config);
        let results = wider.evaluate(&personnel);
        assert_eq!(result_for(&results, "driver-license-expiring").affected_records, 2);
    }

    #[test]
    fn context_notice_period_wins_over_config() {
        let context = ctx().with_value(CTX_EXPIRY_NOTICE_DAYS, json!(5));
        let validator = BusinessRuleValidator::new(default_business_rules(), context)
            .unwrap()
            .with_config(&EngineConfig::default());
        assert_eq!(validator.context().get(CTX_EXPIRY_NOTICE_DAYS), Some(&json!(5)));

        let results = validator.evaluate(&dataset(json!({
            "personnel": [{ "id": 1, "role": "driver", "license_expiry": "2026-05-20" }]
        })));
        assert!(result_for(&results, "driver-license-expiring").result.passed);
    }

    #[test]
    fn same_site_route_fails() {
        let validator = BusinessRuleValidator::new(default_business_rules(), ctx()).unwrap();
        let results = validator.evaluate(&dataset(json!({
            "routes": [{ "id": 1, "distance_km": 10, "origin_site_id": 4, "destination_site_id": "4" }]
        })));
        assert!(!result_for(&results, "route-distinct-endpoints").result.passed);
    }
}
