//! Trip validation: one trip record checked against the scheduling,
//! crew, pricing and compatibility catalogue.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::engine::RuleProvider;
use super::predicates::{days_after, is_present, is_valid_array, is_valid_number, parse_date};
use super::rules::{AutoFix, Severity, ValidationResult, ValidationRule};
use crate::config::EngineConfig;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub const CATEGORY_BASIC_DATA: &str = "Basic Data";
pub const CATEGORY_VEHICLES: &str = "Vehicles";
pub const CATEGORY_PERSONNEL: &str = "Personnel";
pub const CATEGORY_SCHEDULING: &str = "Scheduling";
pub const CATEGORY_CALCULATIONS: &str = "Calculations";
pub const CATEGORY_COMPATIBILITY: &str = "Compatibility";

static TRIP_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{2,4}-\d{3,}$").unwrap_or_else(|e| panic!("trip number pattern: {e}"))
});

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// The route a trip follows, as embedded in the trip record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRef {
    pub id: DbId,
    #[serde(default)]
    pub client_id: Option<DbId>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A trip as edited in the back office. Every field may still be blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trip {
    pub id: Option<DbId>,
    pub trip_number: Option<String>,
    pub client_id: Option<DbId>,
    pub route: Option<RouteRef>,
    pub vehicle_ids: Vec<DbId>,
    pub driver_ids: Vec<DbId>,
    pub co_driver_id: Option<DbId>,
    pub scheduled_date: Option<String>,
    pub estimated_arrival: Option<String>,
    pub distance_km: Option<f64>,
    pub price: Option<f64>,
    pub cost: Option<f64>,
    pub cargo_weight_kg: Option<f64>,
    pub vehicle_capacity_kg: Option<f64>,
    pub requires_refrigeration: bool,
    pub refrigerated_vehicle: bool,
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Validates single trips relative to a fixed "today".
#[derive(Debug, Clone, Copy)]
pub struct TripValidator {
    as_of: NaiveDate,
    future_window_days: i64,
}

impl TripValidator {
    pub fn new(as_of: NaiveDate) -> Self {
        Self::with_config(as_of, &EngineConfig::default())
    }

    pub fn with_config(as_of: NaiveDate, config: &EngineConfig) -> Self {
        Self {
            as_of,
            future_window_days: config.future_window_days,
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }
}

impl RuleProvider<Trip> for TripValidator {
    fn validation_rules(&self) -> Vec<ValidationRule<Trip>> {
        let mut rules = basic_data_rules();
        rules.extend(vehicle_rules());
        rules.extend(personnel_rules());
        rules.extend(scheduling_rules(self.as_of, self.future_window_days));
        rules.extend(calculation_rules());
        rules.extend(compatibility_rules());
        rules
    }
}

// ---------------------------------------------------------------------------
// Basic data
// ---------------------------------------------------------------------------

fn basic_data_rules() -> Vec<ValidationRule<Trip>> {
    vec![
        ValidationRule::new(
            "trip-client",
            CATEGORY_BASIC_DATA,
            "Client assigned",
            Severity::Error,
            |trip: &Trip| {
                Ok(ValidationResult::check(
                    is_present(&trip.client_id),
                    "Client is assigned",
                    "A client is required",
                )
                .with_suggestion("Select the client this trip is billed to."))
            },
        )
        .with_description("Every trip is billed to exactly one client."),
        ValidationRule::new(
            "trip-route",
            CATEGORY_BASIC_DATA,
            "Route assigned",
            Severity::Error,
            |trip: &Trip| {
                Ok(ValidationResult::check(
                    trip.route.is_some(),
                    "Route is assigned",
                    "A route is required",
                )
                .with_suggestion("Pick one of the client's routes."))
            },
        ),
        ValidationRule::new(
            "trip-number-format",
            CATEGORY_BASIC_DATA,
            "Trip number format",
            Severity::Warning,
            |trip: &Trip| {
                let Some(number) = trip.trip_number.as_deref().filter(|n| is_present(*n)) else {
                    return Ok(ValidationResult::pass(
                        "Trip number will be assigned on save",
                    ));
                };
                if TRIP_NUMBER.is_match(number) {
                    return Ok(ValidationResult::pass("Trip number is well formed"));
                }
                let mut result = ValidationResult::fail(format!(
                    "Trip number '{number}' does not match the PREFIX-000 format"
                ))
                .with_suggestion("Use an uppercase prefix followed by a dash and digits.");
                let normalized = number.trim().to_uppercase();
                if TRIP_NUMBER.is_match(&normalized) {
                    result = result.with_auto_fix(AutoFix {
                        field: "trip_number".into(),
                        value: serde_json::Value::String(normalized),
                        description: "Trim and uppercase the trip number".into(),
                    });
                }
                Ok(result)
            },
        ),
    ]
}

// ---------------------------------------------------------------------------
// Vehicles
// ---------------------------------------------------------------------------

fn vehicle_rules() -> Vec<ValidationRule<Trip>> {
    vec![
        ValidationRule::new(
            "trip-vehicle-assigned",
            CATEGORY_VEHICLES,
            "Vehicle assigned",
            Severity::Error,
            |trip: &Trip| {
                Ok(ValidationResult::check(
                    is_valid_array(&trip.vehicle_ids),
                    "At least one vehicle is assigned",
                    "No vehicle assigned",
                )
                .with_suggestion("Assign a tractor or truck to the trip."))
            },
        ),
        ValidationRule::new(
            "trip-vehicle-unique",
            CATEGORY_VEHICLES,
            "Vehicles listed once",
            Severity::Error,
            |trip: &Trip| {
                let dupes = duplicates(&trip.vehicle_ids);
                if dupes.is_empty() {
                    Ok(ValidationResult::pass("No duplicate vehicles"))
                } else {
                    Ok(ValidationResult::fail("The same vehicle is assigned more than once")
                        .with_details(dupes.iter().map(|id| format!("Vehicle {id}"))))
                }
            },
        ),
        ValidationRule::new(
            "trip-vehicle-capacity",
            CATEGORY_VEHICLES,
            "Cargo within capacity",
            Severity::Warning,
            |trip: &Trip| match (trip.cargo_weight_kg, trip.vehicle_capacity_kg) {
                (Some(cargo), Some(capacity))
                    if is_valid_number(cargo) && is_valid_number(capacity) =>
                {
                    if cargo <= capacity {
                        Ok(ValidationResult::pass("Cargo fits the assigned capacity"))
                    } else {
                        Ok(ValidationResult::fail("Cargo exceeds vehicle capacity")
                            .with_detail(format!("Cargo {cargo} kg, capacity {capacity} kg"))
                            .with_suggestion("Split the load or assign a larger vehicle."))
                    }
                }
                _ => Ok(ValidationResult::pass(
                    "Cargo weight or capacity not recorded; nothing to compare",
                )),
            },
        ),
    ]
}

// ---------------------------------------------------------------------------
// Personnel
// ---------------------------------------------------------------------------

fn personnel_rules() -> Vec<ValidationRule<Trip>> {
    vec![
        ValidationRule::new(
            "trip-driver-assigned",
            CATEGORY_PERSONNEL,
            "Driver assigned",
            Severity::Error,
            |trip: &Trip| {
                Ok(ValidationResult::check(
                    is_valid_array(&trip.driver_ids),
                    "At least one driver is assigned",
                    "No driver assigned",
                )
                .with_suggestion("Assign a licensed driver to the trip."))
            },
        ),
        ValidationRule::new(
            "trip-driver-unique",
            CATEGORY_PERSONNEL,
            "Drivers listed once",
            Severity::Error,
            |trip: &Trip| {
                let dupes = duplicates(&trip.driver_ids);
                if dupes.is_empty() {
                    Ok(ValidationResult::pass("No duplicate drivers"))
                } else {
                    Ok(ValidationResult::fail("The same driver is assigned more than once")
                        .with_details(dupes.iter().map(|id| format!("Driver {id}"))))
                }
            },
        ),
        ValidationRule::new(
            "trip-co-driver-distinct",
            CATEGORY_PERSONNEL,
            "Co-driver differs from drivers",
            Severity::Warning,
            |trip: &Trip| match trip.co_driver_id {
                Some(co) if trip.driver_ids.contains(&co) => Ok(ValidationResult::fail(
                    "Co-driver is also listed as a driver",
                )
                .with_detail(format!("Person {co}"))),
                _ => Ok(ValidationResult::pass("Co-driver assignment is consistent")),
            },
        ),
    ]
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

fn scheduling_rules(as_of: NaiveDate, window_days: i64) -> Vec<ValidationRule<Trip>> {
    vec![
        ValidationRule::new(
            "trip-scheduled-date",
            CATEGORY_SCHEDULING,
            "Scheduled date",
            Severity::Error,
            |trip: &Trip| match trip.scheduled_date.as_deref() {
                None => Ok(ValidationResult::fail("A scheduled date is required")),
                Some(raw) if parse_date(raw).is_none() => Ok(ValidationResult::fail(format!(
                    "Scheduled date '{raw}' is not a valid date"
                ))
                .with_suggestion("Use the YYYY-MM-DD format.")),
                Some(_) => Ok(ValidationResult::pass("Scheduled date is valid")),
            },
        ),
        ValidationRule::new(
            "trip-arrival-after-departure",
            CATEGORY_SCHEDULING,
            "Arrival after departure",
            Severity::Error,
            |trip: &Trip| {
                let departure = trip.scheduled_date.as_deref().and_then(parse_date);
                let arrival = trip.estimated_arrival.as_deref().and_then(parse_date);
                match (departure, arrival) {
                    (Some(d), Some(a)) if a < d => Ok(ValidationResult::fail(
                        "Estimated arrival is before the scheduled departure",
                    )
                    .with_detail(format!("Departure {d}, arrival {a}"))),
                    _ => Ok(ValidationResult::pass("Arrival is consistent with departure")),
                }
            },
        ),
        ValidationRule::new(
            "trip-not-in-past",
            CATEGORY_SCHEDULING,
            "Not scheduled in the past",
            Severity::Warning,
            move |trip: &Trip| match trip.scheduled_date.as_deref().and_then(parse_date) {
                Some(date) if date < as_of => Ok(ValidationResult::fail(format!(
                    "Trip is scheduled in the past ({date})"
                ))
                .with_suggestion("Confirm this is a retroactive entry.")),
                _ => Ok(ValidationResult::pass("Scheduled date is not in the past")),
            },
        ),
        ValidationRule::new(
            "trip-scheduling-window",
            CATEGORY_SCHEDULING,
            "Within planning window",
            Severity::Warning,
            move |trip: &Trip| {
                // A window past the calendar range has no horizon.
                let limit = days_after(as_of, window_days);
                match (trip.scheduled_date.as_deref().and_then(parse_date), limit) {
                    (Some(date), Some(limit)) if date > limit => Ok(ValidationResult::fail(format!(
                        "Trip is scheduled more than {window_days} days ahead"
                    ))
                    .with_detail(format!("Scheduled {date}, planning horizon ends {limit}"))
                    .with_suggestion("Check the year of the scheduled date.")),
                    _ => Ok(ValidationResult::pass("Scheduled within the planning window")),
                }
            },
        ),
    ]
}

// ---------------------------------------------------------------------------
// Calculations
// ---------------------------------------------------------------------------

fn calculation_rules() -> Vec<ValidationRule<Trip>> {
    vec![
        ValidationRule::new(
            "trip-distance",
            CATEGORY_CALCULATIONS,
            "Distance",
            Severity::Error,
            |trip: &Trip| {
                Ok(ValidationResult::check(
                    trip.distance_km.is_some_and(|d| is_valid_number(d) && d > 0.0),
                    "Distance is recorded",
                    "Distance must be a positive number of kilometres",
                ))
            },
        ),
        ValidationRule::new(
            "trip-price",
            CATEGORY_CALCULATIONS,
            "Price",
            Severity::Error,
            |trip: &Trip| {
                Ok(ValidationResult::check(
                    trip.price.is_some_and(|p| is_valid_number(p) && p > 0.0),
                    "Price is recorded",
                    "Price must be a positive amount",
                ))
            },
        ),
        ValidationRule::new(
            "trip-margin",
            CATEGORY_CALCULATIONS,
            "Non-negative margin",
            Severity::Warning,
            |trip: &Trip| match (trip.price, trip.cost) {
                (Some(price), Some(cost)) if cost > price => Ok(ValidationResult::fail(
                    "Cost exceeds price; the trip runs at a loss",
                )
                .with_detail(format!("Price {price:.2}, cost {cost:.2}"))),
                _ => Ok(ValidationResult::pass("Margin is not negative")),
            },
        ),
        ValidationRule::new(
            "trip-cost-recorded",
            CATEGORY_CALCULATIONS,
            "Cost recorded",
            Severity::Info,
            |trip: &Trip| {
                Ok(ValidationResult::check(
                    trip.cost.is_some_and(is_valid_number),
                    "Cost is recorded",
                    "Cost not recorded; margin cannot be computed",
                ))
            },
        ),
    ]
}

// ---------------------------------------------------------------------------
// Compatibility
// ---------------------------------------------------------------------------

fn compatibility_rules() -> Vec<ValidationRule<Trip>> {
    vec![
        ValidationRule::new(
            "trip-route-client",
            CATEGORY_COMPATIBILITY,
            "Route belongs to client",
            Severity::Warning,
            |trip: &Trip| {
                let route_client = trip.route.as_ref().and_then(|r| r.client_id);
                match (trip.client_id, route_client) {
                    (Some(client), Some(owner)) if client != owner => Ok(ValidationResult::fail(
                        "The selected route belongs to a different client",
                    )
                    .with_detail(format!("Trip client {client}, route client {owner}"))
                    .with_suggestion("Pick a route registered for this client.")),
                    _ => Ok(ValidationResult::pass("Route matches the trip's client")),
                }
            },
        ),
        ValidationRule::new(
            "trip-refrigeration",
            CATEGORY_COMPATIBILITY,
            "Refrigerated cargo",
            Severity::Error,
            |trip: &Trip| {
                Ok(ValidationResult::check(
                    !trip.requires_refrigeration || trip.refrigerated_vehicle,
                    "Vehicle suits the cargo",
                    "Cargo requires a refrigerated vehicle",
                )
                .with_suggestion("Assign a reefer unit."))
            },
        ),
    ]
}

fn duplicates(ids: &[DbId]) -> BTreeSet<DbId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| !seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::engine::{run_validation, validate};
    use crate::validation::rules::ensure_unique_ids;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    fn valid_trip() -> Trip {
        Trip {
            id: Some(1),
            trip_number: Some("TR-0042".into()),
            client_id: Some(10),
            route: Some(RouteRef {
                id: 5,
                client_id: Some(10),
                name: Some("Porto - Madrid".into()),
            }),
            vehicle_ids: vec![100],
            driver_ids: vec![200],
            co_driver_id: Some(201),
            scheduled_date: Some("2026-05-10".into()),
            estimated_arrival: Some("2026-05-11".into()),
            distance_km: Some(560.0),
            price: Some(1400.0),
            cost: Some(900.0),
            cargo_weight_kg: Some(12_000.0),
            vehicle_capacity_kg: Some(24_000.0),
            requires_refrigeration: false,
            refrigerated_vehicle: false,
        }
    }

    #[test]
    fn rule_ids_are_unique() {
        let rules = TripValidator::new(today()).validation_rules();
        assert!(ensure_unique_ids(rules.iter().map(|r| r.id())).is_ok());
    }

    #[test]
    fn valid_trip_passes_everything() {
        let report = validate(&TripValidator::new(today()), &valid_trip());
        assert!(report.summary.is_valid, "{:?}", report.summary.warnings);
        assert_eq!(report.summary.score, 100.0);
        assert!(report.summary.can_submit);
    }

    #[test]
    fn empty_trip_cannot_be_saved() {
        let report = validate(&TripValidator::new(today()), &Trip::default());
        assert!(!report.summary.can_save);
        assert!(report.results["trip-client"].suggestion.is_some());
        assert!(!report.results["trip-scheduled-date"].passed);
        assert!(report.results["trip-number-format"].passed);
    }

    #[test]
    fn far_future_date_is_a_warning_only() {
        let mut trip = valid_trip();
        trip.scheduled_date = Some("2027-06-01".into());
        trip.estimated_arrival = None;
        let report = validate(&TripValidator::new(today()), &trip);
        assert!(report.summary.can_save);
        assert!(!report.summary.is_valid);
        assert_eq!(report.summary.warnings.len(), 1);
        assert_eq!(report.summary.warnings[0].rule_id, "trip-scheduling-window");
    }

    #[test]
    fn window_follows_config() {
        let config = EngineConfig {
            future_window_days: 3,
            ..EngineConfig::default()
        };
        let validator = TripValidator::with_config(today(), &config);
        let results = run_validation(&validator, &valid_trip());
        assert!(!results["trip-scheduling-window"].passed);
    }

    #[test]
    fn route_of_other_client_is_a_warning() {
        let mut trip = valid_trip();
        trip.route.as_mut().unwrap().client_id = Some(99);
        let report = validate(&TripValidator::new(today()), &trip);
        assert!(report.summary.can_save);
        assert_eq!(report.summary.warnings[0].rule_id, "trip-route-client");
    }

    #[test]
    fn duplicate_vehicles_are_listed() {
        let mut trip = valid_trip();
        trip.vehicle_ids = vec![100, 101, 100];
        let results = run_validation(&TripValidator::new(today()), &trip);
        let r = &results["trip-vehicle-unique"];
        assert!(!r.passed);
        assert_eq!(r.details, ["Vehicle 100"]);
    }

    #[test]
    fn arrival_before_departure_fails() {
        let mut trip = valid_trip();
        trip.estimated_arrival = Some("2026-05-09".into());
        let results = run_validation(&TripValidator::new(today()), &trip);
        assert!(!results["trip-arrival-after-departure"].passed);
    }

    #[test]
    fn lowercase_trip_number_carries_auto_fix() {
        let mut trip = valid_trip();
        trip.trip_number = Some(" tr-0042".into());
        let results = run_validation(&TripValidator::new(today()), &trip);
        let fix = results["trip-number-format"].auto_fix.as_ref().unwrap();
        assert_eq!(fix.value, serde_json::json!("TR-0042"));
    }

    #[test]
    fn reefer_cargo_needs_reefer_vehicle() {
        let mut trip = valid_trip();
        trip.requires_refrigeration = true;
        let report = validate(&TripValidator::new(today()), &trip);
        assert!(!report.summary.can_save);
        assert_eq!(report.summary.errors[0].rule_id, "trip-refrigeration");
    }

    #[test]
    fn deserializes_sparse_record() {
        let trip: Trip = serde_json::from_value(serde_json::json!({
            "client_id": 3,
            "route": { "id": 8 },
            "vehicle_ids": [1, 2]
        }))
        .unwrap();
        assert_eq!(trip.client_id, Some(3));
        assert!(trip.driver_ids.is_empty());
        assert_eq!(trip.route.unwrap().client_id, None);
    }

    #[test]
    fn oversized_window_has_no_horizon() {
        let config = EngineConfig {
            future_window_days: 100_000_000_000_000,
            ..EngineConfig::default()
        };
        let results = run_validation(&TripValidator::with_config(today(), &config), &valid_trip());
        let r = &results["trip-scheduling-window"];
        assert!(r.passed);
        assert_eq!(r.message, "Scheduled within the planning window");
    }
}
