//! Check report and its text rendering.

use std::fmt::{self, Write as _};

use chrono::NaiveDate;
use serde::Serialize;

use fleetdesk_core::validation::summary::RuleOutcome;
use fleetdesk_core::ValidationReport;

/// One validator run over one input.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: String,
    #[serde(flatten)]
    pub report: ValidationReport,
}

impl Section {
    pub fn new(name: impl Into<String>, report: ValidationReport) -> Self {
        Self {
            name: name.into(),
            report,
        }
    }
}

/// A record the entity validators could not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unreadable {
    pub collection: String,
    pub record: String,
    pub error: String,
}

impl Unreadable {
    pub fn new(collection: &str, record: String, error: impl fmt::Display) -> Self {
        Self {
            collection: collection.to_string(),
            record,
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub as_of: NaiveDate,
    pub sections: Vec<Section>,
    pub unreadable: Vec<Unreadable>,
}

impl CheckReport {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            sections: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn unreadable(&mut self, record: Unreadable) {
        tracing::warn!(
            collection = %record.collection,
            record = %record.record,
            error = %record.error,
            "Record could not be decoded"
        );
        self.unreadable.push(record);
    }

    /// Every section saveable and every record readable.
    pub fn can_save(&self) -> bool {
        self.unreadable.is_empty() && self.sections.iter().all(|s| s.report.summary.can_save)
    }

    pub fn can_submit(&self) -> bool {
        self.can_save() && self.sections.iter().all(|s| s.report.summary.can_submit)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Human-readable report, failing rules only.
pub fn render_text(report: &CheckReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_text(&mut out, report);
    out
}

fn write_text(out: &mut String, report: &CheckReport) -> fmt::Result {
    writeln!(out, "Dataset check as of {}", report.as_of)?;

    for section in &report.sections {
        let s = &section.report.summary;
        writeln!(out)?;
        writeln!(
            out,
            "[{}] score {:.1} | {}/{} passed | save: {} | submit: {}",
            section.name,
            s.score,
            s.passed_rules,
            s.total_rules,
            yes_no(s.can_save),
            yes_no(s.can_submit),
        )?;
        for outcome in s.outcomes() {
            write_outcome(out, outcome)?;
        }
    }

    if !report.unreadable.is_empty() {
        writeln!(out)?;
        writeln!(out, "[unreadable]")?;
        for u in &report.unreadable {
            writeln!(out, "  {} {}: {}", u.collection, u.record, u.error)?;
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "Overall: save {} | submit {}",
        yes_no(report.can_save()),
        yes_no(report.can_submit())
    )
}

fn write_outcome(out: &mut String, outcome: &RuleOutcome) -> fmt::Result {
    let severity = outcome.severity.as_str().to_uppercase();
    writeln!(
        out,
        "  {severity:<8}{:<32}{}",
        outcome.rule_id, outcome.result.message
    )?;
    for detail in &outcome.result.details {
        writeln!(out, "          - {detail}")?;
    }
    if let Some(suggestion) = &outcome.result.suggestion {
        writeln!(out, "          > {suggestion}")?;
    }
    Ok(())
}
