//! Triage classification
//!
//! A check-in needs coach attention when its meal compliance is a number
//! below [`MEALS_COMPLIANT_THRESHOLD`]. Everything else, including missing
//! or unparsable answers, is `new`.

use serde::Serialize;

use crate::metrics::{parse_int, MEALS_COMPLIANT_THRESHOLD};
use crate::record::{CheckinRecord, CheckinStatus};

/// Classify a check-in from its `meals_compliant` answer
pub fn classify(meals_compliant: Option<&str>) -> CheckinStatus {
    let Some(raw) = meals_compliant else {
        return CheckinStatus::New;
    };

    if raw.is_empty() || raw == "100" {
        return CheckinStatus::New;
    }

    match parse_int(Some(raw)) {
        Some(pct) if pct < MEALS_COMPLIANT_THRESHOLD => CheckinStatus::NeedsAttention,
        _ => CheckinStatus::New,
    }
}

/// Aggregate triage counts over a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriageSummary {
    pub total: usize,
    pub new: usize,
    pub needs_attention: usize,
    /// Mean of `energy` over records where it parses as an integer
    pub average_energy: Option<f64>,
}

impl TriageSummary {
    /// Summarize persisted statuses and energy scores
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a CheckinRecord>,
    {
        let mut summary = TriageSummary::default();
        // Answers are free text; any i64 may arrive
        let mut energy_sum: f64 = 0.0;
        let mut energy_count: usize = 0;

        for record in records {
            summary.total += 1;
            match record.status {
                CheckinStatus::New => summary.new += 1,
                CheckinStatus::NeedsAttention => summary.needs_attention += 1,
            }

            if let Some(energy) = parse_int(Some(record.metrics.energy.as_str())) {
                energy_sum += energy as f64;
                energy_count += 1;
            }
        }

        if energy_count > 0 {
            summary.average_energy = Some(energy_sum / energy_count as f64);
        }

        summary
    }
}
