//! Check-in record model
//!
//! One [`CheckinRecord`] is created per accepted submission and is never
//! updated afterwards. Metric values are kept as the submitted strings; see
//! [`crate::metrics`] for numeric interpretation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::sanitize::sanitize;
use crate::triage::classify;
use crate::{Error, Result};

/// Date format accepted for `checkin_date`
///
/// Fixed width and zero padded so that string order equals date order.
pub const CHECKIN_DATE_FORMAT: &str = "%Y-%m-%d";

/// Triage status of a check-in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckinStatus {
    #[default]
    #[serde(rename = "new")]
    New,
    #[serde(rename = "needs-attention")]
    NeedsAttention,
}

impl CheckinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinStatus::New => "new",
            CheckinStatus::NeedsAttention => "needs-attention",
        }
    }
}

impl fmt::Display for CheckinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckinStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(CheckinStatus::New),
            "needs-attention" => Ok(CheckinStatus::NeedsAttention),
            other => Err(Error::InvalidInput(format!("Unknown status: {}", other))),
        }
    }
}

macro_rules! metric_fields {
    ($($field:ident),* $(,)?) => {
        /// Optional metric answers from the check-in form, stored verbatim
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct Metrics {
            $(pub $field: String,)*
        }

        /// Form/column names of every metric field, in form order
        pub const METRIC_FIELDS: &[&str] = &[$(stringify!($field)),*];

        impl Metrics {
            /// Look up a metric by its form name
            pub fn get(&self, name: &str) -> Option<&str> {
                match name {
                    $(stringify!($field) => Some(self.$field.as_str()),)*
                    _ => None,
                }
            }

            /// Set a metric by its form name; returns false for unknown names
            pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
                match name {
                    $(stringify!($field) => {
                        self.$field = value.into();
                        true
                    })*
                    _ => false,
                }
            }
        }
    };
}

metric_fields!(
    weight,
    waist,
    meals_compliant,
    off_plan_foods,
    water_intake,
    hunger,
    cravings,
    weight_workouts,
    cardio_sessions,
    strength_trend,
    training_notes,
    sleep_hours,
    sleep_quality,
    energy,
    stress_level,
    mood,
    digestion,
    regularity,
    coach_notes,
);

/// Submitted form fields, before attachments are stored
#[derive(Debug, Clone, Default)]
pub struct CheckinForm {
    pub athlete_name: String,
    pub checkin_date: String,
    pub division: String,
    pub metrics: Metrics,
}

impl CheckinForm {
    /// Check required fields
    ///
    /// Runs before any side effect of a submission. Name and date are
    /// compared after trimming; the name must also produce a non-empty
    /// folder token.
    pub fn validate(&self) -> Result<()> {
        let name = self.athlete_name.trim();
        let date = self.checkin_date.trim();

        if name.is_empty() || date.is_empty() {
            return Err(Error::InvalidInput(
                "Client name and check-in date are required".to_string(),
            ));
        }

        if sanitize(name).is_empty() {
            return Err(Error::InvalidInput(format!(
                "Client name '{}' contains no usable characters",
                name
            )));
        }

        // chrono accepts unpadded fields, so width is checked separately
        let well_formed = date.len() == 10
            && NaiveDate::parse_from_str(date, CHECKIN_DATE_FORMAT).is_ok();
        if !well_formed {
            return Err(Error::InvalidInput(format!(
                "Check-in date '{}' must be formatted as YYYY-MM-DD",
                date
            )));
        }

        Ok(())
    }
}

/// One persisted check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub athlete_name: String,
    pub checkin_date: String,
    #[serde(default)]
    pub division: String,
    #[serde(flatten)]
    pub metrics: Metrics,
    /// Stored photo paths, relative to the upload root, in upload order
    #[serde(default)]
    pub photos: Vec<String>,
    /// Stored video path, relative to the upload root
    #[serde(default)]
    pub video: Option<String>,
    pub status: CheckinStatus,
    pub created_at: DateTime<Utc>,
}

impl CheckinRecord {
    /// Assemble a record from a validated form and the stored attachment paths
    ///
    /// Status is classified here, once, and persisted with the record.
    pub fn create(
        form: CheckinForm,
        photos: Vec<String>,
        video: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        form.validate()?;

        let status = classify(Some(form.metrics.meals_compliant.as_str()));

        Ok(Self {
            athlete_name: form.athlete_name.trim().to_string(),
            checkin_date: form.checkin_date.trim().to_string(),
            division: form.division,
            metrics: form.metrics,
            photos,
            video,
            status,
            created_at,
        })
    }

    /// Number of stored attachments (photos plus video)
    pub fn attachment_count(&self) -> usize {
        self.photos.len() + usize::from(self.video.is_some())
    }

    /// Rewrite stored paths to use `/` separators
    pub fn normalize_paths(&mut self) {
        for photo in &mut self.photos {
            *photo = normalize_separators(photo);
        }
        if let Some(video) = &mut self.video {
            *video = normalize_separators(video);
        }
    }
}

/// Replace `\` separators with `/`
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Parse a persisted timestamp
///
/// Accepts RFC 3339 as written by this crate, and naive ISO timestamps
/// (no offset) which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
