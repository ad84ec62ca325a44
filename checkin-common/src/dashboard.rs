//! Coach dashboard aggregation
//!
//! Turns the persisted record set into totals plus a newest-first list of
//! read-only presentation rows. Nothing here is written back to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{compliance_tag, ComplianceTag};
use crate::record::{CheckinRecord, CheckinStatus};
use crate::triage::TriageSummary;

/// Photos shown per record on the dashboard
pub const PREVIEW_PHOTO_LIMIT: usize = 4;

/// URL prefix under which stored attachments are served
pub const ATTACHMENT_URL_PREFIX: &str = "/uploads";

/// Optional narrowing of the record list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardFilter {
    pub status: Option<CheckinStatus>,
    /// Case-insensitive substring of the athlete name
    pub athlete: Option<String>,
}

impl DashboardFilter {
    fn matches(&self, record: &CheckinRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }

        match self.athlete.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => record
                .athlete_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}

/// One dashboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    pub athlete_name: String,
    pub checkin_date: String,
    pub division: String,
    pub weight: String,
    pub waist: String,
    pub meals_compliant: String,
    pub meals_tag: Option<ComplianceTag>,
    pub energy: String,
    pub weight_workouts: String,
    pub cardio_sessions: String,
    pub status: CheckinStatus,
    /// Up to [`PREVIEW_PHOTO_LIMIT`] photo URLs
    pub photo_urls: Vec<String>,
    pub total_photos: usize,
    pub has_video: bool,
    pub created_at: DateTime<Utc>,
}

impl RecordView {
    pub fn from_record(record: &CheckinRecord) -> Self {
        Self {
            athlete_name: record.athlete_name.clone(),
            checkin_date: record.checkin_date.clone(),
            division: record.division.clone(),
            weight: record.metrics.weight.clone(),
            waist: record.metrics.waist.clone(),
            meals_compliant: record.metrics.meals_compliant.clone(),
            meals_tag: compliance_tag(Some(record.metrics.meals_compliant.as_str())),
            energy: record.metrics.energy.clone(),
            weight_workouts: record.metrics.weight_workouts.clone(),
            cardio_sessions: record.metrics.cardio_sessions.clone(),
            status: record.status,
            photo_urls: record
                .photos
                .iter()
                .take(PREVIEW_PHOTO_LIMIT)
                .map(|p| attachment_url(p))
                .collect(),
            total_photos: record.photos.len(),
            has_video: record.video.is_some(),
            created_at: record.created_at,
        }
    }
}

/// Dashboard payload
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    /// Computed over every record, before filtering
    pub totals: TriageSummary,
    pub records: Vec<RecordView>,
    /// Persisted entries that could not be read
    pub skipped: usize,
}

/// Build the dashboard from persisted records
pub fn summarize(
    mut records: Vec<CheckinRecord>,
    filter: &DashboardFilter,
    skipped: usize,
) -> DashboardSummary {
    let totals = TriageSummary::from_records(&records);

    // ISO dates compare correctly as strings
    records.sort_by(|a, b| {
        b.checkin_date
            .cmp(&a.checkin_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let records = records
        .iter()
        .filter(|r| filter.matches(r))
        .map(RecordView::from_record)
        .collect();

    DashboardSummary {
        totals,
        records,
        skipped,
    }
}

/// Public URL for a stored relative path
pub fn attachment_url(relative_path: &str) -> String {
    let path = relative_path.trim_start_matches('/');
    let path = path.strip_prefix("uploads/").unwrap_or(path);
    format!("{}/{}", ATTACHMENT_URL_PREFIX, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CheckinForm;
    use chrono::{Duration, TimeZone};

    fn record(name: &str, date: &str, meals: &str, photos: usize) -> CheckinRecord {
        let mut form = CheckinForm {
            athlete_name: name.to_string(),
            checkin_date: date.to_string(),
            ..Default::default()
        };
        form.metrics.meals_compliant = meals.to_string();
        form.metrics.energy = "7".to_string();

        let photos = (0..photos)
            .map(|i| format!("{}/{}/photo_{}.jpg", name.to_lowercase(), date.replace('-', ""), i))
            .collect();
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        CheckinRecord::create(form, photos, Some("x/y/video.mp4".to_string()), created).unwrap()
    }

    #[test]
    fn test_sorted_newest_first() {
        let records = vec![
            record("Ann", "2024-01-08", "90", 0),
            record("Bob", "2024-02-01", "90", 0),
            record("Cat", "2023-12-31", "90", 0),
        ];

        let summary = summarize(records, &DashboardFilter::default(), 0);
        let dates: Vec<&str> = summary.records.iter().map(|r| r.checkin_date.as_str()).collect();
        assert_eq!(dates, vec!["2024-02-01", "2024-01-08", "2023-12-31"]);
    }

    #[test]
    fn test_same_date_ties_broken_by_created_at() {
        let mut early = record("Ann", "2024-01-08", "90", 0);
        let mut late = record("Ann", "2024-01-08", "50", 0);
        late.created_at = early.created_at + Duration::seconds(30);
        early.metrics.weight = "early".to_string();

        let summary = summarize(vec![early, late], &DashboardFilter::default(), 0);
        assert_eq!(summary.records[0].status, CheckinStatus::NeedsAttention);
        assert_eq!(summary.records[1].weight, "early");
    }

    #[test]
    fn test_counts_match_statuses() {
        let records = vec![
            record("Ann", "2024-01-08", "75", 0),
            record("Bob", "2024-01-08", "100", 0),
            record("Cat", "2024-01-08", "79", 0),
            record("Dan", "2024-01-08", "", 0),
            record("Eve", "2024-01-08", "abc", 0),
        ];

        let summary = summarize(records, &DashboardFilter::default(), 2);
        assert_eq!(summary.totals.total, 5);
        assert_eq!(summary.totals.needs_attention, 2);
        assert_eq!(summary.totals.new, 3);
        assert_eq!(summary.totals.average_energy, Some(7.0));
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_photo_preview_capped_and_video_excluded() {
        let summary = summarize(
            vec![record("Ann", "2024-01-08", "90", 5)],
            &DashboardFilter::default(),
            0,
        );
        let view = &summary.records[0];
        assert_eq!(view.photo_urls.len(), PREVIEW_PHOTO_LIMIT);
        assert_eq!(view.total_photos, 5);
        assert!(view.has_video);
        assert!(view.photo_urls.iter().all(|u| u.ends_with(".jpg")));
        assert_eq!(view.photo_urls[0], "/uploads/ann/20240108/photo_0.jpg");

        let summary = summarize(
            vec![record("Ann", "2024-01-08", "90", 3)],
            &DashboardFilter::default(),
            0,
        );
        assert_eq!(summary.records[0].photo_urls.len(), 3);
    }

    #[test]
    fn test_meals_tag() {
        let summary = summarize(
            vec![
                record("Ann", "2024-01-03", "80", 0),
                record("Bob", "2024-01-02", "79", 0),
                record("Cat", "2024-01-01", "lots", 0),
            ],
            &DashboardFilter::default(),
            0,
        );
        assert_eq!(summary.records[0].meals_tag, Some(ComplianceTag::Good));
        assert_eq!(summary.records[1].meals_tag, Some(ComplianceTag::Warning));
        assert_eq!(summary.records[2].meals_tag, None);
    }

    #[test]
    fn test_filter_narrows_list_but_not_totals() {
        let records = vec![
            record("Ann Lee", "2024-01-08", "75", 0),
            record("Bob", "2024-01-08", "90", 0),
            record("Annabel", "2024-01-01", "95", 0),
        ];

        let filter = DashboardFilter {
            status: None,
            athlete: Some("ANN".to_string()),
        };
        let summary = summarize(records.clone(), &filter, 0);
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.totals.total, 3);

        let filter = DashboardFilter {
            status: Some(CheckinStatus::NeedsAttention),
            athlete: None,
        };
        let summary = summarize(records, &filter, 0);
        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.records[0].athlete_name, "Ann Lee");
    }

    #[test]
    fn test_attachment_url() {
        assert_eq!(attachment_url("jane/20240115/a.jpg"), "/uploads/jane/20240115/a.jpg");
        assert_eq!(attachment_url("uploads/jane/a.jpg"), "/uploads/jane/a.jpg");
    }
}
