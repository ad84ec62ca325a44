//! Check-in intake
//!
//! A submission is read in full, validated, and only then allowed to touch
//! the disk: attachments are stored, the record is appended and the coach
//! is notified. A rejected submission leaves no folders, files or records.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use checkin_common::attachments::fields::{kind_of, UPLOAD_FIELDS, VIDEO_FIELD};
use checkin_common::attachments::{Namespace, Upload};
use checkin_common::record::CheckinForm;
use checkin_common::CheckinRecord;

use crate::error::{ApiError, ApiResult};
use crate::notify::CheckinNotice;
use crate::AppState;

/// Message returned for an accepted submission
pub const SUCCESS_MESSAGE: &str = "Check-in submitted successfully!";

/// Form field carrying the athlete's name
pub const NAME_FIELD: &str = "client_name";

/// Everything the submitter sent
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub form: CheckinForm,
    pub uploads: Vec<Upload>,
}

impl Submission {
    /// First upload received for `field`
    pub fn upload(&self, field: &str) -> Option<&Upload> {
        self.uploads.iter().find(|u| u.field_name == field)
    }
}

/// Success envelope
#[derive(Debug, Clone, Serialize)]
pub struct IntakeReceipt {
    pub success: bool,
    pub message: String,
    pub athlete: String,
    pub checkin_date: String,
    pub files_uploaded: usize,
}

/// Read a multipart body into text fields and uploads
///
/// Parts with a filename are uploads (an empty file input arrives with an
/// empty filename). Unknown text fields are ignored.
pub async fn read_submission(mut multipart: Multipart) -> ApiResult<Submission> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            submission.uploads.push(Upload {
                field_name: name,
                file_name: Some(file_name),
                bytes,
            });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            NAME_FIELD => submission.form.athlete_name = value,
            "checkin_date" => submission.form.checkin_date = value,
            "division" => submission.form.division = value,
            other => {
                if !submission.form.metrics.set(other, value) {
                    debug!(field = other, "Ignoring unknown form field");
                }
            }
        }
    }

    Ok(submission)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the maximum request size".to_string())
    } else {
        ApiError::BadRequest(format!("Malformed form data: {}", err.body_text()))
    }
}

/// Validate, store, persist and notify
pub async fn process_submission(
    state: &AppState,
    submission: Submission,
) -> ApiResult<IntakeReceipt> {
    submission.form.validate()?;
    let namespace = Namespace::new(&submission.form.athlete_name, &submission.form.checkin_date)?;
    if state.config.strict_extensions {
        check_extensions(&submission)?;
    }

    let mut photos = Vec::new();
    let mut video = None;
    for (field, prefix) in UPLOAD_FIELDS {
        let stored = state
            .attachments
            .store(submission.upload(field), &namespace, prefix)
            .await?;

        if let Some(stored) = stored {
            if *field == VIDEO_FIELD {
                video = Some(stored.relative_path);
            } else {
                photos.push(stored.relative_path);
            }
        }
    }

    for upload in &submission.uploads {
        if !UPLOAD_FIELDS.iter().any(|(field, _)| *field == upload.field_name) {
            debug!(field = %upload.field_name, "Ignoring upload for unknown field");
        }
    }

    let record = CheckinRecord::create(submission.form, photos, video, Utc::now())?;
    state.gateway.append(&record).await?;

    let files_uploaded = record.attachment_count();
    info!(
        athlete = %record.athlete_name,
        date = %record.checkin_date,
        status = %record.status,
        files = files_uploaded,
        backend = %state.gateway.backend(),
        "Check-in accepted"
    );

    state.notifications.enqueue(CheckinNotice::from_record(&record));

    Ok(IntakeReceipt {
        success: true,
        message: SUCCESS_MESSAGE.to_string(),
        athlete: record.athlete_name,
        checkin_date: record.checkin_date,
        files_uploaded,
    })
}

/// Reject uploads whose extension does not match their field's kind
fn check_extensions(submission: &Submission) -> ApiResult<()> {
    for upload in submission.uploads.iter().filter(|u| u.is_present()) {
        if !UPLOAD_FIELDS.iter().any(|(field, _)| *field == upload.field_name) {
            continue;
        }

        let ext = upload.extension();
        if !kind_of(&upload.field_name).allows(&ext) {
            return Err(ApiError::BadRequest(format!(
                "File type '{}' is not allowed for {}",
                ext, upload.field_name
            )));
        }
    }
    Ok(())
}
