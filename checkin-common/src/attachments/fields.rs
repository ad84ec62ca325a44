//! Catalogue of upload fields on the check-in form
//!
//! Each entry maps a multipart field name to the prefix used for its stored
//! filename. Order here is the order photos are recorded in.

use super::AttachmentKind;

/// Form field carrying the posing video
pub const VIDEO_FIELD: &str = "posing_video";

/// `(field name, storage prefix)` for every known upload field
pub const UPLOAD_FIELDS: &[(&str, &str)] = &[
    // Relaxed
    ("pose_front_relaxed", "front_relaxed"),
    ("pose_left_relaxed", "left_relaxed"),
    ("pose_right_relaxed", "right_relaxed"),
    ("pose_rear_relaxed", "rear_relaxed"),
    // Bikini
    ("bikini_front", "bikini_front"),
    ("bikini_left", "bikini_left"),
    ("bikini_rear", "bikini_rear"),
    ("bikini_right", "bikini_right"),
    // Figure
    ("figure_front", "figure_front"),
    ("figure_left", "figure_left"),
    ("figure_rear", "figure_rear"),
    ("figure_right", "figure_right"),
    // Wellness
    ("wellness_front", "wellness_front"),
    ("wellness_left", "wellness_left"),
    ("wellness_rear", "wellness_rear"),
    ("wellness_right", "wellness_right"),
    // Women's physique
    ("wp_front", "wp_front"),
    ("wp_left", "wp_left"),
    ("wp_rear", "wp_rear"),
    ("wp_right", "wp_right"),
    ("wp_front_db", "wp_front_db"),
    ("wp_side_chest", "wp_side_chest"),
    ("wp_rear_db", "wp_rear_db"),
    ("wp_side_tri", "wp_side_tri"),
    ("wp_abs", "wp_abs"),
    // Men's physique
    ("mp_front", "mp_front"),
    ("mp_back", "mp_back"),
    // Bodybuilding
    ("bb_front_db", "bb_front_db"),
    ("bb_front_lat", "bb_front_lat"),
    ("bb_side_chest", "bb_side_chest"),
    ("bb_back_db", "bb_back_db"),
    ("bb_back_lat", "bb_back_lat"),
    ("bb_side_tri", "bb_side_tri"),
    ("bb_abs", "bb_abs"),
    // Classic physique
    ("classic_front_db", "classic_front_db"),
    ("classic_side_chest", "classic_side_chest"),
    ("classic_rear_db", "classic_rear_db"),
    ("classic_abs", "classic_abs"),
    ("classic_favorite", "classic_favorite"),
    // Video
    (VIDEO_FIELD, "posing_video"),
];

/// Storage prefix for a known upload field
pub fn prefix_for(field: &str) -> Option<&'static str> {
    UPLOAD_FIELDS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, prefix)| *prefix)
}

/// Whether a field holds a photo or the video
pub fn kind_of(field: &str) -> AttachmentKind {
    if field == VIDEO_FIELD {
        AttachmentKind::Video
    } else {
        AttachmentKind::Photo
    }
}
