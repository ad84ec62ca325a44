//! Numeric interpretation of string-typed metric fields
//!
//! Metrics are stored verbatim as submitted. Anything that needs a number
//! (triage, dashboard averages, presentation tags) goes through here so the
//! parsing and threshold rules cannot diverge between call sites.

/// Meal compliance percentage below which a check-in needs coach attention
pub const MEALS_COMPLIANT_THRESHOLD: i64 = 80;

/// Parse an optional metric string as an integer
///
/// Surrounding whitespace is ignored. Absent, empty, or non-integer values
/// (including decimals such as `"7.5"`) yield `None`.
pub fn parse_int(raw: Option<&str>) -> Option<i64> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

/// Presentation tag for a meal compliance value
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceTag {
    Good,
    Warning,
}

/// Tag a meal compliance value against [`MEALS_COMPLIANT_THRESHOLD`]
pub fn compliance_tag(meals_compliant: Option<&str>) -> Option<ComplianceTag> {
    parse_int(meals_compliant).map(|pct| {
        if pct >= MEALS_COMPLIANT_THRESHOLD {
            ComplianceTag::Good
        } else {
            ComplianceTag::Warning
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(Some("75")), Some(75));
        assert_eq!(parse_int(Some(" 8 ")), Some(8));
        assert_eq!(parse_int(Some("-3")), Some(-3));
        assert_eq!(parse_int(Some("7.5")), None);
        assert_eq!(parse_int(Some("abc")), None);
        assert_eq!(parse_int(Some("")), None);
        assert_eq!(parse_int(Some("   ")), None);
        assert_eq!(parse_int(None), None);
    }

    #[test]
    fn test_compliance_tag_threshold() {
        assert_eq!(compliance_tag(Some("80")), Some(ComplianceTag::Good));
        assert_eq!(compliance_tag(Some("100")), Some(ComplianceTag::Good));
        assert_eq!(compliance_tag(Some("79")), Some(ComplianceTag::Warning));
        assert_eq!(compliance_tag(Some("n/a")), None);
        assert_eq!(compliance_tag(None), None);
    }
}
