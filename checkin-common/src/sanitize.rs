//! Folder-safe name tokens
//!
//! Converts free-text athlete names (and other user-supplied fragments such
//! as upload field prefixes) into tokens that are safe to use as a single
//! path component.
//!
//! Policy:
//! - Characters other than ASCII alphanumerics, `_`, `-` and whitespace are dropped
//! - Whitespace runs become a single `_`
//! - Consecutive `_` collapse into one
//! - Result is lowercased with leading/trailing `_` stripped
//!
//! The function is total. An empty result means the input carried no usable
//! characters; callers decide whether that is an error.

/// Sanitize `raw` into a lowercase `[a-z0-9_-]` token
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if c == '-' {
            out.push('-');
        } else if c == '_' || c.is_whitespace() {
            if !out.ends_with('_') {
                out.push('_');
            }
        }
        // everything else is dropped
    }

    out.trim_matches('_').to_string()
}

/// Normalize an ISO check-in date (`2024-01-15`) into its folder token (`20240115`)
pub fn normalize_date(raw: &str) -> String {
    sanitize(&raw.replace('-', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clean(token: &str) -> bool {
        token
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            && !token.starts_with('_')
            && !token.ends_with('_')
            && !token.contains("__")
    }

    #[test]
    fn test_basic_name() {
        assert_eq!(sanitize("Jane Doe"), "jane_doe");
        assert_eq!(sanitize("  Jane   Doe  "), "jane_doe");
        assert_eq!(sanitize("Mary-Kate O'Neil"), "mary-kate_oneil");
    }

    #[test]
    fn test_punctuation_and_underscores() {
        assert_eq!(sanitize("a_!_b"), "a_b");
        assert_eq!(sanitize("__Coach__Bob__"), "coach_bob");
        assert_eq!(sanitize("a ! b"), "a_b");
        assert_eq!(sanitize("tab\tseparated\nname"), "tab_separated_name");
    }

    #[test]
    fn test_path_traversal_is_neutralized() {
        assert_eq!(sanitize("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize("..\\windows\\system32"), "windowssystem32");
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("!!!"), "");
        assert_eq!(sanitize("   "), "");
        assert_eq!(sanitize("_ _ _"), "");
    }

    #[test]
    fn test_non_ascii_dropped() {
        assert_eq!(sanitize("José Ramírez"), "jos_ramrez");
    }

    #[test]
    fn test_output_alphabet_and_idempotence() {
        let inputs = [
            "Jane Doe",
            "  --weird__ name!! ",
            "A.B.C",
            "x\t\ty",
            "Ünïcödé Nämé",
            "___",
            "front_relaxed_20240115_101500",
            "semi;colon|pipe/slash",
        ];

        for input in inputs {
            let once = sanitize(input);
            assert!(is_clean(&once), "{:?} -> {:?} not clean", input, once);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2024-01-15"), "20240115");
        assert_eq!(normalize_date("2024/01/15"), "20240115");
    }
}
