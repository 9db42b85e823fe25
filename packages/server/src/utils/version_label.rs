/// Numeric suffix of a `v<N>` version label.
pub fn number(label: &str) -> Option<i32> {
    label
        .strip_prefix('v')
        .and_then(|n| n.parse::<u32>().ok())
        .and_then(|n| i32::try_from(n).ok())
}

pub fn format(n: i32) -> String {
    format!("v{n}")
}

/// The number the next version should take given the current label.
///
/// No versions yet means `1`. An unparseable label is treated as if it
/// were `v1`, so the successor is `2` rather than a hard failure.
pub fn next_number(current: Option<&str>) -> i32 {
    match current {
        None => 1,
        Some(label) => number(label).unwrap_or(1).saturating_add(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_labels() {
        assert_eq!(number("v1"), Some(1));
        assert_eq!(number("v42"), Some(42));
        assert_eq!(number("v003"), Some(3));
    }

    #[test]
    fn rejects_malformed_labels() {
        assert_eq!(number(""), None);
        assert_eq!(number("7"), None);
        assert_eq!(number("version7"), None);
        assert_eq!(number("v-1"), None);
        assert_eq!(number("v1.2"), None);
    }

    #[test]
    fn succession_starts_at_one_and_increments() {
        assert_eq!(next_number(None), 1);
        assert_eq!(next_number(Some("v1")), 2);
        assert_eq!(next_number(Some("v9")), 10);
    }

    #[test]
    fn unparseable_current_label_defaults_to_one() {
        assert_eq!(next_number(Some("garbage")), 2);
    }

    #[test]
    fn labels_round_trip() {
        for n in [1, 7, 120] {
            assert_eq!(number(&format(n)), Some(n));
        }
    }
}
