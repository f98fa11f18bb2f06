use chrono::NaiveDate;

/// Accepted source date formats, tried in order. Day-first formats win over
/// month-first for ambiguous values, matching the source files this tool
/// ingests.
pub const DATE_FORMATS: [&str; 6] = [
    "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y",
];

/// Lenient date parse: empty, `-` and unparsable values are absent, never
/// an error.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_accepted_format() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        for raw in [
            "14/03/2025",
            "14-03-2025",
            "2025/03/14",
            "2025-03-14",
        ] {
            assert_eq!(parse_date(raw), Some(expected), "failed for {raw}");
        }
    }

    #[test]
    fn day_first_wins_for_ambiguous_dates() {
        // 03/04 is the 3rd of April, not March 4th.
        let parsed = parse_date("03/04/2025").unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2025, 4, 3).unwrap());
    }

    #[test]
    fn month_first_is_the_fallback_for_impossible_days() {
        // No 14th month, so MM/dd applies.
        let parsed = parse_date("03/14/2025").unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn blank_dash_and_garbage_are_absent() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("-"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("32/13/2025"), None);
    }
}
