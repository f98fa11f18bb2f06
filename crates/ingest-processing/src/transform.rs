use crate::dates::parse_date;
use chrono::Utc;
use model::records::{
    raw::RawRow,
    site::{NO_ID, SiteRecord},
};
use std::collections::BTreeMap;

pub const SITE_ID_COLUMN: &str = "SITE ID";
pub const EXP_DATE_COLUMN: &str = "EXP DATE";
pub const TOTAL_RENTAL_COLUMN: &str = "TOTAL RENTAL (RM)";
pub const TOTAL_PAYMENT_COLUMN: &str = "TOTAL PAYMENT TO PAY (RM)";
pub const DEPOSIT_COLUMN: &str = "DEPOSIT (RM)";

const KNOWN_COLUMNS: [&str; 5] = [
    SITE_ID_COLUMN,
    EXP_DATE_COLUMN,
    TOTAL_RENTAL_COLUMN,
    TOTAL_PAYMENT_COLUMN,
    DEPOSIT_COLUMN,
];

/// Currency cell -> amount. Strips the `RM` prefix, thousands separators
/// and whitespace; anything still unparsable degrades to `0`.
pub fn parse_currency(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, 'R' | 'M' | ',') && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Map one raw row into a normalized record. Total: every field has a
/// deterministic default when absent or malformed, and rows without a
/// source identifier get the `NO ID` sentinel key.
pub fn transform_row(row: &RawRow) -> SiteRecord {
    let site_id = row
        .get(SITE_ID_COLUMN)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(NO_ID)
        .to_string();

    let exp_date = row.get(EXP_DATE_COLUMN).and_then(parse_date);

    let mut attributes = BTreeMap::new();
    for (label, cell) in &row.cells {
        let known = KNOWN_COLUMNS
            .iter()
            .any(|column| column.eq_ignore_ascii_case(label));
        if !known && !cell.trim().is_empty() {
            attributes.insert(label.clone(), cell.clone());
        }
    }

    SiteRecord {
        site_id,
        exp_date,
        total_rental: row.get(TOTAL_RENTAL_COLUMN).map_or(0.0, parse_currency),
        total_payment_to_pay: row.get(TOTAL_PAYMENT_COLUMN).map_or(0.0, parse_currency),
        deposit: row.get(DEPOSIT_COLUMN).map_or(0.0, parse_currency),
        attributes,
        updated_at: Utc::now(),
    }
}

/// Transform a row sequence, dropping rows that are entirely blank
/// (spreadsheet exports routinely end with one).
pub fn transform_rows(rows: &[RawRow]) -> Vec<SiteRecord> {
    rows.iter()
        .filter(|row| !row.is_empty())
        .map(transform_row)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_strips_prefix_separators_and_whitespace() {
        assert_eq!(parse_currency("RM 1,250.50"), 1250.50);
        assert_eq!(parse_currency("1250.5"), 1250.5);
        assert_eq!(parse_currency(" RM2,000 "), 2000.0);
    }

    #[test]
    fn malformed_currency_defaults_to_zero() {
        assert_eq!(parse_currency(""), 0.0);
        assert_eq!(parse_currency("n/a"), 0.0);
        assert_eq!(parse_currency("--"), 0.0);
    }

    #[test]
    fn missing_site_id_gets_sentinel_key() {
        let row = RawRow::from_pairs([("TOTAL RENTAL (RM)", "RM 100")]);
        let record = transform_row(&row);
        assert_eq!(record.site_id, NO_ID);
        assert!(!record.has_real_id());
        assert_eq!(record.total_rental, 100.0);
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let row = RawRow::from_pairs([("site id", "SITE-9"), ("deposit (rm)", "RM 50")]);
        let record = transform_row(&row);
        assert_eq!(record.site_id, "SITE-9");
        assert_eq!(record.deposit, 50.0);
    }

    #[test]
    fn unknown_columns_pass_through_as_attributes() {
        let row = RawRow::from_pairs([
            ("SITE ID", "SITE-1"),
            ("REGION", "North"),
            ("LANDLORD", "Acme Sdn Bhd"),
            ("EMPTY", "  "),
        ]);
        let record = transform_row(&row);
        assert_eq!(record.attributes.get("REGION").map(String::as_str), Some("North"));
        assert_eq!(
            record.attributes.get("LANDLORD").map(String::as_str),
            Some("Acme Sdn Bhd")
        );
        assert!(!record.attributes.contains_key("EMPTY"));
        assert!(!record.attributes.contains_key("SITE ID"));
    }

    #[test]
    fn bad_date_degrades_to_absent() {
        let row = RawRow::from_pairs([("SITE ID", "SITE-1"), ("EXP DATE", "soon")]);
        assert_eq!(transform_row(&row).exp_date, None);
    }

    #[test]
    fn blank_rows_are_dropped() {
        let rows = vec![
            RawRow::from_pairs([("SITE ID", "SITE-1")]),
            RawRow::from_pairs([("SITE ID", ""), ("REGION", "  ")]),
        ];
        let records = transform_rows(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].site_id, "SITE-1");
    }
}
