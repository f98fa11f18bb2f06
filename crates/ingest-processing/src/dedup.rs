use model::records::site::SiteRecord;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::debug;

/// Collapse records to one per natural key, last occurrence winning: later
/// source rows override earlier ones within a batch. Output keeps the
/// first-seen key order, which stays stable for the lifetime of the chunk
/// plan built from it.
pub fn dedup_records(records: Vec<SiteRecord>) -> Vec<SiteRecord> {
    let input_len = records.len();
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(input_len);
    let mut out: Vec<SiteRecord> = Vec::with_capacity(input_len);

    for record in records {
        match slots.entry(record.site_id.clone()) {
            Entry::Occupied(slot) => out[*slot.get()] = record,
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(record);
            }
        }
    }

    if out.len() < input_len {
        debug!(
            input = input_len,
            deduplicated = out.len(),
            "Collapsed duplicate natural keys"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record(site_id: &str, total_rental: f64) -> SiteRecord {
        SiteRecord {
            site_id: site_id.to_string(),
            exp_date: None,
            total_rental,
            total_payment_to_pay: 0.0,
            deposit: 0.0,
            attributes: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn last_occurrence_wins() {
        let out = dedup_records(vec![
            record("A", 1.0),
            record("B", 2.0),
            record("A", 3.0),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].site_id, "A");
        assert_eq!(out[0].total_rental, 3.0, "third record's payload kept");
        assert_eq!(out[1].site_id, "B");
    }

    #[test]
    fn distinct_keys_pass_through_unchanged() {
        let out = dedup_records(vec![record("A", 1.0), record("B", 2.0)]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn sentinel_keyed_rows_also_collapse() {
        use model::records::site::NO_ID;
        let out = dedup_records(vec![
            record(NO_ID, 1.0),
            record("A", 2.0),
            record(NO_ID, 3.0),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].total_rental, 3.0);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(dedup_records(Vec::new()).is_empty());
    }
}
