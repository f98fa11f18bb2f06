use crate::error::CliError;
use model::records::raw::RawRow;
use tracing::info;

/// Read a headered CSV file into raw rows. Cell coercion happens later in
/// the transform layer; here every cell stays a string.
pub fn read_rows(path: &str) -> Result<Vec<RawRow>, CliError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(RawRow::from_pairs(
            headers
                .iter()
                .zip(record.iter())
                .map(|(label, cell)| (label.to_string(), cell.to_string())),
        ));
    }

    info!(path = %path, rows = rows.len(), "Read source file");
    Ok(rows)
}
