use std::path::Path;

/// Product ids from the first column of a header-less CSV. Blank rows and
/// blank first cells are skipped; duplicates are kept.
pub fn read_product_ids_from_csv(path: impl AsRef<Path>) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut product_ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(id) = record.get(0).filter(|id| !id.is_empty()) {
            product_ids.push(id.to_string());
        }
    }
    Ok(product_ids)
}
