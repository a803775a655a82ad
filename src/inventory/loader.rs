use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::Error;

/// Parsed tabular input: a header row and string cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Position of a column, matched on the trimmed header name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }
}

/// Read a CSV dataset with a header row. Rows may be shorter or longer than
/// the header; missing cells read as empty.
pub fn read_csv(path: &Path) -> Result<RawTable, Error> {
    let file = std::fs::File::open(path)?;
    let table = read_from(file)?;
    info!(
        "Read {} rows from {}",
        table.rows.len(),
        path.display()
    );
    Ok(table)
}

pub fn read_from<R: Read>(reader: R) -> Result<RawTable, Error> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    debug!("Parsed CSV with headers {:?}", headers);

    Ok(RawTable { headers, rows })
}
