//! Batch input: identifier records from a CSV file or the command line.
//!
//! The CSV needs a header row with an `identifier` column; other columns are
//! ignored. Blank lines are skipped and quoted fields may span lines.
//! Identifiers are not validated here; a malformed one fails its own record
//! during the run.

use std::path::Path;

use anyhow::{bail, Context};

use crate::models::IdentifierRecord;

/// Read identifier records from a CSV file.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<IdentifierRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records from {}", path.display()))?;
    parse_records(&contents).with_context(|| format!("Invalid records file {}", path.display()))
}

/// Parse CSV text with an `identifier` column.
pub fn parse_records(contents: &str) -> anyhow::Result<Vec<IdentifierRecord>> {
    let contents = contents.trim_start_matches('\u{feff}');
    let mut rows = split_rows(contents).into_iter();

    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let column = header
        .iter()
        .position(|name| name.eq_ignore_ascii_case("identifier"));
    let Some(column) = column else {
        bail!("missing 'identifier' column in header: {}", header.join(","));
    };

    let records = rows
        .filter_map(|row| {
            row.into_iter()
                .nth(column)
                .filter(|value| !value.is_empty())
                .map(IdentifierRecord::new)
        })
        .collect();

    Ok(records)
}

/// Records for identifiers given directly.
pub fn records_from_identifiers<I, S>(identifiers: I) -> Vec<IdentifierRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    identifiers
        .into_iter()
        .map(|id| id.as_ref().trim().to_string())
        .filter(|id| !id.is_empty())
        .map(IdentifierRecord::new)
        .collect()
}

/// Split CSV text into rows of trimmed fields.
///
/// Double-quoted fields may contain commas, doubled quotes and line breaks.
/// Blank lines are dropped.
fn split_rows(contents: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = contents.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => row.push(std::mem::take(&mut field).trim().to_string()),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                row.push(std::mem::take(&mut field).trim().to_string());
                push_row(&mut rows, std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    row.push(field.trim().to_string());
    push_row(&mut rows, row);
    rows
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    if row.iter().any(|field| !field.is_empty()) {
        rows.push(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_by_header() {
        let csv = "title,identifier\n\
                   \"Minuten, 1650\",NL-HaNA_1.01.02_3097\n\
                   \n\
                   Resoluties,\"NL-HaNA_1.10.94_0455\"\r\n";

        let records = parse_records(csv).unwrap();
        assert_eq!(
            records,
            vec![
                IdentifierRecord::new("NL-HaNA_1.01.02_3097"),
                IdentifierRecord::new("NL-HaNA_1.10.94_0455"),
            ]
        );
    }

    #[test]
    fn test_parse_records_quoted_line_break() {
        let csv = "title,identifier\n\
                   \"Resoluties\nStaten-Generaal\",NL-HaNA_1.01.02_3097\n\
                   Minuten,NL-HaNA_1.10.94_0455\n";

        let records = parse_records(csv).unwrap();
        assert_eq!(
            records,
            vec![
                IdentifierRecord::new("NL-HaNA_1.01.02_3097"),
                IdentifierRecord::new("NL-HaNA_1.10.94_0455"),
            ]
        );
    }

    #[test]
    fn test_parse_records_skips_empty_identifiers() {
        let records = parse_records("identifier\nNL-HaNA_1.10.94_0455\n\"\"\n").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_records_requires_column() {
        assert!(parse_records("id\nNL-HaNA_1.10.94_0455\n").is_err());
        assert!(parse_records("").unwrap().is_empty());
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        std::fs::write(&path, "\u{feff}identifier\nNL-HaNA_1.10.94_0455\n").unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records, vec![IdentifierRecord::new("NL-HaNA_1.10.94_0455")]);
    }

    #[test]
    fn test_records_from_identifiers() {
        let records = records_from_identifiers(["NL-HaNA_1.10.94_0455 ", ""]);
        assert_eq!(records, vec![IdentifierRecord::new("NL-HaNA_1.10.94_0455")]);
    }
}
