use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub first: String,
    pub last: String,
    pub skill: String,
    pub absent: bool,
}

/// Parses a yes/no style cell
fn parse_bool(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    lower == "yes" || lower == "true" || lower == "1" || lower == "x" || lower == "absent"
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().to_lowercase().contains(name))
}

/// Loads a roster from a CSV file with `first`, `last`, `skill` and
/// (optionally) `absent` columns, matched by header name in any order.
///
/// Rows missing either name are skipped. A name seen again replaces the
/// earlier row in place.
pub fn load_roster<P: AsRef<Path>>(csv_path: P) -> Result<Vec<RosterEntry>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let headers = reader.headers()?.clone();
    let first_col = column(&headers, "first")
        .ok_or_else(|| AppError::Validation("Roster has no 'first' column".to_string()))?;
    let last_col = column(&headers, "last")
        .ok_or_else(|| AppError::Validation("Roster has no 'last' column".to_string()))?;
    let skill_col = column(&headers, "skill");
    let absent_col = column(&headers, "absent");

    let mut entries: Vec<RosterEntry> = Vec::new();
    // Lowercased full name -> index into entries, for repeated rows
    let mut seen: HashMap<String, usize> = HashMap::new();

    for result in reader.records() {
        let record = result?;

        let first = record.get(first_col).unwrap_or("").to_string();
        let last = record.get(last_col).unwrap_or("").to_string();
        if first.is_empty() || last.is_empty() {
            continue;
        }

        let skill = skill_col
            .and_then(|col| record.get(col))
            .unwrap_or("")
            .to_string();
        let absent = absent_col
            .and_then(|col| record.get(col))
            .map(parse_bool)
            .unwrap_or(false);

        let key = format!("{} {}", first, last).to_lowercase();
        let entry = RosterEntry {
            first,
            last,
            skill,
            absent,
        };

        match seen.get(&key) {
            Some(&index) => entries[index] = entry,
            None => {
                seen.insert(key, entries.len());
                entries.push(entry);
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_columns_found_by_header() {
        let file = write_csv(
            "Skill level,Last name,First name,Absent?\n\
             Advanced,Lovelace,Ada,\n\
             Beginner,Hopper,Grace,yes\n",
        );
        let roster = load_roster(file.path()).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].first, "Ada");
        assert_eq!(roster[0].skill, "Advanced");
        assert!(!roster[0].absent);
        assert!(roster[1].absent);
    }

    #[test]
    fn test_skips_rows_without_names() {
        let file = write_csv("first,last,skill\nAda,,Advanced\n,Hopper,Beginner\nAlan,Turing,\n");
        let roster = load_roster(file.path()).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].last, "Turing");
        assert_eq!(roster[0].skill, "");
    }

    #[test]
    fn test_repeated_name_replaces_earlier_row() {
        let file = write_csv(
            "first,last,skill\nAda,Lovelace,Beginner\nAlan,Turing,Advanced\nada,LOVELACE,Intermediate\n",
        );
        let roster = load_roster(file.path()).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].skill, "Intermediate");
        assert_eq!(roster[1].first, "Alan");
    }

    #[test]
    fn test_missing_name_column_is_rejected() {
        let file = write_csv("name,skill\nAda,Advanced\n");
        assert!(matches!(load_roster(file.path()), Err(AppError::Validation(_))));
    }
}
