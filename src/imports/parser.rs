//! Member-list file parser
//!
//! Parses an uploaded delimited text file into import rows. The format is
//! comma-separated with a mandatory header row; fields may be quoted with
//! double quotes ("" escapes a quote inside a quoted field).

use crate::models::import::ImportRow;
use crate::models::member::MemberType;

/// Expected columns, in order. The identifier column name depends on the
/// member type of the import.
const COLUMNS: [&str; 5] = ["first_name", "last_name", "email", "identifier", "borrowing_limit"];

/// Why a file could not be parsed at all (row-level problems are reported
/// per row, not here).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("File is empty")]
    Empty,
    #[error("Missing or invalid header row: expected columns {expected}, got '{got}'")]
    BadHeader { expected: String, got: String },
}

/// Identifier column name for a member type: staff-side members carry an
/// employee id, students an admission number.
fn identifier_column(member_type: MemberType) -> &'static str {
    if member_type.uses_staff_directory() {
        "employee_id"
    } else {
        "admission_number"
    }
}

/// Expected header for a member type, in the exact template column order.
pub fn expected_header(member_type: MemberType) -> String {
    COLUMNS
        .iter()
        .map(|c| {
            if *c == "identifier" {
                identifier_column(member_type)
            } else {
                c
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Downloadable import template: header plus one example row.
pub fn import_template(member_type: MemberType) -> String {
    let example = match member_type {
        MemberType::Student => "Asha,Verma,asha.verma@example.edu,ADM-2025-0117,3",
        MemberType::Teacher => "Priya,Nair,priya.nair@example.edu,EMP-0042,5",
        MemberType::Staff => "Ravi,Kumar,ravi.kumar@example.edu,EMP-0108,4",
    };
    format!("{}\n{}\n", expected_header(member_type), example)
}

/// Parse one delimited line into fields, honoring double-quoted values.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn optional(field: Option<&String>) -> Option<String> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parse an uploaded member list.
///
/// Returns the parsed rows in file order along with the 1-based data-row
/// numbers of rows that were dropped for missing mandatory fields (name
/// fields and email). Dropped rows are excluded from the batch, never
/// counted against it.
pub fn parse_import_file(
    content: &str,
    member_type: MemberType,
) -> Result<(Vec<(usize, ImportRow)>, Vec<(usize, String)>), ParseError> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next().ok_or(ParseError::Empty)?;
    let expected = expected_header(member_type);
    let normalized: Vec<String> = split_line(header)
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    let expected_cols: Vec<&str> = expected.split(',').collect();
    if normalized != expected_cols {
        return Err(ParseError::BadHeader {
            expected,
            got: header.trim().to_string(),
        });
    }

    let mut rows = Vec::new();
    let mut dropped = Vec::new();

    for (idx, line) in lines.enumerate() {
        let row_number = idx + 1;
        let fields = split_line(line);

        let first_name = fields.first().map(|s| s.trim()).unwrap_or_default();
        let last_name = fields.get(1).map(|s| s.trim()).unwrap_or_default();
        let email = fields.get(2).map(|s| s.trim()).unwrap_or_default();

        if first_name.is_empty() || last_name.is_empty() || email.is_empty() {
            dropped.push((row_number, "missing mandatory field".to_string()));
            continue;
        }

        let borrowing_limit = match optional(fields.get(4)) {
            None => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    dropped.push((row_number, format!("invalid borrowing_limit '{}'", raw)));
                    continue;
                }
            },
        };

        rows.push((
            row_number,
            ImportRow {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: email.to_string(),
                identifier: optional(fields.get(3)),
                borrowing_limit,
            },
        ));
    }

    Ok((rows, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file() {
        assert_eq!(
            parse_import_file("", MemberType::Student),
            Err(ParseError::Empty)
        );
    }

    #[test]
    fn test_header_required() {
        let result = parse_import_file(
            "Asha,Verma,asha@example.edu,,\n",
            MemberType::Student,
        );
        assert!(matches!(result, Err(ParseError::BadHeader { .. })));
    }

    #[test]
    fn test_identifier_column_depends_on_member_type() {
        assert_eq!(
            expected_header(MemberType::Student),
            "first_name,last_name,email,admission_number,borrowing_limit"
        );
        assert_eq!(
            expected_header(MemberType::Teacher),
            "first_name,last_name,email,employee_id,borrowing_limit"
        );
    }

    #[test]
    fn test_parse_valid_rows() {
        let content = "first_name,last_name,email,admission_number,borrowing_limit\n\
                       Asha,Verma,asha@example.edu,ADM-01,3\n\
                       Meera,Iyer,meera@example.edu,,\n";
        let (rows, dropped) = parse_import_file(content, MemberType::Student).unwrap();
        assert!(dropped.is_empty());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.identifier.as_deref(), Some("ADM-01"));
        assert_eq!(rows[0].1.borrowing_limit, Some(3));
        assert_eq!(rows[1].0, 2);
        assert_eq!(rows[1].1.identifier, None);
        assert_eq!(rows[1].1.borrowing_limit, None);
    }

    #[test]
    fn test_missing_mandatory_field_drops_row() {
        let content = "first_name,last_name,email,admission_number,borrowing_limit\n\
                       Asha,Verma,asha@example.edu,,\n\
                       ,Iyer,meera@example.edu,,\n\
                       Ravi,Kumar,,,\n";
        let (rows, dropped) = parse_import_file(content, MemberType::Student).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(dropped.len(), 2);
        assert_eq!(dropped[0].0, 2);
        assert_eq!(dropped[1].0, 3);
    }

    #[test]
    fn test_invalid_limit_drops_row() {
        let content = "first_name,last_name,email,admission_number,borrowing_limit\n\
                       Asha,Verma,asha@example.edu,,many\n";
        let (rows, dropped) = parse_import_file(content, MemberType::Student).unwrap();
        assert!(rows.is_empty());
        assert_eq!(dropped.len(), 1);
    }

    #[test]
    fn test_quoted_fields() {
        let content = "first_name,last_name,email,employee_id,borrowing_limit\n\
                       \"D'Souza, Maria\",Fernandes,maria@example.edu,\"EMP \"\"A\"\" 7\",4\n";
        let (rows, dropped) = parse_import_file(content, MemberType::Staff).unwrap();
        assert!(dropped.is_empty());
        assert_eq!(rows[0].1.first_name, "D'Souza, Maria");
        assert_eq!(rows[0].1.identifier.as_deref(), Some("EMP \"A\" 7"));
    }

    #[test]
    fn test_template_round_trips() {
        for t in [MemberType::Student, MemberType::Teacher, MemberType::Staff] {
            let (rows, dropped) = parse_import_file(&import_template(t), t).unwrap();
            assert_eq!(rows.len(), 1);
            assert!(dropped.is_empty());
        }
    }
}
