//! Minimal CSV support for the import/export endpoints: fixed headers,
//! comma-separated rows, double-quote quoting. Not a general CSV dialect
//! implementation.

/// Quote a single field if it contains a comma, quote, or newline.
fn format_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn format_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| format_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a header plus rows as a CSV document with trailing newline.
pub fn format_csv(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = format_row(header);
    out.push('\n');
    for row in rows {
        let fields: Vec<&str> = row.iter().map(|s| s.as_str()).collect();
        out.push_str(&format_row(&fields));
        out.push('\n');
    }
    out
}

/// Parse CSV text into rows of fields. Handles quoted fields (including
/// embedded commas, doubled quotes and newlines) and both LF and CRLF line
/// endings. Empty lines are skipped.
pub fn parse(text: &str) -> Vec<Vec<String>> {
    let mut rows = vec![];
    let mut row: Vec<String> = vec![];
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => {
                row.push(std::mem::take(&mut field));
            }
            '\r' => {} // swallowed; the \n ends the row
            '\n' => {
                row.push(std::mem::take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(c),
        }
    }

    // Final row without trailing newline
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_plain_and_quoted_fields() {
        assert_eq!(format_row(&["a", "b", "c"]), "a,b,c");
        assert_eq!(format_row(&["a,b", "c"]), "\"a,b\",c");
        assert_eq!(format_row(&["say \"hi\""]), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn parses_simple_rows() {
        let rows = parse("name,email\nAda,ada@example.com\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["name", "email"]);
        assert_eq!(rows[1], vec!["Ada", "ada@example.com"]);
    }

    #[test]
    fn parses_quoted_fields_with_commas_and_quotes() {
        let rows = parse("\"Last, First\",\"said \"\"ok\"\"\"\n");
        assert_eq!(rows, vec![vec!["Last, First".to_string(), "said \"ok\"".to_string()]]);
    }

    #[test]
    fn handles_crlf_and_skips_blank_lines() {
        let rows = parse("a,b\r\n\r\nc,d\r\n");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn last_row_without_trailing_newline() {
        let rows = parse("a,b\nc,d");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["c", "d"]);
    }

    #[test]
    fn round_trips_through_format_and_parse() {
        let header = ["name", "note"];
        let rows = vec![vec!["Ada, Countess".to_string(), "line1\nline2".to_string()]];
        let text = format_csv(&header, &rows);
        let parsed = parse(&text);
        assert_eq!(parsed[1][0], "Ada, Countess");
        assert_eq!(parsed[1][1], "line1\nline2");
    }
}
