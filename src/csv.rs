// src/csv.rs

use std::mem::take;

const DELIM: char = ',';
const QUOTE: char = '"';

/// Split a sheet CSV export into records.
///
/// Fields are comma separated, records newline separated. A `"` opens or
/// closes a quoted field, `""` inside quotes is a literal quote, and `\r`
/// outside quotes is dropped. A last record without a trailing newline is
/// kept when it has any content.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                QUOTE if chars.peek() == Some(&QUOTE) => {
                    chars.next();
                    field.push(QUOTE);
                }
                QUOTE => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            QUOTE => in_quotes = true,
            DELIM => record.push(take(&mut field)),
            '\n' => {
                record.push(take(&mut field));
                records.push(take(&mut record));
            }
            '\r' => {}
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
