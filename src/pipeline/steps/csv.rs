//! CSV to JSON conversion.
//!
//! Output is a JSON array with one object per data row. With a header row the
//! keys are the column names, otherwise the 1-based column numbers. All
//! values are strings.

use crate::types::Value;
use serde_json::{Map, Value as Json};

const DEFAULT_DELIMITER: char = ',';

/// `delimiter\nquote\nheader` parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field delimiter; `None` takes it from a `sep=` line or defaults to `,`
    pub delimiter: Option<char>,
    /// Quote character; `None` disables quoting
    pub quote: Option<char>,
    /// First row holds the column names
    pub header: bool,
}

impl CsvOptions {
    pub fn parse(params: &str) -> Result<Self, String> {
        let mut parts = params.splitn(3, '\n');
        let delimiter = parts.next().unwrap_or_default();
        let quote = parts
            .next()
            .ok_or_else(|| "cannot find second parameter".to_string())?;
        let header = parts
            .next()
            .ok_or_else(|| "cannot find third parameter".to_string())?;

        Ok(Self {
            delimiter: single_char(delimiter).ok_or_else(|| "invalid first parameter".to_string())?,
            quote: single_char(quote).ok_or_else(|| "invalid second parameter".to_string())?,
            header: header.starts_with('1'),
        })
    }
}

/// `Some(None)` for an empty string, `Some(Some(c))` for exactly one character
fn single_char(s: &str) -> Option<Option<char>> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Some(None),
        (Some(c), None) => Some(Some(c)),
        _ => None,
    }
}

fn csv_error(message: impl std::fmt::Display) -> String {
    format!("cannot convert CSV to JSON: {}", message)
}

/// A leading `sep=<c>` line; returns the delimiter and the remaining data
fn split_sep_line(data: &str) -> Option<(char, &str)> {
    let prefix = data.get(..4)?;
    if !prefix.eq_ignore_ascii_case("sep=") {
        return None;
    }
    let mut chars = data[4..].char_indices();
    let (_, delimiter) = chars.next()?;
    let rest = &data[4 + delimiter.len_utf8()..];
    if rest.is_empty() {
        return Some((delimiter, rest));
    }
    rest.strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .map(|rest| (delimiter, rest))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the start of a field
    Delimiter,
    /// Inside an unquoted field (or right after a closing quote)
    Field,
    /// Inside a quoted field
    Quoted,
}

/// Split CSV text into records. A blank line is an empty record.
fn split_records(data: &str, delimiter: char, quote: Option<char>) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut state = State::Delimiter;
    let mut chars = data.chars().peekable();

    while let Some(c) = chars.next() {
        if state == State::Quoted {
            if Some(c) != quote {
                field.push(c);
                continue;
            }
            match chars.peek().copied() {
                Some(next) if Some(next) == quote => {
                    field.push(next);
                    chars.next();
                }
                None | Some('\r') | Some('\n') => state = State::Field,
                Some(next) if next == delimiter => state = State::Field,
                Some(_) => {
                    return Err(csv_error(format!(
                        "delimiter character or end of line are not detected after quoted field \"{}\"",
                        field
                    )))
                }
            }
            continue;
        }

        match c {
            '\r' => match chars.peek() {
                Some('\n') | None => {}
                Some(_) => return Err(csv_error("unsupported line break")),
            },
            '\n' => {
                if state != State::Delimiter || !record.is_empty() {
                    record.push(std::mem::take(&mut field));
                }
                records.push(std::mem::take(&mut record));
                state = State::Delimiter;
            }
            c if c == delimiter => {
                record.push(std::mem::take(&mut field));
                state = State::Delimiter;
            }
            c if state == State::Delimiter && Some(c) == quote => state = State::Quoted,
            c => {
                field.push(c);
                state = State::Field;
            }
        }
    }

    if state == State::Quoted {
        return Err(csv_error(format!("unclosed quoted field \"{}\"", field)));
    }
    if state != State::Delimiter || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// Convert CSV text into a JSON array of objects
pub fn csv_to_json_text(data: &str, options: &CsvOptions) -> Result<String, String> {
    let (sep_delimiter, data) = match split_sep_line(data) {
        Some((delimiter, rest)) => (Some(delimiter), rest),
        None => (None, data),
    };
    let delimiter = options.delimiter.or(sep_delimiter).unwrap_or(DEFAULT_DELIMITER);

    let mut records = split_records(data, delimiter, options.quote)?.into_iter();

    let names = if options.header {
        match records.next() {
            Some(mut names) => {
                if names.is_empty() {
                    names.push(String::new());
                }
                for (i, name) in names.iter().enumerate() {
                    if names[..i].contains(name) {
                        return Err(csv_error(format!("duplicated column name \"{}\"", name)));
                    }
                }
                Some(names)
            }
            None => None,
        }
    } else {
        None
    };

    let mut rows = Vec::new();
    for record in records {
        let mut row = Map::new();
        match &names {
            Some(names) => {
                if record.len() > names.len() {
                    return Err(csv_error("data row contains more fields than header row"));
                }
                let mut fields = record.into_iter();
                for name in names {
                    row.insert(name.clone(), Json::String(fields.next().unwrap_or_default()));
                }
            }
            None => {
                for (i, field) in record.into_iter().enumerate() {
                    row.insert((i + 1).to_string(), Json::String(field));
                }
            }
        }
        rows.push(Json::Object(row));
    }

    Ok(Json::Array(rows).to_string())
}

/// Replace a CSV value with its JSON rendering
pub fn csv_to_json(value: &mut Value, params: &str) -> Result<(), String> {
    let options = CsvOptions::parse(params)?;
    let text = value.clone().into_string()?;
    *value = Value::String(csv_to_json_text(&text, &options)?);
    Ok(())
}
