//! The delimited text codec behind table persistence.
//!
//! Every field is terminated by `,` and every record by `\n`, including the
//! last of each. A field is optional: `\x` on its own marks an absent (null)
//! field. Inside a field `\\` escapes the backslash and `\,` the separator.

use std::io::{BufRead, Write};

use crate::error::{QueryError, Result};

pub type Field = Option<String>;
pub type Record = Vec<Field>;

const SEPARATOR: char = ',';
const ESCAPE: char = '\\';
const NULL_ESCAPE: char = 'x';

pub fn write_records<W: Write>(out: &mut W, records: &[Record]) -> std::io::Result<()> {
    for record in records {
        let mut line = String::new();
        for field in record {
            write_field(&mut line, field);
            line.push(SEPARATOR);
        }
        line.push('\n');
        out.write_all(line.as_bytes())?;
    }
    Ok(())
}

fn write_field(out: &mut String, field: &Field) {
    let Some(content) = field else {
        out.push(ESCAPE);
        out.push(NULL_ESCAPE);
        return;
    };
    for c in content.chars() {
        if c == ESCAPE || c == SEPARATOR {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

pub fn read_records<R: BufRead>(input: R) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for line in input.lines() {
        let line = line?;
        records.push(parse_line(&line)?);
    }
    Ok(records)
}

pub fn parse_line(line: &str) -> Result<Record> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    while chars.peek().is_some() {
        fields.push(parse_field(&mut chars)?);
    }
    Ok(fields)
}

fn parse_field(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Field> {
    let mut content = String::new();
    loop {
        let Some(c) = chars.next() else {
            return Err(QueryError::parse("unexpected end of line in field"));
        };
        if c == SEPARATOR {
            return Ok(Some(content));
        }
        if c == ESCAPE {
            match chars.next() {
                Some(c) if c == ESCAPE || c == SEPARATOR => content.push(c),
                Some(c) if c == NULL_ESCAPE => {
                    if !content.is_empty() || chars.next() != Some(SEPARATOR) {
                        return Err(QueryError::parse("null field has additional content"));
                    }
                    return Ok(None);
                }
                _ => return Err(QueryError::parse("unknown escape sequence")),
            }
        } else {
            content.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(records: &[Record]) -> Vec<Record> {
        let mut buffer = Vec::new();
        write_records(&mut buffer, records).unwrap();
        read_records(buffer.as_slice()).unwrap()
    }

    #[test]
    fn escapes_separator_and_backslash() {
        let records = vec![vec![
            Some("a,b".to_string()),
            Some("c\\d".to_string()),
            None,
            Some(String::new()),
        ]];
        assert_eq!(roundtrip(&records), records);
    }

    #[test]
    fn null_field_is_standalone() {
        assert_eq!(parse_line("\\x,").unwrap(), vec![None]);
        assert!(parse_line("a\\x,").is_err());
        assert!(parse_line("\\xb,").is_err());
    }

    #[test]
    fn unterminated_field_is_an_error() {
        assert!(parse_line("abc").is_err());
    }
}
