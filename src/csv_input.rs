//! Reader for the seeding CSV (`name,email,age`).
//!
//! Supports RFC 4180 style quoting: fields may be wrapped in double quotes,
//! which allows embedded commas and line breaks, and `""` inside a quoted
//! field is a literal quote. Error line numbers refer to the line a record
//! starts on.
use crate::core::{Result, RowscopeError};
use crate::users::parse_decimal;
use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

/// One candidate row for `user_data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvUser {
    pub name: String,
    pub email: String,
    pub age: i64,
}

struct Columns {
    name: usize,
    email: usize,
    age: usize,
}

impl Columns {
    fn from_header(header: &[String], line: usize) -> Result<Self> {
        let find = |wanted: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(wanted))
                .ok_or_else(|| RowscopeError::Csv {
                    line,
                    message: format!("header has no '{}' column", wanted),
                })
        };
        Ok(Columns {
            name: find("name")?,
            email: find("email")?,
            age: find("age")?,
        })
    }
}

/// Reads every user from the CSV file at `path`
pub fn read_users(path: &Path) -> Result<Vec<CsvUser>> {
    let file = File::open(path)?;
    parse_users(BufReader::new(file))
}

/// Parses users from any reader; the first non-blank record is the header
pub fn parse_users<R: Read>(mut reader: R) -> Result<Vec<CsvUser>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let mut records = Records::new(&text);

    let columns = match records.next_record()? {
        Some((line, header)) => Columns::from_header(&header, line)?,
        None => return Ok(Vec::new()),
    };

    let mut users = Vec::new();
    while let Some((line_no, fields)) = records.next_record()? {
        let field = |idx: usize, label: &str| {
            fields.get(idx).map(|f| f.trim().to_string()).ok_or_else(|| RowscopeError::Csv {
                line: line_no,
                message: format!("missing '{}' field", label),
            })
        };

        let age_text = field(columns.age, "age")?;
        let age = parse_decimal(&age_text).map_err(|_| RowscopeError::Csv {
            line: line_no,
            message: format!("age '{}' is not a number", age_text),
        })?;

        users.push(CsvUser {
            name: field(columns.name, "name")?,
            email: field(columns.email, "email")?,
            age,
        });
    }

    Ok(users)
}

/// Splits CSV text into records, tracking the line each one starts on
struct Records<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Records<'a> {
    fn new(text: &'a str) -> Self {
        Records {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    /// Next non-blank record and its starting line, or `None` at the end
    fn next_record(&mut self) -> Result<Option<(usize, Vec<String>)>> {
        while self.chars.peek().is_some() {
            let start = self.line;
            let fields = self.read_record().map_err(|message| RowscopeError::Csv {
                line: start,
                message,
            })?;
            let blank = fields.len() == 1 && fields[0].trim().is_empty();
            if !blank {
                return Ok(Some((start, fields)));
            }
        }
        Ok(None)
    }

    fn read_record(&mut self) -> std::result::Result<Vec<String>, String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;

        while let Some(c) = self.chars.next() {
            if c == '\n' {
                self.line += 1;
            }
            match (c, in_quotes) {
                ('"', true) if self.chars.peek() == Some(&'"') => {
                    self.chars.next();
                    current.push('"');
                }
                ('"', true) => in_quotes = false,
                ('"', false) if current.is_empty() => in_quotes = true,
                (',', false) => fields.push(std::mem::take(&mut current)),
                ('\n', false) => {
                    fields.push(current);
                    return Ok(fields);
                }
                ('\r', false) if self.chars.peek() == Some(&'\n') => {}
                (c, _) => current.push(c),
            }
        }

        if in_quotes {
            return Err("unterminated quoted field".to_string());
        }
        fields.push(current);
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<Vec<CsvUser>> {
        parse_users(Cursor::new(text))
    }

    #[test]
    fn test_parse_basic_file() {
        let users = parse("name,email,age\nJohnnie Mayer,Ross.Reynolds21@hotmail.com,35\nGlenda Wisozk,Miriam21@gmail.com,119\n").unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(
            users[0],
            CsvUser {
                name: "Johnnie Mayer".to_string(),
                email: "Ross.Reynolds21@hotmail.com".to_string(),
                age: 35,
            }
        );
        assert_eq!(users[1].age, 119);
    }

    #[test]
    fn test_quoted_fields_and_column_order() {
        let text = "email,\"age\",name,extra\r\n\"o'neil@example.com\",\"42\",\"O'Neil, \"\"Pat\"\"\",ignored\r\n";
        let users = parse(text).unwrap();
        assert_eq!(users[0].name, "O'Neil, \"Pat\"");
        assert_eq!(users[0].email, "o'neil@example.com");
        assert_eq!(users[0].age, 42);
    }

    #[test]
    fn test_blank_lines_and_decimal_age() {
        let users = parse("\nname,email,age\n\nAda,ada@example.com,36.0\n\n").unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].age, 36);
    }

    #[test]
    fn test_header_only() {
        assert!(parse("name,email,age\n").unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_missing_header_column() {
        match parse("name,age\nAda,36\n") {
            Err(RowscopeError::Csv { line, message }) => {
                assert_eq!(line, 1);
                assert!(message.contains("email"));
            }
            other => panic!("Expected Csv error, got {:?}", other),
        }
    }

    #[test]
    fn test_short_row_and_bad_age() {
        match parse("name,email,age\nAda,ada@example.com\n") {
            Err(RowscopeError::Csv { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected Csv error, got {:?}", other),
        }
        match parse("name,email,age\nAda,ada@example.com,old\n") {
            Err(RowscopeError::Csv { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("old"));
            }
            other => panic!("Expected Csv error, got {:?}", other),
        }
    }

    #[test]
    fn test_quoted_field_spans_lines() {
        let text = "name,email,age\n\"Ada\nLovelace\",ada@example.com,36\nBob,bob@example.com,40\nCy,cy@example.com,x\n";
        match parse(text) {
            Err(RowscopeError::Csv { line, .. }) => assert_eq!(line, 5),
            other => panic!("Expected Csv error, got {:?}", other),
        }

        let users = parse("name,email,age\r\n\"Ada\r\nLovelace\",ada@example.com,36\r\n").unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Ada\r\nLovelace");
        assert_eq!(users[0].age, 36);

        let users = parse("name,email,age\n\"Ada\nLovelace\",ada@example.com,36\n").unwrap();
        assert_eq!(users[0].name, "Ada\nLovelace");
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(
            parse("name,email,age\n\"Ada,ada@example.com,36\n"),
            Err(RowscopeError::Csv { line: 2, .. })
        ));
    }

    #[test]
    fn test_read_users_missing_file() {
        let result = read_users(Path::new("/nonexistent/users.csv"));
        assert!(matches!(result, Err(RowscopeError::Io(_))));
    }
}
