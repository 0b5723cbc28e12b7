//! Statement parsing.
//!
//! This module defines the parser contract every input format implements,
//! plus a generic column-mapped CSV parser that covers the common case of
//! bank exports with one transaction per row.

use crate::error::{Error, Result};
use crate::statement::{generate_unique_transaction_id, Statement, StatementLine};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::io::Read;
use std::str::FromStr;

/// Contract for turning one input document into a [`Statement`].
///
/// Implementations own their source and configuration; `parse` consumes the
/// input and either returns a complete statement or the first error
/// encountered. There is no partial success.
pub trait StatementParser {
    /// Parse the input into a statement.
    fn parse(&mut self) -> Result<Statement>;
}

/// Destination field for one mapped CSV column.
///
/// The field determines the parse path: `Date`/`DateUser` parse with the
/// configured date format, `Amount` parses as a decimal, everything else is
/// kept as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Transaction id (FITID).
    Id,
    /// Posting date.
    Date,
    /// User-initiated date.
    DateUser,
    /// Counterparty name.
    Payee,
    /// Free-form memo.
    Memo,
    /// Transaction amount.
    Amount,
    /// Check number.
    CheckNo,
    /// Bank reference number.
    RefNum,
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "id" => Ok(Field::Id),
            "date" => Ok(Field::Date),
            "date_user" | "dateuser" => Ok(Field::DateUser),
            "payee" => Ok(Field::Payee),
            "memo" => Ok(Field::Memo),
            "amount" => Ok(Field::Amount),
            "check_no" | "checkno" => Ok(Field::CheckNo),
            "refnum" | "ref_num" => Ok(Field::RefNum),
            _ => Err(Error::InvalidValue(format!("unknown field: {s}"))),
        }
    }
}

/// Default date format for CSV input.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Generic CSV statement parser.
///
/// Columns are mapped to [`Field`]s by zero-based index; the mapping is
/// fixed at construction. Rows that are entirely blank are skipped. Lines
/// without a mapped id get a deterministic generated one, so two runs over
/// the same input produce the same ids.
///
/// # Examples
///
/// ```
/// use stmt2ofx::parser::{CsvStatementParser, StatementParser};
///
/// let data = "2020-01-02,Grocery store,-15.40\n";
/// let mut parser = CsvStatementParser::new(data.as_bytes());
/// let statement = parser.parse()?;
/// assert_eq!(statement.lines.len(), 1);
/// # Ok::<(), stmt2ofx::Error>(())
/// ```
#[derive(Debug)]
pub struct CsvStatementParser<R: Read> {
    reader: R,
    mappings: Vec<(Field, usize)>,
    date_format: String,
    statement: Statement,
}

impl<R: Read> CsvStatementParser<R> {
    /// Create a parser with the default `date,memo,amount` column layout.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            mappings: vec![(Field::Date, 0), (Field::Memo, 1), (Field::Amount, 2)],
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            statement: Statement::default(),
        }
    }

    /// Replace the column mapping.
    pub fn with_mappings(mut self, mappings: Vec<(Field, usize)>) -> Self {
        self.mappings = mappings;
        self
    }

    /// Set the date format (chrono `strftime` syntax).
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    /// Seed the statement the parsed lines are appended to, carrying
    /// account metadata the CSV itself does not contain.
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statement = statement;
        self
    }

    fn parse_record(&self, line_no: usize, record: &StringRecord) -> Result<StatementLine> {
        let mut line = StatementLine::default();
        for &(field, column) in &self.mappings {
            let value = record.get(column).ok_or_else(|| Error::Parse {
                line: line_no,
                message: format!("missing column {column}"),
            })?;
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match field {
                Field::Id => line.id = Some(value.to_string()),
                Field::Date => line.date = Some(self.parse_date(line_no, value)?),
                Field::DateUser => line.date_user = Some(self.parse_date(line_no, value)?),
                Field::Payee => line.payee = Some(value.to_string()),
                Field::Memo => line.memo = Some(value.to_string()),
                Field::Amount => line.amount = Some(parse_amount(line_no, value)?),
                Field::CheckNo => line.check_no = Some(value.to_string()),
                Field::RefNum => line.refnum = Some(value.to_string()),
            }
        }
        Ok(line)
    }

    fn parse_date(&self, line_no: usize, value: &str) -> Result<NaiveDateTime> {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, &self.date_format) {
            return Ok(datetime);
        }
        NaiveDate::parse_from_str(value, &self.date_format)
            .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default())
            .map_err(|_| Error::Parse {
                line: line_no,
                message: format!("invalid date: {value}"),
            })
    }
}

impl<R: Read> StatementParser for CsvStatementParser<R> {
    fn parse(&mut self) -> Result<Statement> {
        let records: Vec<csv::Result<StringRecord>> = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(&mut self.reader)
            .records()
            .collect();

        let mut statement = std::mem::take(&mut self.statement);
        let mut txnids: HashSet<String> = HashSet::new();

        for (index, result) in records.into_iter().enumerate() {
            let line_no = index + 1;
            let record = result.map_err(|err| Error::Parse {
                line: line_no,
                message: err.to_string(),
            })?;

            if record.iter().all(|value| value.trim().is_empty()) {
                continue;
            }

            let mut line = self.parse_record(line_no, &record)?;
            if line.id.is_none() {
                line.id = Some(generate_unique_transaction_id(&line, &mut txnids));
            }
            line.assert_valid()?;
            statement.add_line(line);
        }

        Ok(statement)
    }
}

fn parse_amount(line_no: usize, value: &str) -> Result<Decimal> {
    // Tolerate "1 540,00" style amounts
    let cleaned = value.trim().replace(' ', "").replace(',', ".");
    Decimal::from_str(&cleaned).map_err(|_| Error::Parse {
        line: line_no,
        message: format!("invalid amount: {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_default_layout() {
        let data = "2020-01-02,Grocery store,-15.40\n2020-01-03,Salary,1000\n";
        let statement = CsvStatementParser::new(data.as_bytes()).parse().unwrap();

        assert_eq!(statement.lines.len(), 2);
        assert_eq!(statement.lines[0].date, Some(dt(2020, 1, 2)));
        assert_eq!(statement.lines[0].memo.as_deref(), Some("Grocery store"));
        assert_eq!(statement.lines[0].amount, Some("-15.40".parse().unwrap()));
        assert_eq!(statement.lines[1].amount, Some("1000".parse().unwrap()));
    }

    #[test]
    fn test_generated_ids_are_deterministic_and_unique() {
        let data = "2020-01-02,Coffee,-3.50\n2020-01-02,Coffee,-3.50\n";
        let first = CsvStatementParser::new(data.as_bytes()).parse().unwrap();
        let second = CsvStatementParser::new(data.as_bytes()).parse().unwrap();

        let id0 = first.lines[0].id.clone().unwrap();
        let id1 = first.lines[1].id.clone().unwrap();
        assert_ne!(id0, id1);
        assert_eq!(id1, format!("{id0}-1"));
        // Same input, same ids on a fresh run.
        assert_eq!(second.lines[0].id.as_deref(), Some(id0.as_str()));
        assert_eq!(second.lines[1].id.as_deref(), Some(id1.as_str()));
    }

    #[test]
    fn test_custom_mapping_and_date_format() {
        let data = "T-1,02.01.2020,-15.40,Grocery store,John's\n";
        let statement = CsvStatementParser::new(data.as_bytes())
            .with_mappings(vec![
                (Field::Id, 0),
                (Field::Date, 1),
                (Field::Amount, 2),
                (Field::Memo, 3),
                (Field::Payee, 4),
            ])
            .with_date_format("%d.%m.%Y")
            .parse()
            .unwrap();

        let line = &statement.lines[0];
        assert_eq!(line.id.as_deref(), Some("T-1"));
        assert_eq!(line.date, Some(dt(2020, 1, 2)));
        assert_eq!(line.payee.as_deref(), Some("John's"));
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let data = "2020-01-02,Coffee,-3.50\n,,\n2020-01-03,Tea,-2.00\n";
        let statement = CsvStatementParser::new(data.as_bytes()).parse().unwrap();
        assert_eq!(statement.lines.len(), 2);
    }

    #[test]
    fn test_invalid_amount_reports_line_number() {
        let data = "2020-01-02,Coffee,-3.50\n2020-01-03,Tea,not-a-number\n";
        let err = CsvStatementParser::new(data.as_bytes()).parse().unwrap_err();
        match err {
            Error::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("not-a-number"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_date_reports_line_number() {
        let data = "garbage,Coffee,-3.50\n";
        let err = CsvStatementParser::new(data.as_bytes()).parse().unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_mapped_column() {
        let data = "2020-01-02,Coffee\n";
        let err = CsvStatementParser::new(data.as_bytes()).parse().unwrap_err();
        match err {
            Error::Parse { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("column 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_seeded_statement_metadata_is_kept() {
        let data = "2020-01-02,Coffee,-3.50\n";
        let statement = CsvStatementParser::new(data.as_bytes())
            .with_statement(Statement::new("BID", "ACC-1", "EUR"))
            .parse()
            .unwrap();

        assert_eq!(statement.bank_id.as_deref(), Some("BID"));
        assert_eq!(statement.account_id.as_deref(), Some("ACC-1"));
        assert_eq!(statement.currency.as_deref(), Some("EUR"));
        assert_eq!(statement.lines.len(), 1);
    }

    #[test]
    fn test_amount_cleanup() {
        assert_eq!(
            parse_amount(1, "1 540,00").unwrap(),
            "1540.00".parse::<Decimal>().unwrap()
        );
        assert_eq!(
            parse_amount(1, "-15.4").unwrap(),
            "-15.4".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("date".parse::<Field>().unwrap(), Field::Date);
        assert_eq!("DATE_USER".parse::<Field>().unwrap(), Field::DateUser);
        assert_eq!("check_no".parse::<Field>().unwrap(), Field::CheckNo);
        assert!("frobnicate".parse::<Field>().is_err());
    }
}
