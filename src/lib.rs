//! Statement-to-OFX Converter Library
//!
//! A library for turning bank and brokerage statement data into OFX
//! (Open Financial Exchange) documents that personal finance tools can
//! import.
//!
//! # Pipeline
//!
//! - **Parse**: a [`parser::StatementParser`] implementation reads a source
//!   format into the common [`Statement`] model. A generic CSV parser is
//!   provided; institution-specific parsers implement the same trait.
//! - **Validate**: `assert_valid` checks domain invariants (balance
//!   reconciliation, transaction referenceability, the per-type field rules
//!   for investment lines).
//! - **Write**: [`OfxWriter`] serializes the statement as an OFX document.
//!
//! # Examples
//!
//! ## Parsing a CSV file and writing OFX
//!
//! ```no_run
//! use std::fs::File;
//! use stmt2ofx::parser::{CsvStatementParser, StatementParser};
//! use stmt2ofx::OfxWriter;
//!
//! let file = File::open("statement.csv")?;
//! let mut parser = CsvStatementParser::new(file);
//! let statement = parser.parse()?;
//! statement.assert_valid()?;
//!
//! let mut output = File::create("statement.ofx")?;
//! OfxWriter::new(&statement).write_to(&mut output)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod ofx;
pub mod parser;
pub mod statement;

use std::str::FromStr;

// Re-export commonly used types
pub use error::{Error, Result};
pub use ofx::OfxWriter;
pub use statement::{
    AccountType, BankAccount, Currency, InvestStatementLine, InvestTransactionType, Statement,
    StatementLine, TransactionType,
};

/// Declared encoding of the emitted OFX document.
///
/// Selects the ENCODING/CHARSET pair in the OFX header. The document body
/// is produced as UTF-8 either way; transcoding to a legacy codepage is the
/// caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEncoding {
    /// UNICODE encoding, no charset (the default).
    Unicode,
    /// USASCII encoding with an explicit codepage charset, e.g. "1252".
    CodePage(String),
}

impl Default for OutputEncoding {
    fn default() -> Self {
        OutputEncoding::Unicode
    }
}

impl OutputEncoding {
    /// The (ENCODING, CHARSET) header field values.
    pub fn header_fields(&self) -> (&str, &str) {
        match self {
            OutputEncoding::Unicode => ("UNICODE", "NONE"),
            OutputEncoding::CodePage(codepage) => ("USASCII", codepage.as_str()),
        }
    }
}

impl FromStr for OutputEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidEncoding(s.to_string()));
        }
        match s.to_lowercase().as_str() {
            "unicode" | "utf-8" | "utf8" => Ok(OutputEncoding::Unicode),
            codepage => {
                // "cp1252" and "1252" mean the same codepage
                let codepage = codepage.strip_prefix("cp").unwrap_or(codepage);
                if codepage.is_empty() || !codepage.chars().all(|c| c.is_ascii_digit()) {
                    return Err(Error::InvalidEncoding(s.to_string()));
                }
                Ok(OutputEncoding::CodePage(codepage.to_string()))
            }
        }
    }
}
