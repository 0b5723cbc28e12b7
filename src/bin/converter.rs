//! stmt2ofx - CLI tool for converting CSV bank statements to OFX.

use clap::Parser;
use std::fs::File;
use std::io::{self, Read, Write};
use stmt2ofx::parser::{CsvStatementParser, Field, StatementParser};
use stmt2ofx::{Error, OfxWriter, OutputEncoding, Result, Statement};

#[derive(Parser)]
#[command(name = "stmt2ofx_convert")]
#[command(about = "Convert a CSV bank statement to an OFX document", long_about = None)]
struct Cli {
    /// Input CSV file path (or stdin if not provided)
    #[arg(short, long)]
    input: Option<String>,

    /// Output OFX file path (or stdout if not provided)
    #[arg(short, long)]
    output: Option<String>,

    /// Column mapping as comma-separated field:column pairs,
    /// e.g. "id:0,date:1,amount:2,memo:3"
    #[arg(short, long)]
    mapping: Option<String>,

    /// Date format of the input (chrono strftime syntax)
    #[arg(long, default_value = "%Y-%m-%d")]
    date_format: String,

    /// Bank identifier for the statement
    #[arg(long)]
    bank_id: Option<String>,

    /// Account identifier for the statement
    #[arg(long)]
    account_id: Option<String>,

    /// ISO 4217 currency code for the statement
    #[arg(long)]
    currency: Option<String>,

    /// Declared output encoding (unicode or a codepage like cp1252)
    #[arg(long, default_value = "unicode")]
    encoding: String,

    /// Pretty-print the OFX body
    #[arg(long)]
    pretty: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let encoding = cli.encoding.parse::<OutputEncoding>()?;

    let mut statement = Statement::default();
    statement.bank_id = cli.bank_id.clone();
    statement.account_id = cli.account_id.clone();
    statement.currency = cli.currency.clone();

    let reader: Box<dyn Read> = if let Some(ref input_path) = cli.input {
        Box::new(File::open(input_path)?)
    } else {
        Box::new(io::stdin())
    };

    let mut parser = CsvStatementParser::new(reader)
        .with_date_format(&cli.date_format)
        .with_statement(statement);
    if let Some(ref mapping) = cli.mapping {
        parser = parser.with_mappings(parse_mappings(mapping)?);
    }

    let statement = parser.parse()?;
    statement.assert_valid()?;

    let writer = OfxWriter::new(&statement)
        .with_encoding(encoding)
        .pretty(cli.pretty);

    if let Some(ref output_path) = cli.output {
        let mut file = File::create(output_path)?;
        writer.write_to(&mut file)?;
    } else {
        let mut stdout = io::stdout();
        writer.write_to(&mut stdout)?;
        stdout.write_all(b"\n")?;
    }

    Ok(())
}

fn parse_mappings(mapping: &str) -> Result<Vec<(Field, usize)>> {
    let mut mappings = Vec::new();
    for pair in mapping.split(',') {
        let (field, column) = pair
            .split_once(':')
            .ok_or_else(|| Error::InvalidValue(format!("bad mapping pair: {pair}")))?;
        let field = field.trim().parse::<Field>()?;
        let column = column
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::InvalidValue(format!("bad column index: {column}")))?;
        mappings.push((field, column));
    }
    Ok(mappings)
}
