//! OFX document writer.
//!
//! Serializes a [`Statement`] into the OFX wire form: a 9-line SGML header
//! followed by an XML body. OFX is order-sensitive and distinguishes
//! "omit when absent" elements from "emit even when blank" elements, so the
//! body is built with the quick-xml event writer rather than serde.
//!
//! The writer is a pure function of the statement plus an injected
//! generation timestamp; it performs no validation. A caller that skips
//! [`Statement::assert_valid`] gets a structurally consistent document
//! regardless of whether the numbers reconcile.

use chrono::{Local, NaiveDateTime};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::Write as IoWrite;

use crate::error::{Error, Result};
use crate::statement::{
    BankAccount, Currency, InvestStatementLine, InvestTransactionType, Statement, StatementLine,
};
use crate::OutputEncoding;

/// Writes a statement as an OFX document.
///
/// # Examples
///
/// ```no_run
/// use std::fs::File;
/// use stmt2ofx::ofx::OfxWriter;
/// use stmt2ofx::Statement;
///
/// let statement = Statement::new("BID", "ACCID", "USD");
/// let mut file = File::create("output.ofx")?;
/// OfxWriter::new(&statement).write_to(&mut file)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct OfxWriter<'a> {
    statement: &'a Statement,
    gen_time: NaiveDateTime,
    encoding: OutputEncoding,
    pretty: bool,
}

impl<'a> OfxWriter<'a> {
    /// Create a writer for `statement` with the current local time as the
    /// generation timestamp.
    pub fn new(statement: &'a Statement) -> Self {
        Self {
            statement,
            gen_time: Local::now().naive_local(),
            encoding: OutputEncoding::default(),
            pretty: false,
        }
    }

    /// Override the generation timestamp (DTSERVER), for reproducible output.
    pub fn with_gen_time(mut self, gen_time: NaiveDateTime) -> Self {
        self.gen_time = gen_time;
        self
    }

    /// Select the declared output encoding for the OFX header.
    pub fn with_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enable pretty-printed (indented) XML output.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Render the complete OFX document as a string.
    pub fn to_ofx(&self) -> Result<String> {
        let (encoding, charset) = self.encoding.header_fields();
        let header = format!(
            "OFXHEADER:100\n\
             DATA:OFXSGML\n\
             VERSION:102\n\
             SECURITY:NONE\n\
             ENCODING:{encoding}\n\
             CHARSET:{charset}\n\
             COMPRESSION:NONE\n\
             OLDFILEUID:NONE\n\
             NEWFILEUID:NONE\n\n"
        );
        Ok(header + &self.build_body()?)
    }

    /// Write the complete OFX document to any destination implementing
    /// `Write`.
    pub fn write_to<W: IoWrite>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.to_ofx()?.as_bytes())?;
        Ok(())
    }

    fn build_body(&self) -> Result<String> {
        let mut xml = XmlBuilder::new(self.pretty);

        xml.start("OFX")?;
        self.build_signon(&mut xml)?;
        if !self.statement.lines.is_empty() {
            self.build_bank_section(&mut xml)?;
        }
        if !self.statement.invest_lines.is_empty() {
            self.build_security_list(&mut xml)?;
            self.build_invest_section(&mut xml)?;
        }
        xml.end("OFX")?;

        xml.into_string()
    }

    fn build_signon(&self, xml: &mut XmlBuilder) -> Result<()> {
        xml.start("SIGNONMSGSRSV1")?;
        xml.start("SONRS")?;
        self.build_status(xml)?;
        xml.datetime("DTSERVER", Some(self.gen_time), false)?;
        xml.text("LANGUAGE", Some("ENG"), true)?;
        xml.end("SONRS")?;
        xml.end("SIGNONMSGSRSV1")
    }

    fn build_status(&self, xml: &mut XmlBuilder) -> Result<()> {
        xml.start("STATUS")?;
        xml.text("CODE", Some("0"), true)?;
        xml.text("SEVERITY", Some("INFO"), true)?;
        xml.end("STATUS")
    }

    fn build_bank_section(&self, xml: &mut XmlBuilder) -> Result<()> {
        let stmt = self.statement;

        xml.start("BANKMSGSRSV1")?;
        xml.start("STMTTRNRS")?;
        xml.text("TRNUID", Some("0"), true)?;
        self.build_status(xml)?;

        xml.start("STMTRS")?;
        xml.text("CURDEF", stmt.currency.as_deref(), true)?;

        xml.start("BANKACCTFROM")?;
        xml.text("BANKID", stmt.bank_id.as_deref(), false)?;
        xml.text("ACCTID", stmt.account_id.as_deref(), false)?;
        xml.text("ACCTTYPE", Some(stmt.account_type.as_str()), true)?;
        xml.end("BANKACCTFROM")?;

        xml.start("BANKTRANLIST")?;
        xml.date("DTSTART", stmt.start_date, false)?;
        xml.date("DTEND", stmt.end_date, false)?;
        for line in &stmt.lines {
            self.build_bank_line(xml, line)?;
        }
        xml.end("BANKTRANLIST")?;

        xml.start("LEDGERBAL")?;
        xml.amount("BALAMT", stmt.end_balance, 2, false)?;
        xml.datetime("DTASOF", stmt.end_date, false)?;
        xml.end("LEDGERBAL")?;

        xml.end("STMTRS")?;
        xml.end("STMTTRNRS")?;
        xml.end("BANKMSGSRSV1")
    }

    fn build_bank_line(&self, xml: &mut XmlBuilder, line: &StatementLine) -> Result<()> {
        xml.start("STMTTRN")?;
        xml.text("TRNTYPE", Some(line.trntype.as_str()), true)?;
        xml.date("DTPOSTED", line.date, true)?;
        xml.date("DTUSER", line.date_user, true)?;
        xml.amount("TRNAMT", line.amount, 2, true)?;
        xml.text("FITID", line.id.as_deref(), true)?;
        xml.text("CHECKNUM", line.check_no.as_deref(), true)?;
        xml.text("REFNUM", line.refnum.as_deref(), true)?;
        xml.text("NAME", line.payee.as_deref(), true)?;
        if let Some(ref account) = line.bank_account_to {
            self.build_bank_account_to(xml, account)?;
        }
        xml.text("MEMO", line.memo.as_deref(), true)?;
        if let Some(ref currency) = line.currency {
            self.build_currency(xml, "CURRENCY", currency)?;
        }
        if let Some(ref currency) = line.orig_currency {
            self.build_currency(xml, "ORIG_CURRENCY", currency)?;
        }
        xml.end("STMTTRN")
    }

    fn build_bank_account_to(&self, xml: &mut XmlBuilder, account: &BankAccount) -> Result<()> {
        xml.start("BANKACCTTO")?;
        xml.text("BANKID", Some(&account.bank_id), false)?;
        xml.text("BRANCHID", account.branch_id.as_deref(), true)?;
        xml.text("ACCTID", Some(&account.acct_id), false)?;
        xml.text("ACCTTYPE", Some(account.acct_type.as_str()), true)?;
        xml.text("ACCTKEY", account.acct_key.as_deref(), true)?;
        xml.end("BANKACCTTO")
    }

    fn build_currency(&self, xml: &mut XmlBuilder, tag: &str, currency: &Currency) -> Result<()> {
        xml.start(tag)?;
        xml.text("CURSYM", Some(&currency.symbol), true)?;
        xml.amount("CURRATE", currency.rate, 2, true)?;
        xml.end(tag)
    }

    /// Unique non-null security ids across the investment lines, in
    /// first-seen order.
    fn security_ids(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for line in &self.statement.invest_lines {
            if let Some(ref security_id) = line.security_id {
                if !seen.contains(&security_id.as_str()) {
                    seen.push(security_id);
                }
            }
        }
        seen
    }

    fn build_security_list(&self, xml: &mut XmlBuilder) -> Result<()> {
        xml.start("SECLISTMSGSRSV1")?;
        xml.start("SECLIST")?;
        for security_id in self.security_ids() {
            xml.start("STOCKINFO")?;
            xml.start("SECINFO")?;
            self.build_secid(xml, Some(security_id))?;
            xml.text("SECNAME", Some(security_id), true)?;
            xml.text("TICKER", Some(security_id), true)?;
            xml.end("SECINFO")?;
            xml.end("STOCKINFO")?;
        }
        xml.end("SECLIST")?;
        xml.end("SECLISTMSGSRSV1")
    }

    fn build_secid(&self, xml: &mut XmlBuilder, security_id: Option<&str>) -> Result<()> {
        let Some(security_id) = security_id else {
            return Ok(());
        };
        xml.start("SECID")?;
        xml.text("UNIQUEID", Some(security_id), true)?;
        xml.text("UNIQUEIDTYPE", Some("TICKER"), true)?;
        xml.end("SECID")
    }

    fn build_invest_section(&self, xml: &mut XmlBuilder) -> Result<()> {
        let stmt = self.statement;

        xml.start("INVSTMTMSGSRSV1")?;
        xml.start("INVSTMTTRNRS")?;
        xml.text("TRNUID", Some("0"), true)?;
        self.build_status(xml)?;

        xml.start("INVSTMTRS")?;
        xml.datetime("DTASOF", Some(self.gen_time), false)?;
        xml.text("CURDEF", stmt.currency.as_deref(), true)?;

        xml.start("INVACCTFROM")?;
        xml.text("BROKERID", stmt.broker_id.as_deref(), false)?;
        xml.text("ACCTID", stmt.account_id.as_deref(), false)?;
        xml.end("INVACCTFROM")?;

        xml.start("INVTRANLIST")?;
        xml.date("DTSTART", stmt.start_date, false)?;
        xml.date("DTEND", stmt.end_date, false)?;
        for line in &stmt.invest_lines {
            self.build_invest_line(xml, line)?;
        }
        xml.end("INVTRANLIST")?;

        xml.end("INVSTMTRS")?;
        xml.end("INVSTMTTRNRS")?;
        xml.end("INVSTMTMSGSRSV1")
    }

    fn build_invest_line(&self, xml: &mut XmlBuilder, line: &InvestStatementLine) -> Result<()> {
        // Lines without a transaction type are silently skipped.
        let Some(trntype) = line.trntype else {
            return Ok(());
        };

        use InvestTransactionType::*;
        match trntype {
            BuyMf | BuyStock | BuyOther | SellMf | SellStock | SellOther => {
                self.build_invest_trade(xml, line, trntype)
            }
            Income => self.build_invest_income(xml, line),
            InvExpense => self.build_invest_expense(xml, line),
            Transfer => self.build_invest_transfer(xml, line),
            InvBankTran => self.build_invest_bank_line(xml, line),
        }
    }

    fn build_invest_trade(
        &self,
        xml: &mut XmlBuilder,
        line: &InvestStatementLine,
        trntype: InvestTransactionType,
    ) -> Result<()> {
        let envelope = trntype.as_str();
        let inner = if trntype.is_buy() { "INVBUY" } else { "INVSELL" };

        xml.start(envelope)?;
        // The generic *OTHER envelopes have no BUYTYPE/SELLTYPE element.
        if !matches!(
            trntype,
            InvestTransactionType::BuyOther | InvestTransactionType::SellOther
        ) {
            let detail_tag = if trntype.is_buy() { "BUYTYPE" } else { "SELLTYPE" };
            xml.text(detail_tag, line.trntype_detailed.as_deref(), true)?;
        }
        xml.start(inner)?;
        self.build_invest_tran(xml, line)?;
        self.build_secid(xml, line.security_id.as_deref())?;
        xml.text("SUBACCTSEC", Some("OTHER"), true)?;
        xml.text("SUBACCTFUND", Some("OTHER"), true)?;
        xml.amount("FEES", line.fees, 5, true)?;
        xml.amount("UNITPRICE", line.unit_price, 5, true)?;
        xml.amount("UNITS", line.units, 5, true)?;
        xml.amount("TOTAL", line.amount, 2, true)?;
        xml.end(inner)?;
        xml.end(envelope)
    }

    fn build_invest_income(&self, xml: &mut XmlBuilder, line: &InvestStatementLine) -> Result<()> {
        xml.start("INCOME")?;
        xml.text("INCOMETYPE", line.trntype_detailed.as_deref(), true)?;
        self.build_invest_tran(xml, line)?;
        self.build_secid(xml, line.security_id.as_deref())?;
        xml.text("SUBACCTSEC", Some("OTHER"), true)?;
        xml.text("SUBACCTFUND", Some("OTHER"), true)?;
        xml.amount("WITHHOLDING", line.fees, 5, true)?;
        xml.amount("TOTAL", line.amount, 2, true)?;
        xml.end("INCOME")
    }

    fn build_invest_expense(&self, xml: &mut XmlBuilder, line: &InvestStatementLine) -> Result<()> {
        xml.start("INVEXPENSE")?;
        self.build_invest_tran(xml, line)?;
        self.build_secid(xml, line.security_id.as_deref())?;
        xml.text("SUBACCTSEC", Some("OTHER"), true)?;
        xml.text("SUBACCTFUND", Some("OTHER"), true)?;
        xml.amount("TOTAL", line.amount, 2, true)?;
        xml.end("INVEXPENSE")
    }

    fn build_invest_transfer(&self, xml: &mut XmlBuilder, line: &InvestStatementLine) -> Result<()> {
        xml.start("TRANSFER")?;
        self.build_invest_tran(xml, line)?;
        self.build_secid(xml, line.security_id.as_deref())?;
        xml.text("SUBACCTSEC", Some("OTHER"), true)?;
        xml.amount("UNITPRICE", line.unit_price, 5, true)?;
        xml.amount("UNITS", line.units, 5, true)?;
        xml.end("TRANSFER")
    }

    /// INVBANKTRAN renders as an inner bank-transaction envelope, with
    /// `trntype_detailed` supplying the inner bank transaction type.
    fn build_invest_bank_line(
        &self,
        xml: &mut XmlBuilder,
        line: &InvestStatementLine,
    ) -> Result<()> {
        xml.start("INVBANKTRAN")?;
        xml.start("STMTTRN")?;
        xml.text("TRNTYPE", line.trntype_detailed.as_deref(), true)?;
        xml.date("DTPOSTED", line.date, true)?;
        xml.amount("TRNAMT", line.amount, 2, true)?;
        xml.text("FITID", line.id.as_deref(), true)?;
        xml.text("MEMO", line.memo.as_deref(), true)?;
        xml.end("STMTTRN")?;
        xml.text("SUBACCTFUND", Some("OTHER"), true)?;
        xml.end("INVBANKTRAN")
    }

    fn build_invest_tran(&self, xml: &mut XmlBuilder, line: &InvestStatementLine) -> Result<()> {
        xml.start("INVTRAN")?;
        xml.text("FITID", line.id.as_deref(), true)?;
        xml.date("DTTRADE", line.date, true)?;
        xml.text("MEMO", line.memo.as_deref(), true)?;
        xml.end("INVTRAN")
    }
}

/// Thin wrapper over the quick-xml event writer with the OFX element
/// conventions: skip-empty vs always-emit, date/timestamp rendering and
/// fixed-precision amounts.
struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    fn new(pretty: bool) -> Self {
        let writer = if pretty {
            Writer::new_with_indent(Vec::new(), b' ', 4)
        } else {
            Writer::new(Vec::new())
        };
        Self { writer }
    }

    fn start(&mut self, tag: &str) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(tag)))?;
        Ok(())
    }

    fn end(&mut self, tag: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    /// Emit `<tag>value</tag>`. An absent or empty value is skipped when
    /// `skip_empty` is set, and rendered as an empty element otherwise.
    fn text(&mut self, tag: &str, value: Option<&str>, skip_empty: bool) -> Result<()> {
        let value = value.unwrap_or("");
        if value.is_empty() {
            if skip_empty {
                return Ok(());
            }
            self.writer.write_event(Event::Empty(BytesStart::new(tag)))?;
            return Ok(());
        }
        self.start(tag)?;
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        self.end(tag)
    }

    fn date(&mut self, tag: &str, value: Option<NaiveDateTime>, skip_empty: bool) -> Result<()> {
        let formatted = value.map(|dt| dt.format("%Y%m%d").to_string());
        self.text(tag, formatted.as_deref(), skip_empty)
    }

    fn datetime(
        &mut self,
        tag: &str,
        value: Option<NaiveDateTime>,
        skip_empty: bool,
    ) -> Result<()> {
        let formatted = value.map(|dt| dt.format("%Y%m%d%H%M%S").to_string());
        self.text(tag, formatted.as_deref(), skip_empty)
    }

    fn amount(
        &mut self,
        tag: &str,
        value: Option<Decimal>,
        precision: u32,
        skip_empty: bool,
    ) -> Result<()> {
        let formatted = value.map(|amount| format_amount(&amount, precision));
        self.text(tag, formatted.as_deref(), skip_empty)
    }

    fn into_string(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner()).map_err(|err| Error::Xml(err.to_string()))
    }
}

/// Format a decimal with a fixed number of fraction digits, rounding
/// half away from zero. Downstream importers parse fixed-width decimal
/// text, so the precision is part of the wire contract.
fn format_amount(value: &Decimal, precision: u32) -> String {
    let rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.precision$}", precision = precision as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{BankAccount, Currency, StatementLine};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn dt(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    const HEADER: &str = "OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\nSECURITY:NONE\n\
                          ENCODING:UNICODE\nCHARSET:NONE\nCOMPRESSION:NONE\n\
                          OLDFILEUID:NONE\nNEWFILEUID:NONE\n\n";

    fn bank_statement() -> Statement {
        let mut statement = Statement::new("BID", "ACCID", "LTL");
        statement.add_line(StatementLine::new("1", dt(2012, 2, 12), "Sample 1", dec("15.4")));

        let mut line = StatementLine::new("2", dt(2012, 2, 12), "Sample 2", dec("25.0"));
        line.payee = Some(String::new());
        let mut account = BankAccount::new("SNORAS", "LT1232");
        account.branch_id = Some("VNO".into());
        line.bank_account_to = Some(account);
        statement.add_line(line);

        statement
    }

    #[test]
    fn test_bank_statement_document() {
        let statement = bank_statement();
        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2012, 3, 3))
            .to_ofx()
            .unwrap();

        let expected = HEADER.to_string()
            + "<OFX>\
               <SIGNONMSGSRSV1><SONRS>\
               <STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY></STATUS>\
               <DTSERVER>20120303000000</DTSERVER>\
               <LANGUAGE>ENG</LANGUAGE>\
               </SONRS></SIGNONMSGSRSV1>\
               <BANKMSGSRSV1><STMTTRNRS>\
               <TRNUID>0</TRNUID>\
               <STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY></STATUS>\
               <STMTRS>\
               <CURDEF>LTL</CURDEF>\
               <BANKACCTFROM>\
               <BANKID>BID</BANKID><ACCTID>ACCID</ACCTID><ACCTTYPE>CHECKING</ACCTTYPE>\
               </BANKACCTFROM>\
               <BANKTRANLIST>\
               <DTSTART/><DTEND/>\
               <STMTTRN>\
               <TRNTYPE>CHECK</TRNTYPE><DTPOSTED>20120212</DTPOSTED>\
               <TRNAMT>15.40</TRNAMT><FITID>1</FITID><MEMO>Sample 1</MEMO>\
               </STMTTRN>\
               <STMTTRN>\
               <TRNTYPE>CHECK</TRNTYPE><DTPOSTED>20120212</DTPOSTED>\
               <TRNAMT>25.00</TRNAMT><FITID>2</FITID>\
               <BANKACCTTO>\
               <BANKID>SNORAS</BANKID><BRANCHID>VNO</BRANCHID>\
               <ACCTID>LT1232</ACCTID><ACCTTYPE>CHECKING</ACCTTYPE>\
               </BANKACCTTO>\
               <MEMO>Sample 2</MEMO>\
               </STMTTRN>\
               </BANKTRANLIST>\
               <LEDGERBAL><BALAMT/><DTASOF/></LEDGERBAL>\
               </STMTRS></STMTTRNRS></BANKMSGSRSV1>\
               </OFX>";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_optional_fields_are_suppressed() {
        let mut statement = Statement::new("BID", "ACCID", "USD");
        let mut line = StatementLine::default();
        line.id = Some("1".into());
        line.date = Some(dt(2020, 1, 1));
        line.amount = Some(dec("10"));
        statement.add_line(line);

        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2020, 2, 1))
            .to_ofx()
            .unwrap();

        for required in ["<TRNTYPE>", "<DTPOSTED>", "<TRNAMT>", "<FITID>"] {
            assert!(output.contains(required), "missing {required}");
        }
        for absent in ["<CHECKNUM", "<NAME", "<MEMO", "<REFNUM", "<DTUSER", "<BANKACCTTO"] {
            assert!(!output.contains(absent), "unexpected {absent}");
        }
    }

    #[test]
    fn test_currency_blocks() {
        let mut statement = Statement::new("BID", "ACCID", "LTL");
        let mut line = StatementLine::new("1", dt(2012, 2, 12), "Sample", dec("25.0"));
        line.currency = Some(Currency::new("USD"));
        line.orig_currency = Some(Currency::with_rate("EUR", dec("3.4543")));
        statement.add_line(line);

        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2012, 3, 3))
            .to_ofx()
            .unwrap();

        assert!(output.contains("<CURRENCY><CURSYM>USD</CURSYM></CURRENCY>"));
        assert!(output
            .contains("<ORIG_CURRENCY><CURSYM>EUR</CURSYM><CURRATE>3.45</CURRATE></ORIG_CURRENCY>"));
    }

    #[test]
    fn test_no_bank_section_without_lines() {
        let statement = Statement::new("BID", "ACCID", "USD");
        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2020, 1, 1))
            .to_ofx()
            .unwrap();

        assert!(output.contains("<SIGNONMSGSRSV1>"));
        assert!(!output.contains("<BANKMSGSRSV1>"));
        assert!(!output.contains("<INVSTMTMSGSRSV1>"));
    }

    fn invest_statement() -> Statement {
        let mut statement = Statement::new("BID", "ACCID", "LTL");
        statement.broker_id = Some("BROKERID".into());
        statement.end_date = Some(dt(2021, 5, 1));

        let mut line = InvestStatementLine::new(
            "3",
            dt(2021, 1, 1),
            "Sample 3",
            InvestTransactionType::BuyStock,
        );
        line.trntype_detailed = Some("BUY".into());
        line.security_id = Some("AAPL".into());
        line.amount = Some(dec("-416.08"));
        line.units = Some(dec("3"));
        line.unit_price = Some(dec("138.28"));
        line.fees = Some(dec("1.24"));
        line.assert_valid().unwrap();
        statement.add_invest_line(line);

        let mut line = InvestStatementLine::new(
            "4",
            dt(2021, 1, 1),
            "Sample 4",
            InvestTransactionType::SellStock,
        );
        line.trntype_detailed = Some("SELL".into());
        line.security_id = Some("MSFT".into());
        line.amount = Some(dec("1127.87"));
        line.units = Some(dec("-5"));
        line.unit_price = Some(dec("225.63"));
        line.fees = Some(dec("0.28"));
        line.assert_valid().unwrap();
        statement.add_invest_line(line);

        let mut line = InvestStatementLine::new(
            "5",
            dt(2021, 1, 1),
            "Sample 5",
            InvestTransactionType::Income,
        );
        line.trntype_detailed = Some("DIV".into());
        line.security_id = Some("MSFT".into());
        line.amount = Some(dec("0.79"));
        line.fees = Some(dec("0.5"));
        line.assert_valid().unwrap();
        statement.add_invest_line(line);

        let mut line = InvestStatementLine::new(
            "6",
            dt(2021, 1, 2),
            "Bank Interest",
            InvestTransactionType::InvBankTran,
        );
        line.trntype_detailed = Some("INT".into());
        line.amount = Some(dec("0.45"));
        line.assert_valid().unwrap();
        statement.add_invest_line(line);

        let mut line = InvestStatementLine::new(
            "7",
            dt(2021, 1, 3),
            "Journaled Shares",
            InvestTransactionType::Transfer,
        );
        line.security_id = Some("MSFT".into());
        line.units = Some(dec("4"));
        line.unit_price = Some(dec("225.63"));
        line.assert_valid().unwrap();
        statement.add_invest_line(line);

        let mut line = InvestStatementLine::new(
            "8",
            dt(2025, 1, 1),
            "NRA Tax Adj",
            InvestTransactionType::InvExpense,
        );
        line.security_id = Some("AAPL".into());
        line.amount = Some(dec("-0.29"));
        line.assert_valid().unwrap();
        statement.add_invest_line(line);

        statement
    }

    #[test]
    fn test_invest_statement_document() {
        let statement = invest_statement();
        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2021, 5, 1))
            .to_ofx()
            .unwrap();

        let expected = HEADER.to_string()
            + "<OFX>\
               <SIGNONMSGSRSV1><SONRS>\
               <STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY></STATUS>\
               <DTSERVER>20210501000000</DTSERVER>\
               <LANGUAGE>ENG</LANGUAGE>\
               </SONRS></SIGNONMSGSRSV1>\
               <SECLISTMSGSRSV1><SECLIST>\
               <STOCKINFO><SECINFO>\
               <SECID><UNIQUEID>AAPL</UNIQUEID><UNIQUEIDTYPE>TICKER</UNIQUEIDTYPE></SECID>\
               <SECNAME>AAPL</SECNAME><TICKER>AAPL</TICKER>\
               </SECINFO></STOCKINFO>\
               <STOCKINFO><SECINFO>\
               <SECID><UNIQUEID>MSFT</UNIQUEID><UNIQUEIDTYPE>TICKER</UNIQUEIDTYPE></SECID>\
               <SECNAME>MSFT</SECNAME><TICKER>MSFT</TICKER>\
               </SECINFO></STOCKINFO>\
               </SECLIST></SECLISTMSGSRSV1>\
               <INVSTMTMSGSRSV1><INVSTMTTRNRS>\
               <TRNUID>0</TRNUID>\
               <STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY></STATUS>\
               <INVSTMTRS>\
               <DTASOF>20210501000000</DTASOF>\
               <CURDEF>LTL</CURDEF>\
               <INVACCTFROM><BROKERID>BROKERID</BROKERID><ACCTID>ACCID</ACCTID></INVACCTFROM>\
               <INVTRANLIST>\
               <DTSTART/><DTEND>20210501</DTEND>\
               <BUYSTOCK>\
               <BUYTYPE>BUY</BUYTYPE>\
               <INVBUY>\
               <INVTRAN><FITID>3</FITID><DTTRADE>20210101</DTTRADE><MEMO>Sample 3</MEMO></INVTRAN>\
               <SECID><UNIQUEID>AAPL</UNIQUEID><UNIQUEIDTYPE>TICKER</UNIQUEIDTYPE></SECID>\
               <SUBACCTSEC>OTHER</SUBACCTSEC><SUBACCTFUND>OTHER</SUBACCTFUND>\
               <FEES>1.24000</FEES><UNITPRICE>138.28000</UNITPRICE>\
               <UNITS>3.00000</UNITS><TOTAL>-416.08</TOTAL>\
               </INVBUY>\
               </BUYSTOCK>\
               <SELLSTOCK>\
               <SELLTYPE>SELL</SELLTYPE>\
               <INVSELL>\
               <INVTRAN><FITID>4</FITID><DTTRADE>20210101</DTTRADE><MEMO>Sample 4</MEMO></INVTRAN>\
               <SECID><UNIQUEID>MSFT</UNIQUEID><UNIQUEIDTYPE>TICKER</UNIQUEIDTYPE></SECID>\
               <SUBACCTSEC>OTHER</SUBACCTSEC><SUBACCTFUND>OTHER</SUBACCTFUND>\
               <FEES>0.28000</FEES><UNITPRICE>225.63000</UNITPRICE>\
               <UNITS>-5.00000</UNITS><TOTAL>1127.87</TOTAL>\
               </INVSELL>\
               </SELLSTOCK>\
               <INCOME>\
               <INCOMETYPE>DIV</INCOMETYPE>\
               <INVTRAN><FITID>5</FITID><DTTRADE>20210101</DTTRADE><MEMO>Sample 5</MEMO></INVTRAN>\
               <SECID><UNIQUEID>MSFT</UNIQUEID><UNIQUEIDTYPE>TICKER</UNIQUEIDTYPE></SECID>\
               <SUBACCTSEC>OTHER</SUBACCTSEC><SUBACCTFUND>OTHER</SUBACCTFUND>\
               <WITHHOLDING>0.50000</WITHHOLDING><TOTAL>0.79</TOTAL>\
               </INCOME>\
               <INVBANKTRAN>\
               <STMTTRN>\
               <TRNTYPE>INT</TRNTYPE><DTPOSTED>20210102</DTPOSTED>\
               <TRNAMT>0.45</TRNAMT><FITID>6</FITID><MEMO>Bank Interest</MEMO>\
               </STMTTRN>\
               <SUBACCTFUND>OTHER</SUBACCTFUND>\
               </INVBANKTRAN>\
               <TRANSFER>\
               <INVTRAN><FITID>7</FITID><DTTRADE>20210103</DTTRADE><MEMO>Journaled Shares</MEMO></INVTRAN>\
               <SECID><UNIQUEID>MSFT</UNIQUEID><UNIQUEIDTYPE>TICKER</UNIQUEIDTYPE></SECID>\
               <SUBACCTSEC>OTHER</SUBACCTSEC>\
               <UNITPRICE>225.63000</UNITPRICE><UNITS>4.00000</UNITS>\
               </TRANSFER>\
               <INVEXPENSE>\
               <INVTRAN><FITID>8</FITID><DTTRADE>20250101</DTTRADE><MEMO>NRA Tax Adj</MEMO></INVTRAN>\
               <SECID><UNIQUEID>AAPL</UNIQUEID><UNIQUEIDTYPE>TICKER</UNIQUEIDTYPE></SECID>\
               <SUBACCTSEC>OTHER</SUBACCTSEC><SUBACCTFUND>OTHER</SUBACCTFUND>\
               <TOTAL>-0.29</TOTAL>\
               </INVEXPENSE>\
               </INVTRANLIST>\
               </INVSTMTRS></INVSTMTTRNRS></INVSTMTMSGSRSV1>\
               </OFX>";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_invest_line_without_trntype_is_skipped() {
        let mut statement = Statement::new("BID", "ACCID", "USD");
        statement.broker_id = Some("BROKERID".into());
        let mut line = InvestStatementLine::default();
        line.id = Some("1".into());
        line.date = Some(dt(2021, 1, 1));
        line.security_id = Some("AAPL".into());
        statement.add_invest_line(line);

        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2021, 5, 1))
            .to_ofx()
            .unwrap();

        // The section and the security list are present, but the line
        // contributes no transaction envelope.
        assert!(output.contains("<INVTRANLIST>"));
        assert!(output.contains("<UNIQUEID>AAPL</UNIQUEID>"));
        assert!(!output.contains("<INVTRAN>"));
        assert!(!output.contains("<STMTTRN>"));
    }

    #[test]
    fn test_codepage_encoding_header() {
        let statement = Statement::new("BID", "ACCID", "USD");
        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2020, 1, 1))
            .with_encoding(OutputEncoding::CodePage("1252".into()))
            .to_ofx()
            .unwrap();

        assert!(output.contains("ENCODING:USASCII\nCHARSET:1252\n"));
    }

    #[test]
    fn test_pretty_output() {
        let statement = bank_statement();
        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2012, 3, 3))
            .pretty(true)
            .to_ofx()
            .unwrap();

        assert!(output.contains("\n    <SIGNONMSGSRSV1>"));
        assert!(output.contains("<CODE>0</CODE>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut statement = Statement::new("BID", "ACCID", "USD");
        statement.add_line(StatementLine::new(
            "1",
            dt(2020, 1, 1),
            "Fish & Chips <Ltd>",
            dec("5"),
        ));

        let output = OfxWriter::new(&statement)
            .with_gen_time(dt(2020, 2, 1))
            .to_ofx()
            .unwrap();

        assert!(output.contains("<MEMO>Fish &amp; Chips &lt;Ltd&gt;</MEMO>"));
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(format_amount(&dec("15.4"), 2), "15.40");
        assert_eq!(format_amount(&dec("3"), 5), "3.00000");
        assert_eq!(format_amount(&dec("-5"), 5), "-5.00000");
        assert_eq!(format_amount(&dec("3.4543"), 2), "3.45");
        assert_eq!(format_amount(&dec("0.005"), 2), "0.01");
    }
}
