//! Statement data model: transactions, balances and their validation rules.
//!
//! Institution-specific parsers produce a [`Statement`]; the OFX writer
//! consumes it read-only. Validation is explicit and caller-invoked via the
//! `assert_valid` methods, never automatic on mutation.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Bank account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountType {
    /// Regular checking account.
    #[default]
    Checking,
    /// Savings account.
    Savings,
    /// Money market account.
    MoneyMrkt,
    /// Line of credit.
    CreditLine,
}

impl AccountType {
    /// Wire spelling used in OFX documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "CHECKING",
            AccountType::Savings => "SAVINGS",
            AccountType::MoneyMrkt => "MONEYMRKT",
            AccountType::CreditLine => "CREDITLINE",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "CHECKING" => Ok(AccountType::Checking),
            "SAVINGS" => Ok(AccountType::Savings),
            "MONEYMRKT" => Ok(AccountType::MoneyMrkt),
            "CREDITLINE" => Ok(AccountType::CreditLine),
            _ => Err(Error::InvalidValue(format!("invalid account type: {s}"))),
        }
    }
}

/// Bank transaction type, as constrained by the OFX specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionType {
    Credit,
    Debit,
    /// Interest earned or paid.
    Int,
    /// Dividend.
    Div,
    Fee,
    /// Service charge.
    SrvChg,
    /// Deposit.
    Dep,
    Atm,
    /// Point of sale.
    Pos,
    /// Transfer.
    Xfer,
    #[default]
    Check,
    Payment,
    Cash,
    /// Direct deposit.
    DirectDep,
    DirectDebit,
    /// Repeating payment / standing order.
    RepeatPmt,
    Other,
}

impl TransactionType {
    /// Wire spelling used in OFX documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "CREDIT",
            TransactionType::Debit => "DEBIT",
            TransactionType::Int => "INT",
            TransactionType::Div => "DIV",
            TransactionType::Fee => "FEE",
            TransactionType::SrvChg => "SRVCHG",
            TransactionType::Dep => "DEP",
            TransactionType::Atm => "ATM",
            TransactionType::Pos => "POS",
            TransactionType::Xfer => "XFER",
            TransactionType::Check => "CHECK",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Cash => "CASH",
            TransactionType::DirectDep => "DIRECTDEP",
            TransactionType::DirectDebit => "DIRECTDEBIT",
            TransactionType::RepeatPmt => "REPEATPMT",
            TransactionType::Other => "OTHER",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "CREDIT" => Ok(TransactionType::Credit),
            "DEBIT" => Ok(TransactionType::Debit),
            "INT" => Ok(TransactionType::Int),
            "DIV" => Ok(TransactionType::Div),
            "FEE" => Ok(TransactionType::Fee),
            "SRVCHG" => Ok(TransactionType::SrvChg),
            "DEP" => Ok(TransactionType::Dep),
            "ATM" => Ok(TransactionType::Atm),
            "POS" => Ok(TransactionType::Pos),
            "XFER" => Ok(TransactionType::Xfer),
            "CHECK" => Ok(TransactionType::Check),
            "PAYMENT" => Ok(TransactionType::Payment),
            "CASH" => Ok(TransactionType::Cash),
            "DIRECTDEP" => Ok(TransactionType::DirectDep),
            "DIRECTDEBIT" => Ok(TransactionType::DirectDebit),
            "REPEATPMT" => Ok(TransactionType::RepeatPmt),
            "OTHER" => Ok(TransactionType::Other),
            _ => Err(Error::InvalidValue(format!("invalid transaction type: {s}"))),
        }
    }
}

/// Investment transaction envelope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvestTransactionType {
    /// Mutual fund purchase.
    BuyMf,
    /// Stock purchase.
    BuyStock,
    /// Purchase of some other security kind.
    BuyOther,
    /// Mutual fund sale.
    SellMf,
    /// Stock sale.
    SellStock,
    /// Sale of some other security kind.
    SellOther,
    /// Income event (dividend, interest, ...).
    Income,
    /// Investment account expense.
    InvExpense,
    /// Securities transfer in or out of the account.
    Transfer,
    /// Bank-side transaction on the investment account.
    InvBankTran,
}

impl InvestTransactionType {
    /// Wire spelling, also used as the outer envelope tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestTransactionType::BuyMf => "BUYMF",
            InvestTransactionType::BuyStock => "BUYSTOCK",
            InvestTransactionType::BuyOther => "BUYOTHER",
            InvestTransactionType::SellMf => "SELLMF",
            InvestTransactionType::SellStock => "SELLSTOCK",
            InvestTransactionType::SellOther => "SELLOTHER",
            InvestTransactionType::Income => "INCOME",
            InvestTransactionType::InvExpense => "INVEXPENSE",
            InvestTransactionType::Transfer => "TRANSFER",
            InvestTransactionType::InvBankTran => "INVBANKTRAN",
        }
    }

    /// True for the BUY* kinds.
    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            InvestTransactionType::BuyMf
                | InvestTransactionType::BuyStock
                | InvestTransactionType::BuyOther
        )
    }

    /// True for the SELL* kinds.
    pub fn is_sell(&self) -> bool {
        matches!(
            self,
            InvestTransactionType::SellMf
                | InvestTransactionType::SellStock
                | InvestTransactionType::SellOther
        )
    }
}

impl fmt::Display for InvestTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestTransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "BUYMF" => Ok(InvestTransactionType::BuyMf),
            "BUYSTOCK" => Ok(InvestTransactionType::BuyStock),
            "BUYOTHER" => Ok(InvestTransactionType::BuyOther),
            "SELLMF" => Ok(InvestTransactionType::SellMf),
            "SELLSTOCK" => Ok(InvestTransactionType::SellStock),
            "SELLOTHER" => Ok(InvestTransactionType::SellOther),
            "INCOME" => Ok(InvestTransactionType::Income),
            "INVEXPENSE" => Ok(InvestTransactionType::InvExpense),
            "TRANSFER" => Ok(InvestTransactionType::Transfer),
            "INVBANKTRAN" => Ok(InvestTransactionType::InvBankTran),
            _ => Err(Error::InvalidValue(format!(
                "invalid investment transaction type: {s}"
            ))),
        }
    }
}

/// Reference to a bank account, e.g. a transfer destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Bank identifier.
    pub bank_id: String,

    /// Account identifier.
    pub acct_id: String,

    /// Branch identifier.
    pub branch_id: Option<String>,

    /// Checksum for international banks.
    pub acct_key: Option<String>,

    /// Account type.
    pub acct_type: AccountType,
}

impl BankAccount {
    /// Create a new account reference with the required identifiers.
    pub fn new(bank_id: impl Into<String>, acct_id: impl Into<String>) -> Self {
        Self {
            bank_id: bank_id.into(),
            acct_id: acct_id.into(),
            branch_id: None,
            acct_key: None,
            acct_type: AccountType::default(),
        }
    }

    /// Ensure both required identifiers are present.
    pub fn assert_valid(&self) -> Result<()> {
        if self.bank_id.is_empty() {
            return Err(Error::validation("bank account has no bank_id", self));
        }
        if self.acct_id.is_empty() {
            return Err(Error::validation("bank account has no acct_id", self));
        }
        Ok(())
    }
}

/// Currency of a transaction, with an optional exchange rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO-4217 style currency symbol.
    pub symbol: String,

    /// Exchange rate against the statement currency.
    pub rate: Option<Decimal>,
}

impl Currency {
    /// Create a currency record without an exchange rate.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            rate: None,
        }
    }

    /// Create a currency record with an exchange rate.
    pub fn with_rate(symbol: impl Into<String>, rate: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            rate: Some(rate),
        }
    }
}

/// One bank transaction record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatementLine {
    /// Parser-assigned transaction identifier (FITID in the output).
    pub id: Option<String>,

    /// Posting date.
    pub date: Option<NaiveDateTime>,

    /// Date the user initiated the transaction, if distinct from posting.
    pub date_user: Option<NaiveDateTime>,

    /// Free-form transaction description.
    pub memo: Option<String>,

    /// Counterparty name.
    pub payee: Option<String>,

    /// Transaction amount.
    pub amount: Option<Decimal>,

    /// Check number.
    pub check_no: Option<String>,

    /// Reference number.
    pub refnum: Option<String>,

    /// Transaction type.
    pub trntype: TransactionType,

    /// Transfer destination account.
    pub bank_account_to: Option<BankAccount>,

    /// Transaction currency, when it differs from the statement currency.
    pub currency: Option<Currency>,

    /// Original currency of a converted transaction.
    pub orig_currency: Option<Currency>,
}

impl StatementLine {
    /// Create a line with the commonly populated fields.
    pub fn new(
        id: impl Into<String>,
        date: NaiveDateTime,
        memo: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: Some(id.into()),
            date: Some(date),
            memo: Some(memo.into()),
            amount: Some(amount),
            ..Self::default()
        }
    }

    /// Ensure the line is referenceable and its nested account is valid.
    ///
    /// A line must carry at least one of `id`, `check_no` or `refnum`;
    /// downstream reconciliation has nothing to key on otherwise.
    pub fn assert_valid(&self) -> Result<()> {
        if let Some(ref account) = self.bank_account_to {
            account.assert_valid()?;
        }

        let referenceable = [&self.id, &self.check_no, &self.refnum]
            .iter()
            .any(|field| field.as_deref().is_some_and(|value| !value.is_empty()));
        if !referenceable {
            return Err(Error::validation(
                "statement line has no id, check number or reference number",
                self,
            ));
        }
        Ok(())
    }
}

/// One investment transaction record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvestStatementLine {
    /// Parser-assigned transaction identifier (FITID in the output).
    pub id: Option<String>,

    /// Trade or posting date.
    pub date: Option<NaiveDateTime>,

    /// Free-form transaction description.
    pub memo: Option<String>,

    /// Envelope kind. Lines without one are skipped by the writer.
    pub trntype: Option<InvestTransactionType>,

    /// Sub-classification (BUY/SELL/DIV/..., or the inner bank transaction
    /// type for INVBANKTRAN).
    pub trntype_detailed: Option<String>,

    /// Ticker-like security identifier.
    pub security_id: Option<String>,

    /// Net transaction total.
    pub amount: Option<Decimal>,

    /// Number of units traded or transferred.
    pub units: Option<Decimal>,

    /// Price per unit.
    pub unit_price: Option<Decimal>,

    /// Fees, or withholding for income events.
    pub fees: Option<Decimal>,
}

/// Presence rule for one field of the investment dispatch table.
#[derive(Clone, Copy)]
enum Rule {
    Required,
    Optional,
    Forbidden,
}

impl InvestStatementLine {
    /// Create a line with the commonly populated fields.
    pub fn new(
        id: impl Into<String>,
        date: NaiveDateTime,
        memo: impl Into<String>,
        trntype: InvestTransactionType,
    ) -> Self {
        Self {
            id: Some(id.into()),
            date: Some(date),
            memo: Some(memo.into()),
            trntype: Some(trntype),
            ..Self::default()
        }
    }

    /// Validate the type-conditional field combination.
    ///
    /// Each envelope kind requires some fields and forbids others; any
    /// combination outside the table is rejected, since downstream importers
    /// are strict about structurally valid documents.
    pub fn assert_valid(&self) -> Result<()> {
        use InvestTransactionType::*;
        use Rule::*;

        let trntype = self
            .trntype
            .ok_or_else(|| Error::validation("investment transaction type is not set", self))?;

        // (trntype_detailed, security_id, units + unit_price, amount)
        let (detailed, security, quantities, amount) = match trntype {
            BuyMf | BuyStock | SellMf | SellStock => (Required, Required, Required, Required),
            BuyOther | SellOther => (Optional, Required, Required, Required),
            Income => (Required, Required, Forbidden, Required),
            InvExpense => (Forbidden, Required, Forbidden, Required),
            Transfer => (Forbidden, Required, Required, Forbidden),
            InvBankTran => (Required, Forbidden, Forbidden, Required),
        };

        self.check(trntype, detailed, "trntype_detailed", self.trntype_detailed.is_some())?;
        self.check(trntype, security, "security_id", self.security_id.is_some())?;
        self.check(trntype, quantities, "units", self.units.is_some())?;
        self.check(trntype, quantities, "unit_price", self.unit_price.is_some())?;
        self.check(trntype, amount, "amount", self.amount.is_some())?;
        Ok(())
    }

    fn check(
        &self,
        trntype: InvestTransactionType,
        rule: Rule,
        field: &str,
        present: bool,
    ) -> Result<()> {
        match rule {
            Rule::Required if !present => Err(Error::validation(
                format!("{field} is required for {trntype} transactions"),
                self,
            )),
            Rule::Forbidden if present => Err(Error::validation(
                format!("{field} is not valid for {trntype} transactions"),
                self,
            )),
            _ => Ok(()),
        }
    }
}

/// One account's transaction history over a statement period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statement {
    /// ISO-4217 style currency code for the account.
    pub currency: Option<String>,

    /// Bank identifier.
    pub bank_id: Option<String>,

    /// Account identifier.
    pub account_id: Option<String>,

    /// Account type.
    pub account_type: AccountType,

    /// Broker identifier, for investment statements.
    pub broker_id: Option<String>,

    /// Balance at the start of the period.
    pub start_balance: Option<Decimal>,

    /// Balance at the end of the period.
    pub end_balance: Option<Decimal>,

    /// Start of the statement period.
    pub start_date: Option<NaiveDateTime>,

    /// End of the statement period.
    pub end_date: Option<NaiveDateTime>,

    /// Bank transactions, in output order.
    pub lines: Vec<StatementLine>,

    /// Investment transactions, in output order.
    pub invest_lines: Vec<InvestStatementLine>,
}

impl Statement {
    /// Create a statement with basic account information.
    pub fn new(
        bank_id: impl Into<String>,
        account_id: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            bank_id: Some(bank_id.into()),
            account_id: Some(account_id.into()),
            currency: Some(currency.into()),
            ..Self::default()
        }
    }

    /// Add a bank transaction to the statement.
    pub fn add_line(&mut self, line: StatementLine) {
        self.lines.push(line);
    }

    /// Add an investment transaction to the statement.
    pub fn add_invest_line(&mut self, line: InvestStatementLine) {
        self.invest_lines.push(line);
    }

    /// Check the balance reconciliation invariant.
    ///
    /// When both balances are set, the start balance plus the sum of all
    /// line amounts must equal the end balance exactly. Amounts are
    /// arbitrary-precision decimals, so no tolerance is applied. A no-op
    /// when either balance is missing.
    pub fn assert_valid(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_balance, self.end_balance) {
            let total: Decimal = self.lines.iter().filter_map(|line| line.amount).sum();
            let computed = start + total;
            if computed != end {
                return Err(Error::validation(
                    format!(
                        "start balance {start} plus transaction total {total} \
                         does not match end balance {end} (difference: {})",
                        computed - end
                    ),
                    self,
                ));
            }
        }
        Ok(())
    }
}

/// Generate a deterministic transaction id from a line's content.
///
/// The id is a hex digest over the posting date (formatted as
/// `YYYY-MM-DD HH:MM:SS`), memo and stringified amount; absent fields are
/// omitted from the hash input. Identical inputs always produce identical
/// ids across runs and processes, so repeated conversions of overlapping
/// statement periods reconcile cleanly downstream.
pub fn generate_transaction_id(line: &StatementLine) -> String {
    let mut hasher = Sha256::new();
    if let Some(date) = line.date {
        hasher.update(date.format("%Y-%m-%d %H:%M:%S").to_string().as_bytes());
    }
    if let Some(ref memo) = line.memo {
        hasher.update(memo.as_bytes());
    }
    if let Some(ref amount) = line.amount {
        hasher.update(amount.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Generate a transaction id that is unique within `txnids`.
///
/// The plain content id is tried first, so the common case matches
/// [`generate_transaction_id`]. On collision an increasing integer suffix is
/// appended to the base id until a free one is found. The resolved id is
/// inserted into `txnids`. The set is caller-owned shared state; callers
/// sharing one set across threads must serialize access themselves.
pub fn generate_unique_transaction_id(
    line: &StatementLine,
    txnids: &mut HashSet<String>,
) -> String {
    let base = generate_transaction_id(line);
    let mut txnid = base.clone();
    let mut idx = 0;
    while txnids.contains(&txnid) {
        idx += 1;
        txnid = format!("{base}-{idx}");
    }
    txnids.insert(txnid.clone());
    txnid
}

/// Derive balances and period bounds from the statement lines.
///
/// The start balance defaults to zero when unset; the end balance becomes
/// start plus the sum of line amounts; the period bounds become the minimum
/// and maximum line dates. Fails when the statement has no lines, since
/// min/max over an empty sequence has no defined result.
pub fn recalculate_balance(statement: &mut Statement) -> Result<()> {
    if statement.lines.is_empty() {
        return Err(Error::validation(
            "cannot recalculate balance of a statement with no lines",
            statement,
        ));
    }

    let total: Decimal = statement.lines.iter().filter_map(|line| line.amount).sum();
    let start = statement.start_balance.unwrap_or(Decimal::ZERO);
    statement.start_balance = Some(start);
    statement.end_balance = Some(start + total);
    statement.start_date = statement.lines.iter().filter_map(|line| line.date).min();
    statement.end_date = statement.lines.iter().filter_map(|line| line.date).max();
    Ok(())
}
