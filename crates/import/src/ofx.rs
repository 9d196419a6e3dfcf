use agency_core::{PeriodBounds, PostedDate, StatementTransaction};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PLACEHOLDER_DESCRIPTION: &str = "Sem descrição";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read statement: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Stored instead of an empty memo.
    pub placeholder_description: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            placeholder_description: DEFAULT_PLACEHOLDER_DESCRIPTION.to_string(),
        }
    }
}

/// Rows pulled out of one statement file, in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementExtraction {
    pub transactions: Vec<StatementTransaction>,
    pub period: Option<PeriodBounds>,
    pub count: usize,
}

impl StatementExtraction {
    pub fn period_start(&self) -> Option<&PostedDate> {
        self.period.as_ref().map(|p| &p.start)
    }

    pub fn period_end(&self) -> Option<&PostedDate> {
        self.period.as_ref().map(|p| &p.end)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Block-by-block OFX scanner.
///
/// The text is cut at every `<STMTTRN>` opening tag and each block is scanned
/// for its own fields. A block without a usable posting date or amount is
/// dropped; the blocks around it are unaffected.
pub struct StatementExtractor {
    options: ExtractOptions,
    delimiter: Regex,
    posted: Regex,
    amount: Regex,
    memo: Regex,
    check_number: Regex,
}

impl StatementExtractor {
    pub fn new(options: ExtractOptions) -> Result<Self, ExtractError> {
        Ok(Self {
            options,
            delimiter: Regex::new(r"(?i)<STMTTRN>")?,
            posted: Regex::new(r"(?i)<DTPOSTED>\s*(\d{8})")?,
            amount: Regex::new(r"(?i)<TRNAMT>\s*([-+]?[0-9.,]+)")?,
            memo: Regex::new(r"(?i)<MEMO>([^<\r\n]*)")?,
            check_number: Regex::new(r"(?i)<CHECKNUM>([^<\r\n]*)")?,
        })
    }

    pub fn extract_str(&self, text: &str) -> StatementExtraction {
        // Everything before the first delimiter is header.
        let transactions: Vec<StatementTransaction> = self
            .delimiter
            .split(text)
            .skip(1)
            .enumerate()
            .filter_map(|(index, block)| self.extract_block(index, block))
            .collect();
        let period = PeriodBounds::covering(transactions.iter().map(|t| &t.date));

        tracing::debug!(count = transactions.len(), "Statement extracted");

        StatementExtraction {
            count: transactions.len(),
            transactions,
            period,
        }
    }

    /// Decodes lossily; bytes that are not UTF-8 only affect free-text fields.
    pub fn extract_bytes(&self, data: &[u8]) -> StatementExtraction {
        self.extract_str(&String::from_utf8_lossy(data))
    }

    pub fn extract_reader<R: Read>(&self, mut reader: R) -> Result<StatementExtraction, ExtractError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(self.extract_bytes(&data))
    }

    pub fn extract_file(&self, path: &Path) -> Result<StatementExtraction, ExtractError> {
        let data = std::fs::read(path)?;
        Ok(self.extract_bytes(&data))
    }

    fn extract_block(&self, index: usize, block: &str) -> Option<StatementTransaction> {
        let Some(date) = self
            .capture(&self.posted, block)
            .and_then(PostedDate::from_digits)
        else {
            tracing::debug!(block = index, "Skipping statement block without DTPOSTED");
            return None;
        };

        let Some(amount) = self.capture(&self.amount, block).and_then(parse_amount) else {
            tracing::debug!(block = index, "Skipping statement block without TRNAMT");
            return None;
        };

        let description = match self.capture(&self.memo, block).map(str::trim) {
            Some(memo) if !memo.is_empty() => memo.to_string(),
            _ => self.options.placeholder_description.clone(),
        };

        let document_number = self
            .capture(&self.check_number, block)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Some(StatementTransaction::new(date, description, amount, document_number))
    }

    fn capture<'a>(&self, re: &Regex, block: &'a str) -> Option<&'a str> {
        re.captures(block)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Signed decimal amount, unrounded. A lone comma is read as the decimal
/// separator, otherwise commas are thousands separators.
fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let normalized = if s.contains('.') {
        s.replace(',', "")
    } else if s.matches(',').count() == 1 {
        s.replace(',', ".")
    } else {
        s.replace(',', "")
    };
    let (negative, digits) = match normalized.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, normalized.strip_prefix('+').unwrap_or(&normalized)),
    };
    if !digits.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    // ".50" has no integer part.
    let digits = if digits.starts_with('.') {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    let magnitude = Decimal::from_str(&digits).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agency_core::{Direction, Money};
    use std::io;

    fn extractor() -> StatementExtractor {
        StatementExtractor::new(ExtractOptions::default()).unwrap()
    }

    fn block(date: &str, amount: &str, memo: &str) -> String {
        format!(
            "<STMTTRN>\n<TRNTYPE>OTHER\n<DTPOSTED>{date}\n<TRNAMT>{amount}\n<FITID>X\n<MEMO>{memo}\n</STMTTRN>\n"
        )
    }

    fn wrap(blocks: &[String]) -> String {
        format!(
            "OFXHEADER:100\nDATA:OFXSGML\n\n<OFX>\n<BANKMSGSRSV1>\n<STMTTRNRS>\n<STMTRS>\n<BANKTRANLIST>\n{}</BANKTRANLIST>\n</STMTRS>\n</STMTTRNRS>\n</BANKMSGSRSV1>\n</OFX>\n",
            blocks.concat()
        )
    }

    // ── unit helpers ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_positive() {
        assert_eq!(parse_amount("200.50"), Some(Decimal::new(20050, 2)));
        assert_eq!(parse_amount("+0.01"), Some(Decimal::new(1, 2)));
    }

    #[test]
    fn parse_amount_negative() {
        assert_eq!(parse_amount("-150.00"), Some(Decimal::new(-15000, 2)));
    }

    #[test]
    fn parse_amount_separators() {
        assert_eq!(parse_amount("1,234.56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("-150,00"), Some(Decimal::new(-15000, 2)));
        assert_eq!(parse_amount("1,234,567"), Some(Decimal::new(1234567, 0)));
    }

    #[test]
    fn parse_amount_keeps_sub_cent_precision() {
        assert_eq!(parse_amount("-0.004"), Some(Decimal::new(-4, 3)));
        assert_eq!(parse_amount("10.005"), Some(Decimal::new(10005, 3)));
    }

    #[test]
    fn parse_amount_without_integer_part() {
        assert_eq!(parse_amount("-.50"), Some(Decimal::new(-50, 2)));
        assert_eq!(parse_amount(".5"), Some(Decimal::new(5, 1)));
        assert_eq!(parse_amount("+,75"), Some(Decimal::new(75, 2)));
    }

    #[test]
    fn parse_amount_invalid_returns_none() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("1.2.3"), None);
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount("--1"), None);
    }

    // ── full statement extraction ─────────────────────────────────────────────

    const SAMPLE_OFX: &str = r#"
OFXHEADER:100
DATA:OFXSGML
VERSION:102
CHARSET:1252

<OFX>
<BANKMSGSRSV1>
<STMTTRNRS>
<STMTRS>
<CURDEF>BRL
<BANKACCTFROM>
<BANKID>0341
<ACCTID>12345-6
<ACCTTYPE>CHECKING
</BANKACCTFROM>
<BANKTRANLIST>
<DTSTART>20240101
<DTEND>20240131
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20240105120000[-3:BRT]
<TRNAMT>-150.00
<FITID>TXN001
<CHECKNUM>000123
<MEMO>PIX ENVIADO FORNECEDOR
</STMTTRN>
<STMTTRN>
<TRNTYPE>CREDIT
<DTPOSTED>20240120
<TRNAMT>200.50
<FITID>TXN002
<MEMO>TED RECEBIDA CLIENTE
</STMTTRN>
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20240112
<TRNAMT>-35.90
<FITID>TXN003
<MEMO>TARIFA BANCARIA
</STMTTRN>
</BANKTRANLIST>
</STMTRS>
</STMTTRNRS>
</BANKMSGSRSV1>
</OFX>
"#;

    #[test]
    fn extracts_every_well_formed_block() {
        let out = extractor().extract_str(SAMPLE_OFX);
        assert_eq!(out.count, 3);
        assert_eq!(out.transactions.len(), 3);
        assert!(out.transactions.iter().all(|t| !t.amount.as_decimal().is_sign_negative()));
    }

    #[test]
    fn n_synthetic_blocks_yield_n_rows() {
        let blocks: Vec<String> = (1..=12)
            .map(|day| block(&format!("202402{day:02}"), &format!("-{day}.25"), "row"))
            .collect();
        let out = extractor().extract_str(&wrap(&blocks));
        assert_eq!(out.count, 12);
        assert!(out.transactions.iter().all(|t| !t.amount.as_decimal().is_sign_negative()));
    }

    #[test]
    fn sign_becomes_direction() {
        let out = extractor().extract_str(SAMPLE_OFX);
        let debit = &out.transactions[0];
        assert_eq!(debit.amount, Money::from_cents(15000));
        assert_eq!(debit.direction, Direction::Debit);
        let credit = &out.transactions[1];
        assert_eq!(credit.amount, Money::from_cents(20050));
        assert_eq!(credit.direction, Direction::Credit);
    }

    #[test]
    fn sub_cent_debit_is_still_a_debit() {
        let out = extractor().extract_str(&wrap(&[block("20240105", "-0.004", "tiny")]));
        assert_eq!(out.count, 1);
        assert_eq!(out.transactions[0].direction, Direction::Debit);
        assert!(out.transactions[0].amount.is_zero());
    }

    #[test]
    fn half_cent_rounds_away_from_zero() {
        let out = extractor().extract_str(&wrap(&[block("20240105", "10.005", "half")]));
        assert_eq!(out.transactions[0].amount, Money::from_cents(1001));
        assert_eq!(out.transactions[0].direction, Direction::Credit);
    }

    #[test]
    fn amount_without_leading_digit_is_extracted() {
        let out = extractor().extract_str(&wrap(&[block("20240105", "-.50", "fee")]));
        assert_eq!(out.count, 1);
        assert_eq!(out.transactions[0].amount, Money::from_cents(50));
        assert_eq!(out.transactions[0].direction, Direction::Debit);
    }

    #[test]
    fn fields_are_normalized() {
        let out = extractor().extract_str(SAMPLE_OFX);
        let t0 = &out.transactions[0];
        assert_eq!(t0.date.as_str(), "2024-01-05");
        assert_eq!(t0.description, "PIX ENVIADO FORNECEDOR");
        assert_eq!(t0.document_number.as_deref(), Some("000123"));
        assert!(out.transactions[1].document_number.is_none());
    }

    #[test]
    fn period_bounds_ignore_block_order() {
        let out = extractor().extract_str(SAMPLE_OFX);
        assert_eq!(out.period_start().map(PostedDate::as_str), Some("2024-01-05"));
        assert_eq!(out.period_end().map(PostedDate::as_str), Some("2024-01-20"));
        // Document order is preserved, not sorted.
        let dates: Vec<&str> = out.transactions.iter().map(|t| t.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-05", "2024-01-20", "2024-01-12"]);
    }

    #[test]
    fn block_missing_amount_is_skipped() {
        let middle = "<STMTTRN>\n<DTPOSTED>20240110\n<FITID>B\n<MEMO>sem valor\n</STMTTRN>\n".to_string();
        let text = wrap(&[
            block("20240105", "10.00", "first"),
            middle,
            block("20240115", "-30.00", "third"),
        ]);
        let out = extractor().extract_str(&text);
        assert_eq!(out.count, 2);
        assert_eq!(out.transactions[0].description, "first");
        assert_eq!(out.transactions[1].description, "third");
    }

    #[test]
    fn block_missing_or_short_date_is_skipped() {
        let no_date = "<STMTTRN>\n<TRNAMT>5.00\n<MEMO>x\n</STMTTRN>\n".to_string();
        let short_date = block("2024011", "5.00", "y");
        let text = wrap(&[no_date, short_date, block("20240301", "1.00", "ok")]);
        let out = extractor().extract_str(&text);
        assert_eq!(out.count, 1);
        assert_eq!(out.transactions[0].description, "ok");
    }

    #[test]
    fn unparseable_amount_is_treated_as_missing() {
        let text = wrap(&[block("20240105", "1.2.3", "bad"), block("20240106", "4.00", "good")]);
        let out = extractor().extract_str(&text);
        assert_eq!(out.count, 1);
        assert_eq!(out.transactions[0].description, "good");
    }

    #[test]
    fn empty_memo_gets_placeholder() {
        let no_memo_tag = "<STMTTRN>\n<DTPOSTED>20240107\n<TRNAMT>9.99\n</STMTTRN>\n".to_string();
        let text = wrap(&[block("20240105", "1.00", "   "), no_memo_tag]);
        let out = extractor().extract_str(&text);
        assert_eq!(out.count, 2);
        for t in &out.transactions {
            assert_eq!(t.description, DEFAULT_PLACEHOLDER_DESCRIPTION);
        }
    }

    #[test]
    fn placeholder_is_configurable() {
        let ex = StatementExtractor::new(ExtractOptions {
            placeholder_description: "No description".to_string(),
        })
        .unwrap();
        let out = ex.extract_str(&wrap(&[block("20240105", "1.00", "")]));
        assert_eq!(out.transactions[0].description, "No description");
    }

    #[test]
    fn impossible_calendar_dates_pass_through() {
        let out = extractor().extract_str(&wrap(&[block("20240132", "1.00", "x")]));
        assert_eq!(out.count, 1);
        assert_eq!(out.transactions[0].date.as_str(), "2024-01-32");
    }

    #[test]
    fn no_delimiters_means_nothing_extracted() {
        let out = extractor().extract_str("OFXHEADER:100\n<OFX>\n<DTPOSTED>20240101\n<TRNAMT>1.00\n</OFX>");
        assert_eq!(out.count, 0);
        assert!(out.is_empty());
        assert!(out.period_start().is_none());
        assert!(out.period_end().is_none());
    }

    #[test]
    fn statement_response_tag_is_not_a_delimiter() {
        // <STMTTRNRS> shares a prefix with <STMTTRN> but opens the response wrapper.
        let out = extractor().extract_str(&wrap(&[]));
        assert_eq!(out.count, 0);
    }

    #[test]
    fn tags_are_case_insensitive() {
        let text = "<ofx><stmttrn><dtposted>20240105<trnamt>-2.00<memo>lower</stmttrn></ofx>";
        let out = extractor().extract_str(text);
        assert_eq!(out.count, 1);
        assert_eq!(out.transactions[0].description, "lower");
        assert_eq!(out.transactions[0].direction, Direction::Debit);
    }

    #[test]
    fn non_utf8_bytes_do_not_abort() {
        let mut data = wrap(&[block("20240105", "1.00", "CAF")]).into_bytes();
        let pos = data.windows(3).position(|w| w == b"CAF").unwrap() + 3;
        data.insert(pos, 0xC9); // latin-1 'É'
        let out = extractor().extract_bytes(&data);
        assert_eq!(out.count, 1);
        assert!(out.transactions[0].description.starts_with("CAF"));
    }

    // ── boundary errors ───────────────────────────────────────────────────────

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
        }
    }

    #[test]
    fn unreadable_source_is_an_error() {
        let err = extractor().extract_reader(BrokenReader).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = extractor().extract_file(&dir.path().join("missing.ofx"));
        assert!(matches!(result, Err(ExtractError::Io(_))));
    }

    #[test]
    fn extract_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extrato.ofx");
        std::fs::write(&path, SAMPLE_OFX).unwrap();
        let out = extractor().extract_file(&path).unwrap();
        assert_eq!(out.count, 3);
    }
}
