//! Voucher access key codec
//!
//! Every electronic voucher carries a 49-digit access key that identifies it
//! to the tax authority. The key is the concatenation of eight fixed-width
//! fields followed by a modulus-11 check digit:
//!
//! | Field | Width |
//! |-------|-------|
//! | Issue date (`ddmmyyyy`) | 8 |
//! | Voucher type code | 2 |
//! | Issuer tax id (RUC) | 13 |
//! | Environment | 1 |
//! | Series (establishment + emission point) | 6 |
//! | Sequential number | 9 |
//! | Numeric code | 8 |
//! | Emission type | 1 |
//! | Check digit | 1 |
//!
//! The check digit multiplies the 48 body digits, left to right, by weights
//! drawn cyclically from `[2, 3, 4, 5, 6, 7]`, sums the products and reduces
//! the sum modulo 11: a remainder of 0 or 1 is used as-is, anything else
//! becomes `11 - remainder`.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, NaiveDate};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::impl_wire_enum_conversions;

/// Total length of an access key, check digit included.
pub const ACCESS_KEY_LEN: usize = 49;

const BODY_LEN: usize = 48;
const CHECK_WEIGHTS: [u32; 6] = [2, 3, 4, 5, 6, 7];
const MAX_SEQUENTIAL: u64 = 999_999_999;

const TAX_ID_LEN: usize = 13;
const SERIES_LEN: usize = 6;
const SEQUENTIAL_LEN: usize = 9;
const NUMERIC_CODE_LEN: usize = 8;

/// Byte ranges of each field inside a key, in wire order.
const FIELD_RANGES: [(usize, usize); 9] =
    [(0, 8), (8, 10), (10, 23), (23, 24), (24, 30), (30, 39), (39, 47), (47, 48), (48, 49)];

/// Errors produced while generating, validating or parsing access keys.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessKeyError {
    #[error("{field} must have exactly {expected} digits, got {actual}")]
    InvalidFieldWidth { field: &'static str, expected: usize, actual: usize },

    #[error("{field} must contain only digits")]
    NonNumericField { field: &'static str },

    #[error("access key must have {ACCESS_KEY_LEN} digits, got {actual}")]
    InvalidLength { actual: usize },

    #[error("access key must contain only digits (offending character at position {position})")]
    NonDigit { position: usize },

    #[error("invalid check digit: expected {expected}, found {actual}")]
    CheckDigitMismatch { expected: u8, actual: u8 },

    #[error("unknown {field} code '{value}'")]
    UnknownCode { field: &'static str, value: String },

    #[error("invalid issue date '{value}'")]
    InvalidDate { value: String },

    #[error("sequential number space exhausted")]
    SequenceExhausted,
}

/// Voucher types recognised by the tax authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    Invoice,
    CreditNote,
    DebitNote,
    ShippingGuide,
    WithholdingReceipt,
    PurchaseSettlement,
}

impl VoucherType {
    /// Two-digit wire code embedded in the access key.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Invoice => "01",
            Self::PurchaseSettlement => "03",
            Self::CreditNote => "04",
            Self::DebitNote => "05",
            Self::ShippingGuide => "06",
            Self::WithholdingReceipt => "07",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Invoice),
            "03" => Some(Self::PurchaseSettlement),
            "04" => Some(Self::CreditNote),
            "05" => Some(Self::DebitNote),
            "06" => Some(Self::ShippingGuide),
            "07" => Some(Self::WithholdingReceipt),
            _ => None,
        }
    }

    /// Human-readable name for operator output.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Invoice => "Invoice (01)",
            Self::PurchaseSettlement => "Purchase settlement (03)",
            Self::CreditNote => "Credit note (04)",
            Self::DebitNote => "Debit note (05)",
            Self::ShippingGuide => "Shipping guide (06)",
            Self::WithholdingReceipt => "Withholding receipt (07)",
        }
    }
}

impl_wire_enum_conversions!(VoucherType {
    Invoice => "invoice" | "factura" | "01",
    CreditNote => "credit_note" | "nota_credito" | "04",
    DebitNote => "debit_note" | "nota_debito" | "05",
    ShippingGuide => "shipping_guide" | "guia_remision" | "06",
    WithholdingReceipt => "withholding_receipt" | "comprobante_retencion" | "07",
    PurchaseSettlement => "purchase_settlement" | "liquidacion_compra" | "03",
});

/// Remote environment selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl Environment {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Test => "1",
            Self::Production => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Test),
            "2" => Some(Self::Production),
            _ => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Test => "Test (1)",
            Self::Production => "Production (2)",
        }
    }
}

impl_wire_enum_conversions!(Environment {
    Test => "test" | "pruebas" | "certification" | "1",
    Production => "production" | "produccion" | "2",
});

/// Emission type: normal online emission or offline contingency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionType {
    #[default]
    Normal,
    Contingency,
}

impl EmissionType {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Normal => "1",
            Self::Contingency => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Normal),
            "2" => Some(Self::Contingency),
            _ => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Normal => "Normal (1)",
            Self::Contingency => "Contingency (2)",
        }
    }
}

impl_wire_enum_conversions!(EmissionType {
    Normal => "normal" | "1",
    Contingency => "contingency" | "contingencia" | "2",
});

/// Inputs for access key generation.
///
/// `numeric_code` is optional; when absent the codec draws eight random
/// digits from its own generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyConfig {
    pub issue_date: NaiveDate,
    pub voucher_type: VoucherType,
    pub tax_id: String,
    pub environment: Environment,
    pub series: String,
    pub sequential: String,
    pub numeric_code: Option<String>,
    pub emission_type: EmissionType,
}

/// A validated 49-digit access key.
///
/// Only obtainable from [`AccessKeyCodec::generate`] or by parsing a string
/// that passes [`AccessKeyCodec::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

impl AccessKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hyphen-separated rendering for display.
    pub fn formatted(&self) -> String {
        AccessKeyCodec::format(&self.0)
    }

    /// Decompose the key back into its generation inputs.
    pub fn to_config(&self) -> Result<AccessKeyConfig, AccessKeyError> {
        AccessKeyCodec::parse(&self.0)
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccessKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccessKey {
    type Err = AccessKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessKeyCodec::validate(s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for AccessKey {
    type Error = AccessKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccessKeyCodec::validate(&value)?;
        Ok(Self(value))
    }
}

impl From<AccessKey> for String {
    fn from(key: AccessKey) -> Self {
        key.0
    }
}

/// Generates, validates, parses and formats access keys.
///
/// The codec owns the random source used for numeric codes so tests can
/// seed it and get reproducible keys.
pub struct AccessKeyCodec {
    rng: Mutex<StdRng>,
}

impl fmt::Debug for AccessKeyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKeyCodec").finish_non_exhaustive()
    }
}

impl Default for AccessKeyCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessKeyCodec {
    /// Codec seeded from OS entropy.
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Codec with a deterministic random source.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    /// Build a key from `config`.
    ///
    /// Every fixed-width field must match its exact digit count. The numeric
    /// code is generated when the config does not carry one.
    pub fn generate(&self, config: &AccessKeyConfig) -> Result<AccessKey, AccessKeyError> {
        check_digit_field("tax id", &config.tax_id, TAX_ID_LEN)?;
        check_digit_field("series", &config.series, SERIES_LEN)?;
        check_digit_field("sequential", &config.sequential, SEQUENTIAL_LEN)?;

        let numeric_code = match &config.numeric_code {
            Some(code) => code.clone(),
            None => self.random_numeric_code(),
        };
        check_digit_field("numeric code", &numeric_code, NUMERIC_CODE_LEN)?;

        let mut body = String::with_capacity(ACCESS_KEY_LEN);
        body.push_str(&encode_date(config.issue_date)?);
        body.push_str(config.voucher_type.code());
        body.push_str(&config.tax_id);
        body.push_str(config.environment.code());
        body.push_str(&config.series);
        body.push_str(&config.sequential);
        body.push_str(&numeric_code);
        body.push_str(config.emission_type.code());
        debug_assert_eq!(body.len(), BODY_LEN);

        let check = compute_check_digit(body.as_bytes());
        body.push(char::from(b'0' + check));

        Ok(AccessKey(body))
    }

    /// Check length, digit-only content and the trailing check digit.
    pub fn validate(key: &str) -> Result<(), AccessKeyError> {
        if key.len() != ACCESS_KEY_LEN {
            return Err(AccessKeyError::InvalidLength { actual: key.chars().count() });
        }

        if let Some(position) = key.bytes().position(|b| !b.is_ascii_digit()) {
            return Err(AccessKeyError::NonDigit { position });
        }

        let bytes = key.as_bytes();
        let expected = compute_check_digit(&bytes[..BODY_LEN]);
        let actual = bytes[BODY_LEN] - b'0';

        if expected != actual {
            return Err(AccessKeyError::CheckDigitMismatch { expected, actual });
        }

        Ok(())
    }

    /// Inverse of [`generate`](Self::generate). The embedded numeric code is
    /// returned as-is.
    pub fn parse(key: &str) -> Result<AccessKeyConfig, AccessKeyError> {
        Self::validate(key)?;

        let field = |index: usize| {
            let (start, end) = FIELD_RANGES[index];
            &key[start..end]
        };

        let voucher_code = field(1);
        let voucher_type = VoucherType::from_code(voucher_code).ok_or_else(|| {
            AccessKeyError::UnknownCode { field: "voucher type", value: voucher_code.to_string() }
        })?;

        let environment_code = field(3);
        let environment = Environment::from_code(environment_code).ok_or_else(|| {
            AccessKeyError::UnknownCode { field: "environment", value: environment_code.to_string() }
        })?;

        let emission_code = field(7);
        let emission_type = EmissionType::from_code(emission_code).ok_or_else(|| {
            AccessKeyError::UnknownCode { field: "emission type", value: emission_code.to_string() }
        })?;

        Ok(AccessKeyConfig {
            issue_date: decode_date(field(0))?,
            voucher_type,
            tax_id: field(2).to_string(),
            environment,
            series: field(4).to_string(),
            sequential: field(5).to_string(),
            numeric_code: Some(field(6).to_string()),
            emission_type,
        })
    }

    /// Hyphen-join the nine fields; strings of the wrong length pass through.
    pub fn format(key: &str) -> String {
        if key.len() != ACCESS_KEY_LEN || !key.is_ascii() {
            return key.to_string();
        }

        FIELD_RANGES.iter().map(|&(start, end)| &key[start..end]).collect::<Vec<_>>().join("-")
    }

    /// Check digit for a 48-digit body.
    pub fn check_digit(body: &str) -> Result<u8, AccessKeyError> {
        check_digit_field("access key body", body, BODY_LEN)?;
        Ok(compute_check_digit(body.as_bytes()))
    }

    fn random_numeric_code(&self) -> String {
        let value: u32 = self.rng.lock().gen_range(0..100_000_000);
        format!("{value:08}")
    }
}

/// Hands out zero-padded 9-digit sequential numbers.
///
/// Owned by whoever issues vouchers for a given series; the counter is
/// atomic so a single allocator can be shared across tasks.
#[derive(Debug)]
pub struct SequenceAllocator {
    next: AtomicU64,
}

impl SequenceAllocator {
    /// Allocator whose first number is `start`.
    pub fn starting_at(start: u64) -> Self {
        Self { next: AtomicU64::new(start) }
    }

    /// Next sequential number, formatted to nine digits.
    pub fn next_sequential(&self) -> Result<String, AccessKeyError> {
        let value = self.next.fetch_add(1, Ordering::AcqRel);
        if value > MAX_SEQUENTIAL {
            return Err(AccessKeyError::SequenceExhausted);
        }
        Ok(format!("{value:09}"))
    }

    /// The number the next call will hand out.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

fn check_digit_field(
    field: &'static str,
    value: &str,
    expected: usize,
) -> Result<(), AccessKeyError> {
    if value.len() != expected {
        return Err(AccessKeyError::InvalidFieldWidth {
            field,
            expected,
            actual: value.chars().count(),
        });
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AccessKeyError::NonNumericField { field });
    }
    Ok(())
}

/// Callers guarantee `digits` is ASCII digits only.
fn compute_check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .zip(CHECK_WEIGHTS.iter().cycle())
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum();

    match sum % 11 {
        0 => 0,
        1 => 1,
        remainder => (11 - remainder) as u8,
    }
}

fn encode_date(date: NaiveDate) -> Result<String, AccessKeyError> {
    if !(0..=9999).contains(&date.year()) {
        return Err(AccessKeyError::InvalidDate { value: date.to_string() });
    }
    Ok(format!("{:02}{:02}{:04}", date.day(), date.month(), date.year()))
}

fn decode_date(raw: &str) -> Result<NaiveDate, AccessKeyError> {
    let invalid = || AccessKeyError::InvalidDate { value: raw.to_string() };

    let day: u32 = raw[0..2].parse().map_err(|_| invalid())?;
    let month: u32 = raw[2..4].parse().map_err(|_| invalid())?;
    let year: i32 = raw[4..8].parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PINNED_KEY: &str = "2306202401179214673900110010010000000011234567816";

    fn pinned_config() -> AccessKeyConfig {
        AccessKeyConfig {
            issue_date: NaiveDate::from_ymd_opt(2024, 6, 23).unwrap(),
            voucher_type: VoucherType::Invoice,
            tax_id: "1792146739001".to_string(),
            environment: Environment::Test,
            series: "001001".to_string(),
            sequential: "000000001".to_string(),
            numeric_code: Some("12345678".to_string()),
            emission_type: EmissionType::Normal,
        }
    }

    #[test]
    fn generates_pinned_vector() {
        let codec = AccessKeyCodec::with_seed(7);
        let key = codec.generate(&pinned_config()).unwrap();

        assert_eq!(key.as_str(), PINNED_KEY);
        assert_eq!(key.as_str().len(), ACCESS_KEY_LEN);
        assert!(AccessKeyCodec::validate(key.as_str()).is_ok());
    }

    #[test]
    fn parse_recovers_pinned_fields() {
        let parsed = AccessKeyCodec::parse(PINNED_KEY).unwrap();

        assert_eq!(parsed.tax_id, "1792146739001");
        assert_eq!(parsed.environment, Environment::Test);
        assert_eq!(parsed, pinned_config());
    }

    #[test]
    fn every_field_combination_round_trips() {
        let voucher_types = [
            VoucherType::Invoice,
            VoucherType::PurchaseSettlement,
            VoucherType::CreditNote,
            VoucherType::DebitNote,
            VoucherType::ShippingGuide,
            VoucherType::WithholdingReceipt,
        ];
        let dates = [(2024, 2, 29), (2000, 1, 1), (2023, 12, 31), (2099, 12, 31)]
            .map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        let numeric_codes = [Some("00000000"), Some("99999999"), None];
        let codec = AccessKeyCodec::with_seed(11);
        let mut checked = 0;

        for voucher_type in voucher_types {
            for environment in [Environment::Test, Environment::Production] {
                for emission_type in [EmissionType::Normal, EmissionType::Contingency] {
                    for issue_date in dates {
                        for numeric_code in numeric_codes {
                            let config = AccessKeyConfig {
                                issue_date,
                                voucher_type,
                                environment,
                                emission_type,
                                numeric_code: numeric_code.map(str::to_string),
                                ..pinned_config()
                            };

                            let key = codec.generate(&config).unwrap();
                            assert!(AccessKeyCodec::validate(key.as_str()).is_ok(), "{key}");

                            let parsed = AccessKeyCodec::parse(key.as_str()).unwrap();
                            assert_eq!(parsed.issue_date, issue_date, "{key}");
                            assert_eq!(parsed.voucher_type, voucher_type, "{key}");
                            assert_eq!(parsed.environment, environment, "{key}");
                            assert_eq!(parsed.emission_type, emission_type, "{key}");
                            assert_eq!(parsed.tax_id, config.tax_id);
                            assert_eq!(parsed.series, config.series);
                            assert_eq!(parsed.sequential, config.sequential);
                            match numeric_code {
                                Some(code) => assert_eq!(parsed.numeric_code.as_deref(), Some(code)),
                                None => assert_eq!(
                                    parsed.numeric_code.as_deref().map(str::len),
                                    Some(NUMERIC_CODE_LEN)
                                ),
                            }
                            checked += 1;
                        }
                    }
                }
            }
        }

        assert_eq!(checked, 6 * 2 * 2 * 4 * 3);
    }

    #[test]
    fn generation_is_deterministic_with_explicit_code() {
        let first = AccessKeyCodec::new().generate(&pinned_config()).unwrap();
        let second = AccessKeyCodec::new().generate(&pinned_config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn generated_numeric_code_is_embedded_and_parseable() {
        let codec = AccessKeyCodec::with_seed(42);
        let mut config = pinned_config();
        config.numeric_code = None;

        let key = codec.generate(&config).unwrap();
        let parsed = key.to_config().unwrap();

        let code = parsed.numeric_code.clone().unwrap();
        assert_eq!(code.len(), NUMERIC_CODE_LEN);
        assert_eq!(&key.as_str()[39..47], code);
        assert_eq!(parsed.tax_id, config.tax_id);
        assert_eq!(parsed.sequential, config.sequential);
    }

    #[test]
    fn seeded_codecs_produce_identical_numeric_codes() {
        let mut config = pinned_config();
        config.numeric_code = None;

        let a = AccessKeyCodec::with_seed(99).generate(&config).unwrap();
        let b = AccessKeyCodec::with_seed(99).generate(&config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_wrong_field_widths() {
        let codec = AccessKeyCodec::new();

        let mut config = pinned_config();
        config.tax_id = "179214673900".to_string();
        assert_eq!(
            codec.generate(&config).unwrap_err(),
            AccessKeyError::InvalidFieldWidth { field: "tax id", expected: 13, actual: 12 }
        );

        let mut config = pinned_config();
        config.series = "0010010".to_string();
        assert!(matches!(
            codec.generate(&config),
            Err(AccessKeyError::InvalidFieldWidth { field: "series", .. })
        ));

        let mut config = pinned_config();
        config.sequential = "1".to_string();
        assert!(matches!(
            codec.generate(&config),
            Err(AccessKeyError::InvalidFieldWidth { field: "sequential", .. })
        ));

        let mut config = pinned_config();
        config.numeric_code = Some("1234".to_string());
        assert!(matches!(
            codec.generate(&config),
            Err(AccessKeyError::InvalidFieldWidth { field: "numeric code", .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let mut config = pinned_config();
        config.series = "00A001".to_string();
        assert_eq!(
            AccessKeyCodec::new().generate(&config).unwrap_err(),
            AccessKeyError::NonNumericField { field: "series" }
        );
    }

    #[test]
    fn validate_rejects_bad_length() {
        assert!(matches!(
            AccessKeyCodec::validate(&PINNED_KEY[..48]),
            Err(AccessKeyError::InvalidLength { actual: 48 })
        ));
        assert!(matches!(
            AccessKeyCodec::validate(&format!("{PINNED_KEY}0")),
            Err(AccessKeyError::InvalidLength { actual: 50 })
        ));
        assert!(AccessKeyCodec::validate("").is_err());
    }

    #[test]
    fn validate_rejects_non_digits() {
        let tampered = format!("{}X{}", &PINNED_KEY[..10], &PINNED_KEY[11..]);
        assert_eq!(
            AccessKeyCodec::validate(&tampered),
            Err(AccessKeyError::NonDigit { position: 10 })
        );
    }

    #[test]
    fn validate_rejects_altered_check_digit() {
        for replacement in ['0', '1', '2', '3', '4', '5', '7', '8', '9'] {
            let tampered = format!("{}{}", &PINNED_KEY[..48], replacement);
            assert!(matches!(
                AccessKeyCodec::validate(&tampered),
                Err(AccessKeyError::CheckDigitMismatch { expected: 6, .. })
            ));
        }
    }

    #[test]
    fn check_digit_handles_low_remainders() {
        // All zeros: sum 0, remainder 0.
        assert_eq!(AccessKeyCodec::check_digit(&"0".repeat(48)).unwrap(), 0);
        // A single 1 weighted by 2 at position 0 plus 5 weighted by 2 at
        // position 6 gives 12, remainder 1.
        let body = format!("1{}5{}", "0".repeat(5), "0".repeat(41));
        assert_eq!(AccessKeyCodec::check_digit(&body).unwrap(), 1);
    }

    #[test]
    fn parse_rejects_unknown_codes() {
        // Environment digit 9 with a recomputed check digit.
        let body = format!("{}9{}", &PINNED_KEY[..23], &PINNED_KEY[24..48]);
        let check = AccessKeyCodec::check_digit(&body).unwrap();
        let key = format!("{body}{check}");

        assert!(matches!(
            AccessKeyCodec::parse(&key),
            Err(AccessKeyError::UnknownCode { field: "environment", .. })
        ));
    }

    #[test]
    fn parse_rejects_impossible_dates() {
        let body = format!("31022024{}", &PINNED_KEY[8..48]);
        let check = AccessKeyCodec::check_digit(&body).unwrap();
        let key = format!("{body}{check}");

        assert!(matches!(AccessKeyCodec::parse(&key), Err(AccessKeyError::InvalidDate { .. })));
    }

    #[test]
    fn format_hyphenates_fields() {
        assert_eq!(
            AccessKeyCodec::format(PINNED_KEY),
            "23062024-01-1792146739001-1-001001-000000001-12345678-1-6"
        );
        assert_eq!(AccessKeyCodec::format("12345"), "12345");
    }

    #[test]
    fn access_key_from_str_validates() {
        let key: AccessKey = PINNED_KEY.parse().unwrap();
        assert_eq!(key.to_string(), PINNED_KEY);
        assert!("123".parse::<AccessKey>().is_err());
    }

    #[test]
    fn access_key_serde_round_trips_through_validation() {
        let json = serde_json::to_string(&AccessKey(PINNED_KEY.to_string())).unwrap();
        assert_eq!(json, format!("\"{PINNED_KEY}\""));

        let bad = format!("\"{}0\"", &PINNED_KEY[..48]);
        assert!(serde_json::from_str::<AccessKey>(&bad).is_err());
    }

    #[test]
    fn wire_enums_parse_aliases() {
        assert_eq!("factura".parse::<VoucherType>().unwrap(), VoucherType::Invoice);
        assert_eq!("07".parse::<VoucherType>().unwrap(), VoucherType::WithholdingReceipt);
        assert_eq!("PRODUCCION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("2".parse::<EmissionType>().unwrap(), EmissionType::Contingency);
        assert_eq!(VoucherType::PurchaseSettlement.code(), "03");
    }

    #[test]
    fn sequence_allocator_pads_and_exhausts() {
        let allocator = SequenceAllocator::default();
        assert_eq!(allocator.next_sequential().unwrap(), "000000001");
        assert_eq!(allocator.next_sequential().unwrap(), "000000002");
        assert_eq!(allocator.peek(), 3);

        let near_end = SequenceAllocator::starting_at(MAX_SEQUENTIAL);
        assert_eq!(near_end.next_sequential().unwrap(), "999999999");
        assert_eq!(near_end.next_sequential(), Err(AccessKeyError::SequenceExhausted));
    }
}
