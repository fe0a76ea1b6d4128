// ==========================================
// BOQ Import Engine - Cell Value Parser
// ==========================================
// Scope: locale-free parsing of raw cells into typed values
// Accepted formats are fixed; anything else is a parse failure
// ==========================================
// Numbers: [+-] [currency] digits [, or space thousands] [. fraction]
// Dates:   Date cells, Excel serials (1900 system), %Y-%m-%d, %Y/%m/%d,
//          %d/%m/%Y, %Y%m%d, %d-%b-%Y
// Bools:   yes/true/1 → true, no/false/0 → false
// ==========================================

use crate::domain::boq::CellValue;
use crate::domain::types::FieldType;
use chrono::{Duration, NaiveDate};

const CURRENCY_CODES: [&str; 4] = ["ZAR", "USD", "EUR", "GBP"];
const CURRENCY_SYMBOLS: [char; 6] = ['$', '€', '£', '¥', '₹', 'R'];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d", "%d-%b-%Y"];

/// Largest Excel serial (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Parse failure message (becomes an ImportError)
pub type ParseFailure = String;

// ==========================================
// TypedValue - cell after parsing with a declared type
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Boolean(bool),
}

impl TypedValue {
    /// Normalised text form
    pub fn to_text(&self) -> String {
        match self {
            TypedValue::Text(s) => s.clone(),
            TypedValue::Integer(n) => n.to_string(),
            TypedValue::Decimal(n) => format_number(*n),
            TypedValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            TypedValue::Boolean(b) => b.to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Integer(n) => Some(*n as f64),
            TypedValue::Decimal(n) => Some(*n),
            _ => None,
        }
    }
}

/// Parse a cell with the declared type; `Ok(None)` means absent
pub fn parse_cell(value: &CellValue, field_type: FieldType) -> Result<Option<TypedValue>, ParseFailure> {
    if value.is_blank() {
        return Ok(None);
    }
    let parsed = match field_type {
        FieldType::Text => parse_text(value).map(TypedValue::Text),
        FieldType::Decimal => parse_decimal(value)?.map(TypedValue::Decimal),
        FieldType::Integer => parse_integer(value)?.map(TypedValue::Integer),
        FieldType::Date => parse_date(value)?.map(TypedValue::Date),
        FieldType::Boolean => parse_bool(value)?.map(TypedValue::Boolean),
    };
    Ok(parsed)
}

// ==========================================
// Text
// ==========================================
/// Trimmed text; empty → None. Integral numbers render without a fraction.
pub fn parse_text(value: &CellValue) -> Option<String> {
    let text = match value {
        CellValue::Empty => return None,
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ==========================================
// Numbers
// ==========================================
pub fn parse_decimal(value: &CellValue) -> Result<Option<f64>, ParseFailure> {
    match value {
        CellValue::Empty => Ok(None),
        CellValue::Number(n) if n.is_finite() => Ok(Some(*n)),
        CellValue::Number(_) => Err("number is not finite".to_string()),
        CellValue::Text(s) => parse_number_text(s),
        CellValue::Bool(b) => Err(format!("expected a number, got boolean {}", b)),
        CellValue::Date(d) => Err(format!("expected a number, got date {}", d)),
    }
}

pub fn parse_integer(value: &CellValue) -> Result<Option<i64>, ParseFailure> {
    match parse_decimal(value)? {
        None => Ok(None),
        Some(n) => whole_number(n).map(Some),
    }
}

/// Exact i64 for a whole, in-range float
pub fn whole_number(n: f64) -> Result<i64, ParseFailure> {
    if n.fract() != 0.0 {
        return Err(format!("expected a whole number, got {}", n));
    }
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    if n < i64::MIN as f64 || n >= i64::MAX as f64 {
        return Err(format!("{} is out of the integer range", n));
    }
    Ok(n as i64)
}

/// Text number with optional sign, currency and thousands separators
pub fn parse_number_text(raw: &str) -> Result<Option<f64>, ParseFailure> {
    let mut s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }

    let mut negative = false;
    let mut signed = false;
    if let Some(rest) = strip_sign(s, &mut negative) {
        s = rest.trim_start();
        signed = true;
    }

    s = strip_currency_prefix(s).trim_start();

    if !signed {
        if let Some(rest) = strip_sign(s, &mut negative) {
            s = rest.trim_start();
        }
    }

    s = strip_currency_suffix(s).trim_end();

    let body = normalize_digits(s).ok_or_else(|| format!("'{}' is not a valid number", raw.trim()))?;
    let n: f64 = body
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", raw.trim()))?;
    if !n.is_finite() {
        return Err(format!("'{}' is out of range", raw.trim()));
    }

    Ok(Some(if negative { -n } else { n }))
}

fn strip_sign<'a>(s: &'a str, negative: &mut bool) -> Option<&'a str> {
    if let Some(rest) = s.strip_prefix('-') {
        *negative = true;
        Some(rest)
    } else {
        s.strip_prefix('+')
    }
}

fn strip_currency_prefix(s: &str) -> &str {
    for code in CURRENCY_CODES {
        if s.len() >= code.len()
            && s.is_char_boundary(code.len())
            && s[..code.len()].eq_ignore_ascii_case(code)
        {
            return &s[code.len()..];
        }
    }
    match s.chars().next() {
        Some(c) if CURRENCY_SYMBOLS.contains(&c) => &s[c.len_utf8()..],
        _ => s,
    }
}

fn strip_currency_suffix(s: &str) -> &str {
    for code in CURRENCY_CODES {
        if s.len() >= code.len() {
            let cut = s.len() - code.len();
            if s.is_char_boundary(cut) && s[cut..].eq_ignore_ascii_case(code) {
                return &s[..cut];
            }
        }
    }
    match s.chars().last() {
        Some(c) if CURRENCY_SYMBOLS.contains(&c) && c != 'R' => &s[..s.len() - c.len_utf8()],
        _ => s,
    }
}

/// Remove thousands separators; None when the layout is not
/// `d{1,3}([, ]d{3})*` or plain digits, with an optional `.fraction`
fn normalize_digits(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };

    if let Some(frac) = frac_part {
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let groups: Vec<&str> = int_part
        .split(|c: char| c == ',' || c == ' ' || c == '\u{a0}')
        .collect();
    if groups.len() > 1 {
        let first = groups[0];
        if first.is_empty() || first.len() > 3 {
            return None;
        }
        if groups[1..].iter().any(|g| g.len() != 3) {
            return None;
        }
    }
    if !groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    let digits: String = groups.concat();
    let frac = frac_part.unwrap_or("");
    if digits.is_empty() && frac.is_empty() {
        return None;
    }

    let mut normalized = if digits.is_empty() { "0".to_string() } else { digits };
    if !frac.is_empty() {
        normalized.push('.');
        normalized.push_str(frac);
    }
    Some(normalized)
}

// ==========================================
// Dates
// ==========================================
pub fn parse_date(value: &CellValue) -> Result<Option<NaiveDate>, ParseFailure> {
    match value {
        CellValue::Empty => Ok(None),
        CellValue::Date(d) => Ok(Some(*d)),
        CellValue::Number(n) => excel_serial_to_date(*n)
            .map(Some)
            .ok_or_else(|| format!("{} is not a valid spreadsheet date serial", n)),
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Bool(b) => Err(format!("expected a date, got boolean {}", b)),
    }
}

pub fn parse_date_text(raw: &str) -> Result<Option<NaiveDate>, ParseFailure> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }

    // drop a time component ("2024-03-01T00:00:00", "2024-03-01 08:30")
    let date_part = match s.find(|c: char| c == 'T' || c == ' ') {
        Some(idx) if idx >= 8 => &s[..idx],
        _ => s,
    };

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Ok(Some(date));
        }
    }

    if let Ok(serial) = date_part.parse::<f64>() {
        if let Some(date) = excel_serial_to_date(serial) {
            return Ok(Some(date));
        }
    }

    Err(format!("'{}' is not a recognised date", s))
}

/// 1900 date system, epoch 1899-12-30 (exact from 1900-03-01 onwards)
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

// ==========================================
// Booleans
// ==========================================
pub fn parse_bool(value: &CellValue) -> Result<Option<bool>, ParseFailure> {
    match value {
        CellValue::Empty => Ok(None),
        CellValue::Bool(b) => Ok(Some(*b)),
        CellValue::Number(n) if *n == 1.0 => Ok(Some(true)),
        CellValue::Number(n) if *n == 0.0 => Ok(Some(false)),
        CellValue::Number(n) => Err(format!("{} is not a boolean", n)),
        CellValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "yes" | "true" | "1" => Ok(Some(true)),
            "no" | "false" | "0" => Ok(Some(false)),
            other => Err(format!("'{}' is not a boolean (expected yes/no, true/false, 1/0)", other)),
        },
        CellValue::Date(d) => Err(format!("expected a boolean, got date {}", d)),
    }
}
