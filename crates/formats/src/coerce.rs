//! Numeric and key coercion applied at the loader boundary.
//!
//! Open-data exports disagree on types: the same bay id shows up as `1234`,
//! `"1234"` or `1234.0` depending on the tool that wrote the file. Everything
//! is normalised here so fusion and filtering only ever see clean values.

use serde_json::Value;

const MISSING_TOKENS: [&str; 5] = ["", "na", "n/a", "null", "nan"];

fn is_missing(trimmed: &str) -> bool {
    MISSING_TOKENS
        .iter()
        .any(|t| trimmed.eq_ignore_ascii_case(t))
}

/// Trimmed text, or `None` for blank / NA-like cells.
pub fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Text form of a scalar JSON cell. Arrays and objects are not cells.
pub fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Canonical join key: integral numbers lose their fractional part
/// (`"1234.0"` → `"1234"`), everything else is trimmed text.
pub fn normalize_key(raw: &str) -> Option<String> {
    let text = optional_text(raw)?;
    let looks_float = text.contains(['.', 'e', 'E']);
    if looks_float
        && let Ok(v) = text.parse::<f64>()
        && v.is_finite()
        && v.fract() == 0.0
        && v.abs() < 9.0e15
    {
        return Some(format!("{}", v as i64));
    }
    Some(text)
}

/// Unit of a whole cost column.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CostUnit {
    Cents,
    Dollars,
}

impl CostUnit {
    /// Dollars as soon as any cell has a decimal point, cents otherwise.
    /// A column is never read in mixed units.
    pub fn sniff<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let decimal = cells
            .into_iter()
            .filter_map(optional_text)
            .any(|text| text.contains('.'));
        if decimal {
            CostUnit::Dollars
        } else {
            CostUnit::Cents
        }
    }

    /// Hourly cost in cents.
    pub fn parse(self, raw: &str) -> Result<Option<u32>, String> {
        match self {
            CostUnit::Cents => parse_cents(raw),
            CostUnit::Dollars => parse_dollars(raw),
        }
    }
}

/// Hourly cost given in cents. A leading `$` is accepted.
pub fn parse_cents(raw: &str) -> Result<Option<u32>, String> {
    let Some(text) = optional_text(raw) else {
        return Ok(None);
    };
    parse_whole(text.trim_start_matches('$')).map(Some)
}

/// Hourly cost given in dollars, converted to cents.
pub fn parse_dollars(raw: &str) -> Result<Option<u32>, String> {
    let Some(text) = optional_text(raw) else {
        return Ok(None);
    };
    let text = text.trim_start_matches('$');
    let v: f64 = text
        .parse()
        .map_err(|_| format!("not a dollar amount: {text:?}"))?;
    to_u32((v * 100.0).round(), text).map(Some)
}

/// Whole minutes. Fractional minutes round to the nearest minute.
pub fn parse_minutes(raw: &str) -> Result<Option<u32>, String> {
    let Some(text) = optional_text(raw) else {
        return Ok(None);
    };
    parse_whole(&text).map(Some)
}

fn parse_whole(text: &str) -> Result<u32, String> {
    if let Ok(v) = text.parse::<i64>() {
        return to_u32(v as f64, text);
    }
    let v: f64 = text
        .parse()
        .map_err(|_| format!("not a number: {text:?}"))?;
    to_u32(v.round(), text)
}

fn to_u32(v: f64, text: &str) -> Result<u32, String> {
    if !v.is_finite() {
        return Err(format!("not a finite number: {text:?}"));
    }
    if v < 0.0 {
        return Err(format!("negative value: {text:?}"));
    }
    if v > u32::MAX as f64 {
        return Err(format!("value out of range: {text:?}"));
    }
    Ok(v as u32)
}

#[cfg(test)]
mod tests {
    use super::{
        CostUnit, json_text, normalize_key, optional_text, parse_cents, parse_dollars,
        parse_minutes,
    };
    use serde_json::json;

    #[test]
    fn keys_drop_integral_fraction() {
        assert_eq!(normalize_key("1234.0").as_deref(), Some("1234"));
        assert_eq!(normalize_key(" 1234 ").as_deref(), Some("1234"));
        assert_eq!(normalize_key("7E10").as_deref(), Some("70000000000"));
        assert_eq!(normalize_key("12.5").as_deref(), Some("12.5"));
        assert_eq!(normalize_key("C-12").as_deref(), Some("C-12"));
    }

    #[test]
    fn json_numbers_become_keys() {
        let text = json_text(&json!(1234.0)).expect("number");
        assert_eq!(normalize_key(&text).as_deref(), Some("1234"));
        assert_eq!(json_text(&json!(null)), None);
        assert_eq!(json_text(&json!([1, 2])), None);
    }

    #[test]
    fn missing_tokens_are_absent() {
        for raw in ["", "  ", "NA", "null", "NaN", "n/a"] {
            assert_eq!(optional_text(raw), None, "{raw:?}");
            assert_eq!(normalize_key(raw), None, "{raw:?}");
            assert_eq!(parse_cents(raw), Ok(None), "{raw:?}");
        }
    }

    #[test]
    fn cents_and_dollars() {
        assert_eq!(parse_cents("200"), Ok(Some(200)));
        assert_eq!(parse_cents("$150"), Ok(Some(150)));
        assert_eq!(parse_cents("0"), Ok(Some(0)));
        assert_eq!(parse_dollars("$5.50"), Ok(Some(550)));
        assert_eq!(parse_dollars("3"), Ok(Some(300)));
    }

    #[test]
    fn cost_unit_is_decided_per_column() {
        let whole = ["200", "", "150"];
        assert_eq!(CostUnit::sniff(whole), CostUnit::Cents);
        assert_eq!(CostUnit::Cents.parse("150"), Ok(Some(150)));

        let mixed = ["3.5", "4", "NA"];
        let unit = CostUnit::sniff(mixed);
        assert_eq!(unit, CostUnit::Dollars);
        let cents: Vec<_> = mixed.iter().map(|raw| unit.parse(raw)).collect();
        assert_eq!(cents, vec![Ok(Some(350)), Ok(Some(400)), Ok(None)]);
    }

    #[test]
    fn negative_values_are_rejected() {
        assert!(parse_cents("-1").is_err());
        assert!(parse_dollars("-0.5").is_err());
        assert!(parse_minutes("-60").is_err());
        assert!(parse_minutes("soon").is_err());
    }

    #[test]
    fn minutes_round_fractions() {
        assert_eq!(parse_minutes("120"), Ok(Some(120)));
        assert_eq!(parse_minutes("120.0"), Ok(Some(120)));
        assert_eq!(parse_minutes("59.6"), Ok(Some(60)));
    }
}
