use chrono::NaiveDate;
use serde::Serialize;

/// Get the serde-serialized name of a unit enum variant.
/// Uses serde's own rules (rename_all, rename, etc.) as the single source of truth.
/// Returns `None` for non-string variants (data-carrying variants).
pub fn serde_variant_name<T: Serialize>(val: &T) -> Option<String> {
    match serde_json::to_value(val) {
        Ok(serde_json::Value::String(s)) => Some(s),
        _ => None,
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Parse a calendar date written as `YYYY-MM-DD` or `DD-MM-YYYY` (either
/// separator `-` or `/`). A trailing time component (`2025-07-20 00:00`,
/// `2025-07-20T08:00:00Z`) is ignored.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .ok_or_else(|| format!("Invalid date \"{raw}\" (expected YYYY-MM-DD)"))
}

/// Local calendar date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Long human form used in marker titles, e.g. `20 July 2025`.
pub fn long_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}

/// Serde adapter for `NaiveDate` fields that accept any format understood by
/// [`parse_date`] and always write `YYYY-MM-DD`.
pub mod flex_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }
}

/// Optional variant of [`flex_date`]. Use with `#[serde(default)]`.
pub mod flex_date_opt {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&super::format_date(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => super::parse_date(&raw).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// Interpret a JSON number (or numeric string) as a whole number. Models
/// routinely send `3.0` for a duration of three days; `2.5` is rejected.
pub fn whole_number(value: &serde_json::Value) -> Result<i64, String> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            let f = n.as_f64().ok_or_else(|| format!("{n} is not a number"))?;
            float_to_whole(f)
        }
        serde_json::Value::String(s) => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                return Ok(i);
            }
            let f: f64 = t.parse().map_err(|_| format!("\"{s}\" is not a number"))?;
            float_to_whole(f)
        }
        other => Err(format!("expected a whole number, got {other}")),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn float_to_whole(f: f64) -> Result<i64, String> {
    if !f.is_finite() || f.fract() != 0.0 || f.abs() > 1e12 {
        return Err(format!("{f} is not a whole number"));
    }
    Ok(f as i64)
}

/// Serde adapter for whole-number fields (durations, lags).
pub mod whole_days {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let value = serde_json::Value::deserialize(d)?;
        super::whole_number(&value).map_err(serde::de::Error::custom)
    }
}

/// Optional variant of [`whole_days`]. Use with `#[serde(default)]`.
pub mod whole_days_opt {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Option::<serde_json::Value>::deserialize(d)? {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => super::whole_number(&value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_iso_and_day_first_dates() {
        let expected = NaiveDate::from_ymd_opt(2025, 7, 20).unwrap();
        assert_eq!(parse_date("2025-07-20").unwrap(), expected);
        assert_eq!(parse_date("2025/07/20").unwrap(), expected);
        assert_eq!(parse_date("20-07-2025").unwrap(), expected);
        assert_eq!(parse_date("20/07/2025").unwrap(), expected);
        assert_eq!(parse_date("2025-07-20 00:00").unwrap(), expected);
        assert_eq!(parse_date("2025-07-20T08:30:00Z").unwrap(), expected);
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_date("next tuesday").is_err());
        assert!(parse_date("2025-13-40").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn long_date_has_no_padding() {
        let d = NaiveDate::from_ymd_opt(2025, 7, 5).unwrap();
        assert_eq!(long_date(d), "5 July 2025");
    }

    #[test]
    fn whole_number_accepts_integral_floats_only() {
        assert_eq!(whole_number(&json!(3)).unwrap(), 3);
        assert_eq!(whole_number(&json!(3.0)).unwrap(), 3);
        assert_eq!(whole_number(&json!("4")).unwrap(), 4);
        assert!(whole_number(&json!(2.5)).is_err());
        assert!(whole_number(&json!(true)).is_err());
        assert!(whole_number(&json!("soon")).is_err());
    }
}
