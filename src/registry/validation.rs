//! Shared validation helpers for registry command handlers.
//!
//! Centralizes common checks (colors, durations, ratios, filenames) so all
//! handlers produce consistent error messages.

use crate::error::AppError;

/// Constraint checks that decoding alone cannot express. Runs before a
/// command touches the project, both after translation and on dispatch.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Validate that a value is finite and positive.
pub fn validate_positive_finite(value: f64, name: &str) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::invalid(format!("{name} must be finite")));
    }
    if value <= 0.0 {
        return Err(AppError::invalid(format!("{name} must be positive")));
    }
    Ok(())
}

/// Longest duration or lag accepted, in days (about a century).
pub const MAX_SPAN_DAYS: i64 = 36_500;

/// Validate a task duration in whole working days.
pub fn validate_duration(days: i64) -> Result<(), AppError> {
    if days < 1 {
        return Err(AppError::invalid(format!(
            "Duration must be a positive whole number of days (got {days})"
        )));
    }
    if days > MAX_SPAN_DAYS {
        return Err(AppError::invalid(format!(
            "Duration must be at most {MAX_SPAN_DAYS} days (got {days})"
        )));
    }
    Ok(())
}

/// Validate a signed day count against [`MAX_SPAN_DAYS`] in either direction.
pub fn validate_day_span(days: i64, name: &str) -> Result<(), AppError> {
    if days.unsigned_abs() > MAX_SPAN_DAYS.unsigned_abs() {
        return Err(AppError::invalid(format!(
            "{name} must be within {MAX_SPAN_DAYS} days either way (got {days})"
        )));
    }
    Ok(())
}

/// Validate a link lag in whole days. Negative lags are leads.
pub fn validate_lag(days: i64) -> Result<(), AppError> {
    validate_day_span(days, "Lag")
}

/// Validate that progress is a finite ratio in [0.0, 1.0].
pub fn validate_progress(progress: f64) -> Result<(), AppError> {
    if !progress.is_finite() || !(0.0..=1.0).contains(&progress) {
        return Err(AppError::invalid(format!(
            "Progress ({progress}) must be between 0.0 and 1.0"
        )));
    }
    Ok(())
}

pub fn validate_text(text: &str, name: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::invalid(format!("{name} must not be empty")));
    }
    Ok(())
}

/// Accept a single CSS color token: hex (`#rgb`, `#rgba`, `#rrggbb`,
/// `#rrggbbaa`), `rgb()/rgba()/hsl()/hsla()`, or a named color.
pub fn validate_color(raw: &str) -> Result<(), AppError> {
    let color = raw.trim();
    let bad = || AppError::invalid(format!("\"{raw}\" is not a CSS color"));
    if color.is_empty() || color.len() > 64 {
        return Err(bad());
    }

    if let Some(hex) = color.strip_prefix('#') {
        let ok = matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
        return if ok { Ok(()) } else { Err(bad()) };
    }

    let lower = color.to_ascii_lowercase();
    for func in ["rgba(", "rgb(", "hsla(", "hsl("] {
        if let Some(rest) = lower.strip_prefix(func) {
            let inner = rest.strip_suffix(')').ok_or_else(bad)?;
            let ok = !inner.trim().is_empty()
                && inner.chars().all(|c| {
                    c.is_ascii_digit() || matches!(c, ' ' | ',' | '.' | '%' | '/' | '-' | 'd' | 'e' | 'g')
                });
            return if ok { Ok(()) } else { Err(bad()) };
        }
    }

    if color.len() >= 3 && color.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(());
    }
    Err(bad())
}

/// Export file names are plain leaf names: no directories, no traversal.
pub fn validate_filename(name: &str) -> Result<(), AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid("File name must not be empty"));
    }
    if trimmed.contains(['/', '\\', '\0']) || trimmed.starts_with('.') {
        return Err(AppError::invalid(format!("\"{name}\" is not a plain file name")));
    }
    Ok(())
}

/// Weekday indices 0 (Sunday) through 6 (Saturday); at least one day must stay visible.
pub fn validate_weekdays(days: &[u8]) -> Result<(), AppError> {
    if days.is_empty() {
        return Err(AppError::invalid("Provide at least one weekday to hide"));
    }
    if let Some(bad) = days.iter().find(|d| **d > 6) {
        return Err(AppError::invalid(format!(
            "Weekday {bad} is out of range (0 = Sunday .. 6 = Saturday)"
        )));
    }
    let mut distinct: Vec<u8> = days.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() == 7 {
        return Err(AppError::invalid("Cannot hide every day of the week"));
    }
    Ok(())
}
