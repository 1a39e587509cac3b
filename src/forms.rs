//! Parsing helpers for form-encoded input. HTML forms send every field as a
//! string, so typed values are parsed here and failures become the inline
//! message shown above the re-rendered form.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use validator::{ValidateEmail, ValidationError, ValidationErrors};

/// First message of each failing field, ordered by field name.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid."),
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trimmed value, or `None` for a blank field.
pub fn blank_to_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Password field as typed, or `None` when left blank. Never trimmed: login
/// compares the raw value.
pub fn optional_password(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// `validator` hook for optional email fields: blank passes.
pub fn optional_email(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || value.trim().validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email").with_message("Please enter a valid email address.".into()))
    }
}

pub fn parse_i32(label: &str, value: &str) -> Result<i32, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{label} must be a whole number."))
}

pub fn parse_optional_i32(label: &str, value: &str) -> Result<Option<i32>, String> {
    match blank_to_none(value) {
        Some(v) => parse_i32(label, &v).map(Some),
        None => Ok(None),
    }
}

pub fn parse_date(label: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{label} must be a date (YYYY-MM-DD)."))
}

pub fn parse_optional_date(label: &str, value: &str) -> Result<Option<NaiveDate>, String> {
    match blank_to_none(value) {
        Some(v) => parse_date(label, &v).map(Some),
        None => Ok(None),
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

pub fn parse_datetime(label: &str, value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| format!("{label} must be a date and time."))
}

/// A positive money amount, rounded to cents.
pub fn parse_amount(value: &str) -> Result<Decimal, String> {
    let cleaned = value.trim().trim_start_matches('$').replace(',', "");
    let amount = Decimal::from_str(&cleaned)
        .map_err(|_| "Amount must be a number, for example 25.00.".to_string())?;
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero.".to_string());
    }
    Ok(amount.round_dp(2))
}

/// HTML checkboxes submit "on" when ticked and nothing otherwise.
pub fn checkbox(value: &str) -> bool {
    matches!(value.trim(), "on" | "true" | "1" | "yes")
}

/// Single value of `key` in raw form pairs.
pub fn pair_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Every integer value submitted under `key`, as a multi-select does.
pub fn pair_ids(pairs: &[(String, String)], key: &str) -> Vec<i32> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .filter_map(|(_, v)| v.trim().parse().ok())
        .collect()
}

/// Format a datetime for an `<input type="datetime-local">`.
pub fn datetime_input(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M").to_string()
}

/// Format a datetime for display in tables.
pub fn datetime_display(value: &NaiveDateTime) -> String {
    value.format("%b %-d, %Y %-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Name is required."))]
        name: String,
        #[validate(custom(function = "optional_email"))]
        email: String,
    }

    #[test]
    fn test_validation_message_is_ordered() {
        let sample = Sample {
            name: String::new(),
            email: "nope".to_string(),
        };
        let errors = sample.validate().unwrap_err();
        assert_eq!(
            validation_message(&errors),
            "Please enter a valid email address. Name is required."
        );

        let blank_email = Sample {
            name: "Ana".to_string(),
            email: "  ".to_string(),
        };
        assert!(blank_email.validate().is_ok());
    }

    #[test]
    fn test_optional_password_keeps_spaces() {
        assert_eq!(optional_password("   "), None);
        assert_eq!(
            optional_password("  spaced pass  "),
            Some("  spaced pass  ".to_string())
        );
        assert_eq!(blank_to_none("  spaced pass  "), Some("spaced pass".to_string()));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("25"), Ok(Decimal::new(2500, 2)));
        assert_eq!(parse_amount("$1,000.50"), Ok(Decimal::new(100050, 2)));
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-3").is_err());
        assert!(parse_amount("ten").is_err());
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            parse_date("Date", "2030-02-01"),
            Ok(NaiveDate::from_ymd_opt(2030, 2, 1).unwrap())
        );
        assert!(parse_date("Date", "02/01/2030").is_err());
        assert_eq!(parse_optional_date("Date", " "), Ok(None));

        let dt = parse_datetime("Start", "2030-02-01T09:30").unwrap();
        assert_eq!(datetime_input(&dt), "2030-02-01T09:30");
        assert_eq!(datetime_display(&dt), "Feb 1, 2030 9:30 AM");
        assert!(parse_datetime("Start", "tomorrow").is_err());
    }

    #[test]
    fn test_numbers_and_flags() {
        assert_eq!(parse_i32("Score", " 7 "), Ok(7));
        assert!(parse_i32("Score", "7.5").is_err());
        assert_eq!(parse_optional_i32("Capacity", ""), Ok(None));
        assert!(checkbox("on"));
        assert!(!checkbox(""));
    }

    #[test]
    fn test_pairs() {
        let pairs = vec![
            ("event_schedule_id".to_string(), "4".to_string()),
            ("participant_ids".to_string(), "1".to_string()),
            ("participant_ids".to_string(), "x".to_string()),
            ("participant_ids".to_string(), "3".to_string()),
        ];
        assert_eq!(pair_value(&pairs, "event_schedule_id"), Some("4"));
        assert_eq!(pair_ids(&pairs, "participant_ids"), vec![1, 3]);
        assert!(pair_value(&pairs, "missing").is_none());
    }
}
