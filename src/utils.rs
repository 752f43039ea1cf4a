// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{MarketError, MarketResult};
use crate::models::Role;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

pub const CURRENCY: &str = "NOK";

const SESSION_KEY: &str = "session_user";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email regex"));
static SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]+$").expect("static symbol regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("static url regex"));
static PIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").expect("static pin regex"));

pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn parse_id(s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid id '{}'", s))
}

pub fn parse_count(s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid share count '{}', expected a whole number", s))
}

/// Reads a TEXT column holding a decimal amount.
pub fn decimal_col(r: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = r.get(idx)?;
    raw.parse::<Decimal>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub fn fmt_money(d: &Decimal) -> String {
    format!("{:.2} {}", d, CURRENCY)
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Hex SHA-256 of `secret` followed by `salt`.
pub fn hash_secret(secret: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

// Field validation

/// Trims `value` and checks its length in characters.
pub fn validate_len(field: &str, value: &str, min: usize, max: usize) -> MarketResult<String> {
    let v = value.trim();
    let n = v.chars().count();
    if n < min {
        return Err(MarketError::Validation(format!(
            "{} must be at least {} characters",
            field, min
        )));
    }
    if n > max {
        return Err(MarketError::Validation(format!(
            "{} cannot be more than {} characters",
            field, max
        )));
    }
    Ok(v.to_string())
}

pub fn validate_email(value: &str) -> MarketResult<String> {
    let v = value.trim().to_lowercase();
    if !EMAIL_RE.is_match(&v) {
        return Err(MarketError::Validation(format!(
            "Invalid email address '{}'",
            value.trim()
        )));
    }
    Ok(v)
}

/// Upper-cases and checks a ticker symbol of `min..=max` letters and digits.
pub fn validate_symbol(value: &str, min: usize, max: usize) -> MarketResult<String> {
    let v = validate_len("Symbol", &value.to_uppercase(), min, max)?;
    if !SYMBOL_RE.is_match(&v) {
        return Err(MarketError::Validation(
            "Symbol may only contain capital letters and digits".into(),
        ));
    }
    Ok(v)
}

/// Empty input means "no website".
pub fn validate_website(value: Option<&str>) -> MarketResult<Option<String>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(url) if URL_RE.is_match(url) => Ok(Some(url.to_string())),
        Some(url) => Err(MarketError::Validation(format!("Invalid URL '{}'", url))),
    }
}

/// Highest price per share accepted anywhere a stock is listed.
pub const MAX_PRICE: i64 = 1_000_000;
/// Highest share count a single stock can issue.
pub const MAX_SHARES: i64 = 1_000_000_000;

pub fn validate_price(price: Decimal) -> MarketResult<Decimal> {
    if price <= Decimal::ZERO {
        return Err(MarketError::Validation("Price must be positive".into()));
    }
    if price > Decimal::from(MAX_PRICE) {
        return Err(MarketError::Validation(format!(
            "Price cannot exceed {}",
            MAX_PRICE
        )));
    }
    Ok(price)
}

pub fn validate_shares(total: i64) -> MarketResult<i64> {
    if total <= 0 {
        return Err(MarketError::Validation(
            "Number of shares must be positive".into(),
        ));
    }
    if total > MAX_SHARES {
        return Err(MarketError::Validation(format!(
            "Number of shares cannot exceed {}",
            MAX_SHARES
        )));
    }
    Ok(total)
}

/// `price × shares`, or a validation error when the product does not fit.
pub fn line_value(price: Decimal, shares: i64) -> MarketResult<Decimal> {
    price.checked_mul(Decimal::from(shares)).ok_or_else(|| {
        MarketError::Validation(format!(
            "{} shares at {} is too large an amount",
            shares, price
        ))
    })
}

pub fn validate_pin(pin: &str) -> MarketResult<String> {
    let p = pin.trim();
    if !PIN_RE.is_match(p) {
        return Err(MarketError::Validation(
            "PIN must be exactly 6 digits".into(),
        ));
    }
    Ok(p.to_string())
}

/// Blank optional text collapses to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Lookups

pub fn id_for_profile(conn: &Connection, email: &str) -> MarketResult<i64> {
    let email = email.trim().to_lowercase();
    conn.query_row(
        "SELECT id FROM profiles WHERE email=?1",
        params![&email],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| MarketError::not_found("Profile", email))
}

pub fn role_of(conn: &Connection, user_id: i64) -> MarketResult<Option<Role>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT role FROM user_roles WHERE user_id=?1",
            params![user_id],
            |r| r.get(0),
        )
        .optional()?;
    raw.map(|s| s.parse::<Role>()).transpose()
}

/// Fails unless `user_id` holds `required`.
pub fn require_role(conn: &Connection, user_id: i64, required: Role) -> MarketResult<()> {
    let actual = role_of(conn, user_id)?.unwrap_or(Role::Investor);
    if actual != required {
        return Err(MarketError::Forbidden {
            required,
            actual,
            user_id,
        });
    }
    Ok(())
}

/// Sets the single role row for a user, replacing any previous role.
pub fn assign_role(conn: &Connection, user_id: i64, role: Role) -> MarketResult<()> {
    conn.execute(
        "INSERT INTO user_roles(user_id, role) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET role=excluded.role",
        params![user_id, role.as_str()],
    )?;
    Ok(())
}

// Session

pub fn current_user(conn: &Connection) -> MarketResult<Option<i64>> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key=?1",
            params![SESSION_KEY],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v.and_then(|s| s.parse::<i64>().ok()))
}

pub fn require_session(conn: &Connection) -> MarketResult<i64> {
    current_user(conn)?.ok_or(MarketError::NotAuthenticated)
}

pub fn set_session(conn: &Connection, user_id: i64) -> MarketResult<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![SESSION_KEY, user_id.to_string()],
    )?;
    Ok(())
}

pub fn clear_session(conn: &Connection) -> MarketResult<()> {
    conn.execute("DELETE FROM settings WHERE key=?1", params![SESSION_KEY])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_uppercased_and_checked() {
        assert_eq!(validate_symbol(" nrd1 ", 1, 10).unwrap(), "NRD1");
        assert!(validate_symbol("NR-D", 1, 10).is_err());
        assert!(validate_symbol("TOOLONGSYMBOL", 1, 10).is_err());
    }

    #[test]
    fn website_accepts_blank_and_rejects_garbage() {
        assert_eq!(validate_website(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_website(Some("https://nordlys.no")).unwrap(),
            Some("https://nordlys.no".to_string())
        );
        assert!(validate_website(Some("nordlys")).is_err());
    }

    #[test]
    fn pin_needs_six_digits() {
        assert!(validate_pin("123456").is_ok());
        assert!(validate_pin("12345").is_err());
        assert!(validate_pin("12a456").is_err());
    }

    #[test]
    fn hash_is_salted() {
        let a = hash_secret("123456", "1");
        let b = hash_secret("123456", "2");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert_eq!(validate_len("Name", " Øl ", 2, 100).unwrap(), "Øl");
    }

    #[test]
    fn money_keeps_two_decimals() {
        assert_eq!(fmt_money(&Decimal::new(5000, 0)), "5000.00 NOK");
    }
}
