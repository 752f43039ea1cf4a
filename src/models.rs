// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::MarketError;
use crate::utils::decimal_col;
use rusqlite::Row;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Investor,
    Company,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Investor => "investor",
            Role::Company => "company",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "investor" => Ok(Role::Investor),
            "company" => Ok(Role::Company),
            other => Err(MarketError::Validation(format!("Unknown role '{}'", other))),
        }
    }
}

/// Review status shared by stock requests and company applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(MarketError::Validation(format!(
                "Unknown request status '{}'",
                other
            ))),
        }
    }
}

fn parsed_col<T>(r: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = MarketError>,
{
    let raw: String = r.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: String,
}

impl Profile {
    pub(crate) const COLUMNS: &'static str = "id, email, full_name, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Profile {
            id: r.get(0)?,
            email: r.get(1)?,
            full_name: r.get(2)?,
            created_at: r.get(3)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub sector: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub approved: bool,
    pub approved_at: Option<String>,
    pub approved_by: Option<i64>,
    pub created_at: String,
}

impl Company {
    pub(crate) const COLUMNS: &'static str = "id, owner_id, name, sector, description, website, approved, approved_at, approved_by, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Company {
            id: r.get(0)?,
            owner_id: r.get(1)?,
            name: r.get(2)?,
            sector: r.get(3)?,
            description: r.get(4)?,
            website: r.get(5)?,
            approved: r.get(6)?,
            approved_at: r.get(7)?,
            approved_by: r.get(8)?,
            created_at: r.get(9)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyApplication {
    pub id: i64,
    pub user_id: i64,
    pub company_name: String,
    pub org_number: Option<String>,
    pub contact_person: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub sector: String,
    pub description: String,
    pub status: RequestStatus,
    pub rejection_reason: Option<String>,
    pub reviewed_at: Option<String>,
    pub reviewed_by: Option<i64>,
    pub created_at: String,
}

impl CompanyApplication {
    pub(crate) const COLUMNS: &'static str = "id, user_id, company_name, org_number, contact_person, email, phone, website, sector, description, status, rejection_reason, reviewed_at, reviewed_by, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CompanyApplication {
            id: r.get(0)?,
            user_id: r.get(1)?,
            company_name: r.get(2)?,
            org_number: r.get(3)?,
            contact_person: r.get(4)?,
            email: r.get(5)?,
            phone: r.get(6)?,
            website: r.get(7)?,
            sector: r.get(8)?,
            description: r.get(9)?,
            status: parsed_col(r, 10)?,
            rejection_reason: r.get(11)?,
            reviewed_at: r.get(12)?,
            reviewed_by: r.get(13)?,
            created_at: r.get(14)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: i64,
    pub application_id: i64,
    pub user_id: i64,
    pub message: String,
    pub resolved: bool,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<i64>,
    pub created_at: String,
}

impl Complaint {
    pub(crate) const COLUMNS: &'static str =
        "id, application_id, user_id, message, resolved, resolved_at, resolved_by, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Complaint {
            id: r.get(0)?,
            application_id: r.get(1)?,
            user_id: r.get(2)?,
            message: r.get(3)?,
            resolved: r.get(4)?,
            resolved_at: r.get(5)?,
            resolved_by: r.get(6)?,
            created_at: r.get(7)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRequest {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub symbol: String,
    pub price: Decimal,
    pub total_shares: i64,
    pub sector: String,
    pub description: Option<String>,
    pub status: RequestStatus,
    pub reviewed_at: Option<String>,
    pub reviewed_by: Option<i64>,
    pub created_at: String,
}

impl StockRequest {
    pub(crate) const COLUMNS: &'static str = "id, company_id, name, symbol, price, total_shares, sector, description, status, reviewed_at, reviewed_by, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StockRequest {
            id: r.get(0)?,
            company_id: r.get(1)?,
            name: r.get(2)?,
            symbol: r.get(3)?,
            price: decimal_col(r, 4)?,
            total_shares: r.get(5)?,
            sector: r.get(6)?,
            description: r.get(7)?,
            status: parsed_col(r, 8)?,
            reviewed_at: r.get(9)?,
            reviewed_by: r.get(10)?,
            created_at: r.get(11)?,
        })
    }
}

/// A listed stock as last read from the store.
///
/// Values held by callers are snapshots; `available_shares` may already be
/// lower in the store by the time a purchase commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub symbol: String,
    pub price: Decimal,
    pub total_shares: i64,
    pub available_shares: i64,
    pub sector: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl Stock {
    pub(crate) const COLUMNS: &'static str = "id, company_id, name, symbol, price, total_shares, available_shares, sector, description, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Stock {
            id: r.get(0)?,
            company_id: r.get(1)?,
            name: r.get(2)?,
            symbol: r.get(3)?,
            price: decimal_col(r, 4)?,
            total_shares: r.get(5)?,
            available_shares: r.get(6)?,
            sector: r.get(7)?,
            description: r.get(8)?,
            created_at: r.get(9)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: i64,
    pub investor_id: i64,
    pub stock_id: i64,
    pub shares: i64,
    pub price_per_share: Decimal,
    pub total_amount: Decimal,
    pub created_at: String,
}

impl Investment {
    pub(crate) const COLUMNS: &'static str =
        "id, investor_id, stock_id, shares, price_per_share, total_amount, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Investment {
            id: r.get(0)?,
            investor_id: r.get(1)?,
            stock_id: r.get(2)?,
            shares: r.get(3)?,
            price_per_share: decimal_col(r, 4)?,
            total_amount: decimal_col(r, 5)?,
            created_at: r.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("COMPANY".parse::<Role>().unwrap(), Role::Company);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn status_round_trips_through_its_column_text() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Investor).unwrap(), "\"investor\"");
    }
}
