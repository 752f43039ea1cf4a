// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Share purchases.
//!
//! The availability decrement is a conditional update inside an immediate
//! transaction together with the investment insert. A purchase computed from
//! a stale snapshot either still fits in what is left or is rejected; the
//! counter can never go below zero and always equals total shares minus the
//! sum of recorded investments.

use crate::commands::stocks::stock_by_id;
use crate::error::{MarketError, MarketResult};
use crate::models::{Investment, Stock};
use crate::utils::{fmt_money, line_value, parse_count, parse_id, require_session};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{info, warn};

pub fn handle(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let investor = require_session(conn)?;
    let stock_id = parse_id(sub.get_one::<String>("stock").unwrap())?;
    let shares = parse_count(sub.get_one::<String>("shares").unwrap())?;

    let snapshot = stock_by_id(conn, stock_id)?;
    let inv = purchase(conn, &snapshot, shares, investor)?;
    println!(
        "Bought {} shares of {} at {} (total {})",
        inv.shares,
        snapshot.symbol,
        fmt_money(&inv.price_per_share),
        fmt_money(&inv.total_amount)
    );
    Ok(())
}

/// Buys `requested_shares` of the stock described by `snapshot`.
///
/// The price is taken from the snapshot the investor saw. Availability is
/// checked against the snapshot first and then again by the store at commit.
pub fn purchase(
    conn: &mut Connection,
    snapshot: &Stock,
    requested_shares: i64,
    investor_id: i64,
) -> MarketResult<Investment> {
    if requested_shares <= 0 {
        return Err(MarketError::Validation(format!(
            "Choose between 1 and {} shares",
            snapshot.available_shares
        )));
    }
    if requested_shares > snapshot.available_shares {
        return Err(MarketError::InsufficientShares {
            symbol: snapshot.symbol.clone(),
            requested: requested_shares,
            available: snapshot.available_shares,
        });
    }

    let price = snapshot.price;
    let total_amount = line_value(price, requested_shares)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let updated = tx.execute(
        "UPDATE stocks
         SET available_shares = available_shares - ?1, updated_at = datetime('now')
         WHERE id = ?2 AND available_shares >= ?1",
        params![requested_shares, snapshot.id],
    )?;
    if updated == 0 {
        let available: Option<i64> = tx
            .query_row(
                "SELECT available_shares FROM stocks WHERE id=?1",
                params![snapshot.id],
                |r| r.get(0),
            )
            .optional()?;
        return Err(match available {
            None => MarketError::not_found("Stock", snapshot.id),
            Some(available) => {
                warn!(
                    stock_id = snapshot.id,
                    requested = requested_shares,
                    available,
                    "stale snapshot, purchase rejected"
                );
                MarketError::InsufficientShares {
                    symbol: snapshot.symbol.clone(),
                    requested: requested_shares,
                    available,
                }
            }
        });
    }

    tx.execute(
        "INSERT INTO investments(investor_id, stock_id, shares, price_per_share, total_amount)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            investor_id,
            snapshot.id,
            requested_shares,
            price.to_string(),
            total_amount.to_string()
        ],
    )?;
    let id = tx.last_insert_rowid();
    let sql = format!("SELECT {} FROM investments WHERE id=?1", Investment::COLUMNS);
    let investment = tx.query_row(&sql, params![id], Investment::from_row)?;
    tx.commit()?;

    info!(
        investment_id = id,
        stock_id = snapshot.id,
        investor_id,
        shares = requested_shares,
        total = %total_amount,
        "purchase recorded"
    );
    Ok(investment)
}
