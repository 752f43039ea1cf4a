// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::MarketResult;
use crate::utils::{
    decimal_col, fmt_money, line_value, maybe_print_json, pretty_table, require_session,
};
use anyhow::Result;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("mine", sub)) => mine(conn, sub)?,
        Some(("public", sub)) => public(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn mine(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = require_session(conn)?;
    let data = holdings(conn, user)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        return Ok(());
    }
    println!("{}", holdings_table(&data));
    let invested: Decimal = data.iter().map(|h| h.total_amount).sum();
    let value: Decimal = data.iter().map(|h| h.current_value).sum();
    println!(
        "Invested {}  Value {}  Gain {}",
        fmt_money(&invested),
        fmt_money(&value),
        fmt_money(&(value - invested))
    );
    Ok(())
}

fn public(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = require_session(conn)?;
    let mut data = public_portfolios(conn, user)?;
    if let Some(q) = sub
        .get_one::<String>("search")
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
    {
        data.retain(|p| {
            p.display_name.to_lowercase().contains(&q) || p.email.to_lowercase().contains(&q)
        });
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|p| {
                vec![
                    p.display_name.clone(),
                    p.holdings.to_string(),
                    fmt_money(&p.total_value),
                    fmt_money(&p.total_gain),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Investor", "Holdings", "Value", "Gain"], rows)
        );
    }
    Ok(())
}

/// One investment joined with the stock's current price.
#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub investment_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub shares: i64,
    pub price_per_share: Decimal,
    pub total_amount: Decimal,
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub gain: Decimal,
    pub created_at: String,
}

pub fn holdings_table(data: &[Holding]) -> comfy_table::Table {
    let rows = data
        .iter()
        .map(|h| {
            vec![
                h.created_at.clone(),
                h.symbol.clone(),
                h.name.clone(),
                h.shares.to_string(),
                fmt_money(&h.price_per_share),
                fmt_money(&h.total_amount),
                fmt_money(&h.current_value),
                fmt_money(&h.gain),
            ]
        })
        .collect();
    pretty_table(
        &[
            "Date", "Symbol", "Name", "Shares", "Paid/share", "Paid", "Value", "Gain",
        ],
        rows,
    )
}

/// The investor's purchases, newest first.
pub fn holdings(conn: &Connection, investor_id: i64) -> MarketResult<Vec<Holding>> {
    let mut stmt = conn.prepare_cached(
        "SELECT i.id, i.stock_id, s.symbol, s.name, s.sector, i.shares, i.price_per_share,
                i.total_amount, s.price, i.created_at
         FROM investments i JOIN stocks s ON s.id = i.stock_id
         WHERE i.investor_id = ?1
         ORDER BY i.created_at DESC, i.id DESC",
    )?;
    let mut cur = stmt.query(params![investor_id])?;
    let mut out = Vec::new();
    while let Some(r) = cur.next()? {
        let shares: i64 = r.get(5)?;
        let total_amount = decimal_col(r, 7)?;
        let current_price = decimal_col(r, 8)?;
        let current_value = line_value(current_price, shares)?;
        out.push(Holding {
            investment_id: r.get(0)?,
            stock_id: r.get(1)?,
            symbol: r.get(2)?,
            name: r.get(3)?,
            sector: r.get(4)?,
            shares,
            price_per_share: decimal_col(r, 6)?,
            total_amount,
            current_price,
            current_value,
            gain: current_value - total_amount,
            created_at: r.get(9)?,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicPortfolio {
    pub user_id: i64,
    pub display_name: String,
    pub email: String,
    pub holdings: usize,
    pub total_value: Decimal,
    pub total_gain: Decimal,
}

/// Every other investor's holdings, valued at current prices and grouped
/// per investor, largest portfolio first.
pub fn public_portfolios(conn: &Connection, viewer: i64) -> MarketResult<Vec<PublicPortfolio>> {
    let mut stmt = conn.prepare_cached(
        "SELECT i.investor_id, p.email, p.full_name, i.shares, i.total_amount, s.price
         FROM investments i
         JOIN stocks s ON s.id = i.stock_id
         JOIN profiles p ON p.id = i.investor_id
         WHERE i.investor_id != ?1",
    )?;
    let mut cur = stmt.query(params![viewer])?;
    let mut grouped: BTreeMap<i64, PublicPortfolio> = BTreeMap::new();
    while let Some(r) = cur.next()? {
        let user_id: i64 = r.get(0)?;
        let email: String = r.get(1)?;
        let full_name: Option<String> = r.get(2)?;
        let shares: i64 = r.get(3)?;
        let paid = decimal_col(r, 4)?;
        let value = line_value(decimal_col(r, 5)?, shares)?;

        let entry = grouped.entry(user_id).or_insert_with(|| PublicPortfolio {
            user_id,
            display_name: full_name.unwrap_or_else(|| email.clone()),
            email,
            holdings: 0,
            total_value: Decimal::ZERO,
            total_gain: Decimal::ZERO,
        });
        entry.holdings += 1;
        entry.total_value += value;
        entry.total_gain += value - paid;
    }
    let mut out: Vec<PublicPortfolio> = grouped.into_values().collect();
    out.sort_by(|a, b| b.total_value.cmp(&a.total_value));
    Ok(out)
}
