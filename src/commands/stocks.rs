// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{MarketError, MarketResult};
use crate::models::{Role, Stock};
use crate::utils::{
    fmt_money, maybe_print_json, optional_text, parse_count, parse_decimal, parse_id,
    pretty_table, require_role, require_session, validate_len, validate_price, validate_shares,
    validate_symbol,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(conn, sub)?,
        Some(("show", sub)) => show(conn, sub)?,
        Some(("create", sub)) => create(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data = marketplace(conn)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        println!("{}", stock_table(&data));
    }
    Ok(())
}

pub fn stock_table(stocks: &[Stock]) -> comfy_table::Table {
    let rows = stocks
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.symbol.clone(),
                s.name.clone(),
                s.sector.clone(),
                fmt_money(&s.price),
                format!("{} / {}", s.available_shares, s.total_shares),
            ]
        })
        .collect();
    pretty_table(
        &["ID", "Symbol", "Name", "Sector", "Price", "Available"],
        rows,
    )
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = parse_id(sub.get_one::<String>("id").unwrap())?;
    let stock = stock_by_id(conn, id)?;
    if maybe_print_json(sub.get_flag("json"), false, &stock)? {
        return Ok(());
    }
    let company: String = conn.query_row(
        "SELECT name FROM companies WHERE id=?1",
        params![stock.company_id],
        |r| r.get(0),
    )?;
    println!("{} ({})", stock.name, stock.symbol);
    println!("Company:   {}", company);
    println!("Sector:    {}", stock.sector);
    println!("Price:     {}", fmt_money(&stock.price));
    println!(
        "Available: {} of {} shares",
        stock.available_shares, stock.total_shares
    );
    if let Some(d) = &stock.description {
        println!();
        println!("{}", d);
    }
    Ok(())
}

fn create(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let actor = require_session(conn)?;
    let form = StockForm {
        company_id: parse_id(sub.get_one::<String>("company").unwrap())?,
        name: sub.get_one::<String>("name").unwrap().to_string(),
        symbol: sub.get_one::<String>("symbol").unwrap().to_string(),
        price: parse_decimal(sub.get_one::<String>("price").unwrap())?,
        total_shares: parse_count(sub.get_one::<String>("shares").unwrap())?,
        sector: sub.get_one::<String>("sector").unwrap().to_string(),
        description: optional_text(sub.get_one::<String>("description").map(|s| s.as_str())),
    };
    let stock = create_stock(conn, actor, &form)?;
    println!(
        "Listed {} ({}) with {} shares at {}",
        stock.name,
        stock.symbol,
        stock.total_shares,
        fmt_money(&stock.price)
    );
    Ok(())
}

pub fn stock_by_id(conn: &Connection, id: i64) -> MarketResult<Stock> {
    let sql = format!("SELECT {} FROM stocks WHERE id=?1", Stock::COLUMNS);
    conn.query_row(&sql, params![id], Stock::from_row)
        .optional()?
        .ok_or_else(|| MarketError::not_found("Stock", id))
}

/// Stocks that still have shares for sale, newest first.
pub fn marketplace(conn: &Connection) -> MarketResult<Vec<Stock>> {
    let sql = format!(
        "SELECT {} FROM stocks WHERE available_shares > 0 ORDER BY created_at DESC, id DESC",
        Stock::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], Stock::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct StockForm {
    pub company_id: i64,
    pub name: String,
    pub symbol: String,
    pub price: Decimal,
    pub total_shares: i64,
    pub sector: String,
    pub description: Option<String>,
}

/// Admin listing of a stock without a prior request.
pub fn create_stock(conn: &Connection, actor: i64, form: &StockForm) -> MarketResult<Stock> {
    require_role(conn, actor, Role::Admin)?;
    let name = validate_len("Name", &form.name, 1, 100)?;
    let symbol = validate_symbol(&form.symbol, 1, 10)?;
    let price = validate_price(form.price)?;
    let total = validate_shares(form.total_shares)?;
    let sector = validate_len("Sector", &form.sector, 2, 50)?;
    let description = match form.description.as_deref() {
        Some(d) => Some(validate_len("Description", d, 0, 2000)?),
        None => None,
    };

    let approved: Option<bool> = conn
        .query_row(
            "SELECT approved FROM companies WHERE id=?1",
            params![form.company_id],
            |r| r.get(0),
        )
        .optional()?;
    match approved {
        None => return Err(MarketError::not_found("Company", form.company_id)),
        Some(false) => {
            return Err(MarketError::Validation(
                "The company must be approved before stocks can be listed".into(),
            ));
        }
        Some(true) => {}
    }

    let id = insert_stock(
        conn,
        form.company_id,
        &name,
        &symbol,
        price,
        total,
        &sector,
        description.as_deref(),
    )?;
    info!(stock_id = id, %symbol, total, "stock listed by admin");
    stock_by_id(conn, id)
}

/// Inserts a fresh stock with its whole float available.
#[allow(clippy::too_many_arguments)]
pub(crate) fn insert_stock(
    conn: &Connection,
    company_id: i64,
    name: &str,
    symbol: &str,
    price: Decimal,
    total_shares: i64,
    sector: &str,
    description: Option<&str>,
) -> MarketResult<i64> {
    conn.execute(
        "INSERT INTO stocks(company_id, name, symbol, price, total_shares, available_shares, sector, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7)",
        params![
            company_id,
            name,
            symbol,
            price.to_string(),
            total_shares,
            sector,
            description
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
