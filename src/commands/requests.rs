// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Stock requests: a company proposes a listing, an admin approves or rejects.

use crate::commands::companies::owned_company;
use crate::commands::stocks::{insert_stock, stock_by_id};
use crate::error::{MarketError, MarketResult};
use crate::models::{RequestStatus, Role, Stock, StockRequest};
use crate::utils::{
    fmt_money, maybe_print_json, now_ts, parse_count, parse_decimal, parse_id, pretty_table,
    require_role, require_session, role_of, validate_len, validate_price, validate_shares,
    validate_symbol,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rust_decimal::Decimal;
use tracing::info;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("submit", sub)) => submit(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("approve", sub)) => {
            let actor = require_session(conn)?;
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let stock = approve_stock_request(conn, actor, id)?;
            println!(
                "Approved: {} ({}) is now open for investment as stock {}",
                stock.name, stock.symbol, stock.id
            );
        }
        Some(("reject", sub)) => {
            let actor = require_session(conn)?;
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            reject_stock_request(conn, actor, id)?;
            println!("Rejected stock request {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn submit(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = require_session(conn)?;
    let form = StockRequestForm {
        name: sub.get_one::<String>("name").unwrap().to_string(),
        symbol: sub.get_one::<String>("symbol").unwrap().to_string(),
        price: parse_decimal(sub.get_one::<String>("price").unwrap())?,
        total_shares: parse_count(sub.get_one::<String>("shares").unwrap())?,
        sector: sub.get_one::<String>("sector").unwrap().to_string(),
        description: sub
            .get_one::<String>("description")
            .map(|s| s.to_string())
            .unwrap_or_default(),
    };
    let req = submit_stock_request(conn, user, &form)?;
    println!(
        "Request {} for {} sent to admin for approval",
        req.id, req.symbol
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = require_session(conn)?;
    let status = sub
        .get_one::<String>("status")
        .map(|s| s.parse::<RequestStatus>())
        .transpose()?;
    let data = match role_of(conn, user)? {
        Some(Role::Admin) => requests_by_status(conn, status)?,
        _ => {
            let company = owned_company(conn, user)?
                .ok_or_else(|| MarketError::Validation("You have no company profile".into()))?;
            company_requests(conn, company.id)?
                .into_iter()
                .filter(|r| status.is_none_or(|s| r.status == s))
                .collect()
        }
    };
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        println!("{}", request_table(&data));
    }
    Ok(())
}

pub fn request_table(data: &[StockRequest]) -> comfy_table::Table {
    let rows = data
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.symbol.clone(),
                r.name.clone(),
                fmt_money(&r.price),
                r.total_shares.to_string(),
                r.sector.clone(),
                r.status.to_string(),
                r.created_at.clone(),
            ]
        })
        .collect();
    pretty_table(
        &["ID", "Symbol", "Name", "Price", "Shares", "Sector", "Status", "Created"],
        rows,
    )
}

pub fn request_by_id(conn: &Connection, id: i64) -> MarketResult<StockRequest> {
    let sql = format!(
        "SELECT {} FROM stock_requests WHERE id=?1",
        StockRequest::COLUMNS
    );
    conn.query_row(&sql, params![id], StockRequest::from_row)
        .optional()?
        .ok_or_else(|| MarketError::not_found("Stock request", id))
}

pub fn requests_by_status(
    conn: &Connection,
    status: Option<RequestStatus>,
) -> MarketResult<Vec<StockRequest>> {
    let mut sql = format!("SELECT {} FROM stock_requests", StockRequest::COLUMNS);
    if status.is_some() {
        sql.push_str(" WHERE status=?1");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = match status {
        Some(s) => stmt.query_map(params![s.as_str()], StockRequest::from_row)?,
        None => stmt.query_map([], StockRequest::from_row)?,
    };
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn company_requests(conn: &Connection, company_id: i64) -> MarketResult<Vec<StockRequest>> {
    let sql = format!(
        "SELECT {} FROM stock_requests WHERE company_id=?1 ORDER BY created_at DESC, id DESC",
        StockRequest::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![company_id], StockRequest::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct StockRequestForm {
    pub name: String,
    pub symbol: String,
    pub price: Decimal,
    pub total_shares: i64,
    pub sector: String,
    pub description: String,
}

/// Files a listing proposal for the caller's approved company.
pub fn submit_stock_request(
    conn: &Connection,
    user_id: i64,
    form: &StockRequestForm,
) -> MarketResult<StockRequest> {
    let company = owned_company(conn, user_id)?.ok_or_else(|| {
        MarketError::Validation("You must create a company profile first".into())
    })?;
    if !company.approved {
        return Err(MarketError::Validation(format!(
            "Company '{}' is not approved yet",
            company.name
        )));
    }
    let name = validate_len("Name", &form.name, 2, 100)?;
    let symbol = validate_symbol(&form.symbol, 2, 10)?;
    let price = validate_price(form.price)?;
    let total = validate_shares(form.total_shares)?;
    let description = validate_len("Description", &form.description, 10, 500)?;
    let sector = validate_len("Sector", &form.sector, 2, 50)?;

    conn.execute(
        "INSERT INTO stock_requests(company_id, name, symbol, price, total_shares, sector, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            company.id,
            &name,
            &symbol,
            price.to_string(),
            total,
            &sector,
            &description
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(request_id = id, company_id = company.id, %symbol, "stock request submitted");
    request_by_id(conn, id)
}

/// Turns a pending request into a live stock with its whole float available.
///
/// The status flip and the stock insert share one transaction, so a request
/// is never approved without its stock and a retry cannot list it twice.
pub fn approve_stock_request(
    conn: &mut Connection,
    actor: i64,
    request_id: i64,
) -> MarketResult<Stock> {
    require_role(conn, actor, Role::Admin)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let req = request_by_id(&tx, request_id)?;
    if req.status != RequestStatus::Pending {
        return Err(MarketError::InvalidState {
            entity: "Stock request",
            id: request_id,
            status: req.status,
        });
    }
    let ts = now_ts();
    tx.execute(
        "UPDATE stock_requests SET status='approved', reviewed_at=?1, reviewed_by=?2, updated_at=?1
         WHERE id=?3 AND status='pending'",
        params![&ts, actor, request_id],
    )?;
    let stock_id = insert_stock(
        &tx,
        req.company_id,
        &req.name,
        &req.symbol,
        req.price,
        req.total_shares,
        &req.sector,
        req.description.as_deref(),
    )?;
    let stock = stock_by_id(&tx, stock_id)?;
    tx.commit()?;
    info!(request_id, stock_id, reviewer = actor, "stock request approved");
    Ok(stock)
}

/// Marks a pending request rejected. Rejecting twice is an error.
pub fn reject_stock_request(conn: &Connection, actor: i64, request_id: i64) -> MarketResult<()> {
    require_role(conn, actor, Role::Admin)?;
    let ts = now_ts();
    let updated = conn.execute(
        "UPDATE stock_requests SET status='rejected', reviewed_at=?1, reviewed_by=?2, updated_at=?1
         WHERE id=?3 AND status='pending'",
        params![&ts, actor, request_id],
    )?;
    if updated == 0 {
        let req = request_by_id(conn, request_id)?;
        return Err(MarketError::InvalidState {
            entity: "Stock request",
            id: request_id,
            status: req.status,
        });
    }
    info!(request_id, reviewer = actor, "stock request rejected");
    Ok(())
}
