// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Role;
use crate::utils::{require_role, require_session};
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("investments", sub)) => export_investments(conn, sub),
        _ => Ok(()),
    }
}

fn export_investments(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let actor = require_session(conn)?;
    require_role(conn, actor, Role::Admin)?;
    let fmt = sub.get_one::<String>("format").unwrap().trim().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap().trim();

    let mut stmt = conn.prepare(
        "SELECT i.created_at, p.email, s.symbol, i.shares, i.price_per_share, i.total_amount
         FROM investments i
         JOIN profiles p ON p.id = i.investor_id
         JOIN stocks s ON s.id = i.stock_id
         ORDER BY i.created_at, i.id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, i64>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
        ))
    })?;

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "created_at",
                "investor",
                "symbol",
                "shares",
                "price_per_share",
                "total_amount",
            ])?;
            for row in rows {
                let (ts, email, sym, shares, px, total) = row?;
                wtr.write_record([ts, email, sym, shares.to_string(), px, total])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let mut items = Vec::new();
            for row in rows {
                let (ts, email, sym, shares, px, total) = row?;
                items.push(json!({
                    "created_at": ts, "investor": email, "symbol": sym, "shares": shares,
                    "price_per_share": px, "total_amount": total
                }));
            }
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
        other => return Err(anyhow!("Unknown format: {} (use csv|json)", other)),
    }
    println!("Exported investments to {}", out);
    Ok(())
}
