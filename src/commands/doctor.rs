// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::MarketResult;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: &'static str,
    pub detail: String,
}

pub fn handle(conn: &Connection) -> Result<()> {
    let issues = find_issues(conn)?;
    if issues.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.kind.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Checks every stock's float against the investments recorded for it.
pub fn find_issues(conn: &Connection) -> MarketResult<Vec<Issue>> {
    let mut issues = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT s.id, s.symbol, s.total_shares, s.available_shares,
                COALESCE((SELECT SUM(i.shares) FROM investments i WHERE i.stock_id = s.id), 0)
         FROM stocks s ORDER BY s.id",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let symbol: String = r.get(1)?;
        let total: i64 = r.get(2)?;
        let available: i64 = r.get(3)?;
        let sold: i64 = r.get(4)?;

        // 1) Float outside [0, total]
        if available < 0 || available > total {
            issues.push(Issue {
                kind: "available_out_of_range",
                detail: format!("{} (#{}) has {} of {}", symbol, id, available, total),
            });
        }
        // 2) Float does not match what was sold
        if available != total - sold {
            issues.push(Issue {
                kind: "float_mismatch",
                detail: format!(
                    "{} (#{}) available {} but {} - {} sold = {}",
                    symbol,
                    id,
                    available,
                    total,
                    sold,
                    total - sold
                ),
            });
        }
    }

    // 3) Approved requests without any stock under the same symbol
    let mut stmt2 = conn.prepare(
        "SELECT r.id, r.symbol FROM stock_requests r
         WHERE r.status='approved'
           AND NOT EXISTS (SELECT 1 FROM stocks s WHERE s.company_id=r.company_id AND s.symbol=r.symbol)",
    )?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let id: i64 = r.get(0)?;
        let symbol: String = r.get(1)?;
        issues.push(Issue {
            kind: "approved_request_without_stock",
            detail: format!("request #{} ({})", id, symbol),
        });
    }

    Ok(issues)
}
