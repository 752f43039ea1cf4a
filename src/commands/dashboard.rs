// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Role-gated dashboard.
//!
//! The router starts in `Loading`, resolves once against the session and the
//! user's role row, and then stays in the resulting state. Switching views
//! needs a new login.

use crate::commands::applications::{
    ApplicationSummary, application_summaries, latest_application, summary_table,
};
use crate::commands::companies::owned_company;
use crate::commands::portfolio::{Holding, holdings, holdings_table};
use crate::commands::requests::{company_requests, request_table, requests_by_status};
use crate::commands::stocks::{marketplace, stock_table};
use crate::error::MarketResult;
use crate::models::{Company, CompanyApplication, RequestStatus, Role, Stock, StockRequest};
use crate::utils::{
    current_user, maybe_print_json, pretty_table, require_role, require_session, role_of,
};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardState {
    Loading,
    Unauthenticated,
    Admin,
    Investor,
    Company,
}

impl From<Role> for DashboardState {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => DashboardState::Admin,
            Role::Investor => DashboardState::Investor,
            Role::Company => DashboardState::Company,
        }
    }
}

impl DashboardState {
    /// Leaves `Loading` with a single role lookup; other states are terminal.
    pub fn resolve(self, conn: &Connection) -> MarketResult<Self> {
        if self != DashboardState::Loading {
            return Ok(self);
        }
        let Some(user) = current_user(conn)? else {
            return Ok(DashboardState::Unauthenticated);
        };
        let next = match role_of(conn, user)? {
            Some(role) => DashboardState::from(role),
            None => {
                warn!(user_id = user, "no role row, showing investor view");
                DashboardState::Investor
            }
        };
        debug!(user_id = user, state = ?next, "dashboard resolved");
        Ok(next)
    }
}

/// Resolves the dashboard for the current session.
pub fn route(conn: &Connection) -> MarketResult<DashboardState> {
    DashboardState::Loading.resolve(conn)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_stocks: i64,
    pub pending_requests: i64,
    pub total_investments: i64,
    pub pending_applications: i64,
}

pub fn admin_stats(conn: &Connection) -> MarketResult<AdminStats> {
    let count = |sql: &str| -> MarketResult<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    Ok(AdminStats {
        total_stocks: count("SELECT COUNT(*) FROM stocks")?,
        pending_requests: count("SELECT COUNT(*) FROM stock_requests WHERE status='pending'")?,
        total_investments: count("SELECT COUNT(*) FROM investments")?,
        pending_applications: count(
            "SELECT COUNT(*) FROM company_applications WHERE status='pending'",
        )?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub stats: AdminStats,
    pub pending_requests: Vec<StockRequest>,
    pub pending_applications: Vec<ApplicationSummary>,
}

pub fn admin_overview(conn: &Connection) -> MarketResult<AdminOverview> {
    Ok(AdminOverview {
        stats: admin_stats(conn)?,
        pending_requests: requests_by_status(conn, Some(RequestStatus::Pending))?,
        pending_applications: application_summaries(conn, Some(RequestStatus::Pending))?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestorOverview {
    pub marketplace: Vec<Stock>,
    pub investments: Vec<Holding>,
}

pub fn investor_overview(conn: &Connection, user_id: i64) -> MarketResult<InvestorOverview> {
    Ok(InvestorOverview {
        marketplace: marketplace(conn)?,
        investments: holdings(conn, user_id)?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyOverview {
    pub company: Option<Company>,
    pub application: Option<CompanyApplication>,
    pub requests: Vec<StockRequest>,
}

pub fn company_overview(conn: &Connection, user_id: i64) -> MarketResult<CompanyOverview> {
    let company = owned_company(conn, user_id)?;
    let requests = match &company {
        Some(c) => company_requests(conn, c.id)?,
        None => Vec::new(),
    };
    Ok(CompanyOverview {
        company,
        application: latest_application(conn, user_id)?,
        requests,
    })
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let json = m.get_flag("json");
    let state = route(conn)?;
    match state {
        DashboardState::Loading => println!("Loading..."),
        DashboardState::Unauthenticated => {
            println!("Not logged in; run `minibors auth login` or `minibors auth signup`");
        }
        DashboardState::Admin => {
            let view = admin_overview(conn)?;
            if maybe_print_json(json, false, &view)? {
                return Ok(());
            }
            print_stats(&view.stats);
            println!("Pending stock requests");
            println!("{}", request_table(&view.pending_requests));
            println!("Pending company applications");
            println!("{}", summary_table(&view.pending_applications));
        }
        DashboardState::Investor => {
            let user = current_user(conn)?.unwrap_or_default();
            let view = investor_overview(conn, user)?;
            if maybe_print_json(json, false, &view)? {
                return Ok(());
            }
            println!("Marketplace");
            println!("{}", stock_table(&view.marketplace));
            println!("My investments");
            println!("{}", holdings_table(&view.investments));
        }
        DashboardState::Company => {
            let user = current_user(conn)?.unwrap_or_default();
            let view = company_overview(conn, user)?;
            if maybe_print_json(json, false, &view)? {
                return Ok(());
            }
            print_company(&view);
        }
    }
    Ok(())
}

pub fn handle_stats(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let actor = require_session(conn)?;
    require_role(conn, actor, Role::Admin)?;
    let stats = admin_stats(conn)?;
    if !maybe_print_json(m.get_flag("json"), false, &stats)? {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &AdminStats) {
    let rows = vec![
        vec!["Stocks".to_string(), stats.total_stocks.to_string()],
        vec![
            "Pending requests".to_string(),
            stats.pending_requests.to_string(),
        ],
        vec![
            "Investments".to_string(),
            stats.total_investments.to_string(),
        ],
        vec![
            "Pending applications".to_string(),
            stats.pending_applications.to_string(),
        ],
    ];
    println!("{}", pretty_table(&["Metric", "Count"], rows));
}

fn print_company(view: &CompanyOverview) {
    match (&view.company, &view.application) {
        (Some(c), _) => {
            let state = if c.approved { "approved" } else { "awaiting approval" };
            println!("{} ({}), {}", c.name, c.sector, state);
            println!("Stock requests");
            println!("{}", request_table(&view.requests));
        }
        (None, Some(app)) => {
            println!(
                "Application {} for {}: {}",
                app.id, app.company_name, app.status
            );
            if let Some(reason) = &app.rejection_reason {
                println!("Reason: {}", reason);
            }
        }
        (None, None) => println!("No company profile yet; apply with `minibors company apply`"),
    }
}
