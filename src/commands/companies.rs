// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::applications::{self, ApplicationForm, latest_application};
use crate::error::{MarketError, MarketResult};
use crate::models::{Company, RequestStatus, Role};
use crate::utils::{
    assign_role, id_for_profile, maybe_print_json, now_ts, optional_text, pretty_table,
    require_role, require_session, validate_len, validate_website,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("apply", sub)) => {
            let user = require_session(conn)?;
            let opt = |k: &str| sub.get_one::<String>(k).map(|s| s.to_string());
            let form = ApplicationForm {
                company_name: opt("name").unwrap_or_default(),
                org_number: opt("org_number"),
                contact_person: opt("contact").unwrap_or_default(),
                email: opt("email").unwrap_or_default(),
                phone: opt("phone"),
                website: opt("website"),
                sector: opt("sector").unwrap_or_default(),
                description: opt("description").unwrap_or_default(),
            };
            let app = applications::submit_application(conn, user, &form)?;
            println!(
                "Application {} for {} submitted; an administrator will review it",
                app.id, app.company_name
            );
        }
        Some(("status", sub)) => status(conn, sub)?,
        Some(("create", sub)) => {
            let actor = require_session(conn)?;
            let form = CompanyForm {
                owner_email: sub.get_one::<String>("owner").unwrap().to_string(),
                name: sub.get_one::<String>("name").unwrap().to_string(),
                sector: sub.get_one::<String>("sector").unwrap().to_string(),
                description: sub.get_one::<String>("description").map(|s| s.to_string()),
                website: sub.get_one::<String>("website").map(|s| s.to_string()),
            };
            let company = create_company(conn, actor, &form)?;
            println!("Created approved company '{}' ({})", company.name, company.id);
        }
        Some(("list", sub)) => {
            let data = all_companies(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|c| {
                        vec![
                            c.id.to_string(),
                            c.name.clone(),
                            c.sector.clone(),
                            if c.approved { "yes" } else { "no" }.to_string(),
                            c.website.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Name", "Sector", "Approved", "Website"], rows)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

fn status(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = require_session(conn)?;
    if let Some(company) = owned_company(conn, user)? {
        if maybe_print_json(sub.get_flag("json"), false, &company)? {
            return Ok(());
        }
        let state = if company.approved {
            "approved"
        } else {
            "awaiting approval"
        };
        println!("{} ({}) is {}", company.name, company.sector, state);
        return Ok(());
    }
    match latest_application(conn, user)? {
        Some(app) => {
            if maybe_print_json(sub.get_flag("json"), false, &app)? {
                return Ok(());
            }
            let label = match app.status {
                RequestStatus::Pending => "awaiting approval",
                RequestStatus::Approved => "approved",
                RequestStatus::Rejected => "rejected",
            };
            println!("Application {} for {}: {}", app.id, app.company_name, label);
            if let Some(reason) = app.rejection_reason.as_deref() {
                println!("Reason: {}", reason);
                println!(
                    "File a complaint with `minibors application complain --id {}`",
                    app.id
                );
            }
        }
        None => println!("No company profile yet; apply with `minibors company apply`"),
    }
    Ok(())
}

pub fn company_by_id(conn: &Connection, id: i64) -> MarketResult<Company> {
    let sql = format!("SELECT {} FROM companies WHERE id=?1", Company::COLUMNS);
    conn.query_row(&sql, params![id], Company::from_row)
        .optional()?
        .ok_or_else(|| MarketError::not_found("Company", id))
}

/// The company owned by `user_id`, oldest first when there are several.
pub fn owned_company(conn: &Connection, user_id: i64) -> MarketResult<Option<Company>> {
    let sql = format!(
        "SELECT {} FROM companies WHERE owner_id=?1 ORDER BY id LIMIT 1",
        Company::COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![user_id], Company::from_row)
        .optional()?)
}

pub fn all_companies(conn: &Connection) -> MarketResult<Vec<Company>> {
    let sql = format!("SELECT {} FROM companies ORDER BY name", Company::COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], Company::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct CompanyForm {
    pub owner_email: String,
    pub name: String,
    pub sector: String,
    pub description: Option<String>,
    pub website: Option<String>,
}

/// Admin shortcut: an approved company for an existing profile, which also
/// receives the company role.
pub fn create_company(conn: &Connection, actor: i64, form: &CompanyForm) -> MarketResult<Company> {
    require_role(conn, actor, Role::Admin)?;
    let owner = id_for_profile(conn, &form.owner_email)?;
    let name = validate_len("Company name", &form.name, 2, 100)?;
    let sector = validate_len("Sector", &form.sector, 2, 50)?;
    let website = validate_website(form.website.as_deref())?;
    let description = optional_text(form.description.as_deref());

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO companies(owner_id, name, sector, description, website, approved, approved_at, approved_by)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
        params![owner, &name, &sector, &description, &website, now_ts(), actor],
    )?;
    let id = tx.last_insert_rowid();
    promote_to_company(&tx, owner)?;
    let company = company_by_id(&tx, id)?;
    tx.commit()?;
    info!(company_id = id, owner, "company created by admin");
    Ok(company)
}

/// Gives `user_id` the company role unless they are an admin.
pub(crate) fn promote_to_company(conn: &Connection, user_id: i64) -> MarketResult<()> {
    let current: Option<String> = conn
        .query_row(
            "SELECT role FROM user_roles WHERE user_id=?1",
            params![user_id],
            |r| r.get(0),
        )
        .optional()?;
    if current.as_deref() == Some(Role::Admin.as_str()) {
        return Ok(());
    }
    assign_role(conn, user_id, Role::Company)
}
