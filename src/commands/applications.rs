// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Company applications and the complaints filed against rejections.

use crate::commands::companies::{company_by_id, promote_to_company};
use crate::error::{MarketError, MarketResult};
use crate::models::{Company, CompanyApplication, Complaint, RequestStatus, Role};
use crate::utils::{
    maybe_print_json, now_ts, optional_text, parse_id, pretty_table, require_role,
    require_session, validate_email, validate_len, validate_website,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use tracing::info;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => {
            let actor = require_session(conn)?;
            require_role(conn, actor, Role::Admin)?;
            let status = sub
                .get_one::<String>("status")
                .map(|s| s.parse::<RequestStatus>())
                .transpose()?;
            let data = application_summaries(conn, status)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                println!("{}", summary_table(&data));
            }
        }
        Some(("approve", sub)) => {
            let actor = require_session(conn)?;
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let company = approve_application(conn, actor, id)?;
            println!("Approved: {} is now an approved company", company.name);
        }
        Some(("reject", sub)) => {
            let actor = require_session(conn)?;
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let reason = sub.get_one::<String>("reason").unwrap();
            reject_application(conn, actor, id, reason)?;
            println!("Rejected application {}", id);
        }
        Some(("complain", sub)) => {
            let user = require_session(conn)?;
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let complaint = file_complaint(conn, user, id)?;
            println!(
                "Complaint {} sent to the administrators for review",
                complaint.id
            );
        }
        _ => {}
    }
    Ok(())
}

pub fn handle_complaints(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => {
            let actor = require_session(conn)?;
            require_role(conn, actor, Role::Admin)?;
            let data = list_complaints(conn, sub.get_flag("open"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|c| {
                        vec![
                            c.id.to_string(),
                            c.application_id.to_string(),
                            c.message.clone(),
                            if c.resolved { "resolved" } else { "open" }.to_string(),
                            c.created_at.clone(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Application", "Message", "State", "Filed"], rows)
                );
            }
        }
        Some(("resolve", sub)) => {
            let actor = require_session(conn)?;
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            resolve_complaint(conn, actor, id)?;
            println!("Complaint {} marked resolved", id);
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationForm {
    pub company_name: String,
    pub org_number: Option<String>,
    pub contact_person: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub sector: String,
    pub description: String,
}

pub fn application_by_id(conn: &Connection, id: i64) -> MarketResult<CompanyApplication> {
    let sql = format!(
        "SELECT {} FROM company_applications WHERE id=?1",
        CompanyApplication::COLUMNS
    );
    conn.query_row(&sql, params![id], CompanyApplication::from_row)
        .optional()?
        .ok_or_else(|| MarketError::not_found("Company application", id))
}

pub fn latest_application(
    conn: &Connection,
    user_id: i64,
) -> MarketResult<Option<CompanyApplication>> {
    let sql = format!(
        "SELECT {} FROM company_applications WHERE user_id=?1 ORDER BY created_at DESC, id DESC LIMIT 1",
        CompanyApplication::COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![user_id], CompanyApplication::from_row)
        .optional()?)
}

pub fn submit_application(
    conn: &Connection,
    user_id: i64,
    form: &ApplicationForm,
) -> MarketResult<CompanyApplication> {
    let company_name = validate_len("Company name", &form.company_name, 2, 100)?;
    let contact = validate_len("Contact person", &form.contact_person, 2, 100)?;
    let email = validate_email(&form.email)?;
    let website = validate_website(form.website.as_deref())?;
    let sector = validate_len("Sector", &form.sector, 2, 50)?;
    let description = validate_len("Description", &form.description, 50, 1000)?;

    if let Some(open) = latest_application(conn, user_id)? {
        if open.status == RequestStatus::Pending {
            return Err(MarketError::Conflict(format!(
                "Application {} is still awaiting review",
                open.id
            )));
        }
    }

    conn.execute(
        "INSERT INTO company_applications(user_id, company_name, org_number, contact_person, email, phone, website, sector, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user_id,
            &company_name,
            optional_text(form.org_number.as_deref()),
            &contact,
            &email,
            optional_text(form.phone.as_deref()),
            &website,
            &sector,
            &description
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(application_id = id, user_id, "company application submitted");
    application_by_id(conn, id)
}

/// Approves a pending application.
///
/// The applicant's existing company is flagged approved, or a new approved
/// company is created from the application; either way the applicant ends up
/// with the company role. All of it commits as one unit.
pub fn approve_application(
    conn: &mut Connection,
    actor: i64,
    application_id: i64,
) -> MarketResult<Company> {
    require_role(conn, actor, Role::Admin)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let app = application_by_id(&tx, application_id)?;
    if app.status != RequestStatus::Pending {
        return Err(MarketError::InvalidState {
            entity: "Company application",
            id: application_id,
            status: app.status,
        });
    }
    let ts = now_ts();
    tx.execute(
        "UPDATE company_applications SET status='approved', reviewed_at=?1, reviewed_by=?2, updated_at=?1
         WHERE id=?3 AND status='pending'",
        params![&ts, actor, application_id],
    )?;

    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM companies WHERE owner_id=?1 ORDER BY id LIMIT 1",
            params![app.user_id],
            |r| r.get(0),
        )
        .optional()?;
    let company_id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE companies SET approved=1, approved_at=?1, approved_by=?2, updated_at=?1 WHERE id=?3",
                params![&ts, actor, id],
            )?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO companies(owner_id, name, sector, description, website, approved, approved_at, approved_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
                params![
                    app.user_id,
                    &app.company_name,
                    &app.sector,
                    &app.description,
                    &app.website,
                    &ts,
                    actor
                ],
            )?;
            tx.last_insert_rowid()
        }
    };
    promote_to_company(&tx, app.user_id)?;
    let company = company_by_id(&tx, company_id)?;
    tx.commit()?;
    info!(
        application_id,
        company_id,
        reviewer = actor,
        "company application approved"
    );
    Ok(company)
}

/// Rejects a pending application with a reason the applicant will see.
pub fn reject_application(
    conn: &Connection,
    actor: i64,
    application_id: i64,
    reason: &str,
) -> MarketResult<()> {
    require_role(conn, actor, Role::Admin)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(MarketError::Validation(
            "A rejection reason is required".into(),
        ));
    }
    let ts = now_ts();
    let updated = conn.execute(
        "UPDATE company_applications
         SET status='rejected', reviewed_at=?1, reviewed_by=?2, rejection_reason=?3, updated_at=?1
         WHERE id=?4 AND status='pending'",
        params![&ts, actor, reason, application_id],
    )?;
    if updated == 0 {
        let app = application_by_id(conn, application_id)?;
        return Err(MarketError::InvalidState {
            entity: "Company application",
            id: application_id,
            status: app.status,
        });
    }
    info!(application_id, reviewer = actor, "company application rejected");
    Ok(())
}

/// Files the single complaint allowed against a rejected application.
pub fn file_complaint(
    conn: &Connection,
    user_id: i64,
    application_id: i64,
) -> MarketResult<Complaint> {
    let app = application_by_id(conn, application_id)?;
    if app.user_id != user_id {
        return Err(MarketError::NotOwner(format!(
            "Application {} belongs to another user",
            application_id
        )));
    }
    if app.status != RequestStatus::Rejected {
        return Err(MarketError::Validation(format!(
            "Only rejected applications can be appealed; application {} is {}",
            application_id, app.status
        )));
    }
    let already: Option<i64> = conn
        .query_row(
            "SELECT id FROM application_complaints WHERE application_id=?1",
            params![application_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(existing) = already {
        return Err(MarketError::Conflict(format!(
            "Complaint {} has already been filed for application {}",
            existing, application_id
        )));
    }
    let message = format!("Complaint about rejected application: {}", app.company_name);
    let id = insert_complaint(conn, application_id, user_id, &message)?;
    info!(complaint_id = id, application_id, "complaint filed");
    complaint_by_id(conn, id)
}

/// A concurrent filer that slipped past the lookup hits the UNIQUE column.
fn insert_complaint(
    conn: &Connection,
    application_id: i64,
    user_id: i64,
    message: &str,
) -> MarketResult<i64> {
    match conn.execute(
        "INSERT INTO application_complaints(application_id, user_id, message) VALUES (?1, ?2, ?3)",
        params![application_id, user_id, message],
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(MarketError::Conflict(format!(
                "A complaint has already been filed for application {}",
                application_id
            )))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn complaint_by_id(conn: &Connection, id: i64) -> MarketResult<Complaint> {
    let sql = format!(
        "SELECT {} FROM application_complaints WHERE id=?1",
        Complaint::COLUMNS
    );
    conn.query_row(&sql, params![id], Complaint::from_row)
        .optional()?
        .ok_or_else(|| MarketError::not_found("Complaint", id))
}

pub fn list_complaints(conn: &Connection, only_open: bool) -> MarketResult<Vec<Complaint>> {
    let mut sql = format!("SELECT {} FROM application_complaints", Complaint::COLUMNS);
    if only_open {
        sql.push_str(" WHERE resolved=0");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], Complaint::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Marks a complaint handled. This does not reopen the application.
pub fn resolve_complaint(conn: &Connection, actor: i64, complaint_id: i64) -> MarketResult<()> {
    require_role(conn, actor, Role::Admin)?;
    let updated = conn.execute(
        "UPDATE application_complaints SET resolved=1, resolved_at=?1, resolved_by=?2
         WHERE id=?3 AND resolved=0",
        params![now_ts(), actor, complaint_id],
    )?;
    if updated == 0 {
        complaint_by_id(conn, complaint_id)?;
        return Err(MarketError::Conflict(format!(
            "Complaint {} is already resolved",
            complaint_id
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummary {
    #[serde(flatten)]
    pub application: CompanyApplication,
    pub complaint_count: i64,
}

/// Applications (optionally filtered by status) with their complaint counts.
pub fn application_summaries(
    conn: &Connection,
    status: Option<RequestStatus>,
) -> MarketResult<Vec<ApplicationSummary>> {
    let cols = CompanyApplication::COLUMNS
        .split(", ")
        .map(|c| format!("a.{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "SELECT {}, (SELECT COUNT(*) FROM application_complaints c WHERE c.application_id=a.id)
         FROM company_applications a",
        cols
    );
    if status.is_some() {
        sql.push_str(" WHERE a.status=?1");
    }
    sql.push_str(" ORDER BY a.created_at DESC, a.id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let map = |r: &rusqlite::Row<'_>| -> rusqlite::Result<ApplicationSummary> {
        Ok(ApplicationSummary {
            application: CompanyApplication::from_row(r)?,
            complaint_count: r.get(15)?,
        })
    };
    let rows = match status {
        Some(s) => stmt.query_map(params![s.as_str()], map)?,
        None => stmt.query_map([], map)?,
    };
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn summary_table(data: &[ApplicationSummary]) -> comfy_table::Table {
    let rows = data
        .iter()
        .map(|s| {
            let a = &s.application;
            vec![
                a.id.to_string(),
                a.company_name.clone(),
                a.contact_person.clone(),
                a.email.clone(),
                a.sector.clone(),
                a.status.to_string(),
                s.complaint_count.to_string(),
            ]
        })
        .collect();
    pretty_table(
        &["ID", "Company", "Contact", "Email", "Sector", "Status", "Complaints"],
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    #[test]
    fn racing_complaint_insert_is_a_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO profiles(email, password_hash) VALUES ('kari@nordlys.no', 'x')",
            [],
        )
        .unwrap();
        let user = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO company_applications(user_id, company_name, contact_person, email, sector, description, status)
             VALUES (?1, 'Nordlys AS', 'Kari', 'kari@nordlys.no', 'Energi', 'Vindkraft', 'rejected')",
            params![user],
        )
        .unwrap();
        let app = conn.last_insert_rowid();

        insert_complaint(&conn, app, user, "first").unwrap();
        let err = insert_complaint(&conn, app, user, "second").unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM application_complaints", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }
}
