// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use minibors::commands::applications::{
    ApplicationForm, application_by_id, application_summaries, approve_application,
    file_complaint, latest_application, list_complaints, reject_application, resolve_complaint,
    submit_application,
};
use minibors::commands::auth::{grant_admin, signup};
use minibors::commands::companies::owned_company;
use minibors::db;
use minibors::error::MarketError;
use minibors::models::{RequestStatus, Role};
use minibors::utils::role_of;
use rusqlite::{Connection, params};

fn setup() -> (Connection, i64, i64) {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let admin = signup(&mut conn, "admin@minibors.no", "hemmelig", None)
        .unwrap()
        .id;
    grant_admin(&conn, None, "admin@minibors.no").unwrap();
    let applicant = signup(&mut conn, "kari@nordlys.no", "hemmelig", Some("Kari"))
        .unwrap()
        .id;
    (conn, admin, applicant)
}

fn nordlys() -> ApplicationForm {
    ApplicationForm {
        company_name: "Nordlys AS".into(),
        org_number: Some("912345678".into()),
        contact_person: "Kari Nordmann".into(),
        email: "Kari@Nordlys.no".into(),
        website: Some("https://nordlys.no".into()),
        sector: "Energi".into(),
        description: "Nordlys AS bygger og drifter vindparker langs kysten av Nord-Norge."
            .into(),
        ..Default::default()
    }
}

#[test]
fn approval_creates_company_for_applicant() {
    let (mut conn, admin, applicant) = setup();
    let app = submit_application(&conn, applicant, &nordlys()).unwrap();
    assert_eq!(app.status, RequestStatus::Pending);
    assert_eq!(app.email, "kari@nordlys.no");

    let company = approve_application(&mut conn, admin, app.id).unwrap();
    assert_eq!(company.name, "Nordlys AS");
    assert_eq!(company.owner_id, applicant);
    assert!(company.approved);
    assert_eq!(company.approved_by, Some(admin));

    let reviewed = application_by_id(&conn, app.id).unwrap();
    assert_eq!(reviewed.status, RequestStatus::Approved);
    assert_eq!(role_of(&conn, applicant).unwrap(), Some(Role::Company));
}

#[test]
fn second_approval_is_invalid_state() {
    let (mut conn, admin, applicant) = setup();
    let app = submit_application(&conn, applicant, &nordlys()).unwrap();
    approve_application(&mut conn, admin, app.id).unwrap();

    let err = approve_application(&mut conn, admin, app.id).unwrap_err();
    assert!(matches!(err, MarketError::InvalidState { .. }));
    let companies: i64 = conn
        .query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))
        .unwrap();
    assert_eq!(companies, 1);
}

#[test]
fn approval_flags_existing_company() {
    let (mut conn, admin, applicant) = setup();
    conn.execute(
        "INSERT INTO companies(owner_id, name, sector) VALUES (?1, 'Nordlys', 'Energi')",
        params![applicant],
    )
    .unwrap();
    let existing = owned_company(&conn, applicant).unwrap().unwrap();
    assert!(!existing.approved);

    let app = submit_application(&conn, applicant, &nordlys()).unwrap();
    let company = approve_application(&mut conn, admin, app.id).unwrap();
    assert_eq!(company.id, existing.id);
    assert!(company.approved);
}

#[test]
fn rejection_needs_reason_and_is_final() {
    let (mut conn, admin, applicant) = setup();
    let app = submit_application(&conn, applicant, &nordlys()).unwrap();

    let err = reject_application(&conn, admin, app.id, "   ").unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
    assert_eq!(
        application_by_id(&conn, app.id).unwrap().status,
        RequestStatus::Pending
    );

    reject_application(&conn, admin, app.id, "Mangler organisasjonsnummer").unwrap();
    let rejected = latest_application(&conn, applicant).unwrap().unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("Mangler organisasjonsnummer")
    );
    assert!(owned_company(&conn, applicant).unwrap().is_none());
    assert_eq!(role_of(&conn, applicant).unwrap(), Some(Role::Investor));

    assert!(reject_application(&conn, admin, app.id, "igjen").is_err());
    assert!(approve_application(&mut conn, admin, app.id).is_err());
}

#[test]
fn pending_application_blocks_a_second_one() {
    let (conn, admin, applicant) = setup();
    let app = submit_application(&conn, applicant, &nordlys()).unwrap();
    let err = submit_application(&conn, applicant, &nordlys()).unwrap_err();
    assert!(matches!(err, MarketError::Conflict(_)));

    reject_application(&conn, admin, app.id, "Ufullstendig").unwrap();
    assert!(submit_application(&conn, applicant, &nordlys()).is_ok());
}

#[test]
fn short_description_is_rejected() {
    let (conn, _, applicant) = setup();
    let mut form = nordlys();
    form.description = "For kort".into();
    assert!(matches!(
        submit_application(&conn, applicant, &form),
        Err(MarketError::Validation(_))
    ));
    let mut form = nordlys();
    form.website = Some("nordlys.no".into());
    assert!(submit_application(&conn, applicant, &form).is_err());
}

#[test]
fn one_complaint_per_rejected_application() {
    let (mut conn, admin, applicant) = setup();
    let app = submit_application(&conn, applicant, &nordlys()).unwrap();

    // Pending applications cannot be appealed yet
    assert!(matches!(
        file_complaint(&conn, applicant, app.id),
        Err(MarketError::Validation(_))
    ));

    reject_application(&conn, admin, app.id, "Ufullstendig").unwrap();
    let other = signup(&mut conn, "ola@example.no", "hemmelig", None)
        .unwrap()
        .id;
    assert!(matches!(
        file_complaint(&conn, other, app.id),
        Err(MarketError::NotOwner(_))
    ));

    let complaint = file_complaint(&conn, applicant, app.id).unwrap();
    assert_eq!(
        complaint.message,
        "Complaint about rejected application: Nordlys AS"
    );
    assert!(!complaint.resolved);
    assert!(matches!(
        file_complaint(&conn, applicant, app.id),
        Err(MarketError::Conflict(_))
    ));

    let summaries = application_summaries(&conn, Some(RequestStatus::Rejected)).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].complaint_count, 1);
}

#[test]
fn admin_resolves_complaints() {
    let (conn, admin, applicant) = setup();
    let app = submit_application(&conn, applicant, &nordlys()).unwrap();
    reject_application(&conn, admin, app.id, "Ufullstendig").unwrap();
    let complaint = file_complaint(&conn, applicant, app.id).unwrap();
    assert_eq!(list_complaints(&conn, true).unwrap().len(), 1);

    assert!(matches!(
        resolve_complaint(&conn, applicant, complaint.id),
        Err(MarketError::Forbidden { .. })
    ));
    resolve_complaint(&conn, admin, complaint.id).unwrap();
    assert!(list_complaints(&conn, true).unwrap().is_empty());
    assert_eq!(list_complaints(&conn, false).unwrap().len(), 1);
    assert!(matches!(
        resolve_complaint(&conn, admin, complaint.id),
        Err(MarketError::Conflict(_))
    ));
    // Resolving leaves the application rejected
    assert_eq!(
        application_by_id(&conn, app.id).unwrap().status,
        RequestStatus::Rejected
    );
}

#[test]
fn admin_keeps_role_when_approved_as_company() {
    let (mut conn, admin, _) = setup();
    let app = submit_application(&conn, admin, &nordlys()).unwrap();
    approve_application(&mut conn, admin, app.id).unwrap();
    assert_eq!(role_of(&conn, admin).unwrap(), Some(Role::Admin));
}
