// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use minibors::commands::applications::{ApplicationForm, submit_application};
use minibors::commands::auth::{grant_admin, login, signup};
use minibors::commands::companies::{CompanyForm, create_company};
use minibors::commands::dashboard::{
    DashboardState, admin_overview, admin_stats, company_overview, investor_overview, route,
};
use minibors::commands::doctor::find_issues;
use minibors::commands::purchase::purchase;
use minibors::commands::requests::{StockRequestForm, submit_stock_request};
use minibors::commands::stocks::{StockForm, create_stock};
use minibors::db;
use minibors::utils::set_session;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

#[test]
fn no_session_is_unauthenticated() {
    let conn = setup();
    assert_eq!(route(&conn).unwrap(), DashboardState::Unauthenticated);
}

#[test]
fn each_role_gets_its_view() {
    let mut conn = setup();
    let admin = signup(&mut conn, "admin@minibors.no", "hemmelig", None)
        .unwrap()
        .id;
    grant_admin(&conn, None, "admin@minibors.no").unwrap();
    signup(&mut conn, "ola@example.no", "hemmelig", None).unwrap();
    signup(&mut conn, "kari@nordlys.no", "hemmelig", None).unwrap();
    create_company(
        &conn,
        admin,
        &CompanyForm {
            owner_email: "kari@nordlys.no".into(),
            name: "Nordlys AS".into(),
            sector: "Energi".into(),
            description: None,
            website: None,
        },
    )
    .unwrap();

    login(&conn, "admin@minibors.no", "hemmelig").unwrap();
    assert_eq!(route(&conn).unwrap(), DashboardState::Admin);
    login(&conn, "ola@example.no", "hemmelig").unwrap();
    assert_eq!(route(&conn).unwrap(), DashboardState::Investor);
    login(&conn, "kari@nordlys.no", "hemmelig").unwrap();
    assert_eq!(route(&conn).unwrap(), DashboardState::Company);
}

#[test]
fn missing_role_row_falls_back_to_investor() {
    let mut conn = setup();
    let p = signup(&mut conn, "ola@example.no", "hemmelig", None).unwrap();
    conn.execute("DELETE FROM user_roles WHERE user_id=?1", params![p.id])
        .unwrap();
    set_session(&conn, p.id).unwrap();
    assert_eq!(route(&conn).unwrap(), DashboardState::Investor);
}

#[test]
fn resolved_state_is_terminal() {
    let conn = setup();
    assert_eq!(
        DashboardState::Admin.resolve(&conn).unwrap(),
        DashboardState::Admin
    );
}

#[test]
fn overviews_and_stats() {
    let mut conn = setup();
    let admin = signup(&mut conn, "admin@minibors.no", "hemmelig", None)
        .unwrap()
        .id;
    grant_admin(&conn, None, "admin@minibors.no").unwrap();
    let owner = signup(&mut conn, "kari@nordlys.no", "hemmelig", None)
        .unwrap()
        .id;
    let investor = signup(&mut conn, "ola@example.no", "hemmelig", None)
        .unwrap()
        .id;
    let applicant = signup(&mut conn, "per@example.no", "hemmelig", None)
        .unwrap()
        .id;

    let company = create_company(
        &conn,
        admin,
        &CompanyForm {
            owner_email: "kari@nordlys.no".into(),
            name: "Nordlys AS".into(),
            sector: "Energi".into(),
            description: None,
            website: None,
        },
    )
    .unwrap();
    let stock = create_stock(
        &conn,
        admin,
        &StockForm {
            company_id: company.id,
            name: "Nordlys".into(),
            symbol: "NRD".into(),
            price: Decimal::new(5000, 2),
            total_shares: 100,
            sector: "Energi".into(),
            description: None,
        },
    )
    .unwrap();
    submit_stock_request(
        &conn,
        owner,
        &StockRequestForm {
            name: "Nordlys B".into(),
            symbol: "NRDB".into(),
            price: Decimal::new(4000, 2),
            total_shares: 50,
            sector: "Energi".into(),
            description: "B-aksjer i Nordlys AS".into(),
        },
    )
    .unwrap();
    submit_application(
        &conn,
        applicant,
        &ApplicationForm {
            company_name: "Fjord Fisk AS".into(),
            contact_person: "Per Hansen".into(),
            email: "per@fjordfisk.no".into(),
            sector: "Sjømat".into(),
            description: "Fjord Fisk AS driver bærekraftig oppdrett av laks i Hardangerfjorden."
                .into(),
            ..Default::default()
        },
    )
    .unwrap();
    purchase(&mut conn, &stock, 10, investor).unwrap();

    let stats = admin_stats(&conn).unwrap();
    assert_eq!(stats.total_stocks, 1);
    assert_eq!(stats.pending_requests, 1);
    assert_eq!(stats.total_investments, 1);
    assert_eq!(stats.pending_applications, 1);

    let admin_view = admin_overview(&conn).unwrap();
    assert_eq!(admin_view.pending_requests.len(), 1);
    assert_eq!(admin_view.pending_applications.len(), 1);

    let investor_view = investor_overview(&conn, investor).unwrap();
    assert_eq!(investor_view.marketplace.len(), 1);
    assert_eq!(investor_view.marketplace[0].available_shares, 90);
    assert_eq!(investor_view.investments.len(), 1);

    let company_view = company_overview(&conn, owner).unwrap();
    assert_eq!(company_view.company.map(|c| c.id), Some(company.id));
    assert_eq!(company_view.requests.len(), 1);

    assert!(find_issues(&conn).unwrap().is_empty());
}

#[test]
fn doctor_flags_float_drift() {
    let mut conn = setup();
    let admin = signup(&mut conn, "admin@minibors.no", "hemmelig", None)
        .unwrap()
        .id;
    grant_admin(&conn, None, "admin@minibors.no").unwrap();
    let company = create_company(
        &conn,
        admin,
        &CompanyForm {
            owner_email: "admin@minibors.no".into(),
            name: "Nordlys AS".into(),
            sector: "Energi".into(),
            description: None,
            website: None,
        },
    )
    .unwrap();
    let stock = create_stock(
        &conn,
        admin,
        &StockForm {
            company_id: company.id,
            name: "Nordlys".into(),
            symbol: "NRD".into(),
            price: Decimal::new(5000, 2),
            total_shares: 100,
            sector: "Energi".into(),
            description: None,
        },
    )
    .unwrap();
    conn.execute(
        "UPDATE stocks SET available_shares=80 WHERE id=?1",
        params![stock.id],
    )
    .unwrap();

    let issues = find_issues(&conn).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "float_mismatch");
}
