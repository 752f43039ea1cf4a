// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use minibors::commands::auth::{grant_admin, signup};
use minibors::commands::companies::{CompanyForm, create_company};
use minibors::commands::portfolio::{holdings, public_portfolios};
use minibors::commands::purchase::purchase;
use minibors::commands::stocks::{StockForm, create_stock, marketplace, stock_by_id};
use minibors::db;
use minibors::error::MarketError;
use minibors::models::Stock;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::thread;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

/// Lists NRD at 100.00 NOK with `total` shares and returns (stock, investor id).
fn listed(conn: &mut Connection, total: i64) -> (Stock, i64) {
    let admin = signup(conn, "admin@minibors.no", "hemmelig", Some("Admin"))
        .unwrap()
        .id;
    grant_admin(conn, None, "admin@minibors.no").unwrap();
    signup(conn, "kari@nordlys.no", "hemmelig", Some("Kari Nordmann")).unwrap();
    let company = create_company(
        conn,
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
        conn,
        admin,
        &StockForm {
            company_id: company.id,
            name: "Nordlys".into(),
            symbol: "nrd".into(),
            price: Decimal::new(10000, 2),
            total_shares: total,
            sector: "Energi".into(),
            description: None,
        },
    )
    .unwrap();
    let investor = signup(conn, "ola@example.no", "hemmelig", Some("Ola"))
        .unwrap()
        .id;
    (stock, investor)
}

fn investment_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM investments", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn purchase_records_total_and_decrements_float() {
    let mut conn = setup();
    let (stock, investor) = listed(&mut conn, 200);
    assert_eq!(stock.symbol, "NRD");
    assert_eq!(stock.available_shares, 200);

    let inv = purchase(&mut conn, &stock, 50, investor).unwrap();
    assert_eq!(inv.shares, 50);
    assert_eq!(inv.price_per_share, Decimal::new(10000, 2));
    assert_eq!(inv.total_amount, Decimal::new(500000, 2));

    let after = stock_by_id(&conn, stock.id).unwrap();
    assert_eq!(after.available_shares, 150);
    assert_eq!(after.total_shares, 200);
}

#[test]
fn stale_snapshot_cannot_oversell() {
    let mut conn = setup();
    let (snapshot, investor) = listed(&mut conn, 200);

    purchase(&mut conn, &snapshot, 150, investor).unwrap();
    // Same snapshot still claims 200 available
    let err = purchase(&mut conn, &snapshot, 100, investor).unwrap_err();
    match err {
        MarketError::InsufficientShares {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, 100);
            assert_eq!(available, 50);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(investment_count(&conn), 1);
    assert_eq!(stock_by_id(&conn, snapshot.id).unwrap().available_shares, 50);
}

#[test]
fn concurrent_buyers_on_two_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("market.sqlite");
    let (snapshot, investor) = {
        let mut conn = db::open_at(&path).unwrap();
        listed(&mut conn, 200)
    };

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let snapshot = snapshot.clone();
            thread::spawn(move || {
                let mut conn = db::open_at(&path).unwrap();
                purchase(&mut conn, &snapshot, 150, investor).is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    let conn = db::open_at(&path).unwrap();
    assert_eq!(stock_by_id(&conn, snapshot.id).unwrap().available_shares, 50);
    assert_eq!(investment_count(&conn), 1);
}

#[test]
fn zero_shares_is_rejected() {
    let mut conn = setup();
    let (stock, investor) = listed(&mut conn, 200);
    let err = purchase(&mut conn, &stock, 0, investor).unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
    assert_eq!(investment_count(&conn), 0);
}

#[test]
fn more_than_snapshot_writes_nothing() {
    let mut conn = setup();
    let (stock, investor) = listed(&mut conn, 200);
    let err = purchase(&mut conn, &stock, 201, investor).unwrap_err();
    assert!(matches!(err, MarketError::InsufficientShares { .. }));
    assert_eq!(investment_count(&conn), 0);
    assert_eq!(stock_by_id(&conn, stock.id).unwrap().available_shares, 200);
}

#[test]
fn sold_out_stock_leaves_marketplace() {
    let mut conn = setup();
    let (stock, investor) = listed(&mut conn, 10);
    assert_eq!(marketplace(&conn).unwrap().len(), 1);
    purchase(&mut conn, &stock, 10, investor).unwrap();
    assert!(marketplace(&conn).unwrap().is_empty());
}

#[test]
fn holdings_and_public_portfolios() {
    let mut conn = setup();
    let (stock, investor) = listed(&mut conn, 200);
    purchase(&mut conn, &stock, 20, investor).unwrap();

    let mine = holdings(&conn, investor).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].symbol, "NRD");
    assert_eq!(mine[0].current_value, Decimal::new(200000, 2));
    assert_eq!(mine[0].gain, Decimal::ZERO);

    // The investor does not see themselves among public portfolios
    assert!(public_portfolios(&conn, investor).unwrap().is_empty());

    let viewer = signup(&mut conn, "per@example.no", "hemmelig", None)
        .unwrap()
        .id;
    let public = public_portfolios(&conn, viewer).unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].display_name, "Ola");
    assert_eq!(public[0].holdings, 1);
    assert_eq!(public[0].total_value, Decimal::new(200000, 2));
}

#[test]
fn failed_investment_insert_keeps_the_float() {
    let mut conn = setup();
    let (stock, _) = listed(&mut conn, 200);
    // No profile 9999: the investment insert fails after the decrement ran
    let err = purchase(&mut conn, &stock, 50, 9999).unwrap_err();
    assert!(matches!(err, MarketError::Store(_)));
    assert_eq!(investment_count(&conn), 0);
    assert_eq!(stock_by_id(&conn, stock.id).unwrap().available_shares, 200);
}

#[test]
fn oversized_amounts_are_rejected_not_panicking() {
    let mut conn = setup();
    let (stock, investor) = listed(&mut conn, 200);
    purchase(&mut conn, &stock, 1, investor).unwrap();

    conn.execute(
        "UPDATE stocks SET price=?1 WHERE id=?2",
        rusqlite::params![Decimal::MAX.to_string(), stock.id],
    )
    .unwrap();
    let snapshot = stock_by_id(&conn, stock.id).unwrap();
    let err = purchase(&mut conn, &snapshot, 2, investor).unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
    assert_eq!(investment_count(&conn), 1);
    assert_eq!(stock_by_id(&conn, stock.id).unwrap().available_shares, 199);

    // Valuing a holding at that price overflows as well
    conn.execute(
        "UPDATE investments SET shares=2 WHERE investor_id=?1",
        rusqlite::params![investor],
    )
    .unwrap();
    assert!(matches!(
        holdings(&conn, investor),
        Err(MarketError::Validation(_))
    ));
    assert!(matches!(
        public_portfolios(&conn, 0),
        Err(MarketError::Validation(_))
    ));
}
