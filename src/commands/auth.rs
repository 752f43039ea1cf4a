// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Accounts, sessions and the PIN second factor.
//!
//! A signup writes the profile and its investor role in one transaction, so
//! the role is readable as soon as `signup` returns.

use crate::error::{MarketError, MarketResult};
use crate::models::{Profile, Role};
use crate::utils::{
    assign_role, clear_session, current_user, hash_secret, id_for_profile, optional_text,
    require_role, require_session, role_of, set_session, validate_email, validate_len,
    validate_pin,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

const MIN_PASSWORD: usize = 6;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("signup", sub)) => {
            let email = sub.get_one::<String>("email").unwrap();
            let password = sub.get_one::<String>("password").unwrap();
            let full_name = sub.get_one::<String>("name").map(|s| s.as_str());
            let profile = signup(conn, email, password, full_name)?;
            set_session(conn, profile.id)?;
            println!("Registered {} as investor and logged in", profile.email);
        }
        Some(("login", sub)) => {
            let email = sub.get_one::<String>("email").unwrap();
            let password = sub.get_one::<String>("password").unwrap();
            let profile = login(conn, email, password)?;
            println!("Welcome back, {}", display_name(&profile));
        }
        Some(("logout", _)) => {
            clear_session(conn)?;
            println!("Logged out");
        }
        Some(("whoami", _)) => match current_user(conn)? {
            Some(id) => {
                let profile = profile_by_id(conn, id)?;
                let role = role_of(conn, id)?.unwrap_or(Role::Investor);
                println!("{} ({}), role: {}", display_name(&profile), profile.email, role);
            }
            None => println!("Not logged in"),
        },
        Some(("set-pin", sub)) => {
            let user_id = require_session(conn)?;
            let pin = sub.get_one::<String>("pin").unwrap();
            let confirm = sub.get_one::<String>("confirm").unwrap();
            if pin.trim() != confirm.trim() {
                return Err(MarketError::Validation("PIN codes do not match".into()).into());
            }
            set_pin(conn, user_id, pin)?;
            println!("PIN saved");
        }
        Some(("pin-login", sub)) => {
            let email = sub.get_one::<String>("email").unwrap();
            let pin = sub.get_one::<String>("pin").unwrap();
            let profile = pin_login(conn, email, pin)?;
            println!("Welcome back, {}", display_name(&profile));
        }
        Some(("grant-admin", sub)) => {
            let email = sub.get_one::<String>("email").unwrap();
            let actor = current_user(conn)?;
            grant_admin(conn, actor, email)?;
            println!("{} is now an admin", email.trim());
        }
        _ => {}
    }
    Ok(())
}

fn display_name(p: &Profile) -> &str {
    p.full_name.as_deref().unwrap_or(&p.email)
}

pub fn profile_by_id(conn: &Connection, id: i64) -> MarketResult<Profile> {
    let sql = format!("SELECT {} FROM profiles WHERE id=?1", Profile::COLUMNS);
    conn.query_row(&sql, params![id], Profile::from_row)
        .optional()?
        .ok_or_else(|| MarketError::not_found("Profile", id))
}

/// Creates a profile with the default investor role.
pub fn signup(
    conn: &mut Connection,
    email: &str,
    password: &str,
    full_name: Option<&str>,
) -> MarketResult<Profile> {
    let email = validate_email(email)?;
    if password.chars().count() < MIN_PASSWORD {
        return Err(MarketError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD
        )));
    }
    let full_name = optional_text(full_name);

    let tx = conn.transaction()?;
    let taken: Option<i64> = tx
        .query_row(
            "SELECT id FROM profiles WHERE email=?1",
            params![&email],
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(MarketError::Conflict(format!(
            "Email '{}' is already registered",
            email
        )));
    }
    tx.execute(
        "INSERT INTO profiles(email, full_name, password_hash) VALUES (?1, ?2, ?3)",
        params![&email, &full_name, hash_secret(password, &email)],
    )?;
    let id = tx.last_insert_rowid();
    assign_role(&tx, id, Role::Investor)?;
    let profile = profile_by_id(&tx, id)?;
    tx.commit()?;
    info!(user_id = id, "profile created with investor role");
    Ok(profile)
}

/// Checks email and password and opens a session.
pub fn login(conn: &Connection, email: &str, password: &str) -> MarketResult<Profile> {
    let email = email.trim().to_lowercase();
    let stored: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM profiles WHERE email=?1",
            params![&email],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((id, hash)) = stored else {
        warn!("login for unknown email");
        return Err(MarketError::InvalidCredentials);
    };
    if hash != hash_secret(password, &email) {
        warn!(user_id = id, "password mismatch");
        return Err(MarketError::InvalidCredentials);
    }
    set_session(conn, id)?;
    info!(user_id = id, "logged in");
    profile_by_id(conn, id)
}

/// Stores the PIN digest for a user, replacing any previous PIN.
pub fn set_pin(conn: &Connection, user_id: i64, pin: &str) -> MarketResult<()> {
    let pin = validate_pin(pin)?;
    conn.execute(
        "INSERT INTO user_pins(user_id, pin_hash) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET pin_hash=excluded.pin_hash",
        params![user_id, hash_secret(&pin, &user_id.to_string())],
    )?;
    Ok(())
}

pub fn pin_login(conn: &Connection, email: &str, pin: &str) -> MarketResult<Profile> {
    let pin = validate_pin(pin)?;
    let user_id = match id_for_profile(conn, email) {
        Ok(id) => id,
        Err(MarketError::NotFound { .. }) => return Err(MarketError::InvalidCredentials),
        Err(e) => return Err(e),
    };
    let stored: Option<String> = conn
        .query_row(
            "SELECT pin_hash FROM user_pins WHERE user_id=?1",
            params![user_id],
            |r| r.get(0),
        )
        .optional()?;
    match stored {
        Some(hash) if hash == hash_secret(&pin, &user_id.to_string()) => {
            set_session(conn, user_id)?;
            info!(user_id, "logged in with PIN");
            profile_by_id(conn, user_id)
        }
        _ => {
            warn!(user_id, "PIN rejected");
            Err(MarketError::InvalidCredentials)
        }
    }
}

/// Promotes a profile to admin.
///
/// With no admin in the store yet anyone may bootstrap the first one;
/// afterwards only an admin can grant the role.
pub fn grant_admin(conn: &Connection, actor: Option<i64>, email: &str) -> MarketResult<()> {
    let target = id_for_profile(conn, email)?;
    let admins: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_roles WHERE role='admin'",
        [],
        |r| r.get(0),
    )?;
    if admins > 0 {
        let actor = actor.ok_or(MarketError::NotAuthenticated)?;
        require_role(conn, actor, Role::Admin)?;
    }
    assign_role(conn, target, Role::Admin)?;
    info!(user_id = target, "admin role granted");
    Ok(())
}
