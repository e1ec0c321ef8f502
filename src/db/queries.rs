use chrono::{NaiveDateTime, Utc};
use rusqlite::{ffi, params, Connection};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "id, company_name, phone, email, schedule, picture, description, \
                            subscribed, settings, stripe_account, created_at, updated_at";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn now() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

// ── Users ──

/// Inserts a new user. The unique index on `email` is the source of truth for
/// duplicates, so concurrent registrations cannot both succeed.
pub fn create_user(conn: &Connection, new_user: &NewUser) -> Result<User, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = now();
    let schedule = new_user
        .schedule
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let result = conn.execute(
        "INSERT INTO users (id, company_name, phone, email, schedule, picture, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            new_user.company_name,
            new_user.phone,
            new_user.email,
            schedule,
            new_user.picture,
            now,
            now,
        ],
    );

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(AppError::DuplicateEmail),
        Err(e) => return Err(e.into()),
    }

    get_user(conn, &id)?.ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, rowid ASC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(parse_user_row(row)))?;

    let mut users = vec![];
    for row in rows {
        users.push(row??);
    }
    Ok(users)
}

/// `users.email` carries the only UNIQUE index, so this is a duplicate email.
/// Primary key and NOT NULL failures have their own extended codes.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<User>, AppError> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Applies the fields present in `update` (an explicit null clears the
/// column) and returns the updated record, or `None` when no user has this id.
pub fn update_profile(
    conn: &Connection,
    id: &str,
    update: &ProfileUpdate,
) -> Result<Option<User>, AppError> {
    let field = |value: &Option<Option<String>>| (value.is_some(), value.clone().flatten());
    let (set_company, company_name) = field(&update.company_name);
    let (set_phone, phone) = field(&update.phone);
    let (set_description, description) = field(&update.description);
    let (set_picture, picture) = field(&update.picture);

    let count = conn.execute(
        "UPDATE users SET
           company_name = CASE WHEN ?1 THEN ?2 ELSE company_name END,
           phone = CASE WHEN ?3 THEN ?4 ELSE phone END,
           description = CASE WHEN ?5 THEN ?6 ELSE description END,
           picture = CASE WHEN ?7 THEN ?8 ELSE picture END,
           updated_at = ?9
         WHERE id = ?10",
        params![
            set_company,
            company_name,
            set_phone,
            phone,
            set_description,
            description,
            set_picture,
            picture,
            now(),
            id,
        ],
    )?;
    fetch_if_updated(conn, id, count)
}

pub fn update_settings(
    conn: &Connection,
    id: &str,
    settings: &serde_json::Value,
) -> Result<Option<User>, AppError> {
    let settings_json = serde_json::to_string(settings)?;
    let count = conn.execute(
        "UPDATE users SET settings = ?1, updated_at = ?2 WHERE id = ?3",
        params![settings_json, now(), id],
    )?;
    fetch_if_updated(conn, id, count)
}

pub fn set_subscribed(
    conn: &Connection,
    id: &str,
    subscribed: bool,
) -> Result<Option<User>, AppError> {
    let count = conn.execute(
        "UPDATE users SET subscribed = ?1, updated_at = ?2 WHERE id = ?3",
        params![subscribed as i32, now(), id],
    )?;
    fetch_if_updated(conn, id, count)
}

/// Stores the connected account id only if the user has none yet. Returns
/// `true` when this call stored it.
pub fn set_stripe_account_if_absent(
    conn: &Connection,
    id: &str,
    account_id: &str,
) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE users SET stripe_account = ?1, updated_at = ?2
         WHERE id = ?3 AND stripe_account IS NULL",
        params![account_id, now(), id],
    )?;
    Ok(count > 0)
}

fn fetch_if_updated(conn: &Connection, id: &str, count: usize) -> Result<Option<User>, AppError> {
    if count == 0 {
        return Ok(None);
    }
    get_user(conn, id)
}

fn parse_user_row(row: &rusqlite::Row) -> Result<User, AppError> {
    let schedule_json: Option<String> = row.get(4)?;
    let subscribed: i32 = row.get(7)?;
    let settings_json: String = row.get(8)?;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    let schedule: Option<serde_json::Value> = schedule_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    let settings: serde_json::Value = serde_json::from_str(&settings_json)?;

    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(User {
        id: row.get(0)?,
        company_name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        schedule,
        picture: row.get(5)?,
        description: row.get(6)?,
        subscribed: subscribed != 0,
        settings,
        stripe_account: row.get(9)?,
        created_at,
        updated_at,
    })
}
