//! One-time numeric confirmation codes.
//!
//! Codes are bound to an identity and matched on (value, owner email). A code
//! authorizes at most one transition: consumption is a single conditional
//! UPDATE, so concurrent redemptions of the same record cannot both win.

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use bazaar_db::rusqlite::Connection;
use bazaar_db::queries::codes::{insert_code, mark_code_used, query_codes_for_redemption};

use crate::error::CoreError;

pub const CODE_TTL_MINUTES: i64 = 10;

pub fn generate_code() -> String {
    rand::rng().random_range(100_000..=999_999).to_string()
}

/// Persist a fresh unused code for `user_id`. Earlier codes are left as they are.
pub fn issue(conn: &Connection, user_id: &str) -> anyhow::Result<String> {
    let code = generate_code();
    let expires_at = (Utc::now() + chrono::Duration::minutes(CODE_TTL_MINUTES)).timestamp();

    insert_code(conn, &Uuid::new_v4().to_string(), user_id, &code, expires_at)?;
    Ok(code)
}

/// Consume a code and return the owning identity's id.
///
/// Used and expired codes both report `Expired` so callers cannot tell them apart.
pub fn redeem(conn: &Connection, code: &str, email: &str) -> Result<String, CoreError> {
    let candidates = query_codes_for_redemption(conn, code, email)?;
    if candidates.is_empty() {
        return Err(CoreError::NotFound("confirmation code"));
    }

    let now = Utc::now().timestamp();
    let Some(live) = candidates.iter().find(|c| !c.used && now <= c.expires_at) else {
        return Err(CoreError::Expired);
    };

    if !mark_code_used(conn, &live.id)? {
        return Err(CoreError::Expired);
    }

    Ok(live.user_id.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use bazaar_db::Database;
    use bazaar_db::queries::codes::count_codes_for_user;
    use bazaar_db::queries::users::insert_user;

    fn db_with_user() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| insert_user(conn, "u1", "a@x.com", "A", "hash", true))
            .unwrap();
        db
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn issue_keeps_prior_codes() {
        let db = db_with_user();
        db.with_conn(|conn| issue(conn, "u1")).unwrap();
        db.with_conn(|conn| issue(conn, "u1")).unwrap();
        assert_eq!(db.with_conn(|conn| count_codes_for_user(conn, "u1")).unwrap(), 2);
    }

    #[test]
    fn second_redeem_reports_expired() {
        let db = db_with_user();
        let code = db.with_conn(|conn| issue(conn, "u1")).unwrap();

        let owner = db.with_tx(|tx| redeem(tx, &code, "a@x.com")).unwrap();
        assert_eq!(owner, "u1");

        let again = db.with_tx(|tx| redeem(tx, &code, "a@x.com"));
        assert!(matches!(again, Err(CoreError::Expired)));
    }

    #[test]
    fn unknown_pair_is_not_found() {
        let db = db_with_user();
        let code = db.with_conn(|conn| issue(conn, "u1")).unwrap();

        let wrong_email = db.with_tx(|tx| redeem(tx, &code, "b@x.com"));
        assert!(matches!(wrong_email, Err(CoreError::NotFound(_))));

        let wrong_code = if code == "100000" { "100001" } else { "100000" };
        let result = db.with_tx(|tx| redeem(tx, wrong_code, "a@x.com"));
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[test]
    fn elapsed_code_reports_expired() {
        let db = db_with_user();
        let past = Utc::now().timestamp() - 1;
        db.with_conn(|conn| insert_code(conn, "c1", "u1", "654321", past))
            .unwrap();

        let result = db.with_tx(|tx| redeem(tx, "654321", "a@x.com"));
        assert!(matches!(result, Err(CoreError::Expired)));
    }

    #[test]
    fn concurrent_redemption_has_one_winner() {
        let db = Arc::new(db_with_user());
        let code = db.with_conn(|conn| issue(conn, "u1")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let code = code.clone();
                thread::spawn(move || db.with_tx(|tx| redeem(tx, &code, "a@x.com")).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
