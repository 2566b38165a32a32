//! Sign-in accounts, password hashing and reset requests.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rusqlite::{params, ErrorCode, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Account;

/// Hash a password with the given hex salt.
pub fn hash_password(salt_hex: &str, password: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

impl Account {
    /// Compare in constant time against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        let Ok(stored) = blake3::Hash::from_hex(&self.password_hash) else {
            return false;
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.password_salt.as_bytes());
        hasher.update(password.as_bytes());
        hasher.finalize() == stored
    }
}

impl Database {
    /// Create an account. Emails are unique, case-insensitively.
    pub fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Account> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let password_salt = hex::encode(salt);

        let account = Account {
            uid: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            password_hash: hash_password(&password_salt, password),
            password_salt,
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO accounts (uid, email, display_name, password_salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    account.uid,
                    account.email,
                    account.display_name,
                    account.password_salt,
                    account.password_hash,
                    account.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::AlreadyExists(email.to_string())
                }
                other => StoreError::Sqlite(other),
            })?;

        tracing::info!(uid = %account.uid, "account created");
        Ok(account)
    }

    pub fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.conn()
            .query_row(
                "SELECT uid, email, display_name, password_salt, password_hash, created_at
                 FROM accounts WHERE email = ?1",
                params![email],
                row_to_account,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    pub fn get_account(&self, uid: &str) -> Result<Account> {
        self.conn()
            .query_row(
                "SELECT uid, email, display_name, password_salt, password_hash, created_at
                 FROM accounts WHERE uid = ?1",
                params![uid],
                row_to_account,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("account {uid}")),
                other => StoreError::Sqlite(other),
            })
    }

    pub fn set_account_display_name(&self, uid: &str, display_name: Option<&str>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE accounts SET display_name = ?1 WHERE uid = ?2",
            params![display_name, uid],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("account {uid}")));
        }
        Ok(())
    }

    /// Record a password reset request for a known account.
    pub fn record_password_reset(&self, email: &str) -> Result<()> {
        if self.find_account_by_email(email)?.is_none() {
            return Err(StoreError::NotFound(format!("account {email}")));
        }
        self.conn().execute(
            "INSERT INTO password_resets (email, requested_at) VALUES (?1, ?2)",
            params![email, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn count_password_resets(&self, email: &str) -> Result<u32> {
        let n: u32 = self.conn().query_row(
            "SELECT COUNT(*) FROM password_resets WHERE email = ?1 COLLATE NOCASE",
            params![email],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let created_str: String = row.get(5)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Account {
        uid: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        password_salt: row.get(3)?,
        password_hash: row.get(4)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_verify() {
        let db = Database::open_in_memory().unwrap();
        let account = db.create_account("ada@example.com", "hunter22", Some("Ada")).unwrap();

        let found = db.find_account_by_email("ADA@example.com").unwrap().unwrap();
        assert_eq!(found.uid, account.uid);
        assert!(found.verify_password("hunter22"));
        assert!(!found.verify_password("hunter23"));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_account("ada@example.com", "hunter22", None).unwrap();
        let err = db.create_account("Ada@Example.com", "other-pass", None).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn salts_differ_per_account() {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_account("a@example.com", "same-pass", None).unwrap();
        let b = db.create_account("b@example.com", "same-pass", None).unwrap();
        assert_ne!(a.password_hash, b.password_hash);
    }

    #[test]
    fn reset_requires_known_account() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.record_password_reset("ghost@example.com"),
            Err(StoreError::NotFound(_))
        ));

        db.create_account("ada@example.com", "hunter22", None).unwrap();
        db.record_password_reset("ada@example.com").unwrap();
        assert_eq!(db.count_password_resets("ada@example.com").unwrap(), 1);
    }
}
