// crates/tfstated-store-sqlite/src/accounts.rs
// ============================================================================
// Module: SQLite Accounts
// Description: Account bootstrap, creation, lookup, and authentication.
// Purpose: Back HTTP basic authentication with argon2-hashed credentials.
// Dependencies: tfstated-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! Accounts author state versions. Passwords are stored only as argon2id PHC
//! strings. On first start the server bootstraps an `admin` account with a
//! generated password that is handed to the caller exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use tfstated_core::Account;
use tfstated_core::AccountId;
use tfstated_core::StoreError;
use tfstated_core::generate_password;
use tfstated_core::hash_password;
use tfstated_core::unix_seconds;
use tfstated_core::verify_password;

use crate::states::parse_account_id;
use crate::store::SqliteStateStore;
use crate::store::SqliteStoreError;
use crate::store::TxOutcome;
use crate::store::db_error;
use crate::store::is_constraint_violation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Username of the bootstrap administrator.
pub const ADMIN_USERNAME: &str = "admin";
/// Maximum username length.
const MAX_USERNAME_LENGTH: usize = 64;
/// Columns selected for account rows, in [`AccountRow::from_row`] order.
const ACCOUNT_COLUMNS: &str = "id, username, password_hash, is_admin, created, last_login";

// ============================================================================
// SECTION: Accounts
// ============================================================================

impl SqliteStateStore {
    /// Ensures an administrator exists, creating or resetting `admin` if not.
    ///
    /// `on_generated` receives the generated plaintext password after the
    /// account is committed, and is not called when an administrator already
    /// exists. Returns whether a password was generated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when hashing or persistence fails.
    pub fn init_admin_account(&self, on_generated: impl FnOnce(&str)) -> Result<bool, StoreError> {
        let generated =
            self.with_transaction(|tx| -> Result<TxOutcome<Option<String>>, StoreError> {
                let has_admin: bool = tx
                    .query_row(
                        "SELECT EXISTS (SELECT 1 FROM accounts WHERE is_admin = 1)",
                        [],
                        |row| row.get(0),
                    )
                    .map_err(|err| db_error(&err))?;
                if has_admin {
                    return Ok(TxOutcome::Rollback(None));
                }
                let password = generate_password();
                let password_hash = hash_password(&password)?;
                tx.execute(
                    "INSERT INTO accounts (id, username, password_hash, is_admin, created) VALUES \
                     (?1, ?2, ?3, 1, ?4) ON CONFLICT (username) DO UPDATE SET password_hash = \
                     excluded.password_hash, is_admin = 1",
                    params![
                        AccountId::generate().to_string(),
                        ADMIN_USERNAME,
                        password_hash,
                        unix_seconds()
                    ],
                )
                .map_err(|err| db_error(&err))?;
                Ok(TxOutcome::Commit(Some(password)))
            })?;
        let Some(password) = generated else {
            return Ok(false);
        };
        tracing::info!(username = ADMIN_USERNAME, "administrator account initialized");
        on_generated(&password);
        Ok(true)
    }

    /// Creates an account.
    ///
    /// Returns `None` when the username is taken.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an invalid username or empty
    /// password, and [`StoreError::Internal`] when persistence fails.
    pub fn create_account(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<Option<Account>, StoreError> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(StoreError::Validation("password must not be empty".to_string()));
        }
        let password_hash = hash_password(password)?;
        self.with_transaction(|tx| -> Result<TxOutcome<Option<Account>>, StoreError> {
            let account = Account {
                id: AccountId::generate(),
                username: username.to_string(),
                is_admin,
                created: unix_seconds(),
                last_login: None,
            };
            let inserted = tx.execute(
                "INSERT INTO accounts (id, username, password_hash, is_admin, created) VALUES (?1, \
                 ?2, ?3, ?4, ?5)",
                params![
                    account.id.to_string(),
                    account.username,
                    password_hash,
                    account.is_admin,
                    account.created
                ],
            );
            match inserted {
                Ok(_) => {
                    tracing::info!(username, is_admin, "account created");
                    Ok(TxOutcome::Commit(Some(account)))
                }
                Err(err) if is_constraint_violation(&err) => Ok(TxOutcome::Rollback(None)),
                Err(err) => Err(db_error(&err).into()),
            }
        })
    }

    /// Verifies credentials and stamps `last_login` on success.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Internal`] when persistence fails.
    pub fn authenticate_account(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Account>, StoreError> {
        let row = self.with_read(|connection| query_account(connection, username))?;
        let Some(row) = row else {
            return Ok(None);
        };
        if !verify_password(password, &row.password_hash) {
            return Ok(None);
        }
        let mut account = row.into_account()?;
        let now = unix_seconds();
        self.with_transaction(|tx| -> Result<TxOutcome<()>, StoreError> {
            tx.execute(
                "UPDATE accounts SET last_login = ?1 WHERE id = ?2",
                params![now, account.id.to_string()],
            )
            .map_err(|err| db_error(&err))?;
            Ok(TxOutcome::Commit(()))
        })?;
        account.last_login = Some(now);
        Ok(Some(account))
    }

    /// Loads an account by username.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or the row is corrupt.
    pub fn load_account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let row = self.with_read(|connection| query_account(connection, username))?;
        Ok(row.map(AccountRow::into_account).transpose()?)
    }

    /// Lists accounts ordered by username.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or a row is corrupt.
    pub fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.with_read(|connection| -> Result<Vec<Account>, StoreError> {
            let mut stmt = connection
                .prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY username"))
                .map_err(|err| db_error(&err))?;
            let rows = stmt.query_map([], AccountRow::from_row).map_err(|err| db_error(&err))?;
            let mut accounts = Vec::new();
            for row in rows {
                accounts.push(row.map_err(|err| db_error(&err))?.into_account()?);
            }
            Ok(accounts)
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Raw `accounts` row.
struct AccountRow {
    /// Stored identifier text.
    id: String,
    /// Username.
    username: String,
    /// Argon2 PHC string.
    password_hash: String,
    /// Administrator flag.
    is_admin: bool,
    /// Creation time.
    created: i64,
    /// Last login time.
    last_login: Option<i64>,
}

impl AccountRow {
    /// Reads a row selected with [`ACCOUNT_COLUMNS`].
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            is_admin: row.get(3)?,
            created: row.get(4)?,
            last_login: row.get(5)?,
        })
    }

    /// Validates stored fields into an [`Account`], dropping the hash.
    fn into_account(self) -> Result<Account, SqliteStoreError> {
        Ok(Account {
            id: parse_account_id(&self.id)?,
            username: self.username,
            is_admin: self.is_admin,
            created: self.created,
            last_login: self.last_login,
        })
    }
}

/// Loads one account row by username.
fn query_account(
    connection: &Connection,
    username: &str,
) -> Result<Option<AccountRow>, SqliteStoreError> {
    connection
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1"),
            params![username],
            AccountRow::from_row,
        )
        .optional()
        .map_err(|err| db_error(&err))
}

/// Checks that a username starts with a letter and continues with word characters.
fn validate_username(username: &str) -> Result<(), StoreError> {
    let mut chars = username.chars();
    let valid_start = chars.next().is_some_and(|first| first.is_ascii_alphabetic());
    let valid_rest = chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid_start || !valid_rest || username.len() > MAX_USERNAME_LENGTH {
        return Err(StoreError::Validation(format!(
            "invalid username '{username}': must start with a letter and contain only letters, \
             digits, or underscores"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_follow_word_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a_1").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("1abc").is_err());
        assert!(validate_username("_abc").is_err());
        assert!(validate_username("bad-name").is_err());
        assert!(validate_username("bad name").is_err());
    }
}
