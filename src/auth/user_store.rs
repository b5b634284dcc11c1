//! User Storage
//! Mission: Securely store and manage user accounts with SQLite

use crate::auth::models::{UpdateProfileRequest, User};
use anyhow::Result;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

/// Store-level failures; validation is kept distinct so the API layer can
/// return 400 for bad input and 500 for everything else
#[derive(Debug)]
pub enum StoreError {
    Validation(String),
    NotFound,
    Database(anyhow::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Validation(msg) => write!(f, "Validation error: {}", msg),
            StoreError::NotFound => write!(f, "Not found"),
            StoreError::Database(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Database(err)
    }
}

/// User storage with SQLite backend
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a new user store and initialize the schema
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_staff INTEGER NOT NULL DEFAULT 0,
                is_superuser INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Create a new user; the raw password is hashed and dropped here
    pub fn create_user(&self, email: &str, password: &str, name: &str) -> Result<User, StoreError> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| StoreError::Database(anyhow::anyhow!("Failed to hash password: {}", e)))?;

        let user = User {
            id: Uuid::new_v4(),
            email,
            name: name.to_string(),
            password_hash,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            created_at: Utc::now().to_rfc3339(),
        };

        self.insert(&user)?;

        info!("Created user: {}", user.email);

        Ok(user)
    }

    /// Create a user with staff + superuser flags forced on
    pub fn create_superuser(&self, email: &str, password: &str) -> Result<User, StoreError> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| StoreError::Database(anyhow::anyhow!("Failed to hash password: {}", e)))?;

        let user = User {
            id: Uuid::new_v4(),
            email,
            name: String::new(),
            password_hash,
            is_active: true,
            is_staff: true,
            is_superuser: true,
            created_at: Utc::now().to_rfc3339(),
        };

        self.insert(&user)?;

        info!("Created superuser: {}", user.email);

        Ok(user)
    }

    fn insert(&self, user: &User) -> Result<(), StoreError> {
        let conn = Connection::open(&self.db_path)?;

        let result = conn.execute(
            "INSERT INTO users (id, email, name, password_hash, is_active, is_staff, is_superuser, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.to_string(),
                user.email,
                user.name,
                user.password_hash,
                user.is_active,
                user.is_staff,
                user.is_superuser,
                user.created_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Validation(
                    "A user with this email already exists".to_string(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get user by email (normalized); absence is Ok(None), never an error
    pub fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_lowercase();
        let conn = Connection::open(&self.db_path)?;

        let user = conn
            .query_row(
                "SELECT id, email, name, password_hash, is_active, is_staff, is_superuser, created_at
                 FROM users WHERE email = ?1",
                params![email],
                map_user_row,
            )
            .optional()?;

        Ok(user)
    }

    /// Get user by id; absence is Ok(None), never an error
    pub fn get_by_id(&self, id: &Uuid) -> Result<Option<User>, StoreError> {
        let conn = Connection::open(&self.db_path)?;

        let user = conn
            .query_row(
                "SELECT id, email, name, password_hash, is_active, is_staff, is_superuser, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                map_user_row,
            )
            .optional()?;

        Ok(user)
    }

    /// Resolve email + password to an active user.
    ///
    /// Unknown email, wrong password, and inactive account all collapse to
    /// None so callers cannot distinguish them.
    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>, StoreError> {
        let Some(user) = self.get_by_email(email)? else {
            return Ok(None);
        };

        if !user.is_active {
            return Ok(None);
        }

        let valid = verify(password, &user.password_hash)
            .map_err(|e| StoreError::Database(anyhow::anyhow!("Failed to verify password: {}", e)))?;

        Ok(valid.then_some(user))
    }

    /// Update the profile allow-list: name and/or password (re-hashed)
    pub fn update_profile(
        &self,
        user_id: &Uuid,
        update: &UpdateProfileRequest,
    ) -> Result<User, StoreError> {
        // Validate everything before touching any column, so a rejected
        // update leaves the row untouched
        if let Some(password) = &update.password {
            validate_password(password)?;
        }

        let mut conn = Connection::open(&self.db_path)?;

        // Both columns commit together or not at all
        let tx = conn.transaction().map_err(StoreError::from)?;

        if let Some(name) = &update.name {
            tx.execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                params![name, user_id.to_string()],
            )?;
        }

        if let Some(password) = &update.password {
            let password_hash = hash(password, DEFAULT_COST).map_err(|e| {
                StoreError::Database(anyhow::anyhow!("Failed to hash password: {}", e))
            })?;
            tx.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, user_id.to_string()],
            )?;
        }

        tx.commit().map_err(StoreError::from)?;

        self.get_by_id(user_id)?.ok_or(StoreError::NotFound)
    }
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(User {
        id,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        is_staff: row.get(5)?,
        is_superuser: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Trim, lowercase, and sanity-check an email address
fn normalize_email(email: &str) -> Result<String, StoreError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(StoreError::Validation(
            "Email must not be blank".to_string(),
        ));
    }

    let valid_shape = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid_shape {
        return Err(StoreError::Validation(
            "Enter a valid email address".to_string(),
        ));
    }

    Ok(email)
}

fn validate_password(password: &str) -> Result<(), StoreError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StoreError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
