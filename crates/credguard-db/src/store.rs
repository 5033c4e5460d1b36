//! Credential store
//!
//! The store is the only shared resource in the service. Its uniqueness
//! guarantee comes from the database constraint: an insert racing past an
//! application-level lookup surfaces as [`StoreError::DuplicateEmail`],
//! never as an overwrite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::entities::user;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A credential with this email already exists
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// A stored identity
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl From<user::Model> for Credential {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            password_hash: model.password_hash,
            created_at: model.created_at,
        }
    }
}

/// Persistence collaborator for credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact-match lookup
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError>;

    /// Persist a new credential. Fails with `DuplicateEmail` if the email is taken.
    async fn insert(&self, email: &str, password_hash: &str) -> Result<Credential, StoreError>;

    /// All credentials, oldest first
    async fn list(&self) -> Result<Vec<Credential>, StoreError>;

    /// Remove a credential. Returns whether anything was deleted.
    async fn delete_by_email(&self, email: &str) -> Result<bool, StoreError>;
}

/// sea-orm backed store
#[derive(Clone)]
pub struct SeaOrmCredentialStore {
    db: DatabaseConnection,
}

impl SeaOrmCredentialStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn translate_insert_error(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            debug!("Unique constraint violation on insert: {}", detail);
            StoreError::DuplicateEmail
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl CredentialStore for SeaOrmCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        Ok(found.map(Credential::from))
    }

    async fn insert(&self, email: &str, password_hash: &str) -> Result<Credential, StoreError> {
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = model.insert(&self.db).await.map_err(translate_insert_error)?;

        Ok(inserted.into())
    }

    async fn list(&self) -> Result<Vec<Credential>, StoreError> {
        let users = user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Email)
            .all(&self.db)
            .await?;

        Ok(users.into_iter().map(Credential::from).collect())
    }

    async fn delete_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let result = user::Entity::delete_many()
            .filter(user::Column::Email.eq(email))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
