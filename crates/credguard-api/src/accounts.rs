//! Registration and login flows
//!
//! Registration runs validate → uniqueness lookup → hash → insert. Nothing
//! is persisted unless every earlier step succeeded. Argon2 work runs on
//! the blocking pool so request workers stay responsive.

use std::sync::Arc;

use credguard_auth::{validate_registration, PasswordError, PasswordHasher, ValidationError};
use credguard_db::{Credential, CredentialStore, StoreError};
use serde_json::Value;
use thiserror::Error;
use tokio::task::{self, JoinError};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Blocking task failed: {0}")]
    Join(#[from] JoinError),
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AccountError::Validation(ValidationError::email_taken()),
            other => AccountError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<PasswordHasher>,
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: Arc<PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    /// Register a new credential from an untrusted request body
    pub async fn register(&self, body: &Value) -> Result<Credential, AccountError> {
        let input = validate_registration(body)?;

        if self.store.find_by_email(&input.email).await?.is_some() {
            debug!("Registration rejected: email already taken");
            return Err(ValidationError::email_taken().into());
        }

        let hasher = self.hasher.clone();
        let password = input.password;
        let password_hash = task::spawn_blocking(move || hasher.hash(&password)).await??;

        // A concurrent registration may have won since the lookup; the
        // store reports that as DuplicateEmail, which maps to EmailTaken.
        let credential = self.store.insert(&input.email, &password_hash).await?;

        info!("Registered user {}", credential.id);
        Ok(credential)
    }

    /// Check a login attempt
    ///
    /// Unknown emails still pay for one hash verification so the two
    /// failure cases take comparable time.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Credential, AccountError> {
        let credential = self.store.find_by_email(email).await?;

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored_hash = credential.as_ref().map(|c| c.password_hash.clone());
        let verified = task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => hasher.verify_dummy(&password),
        })
        .await?;

        match credential {
            Some(credential) if verified => Ok(credential),
            _ => Err(AccountError::InvalidCredentials),
        }
    }

    pub async fn find(&self, email: &str) -> Result<Credential, AccountError> {
        self.store
            .find_by_email(email)
            .await?
            .ok_or(AccountError::NotFound)
    }

    pub async fn list(&self) -> Result<Vec<Credential>, AccountError> {
        Ok(self.store.list().await?)
    }

    pub async fn delete(&self, email: &str) -> Result<(), AccountError> {
        if self.store.delete_by_email(email).await? {
            info!("Deleted account");
            Ok(())
        } else {
            Err(AccountError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use credguard_auth::{Field, HashingParams, ValidationErrorKind};
    use serde_json::json;
    use std::sync::Mutex;

    /// Store whose lookup never sees existing rows, as if a concurrent
    /// registration committed between lookup and insert.
    #[derive(Default)]
    struct RacingStore {
        rows: Mutex<Vec<Credential>>,
    }

    #[async_trait]
    impl CredentialStore for RacingStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<Credential>, StoreError> {
            Ok(None)
        }

        async fn insert(&self, email: &str, password_hash: &str) -> Result<Credential, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|c| c.email == email) {
                return Err(StoreError::DuplicateEmail);
            }
            let credential = Credential {
                id: Default::default(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: Utc::now(),
            };
            rows.push(credential.clone());
            Ok(credential)
        }

        async fn list(&self) -> Result<Vec<Credential>, StoreError> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn delete_by_email(&self, email: &str) -> Result<bool, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|c| c.email != email);
            Ok(rows.len() != before)
        }
    }

    fn service(store: Arc<dyn CredentialStore>) -> AccountService {
        let hasher = PasswordHasher::new(HashingParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        AccountService::new(store, Arc::new(hasher))
    }

    #[tokio::test]
    async fn test_constraint_violation_becomes_email_taken() {
        let service = service(Arc::new(RacingStore::default()));
        let body = json!({"email": "exampleEmail", "password": "examplePass1"});

        service.register(&body).await.expect("first registration");

        match service.register(&body).await {
            Err(AccountError::Validation(err)) => {
                assert_eq!(err.kind, ValidationErrorKind::EmailTaken);
                assert_eq!(err.location, Field::Email);
            }
            other => panic!("expected EmailTaken, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_input_persists_nothing() {
        let store = Arc::new(RacingStore::default());
        let service = service(store.clone());

        let result = service
            .register(&json!({"email": "exampleEmail", "password": "short"}))
            .await;
        assert!(matches!(result, Err(AccountError::Validation(_))));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stored_hash_is_not_the_password() {
        let store = Arc::new(RacingStore::default());
        let service = service(store.clone());

        let credential = service
            .register(&json!({"email": "exampleEmail", "password": "examplePass1"}))
            .await
            .unwrap();
        assert_ne!(credential.password_hash, "examplePass1");
        assert!(credential.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_identical() {
        let store = Arc::new(RacingStore::default());
        let service = service(store);
        service
            .register(&json!({"email": "exampleEmail", "password": "examplePass1"}))
            .await
            .unwrap();

        // RacingStore lookups always miss, so only the error shape is exercised here
        let unknown = service.authenticate("nobody", "examplePass1").await;
        let wrong = service.authenticate("exampleEmail", "wrongPass12").await;
        assert!(matches!(unknown, Err(AccountError::InvalidCredentials)));
        assert!(matches!(wrong, Err(AccountError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_delete_missing_account() {
        let service = service(Arc::new(RacingStore::default()));
        assert!(matches!(
            service.delete("nobody").await,
            Err(AccountError::NotFound)
        ));
    }
}
