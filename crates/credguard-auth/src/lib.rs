//! Credential validation, password hashing and session tokens

pub mod jwt;
pub mod password;
pub mod validator;

pub use jwt::{SessionClaims, SessionError, SessionTokens};
pub use password::{HashingParams, PasswordError, PasswordHasher};
pub use validator::{
    validate_registration, Field, RegistrationInput, ValidationError, ValidationErrorKind,
    EMAIL_MIN_LEN, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN,
};
