//! Registration input validation
//!
//! Checks run in a fixed order and stop at the first failure, so clients
//! always see the same message for the same bad input:
//!
//! 1. presence (`email`, then `password`)
//! 2. string type (`email`, then `password`)
//! 3. no leading/trailing whitespace (`email`, then `password`)
//! 4. lengths: `email` minimum, `password` minimum, `password` maximum
//!
//! The email is only length-checked. No address format is enforced.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Minimum email length, in characters
pub const EMAIL_MIN_LEN: usize = 4;
/// Minimum password length, in characters
pub const PASSWORD_MIN_LEN: usize = 10;
/// Maximum password length, in characters
pub const PASSWORD_MAX_LEN: usize = 72;

/// Registration field a validation failure points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Password,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Email => "email",
            Field::Password => "password",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong with a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    MissingField,
    IncorrectFieldType,
    WhitespaceNotAllowed,
    TooShort { min: usize },
    TooLong { max: usize },
    /// Another credential already uses this email
    EmailTaken,
}

/// A single structured rejection of registration input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {}", self.message())]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub location: Field,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, location: Field) -> Self {
        Self { kind, location }
    }

    pub fn email_taken() -> Self {
        Self::new(ValidationErrorKind::EmailTaken, Field::Email)
    }

    /// Client-facing message. These strings are part of the API contract.
    pub fn message(&self) -> String {
        match self.kind {
            ValidationErrorKind::MissingField => "Missing field".to_string(),
            ValidationErrorKind::IncorrectFieldType => {
                "Incorrect field type: expected string".to_string()
            }
            ValidationErrorKind::WhitespaceNotAllowed => {
                "Cannot start or end with whitespace".to_string()
            }
            ValidationErrorKind::TooShort { min } => {
                format!("Must be at least {} characters long", min)
            }
            ValidationErrorKind::TooLong { max } => {
                format!("Must be at most {} characters long", max)
            }
            ValidationErrorKind::EmailTaken => "Email already taken".to_string(),
        }
    }
}

/// Validated registration credentials
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationInput {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegistrationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationInput")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

const FIELDS: [Field; 2] = [Field::Email, Field::Password];

/// Validate raw registration input
///
/// `input` is the untrusted request body. Anything that is not a JSON
/// object is treated as having no fields at all. A field explicitly set to
/// `null` counts as present but of the wrong type.
///
/// # Example
/// ```
/// use credguard_auth::validator::{validate_registration, Field, ValidationErrorKind};
/// use serde_json::json;
///
/// let ok = validate_registration(&json!({"email": "exampleEmail", "password": "examplePass1"}))
///     .unwrap();
/// assert_eq!(ok.email, "exampleEmail");
///
/// let err = validate_registration(&json!({"email": "abc", "password": "1234567890"}))
///     .unwrap_err();
/// assert_eq!(err.kind, ValidationErrorKind::TooShort { min: 4 });
/// assert_eq!(err.location, Field::Email);
/// ```
pub fn validate_registration(input: &Value) -> Result<RegistrationInput, ValidationError> {
    let object = input.as_object();
    let raw = |field: Field| object.and_then(|o| o.get(field.as_str()));

    for field in FIELDS {
        if raw(field).is_none() {
            return Err(ValidationError::new(ValidationErrorKind::MissingField, field));
        }
    }

    let mut strings = [""; 2];
    for (slot, field) in strings.iter_mut().zip(FIELDS) {
        *slot = raw(field).and_then(Value::as_str).ok_or_else(|| {
            ValidationError::new(ValidationErrorKind::IncorrectFieldType, field)
        })?;
    }
    let [email, password] = strings;

    for (value, field) in [(email, Field::Email), (password, Field::Password)] {
        if value.trim() != value {
            return Err(ValidationError::new(
                ValidationErrorKind::WhitespaceNotAllowed,
                field,
            ));
        }
    }

    if email.chars().count() < EMAIL_MIN_LEN {
        return Err(ValidationError::new(
            ValidationErrorKind::TooShort { min: EMAIL_MIN_LEN },
            Field::Email,
        ));
    }

    let password_len = password.chars().count();
    if password_len < PASSWORD_MIN_LEN {
        return Err(ValidationError::new(
            ValidationErrorKind::TooShort {
                min: PASSWORD_MIN_LEN,
            },
            Field::Password,
        ));
    }
    if password_len > PASSWORD_MAX_LEN {
        return Err(ValidationError::new(
            ValidationErrorKind::TooLong {
                max: PASSWORD_MAX_LEN,
            },
            Field::Password,
        ));
    }

    Ok(RegistrationInput {
        email: email.to_string(),
        password: password.to_string(),
    })
}
