use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use lazy_static::lazy_static;
use regex::Regex;

use crate::db::schema::users;
use crate::types::{ApiError, ValidationError};

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from("email", "is invalid"))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    if username.trim().len() < 3 {
        Err(ValidationError::from("username", "must be at least 3 characters"))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < 8 {
        Err(ValidationError::from("password", "must be at least 8 characters"))
    } else {
        Ok(())
    }
}

/// Format check plus a uniqueness probe against the identity store.
pub fn validate_email(email_to_validate: &str, connection: &mut PgConnection) -> Result<(), ApiError> {
    let mut errors = ValidationError::default();
    if let Err(error) = validate_email_re(email_to_validate) {
        errors.merge(error);
    }

    let email_exists = select(exists(users::table.find(email_to_validate)))
        .get_result::<bool>(connection)?;
    if email_exists {
        errors.add("email", "is already taken");
    }

    if errors.empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}
