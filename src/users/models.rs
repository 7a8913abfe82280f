use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;

use crate::db::schema::users;
use crate::types::{ApiError, ValidationError};

const TOKEN_TTL_DAYS: i64 = 60;

/// A user row. The `password` field holds the argon2 hash and is never
/// serialized; handlers expose users through `Account` or `Author` instead.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = users, primary_key(email), check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub email: String,
    pub username: String,
    pub password: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// The author projection attached to animals and comments: username, bio and
/// image only. Email and password never appear here.
#[derive(Debug, Serialize)]
pub struct Author {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl From<&User> for Author {
    fn from(user: &User) -> Author {
        Author {
            username: user.username.clone(),
            bio: user.bio.clone(),
            image: user.image.clone(),
        }
    }
}

/// The `{"user": ...}` envelope returned by the account routes.
#[derive(Debug, Serialize)]
pub struct Account {
    pub email: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub token: String,
}

impl Account {
    pub fn new(user: &User, token: String) -> Account {
        Account {
            email: user.email.clone(),
            username: user.username.clone(),
            bio: user.bio.clone(),
            image: user.image.clone(),
            token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: Account,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

fn secret() -> Result<String, ApiError> {
    env::var("SECRET_KEY").map_err(|_| {
        log::error!("SECRET_KEY is not set");
        ApiError::Internal
    })
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| ApiError::Internal)
    }

    pub fn new_password(&mut self, password: &str) -> Result<(), ApiError> {
        self.password = User::make_password(password)?;
        Ok(())
    }

    pub fn verify_password(&self, candidate: &str) -> Result<bool, ApiError> {
        let parsed = PasswordHash::new(&self.password).map_err(|_| ApiError::Internal)?;
        Ok(Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn token(&self) -> Result<String, ApiError> {
        let claims = Claims {
            sub: self.email.clone(),
            exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret()?.as_bytes()),
        )
        .map_err(|_| ApiError::Internal)
    }

    pub fn load_from_token(token: &str, connection: &mut PgConnection) -> Result<User, ApiError> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret()?.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::Validation(ValidationError::from("token", "is invalid")))?;
        User::load_by_email(&data.claims.sub, connection)
    }

    pub fn load_by_email(email: &str, connection: &mut PgConnection) -> Result<User, ApiError> {
        users::table
            .find(email)
            .first::<User>(connection)
            .optional()?
            .ok_or(ApiError::NotFound("user"))
    }

    pub fn load_by_name(name: &str, connection: &mut PgConnection) -> Result<User, ApiError> {
        users::table
            .filter(users::username.eq(name))
            .first::<User>(connection)
            .optional()?
            .ok_or(ApiError::NotFound("user"))
    }

    /// Removes the account. Owned animals, comments, favorites and follow
    /// edges go with it through the schema's cascades.
    pub fn delete(email: &str, connection: &mut PgConnection) -> Result<(), ApiError> {
        diesel::delete(users::table.find(email)).execute(connection)?;
        Ok(())
    }
}
