use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{insert_into, select, update as diesel_update};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::serde::json::Json;
use rocket::{get, post, put};
use serde::Deserialize;

pub mod models;
mod utils;

use crate::db::schema::users;
use crate::db::{DbConnection, Pool};
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use self::models::{Account, NewUser, User, UserResponse};
use self::utils::*;

/// Handlers that require a caller take this guard; public reads take
/// `Option<User>` instead.
pub type CurrentUser = Result<User, ApiError>;

/// Resolves `Authorization: Token <jwt>` to a user row. The token carries the
/// caller's email as its subject; everything downstream of this guard works
/// with an already-verified identity.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(header) = request.headers().get_one("Authorization") else {
            return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized));
        };
        let token = header
            .strip_prefix("Token ")
            .or_else(|| header.strip_prefix("Bearer "))
            .unwrap_or(header);

        let Some(pool) = request.rocket().state::<Pool>() else {
            return Outcome::Error((Status::InternalServerError, ApiError::Internal));
        };
        let Ok(mut connection) = pool.get() else {
            return Outcome::Error((Status::ServiceUnavailable, ApiError::Internal));
        };

        match User::load_from_token(token, &mut connection) {
            Ok(user) => Outcome::Success(user),
            Err(error @ ApiError::Validation(_)) => {
                Outcome::Error((Status::UnprocessableEntity, error))
            }
            Err(ApiError::NotFound(_)) => Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistrationDetails {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    user: RegistrationDetails,
}

impl Validate for Registration {
    type Error = ApiError;

    fn validate(self, connection: &mut PgConnection) -> Result<Self, ApiError> {
        let mut errors = ValidationError::default();

        match validate_email(&self.user.email, connection) {
            Ok(_) => {}
            Err(ApiError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        if let Err(e) = validate_password(&self.user.password) {
            errors.merge(e);
        }

        if let Err(e) = validate_username_re(&self.user.username) {
            errors.merge(e);
        }

        let username_exists = select(exists(
            users::table.filter(users::username.eq(&self.user.username)),
        ))
        .get_result::<bool>(connection)?;
        if username_exists {
            errors.add("username", "is already taken");
        }

        if errors.empty() {
            Ok(self)
        } else {
            Err(errors.into())
        }
    }
}

#[post("/", format = "json", data = "<registration>")]
pub fn register(
    mut connection: DbConnection,
    registration: Json<Registration>,
) -> ApiResult<UserResponse> {
    let registration = registration.into_inner().validate(&mut connection)?;
    let new_user = NewUser {
        email: registration.user.email,
        username: registration.user.username,
        password: User::make_password(&registration.user.password)?,
    };

    let user = insert_into(users::table)
        .values(&new_user)
        .get_result::<User>(&mut *connection)?;
    let token = user.token()?;
    Ok(Json(UserResponse {
        user: Account::new(&user, token),
    }))
}

#[derive(Debug, Deserialize)]
struct LoginDetails {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    user: LoginDetails,
}

#[post("/login", format = "json", data = "<login>")]
pub fn login(mut connection: DbConnection, login: Json<Login>) -> ApiResult<UserResponse> {
    let login = login.into_inner();
    let user = users::table
        .filter(users::email.eq(&login.user.email))
        .first::<User>(&mut *connection)
        .optional()?
        .ok_or_else(|| ValidationError::from("email or password", "is invalid"))?;

    if !user.verify_password(&login.user.password)? {
        return Err(ValidationError::from("email or password", "is invalid").into());
    }

    let token = user.token()?;
    Ok(Json(UserResponse {
        user: Account::new(&user, token),
    }))
}

#[get("/user", format = "json")]
pub fn current(user: CurrentUser) -> ApiResult<UserResponse> {
    let user = user?;
    let token = user.token()?;
    Ok(Json(UserResponse {
        user: Account::new(&user, token),
    }))
}

/// Patch semantics: only supplied fields change. The email is the identity
/// key and cannot be changed.
#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    username: Option<String>,
    bio: Option<String>,
    image: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    user: UpdateUser,
}

#[put("/user", format = "json", data = "<update>")]
pub fn update(
    current_user: CurrentUser,
    mut connection: DbConnection,
    update: Json<Update>,
) -> ApiResult<UserResponse> {
    let mut user = current_user?;
    let mut error = ValidationError::default();
    let update = update.into_inner().user;

    if update.bio.is_some() {
        user.bio = update.bio;
    }
    if update.image.is_some() {
        user.image = update.image;
    }

    if let Some(new_username) = update.username {
        match validate_username_re(&new_username) {
            Err(e) => error.merge(e),
            Ok(_) => user.username = new_username,
        }
        let expr = users::table
            .filter(users::username.eq(&user.username))
            .filter(users::email.ne(&user.email));
        let username_exists = select(exists(expr)).get_result::<bool>(&mut *connection)?;
        if username_exists {
            error.add("username", "is already taken");
        }
    }

    if let Some(new_password) = update.password {
        match validate_password(&new_password) {
            Err(e) => error.merge(e),
            Ok(_) => user.new_password(&new_password)?,
        }
    }

    if !error.empty() {
        return Err(error.into());
    }

    let user = diesel_update(&user)
        .set(&user)
        .get_result::<User>(&mut *connection)?;
    let token = user.token()?;
    Ok(Json(UserResponse {
        user: Account::new(&user, token),
    }))
}
