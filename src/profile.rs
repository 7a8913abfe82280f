use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_into, select};
use rocket::serde::json::Json;
use rocket::{delete, get, post};
use serde::Serialize;
use std::borrow::Cow;

use crate::db::schema::followers;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;

#[derive(Debug, Serialize)]
pub struct ProfileResponse<'a> {
    profile: Profile<'a>,
}

#[derive(Debug, Serialize)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub bio: Option<Cow<'a, str>>,
    pub image: Option<Cow<'a, str>>,
    pub following: bool,
}

impl Profile<'static> {
    fn owned(user: User, following: bool) -> Self {
        Profile {
            username: Cow::Owned(user.username),
            bio: user.bio.map(Cow::Owned),
            image: user.image.map(Cow::Owned),
            following,
        }
    }
}

/// True iff `follower` follows `followed`. Both arguments are user emails.
pub fn is_following(
    connection: &mut PgConnection,
    followed: &str,
    follower: &str,
) -> Result<bool, ApiError> {
    select(exists(followers::table.find((followed, follower))))
        .get_result::<bool>(connection)
        .map_err(ApiError::from)
}

/// Adds the directed follow edge. Inserting an existing edge is a no-op.
pub fn follow_user(
    connection: &mut PgConnection,
    follower: &User,
    name: &str,
) -> Result<User, ApiError> {
    let target = User::load_by_name(name, connection)?;
    if target.email == follower.email {
        return Err(ValidationError::from("profile", "cannot follow yourself").into());
    }
    insert_into(followers::table)
        .values((
            followers::user_email.eq(&target.email),
            followers::follower_email.eq(&follower.email),
        ))
        .on_conflict((followers::user_email, followers::follower_email))
        .do_nothing()
        .execute(connection)?;
    Ok(target)
}

/// Removes the follow edge; removing an absent edge is a no-op.
pub fn unfollow_user(
    connection: &mut PgConnection,
    follower: &User,
    name: &str,
) -> Result<User, ApiError> {
    let target = User::load_by_name(name, connection)?;
    diesel_delete(followers::table.find((&target.email, &follower.email)))
        .execute(connection)?;
    Ok(target)
}

#[get("/profiles/<name>", format = "json")]
pub fn profile(
    mut connection: DbConnection,
    current_user: Option<User>,
    name: String,
) -> ApiResult<ProfileResponse<'static>> {
    let user = User::load_by_name(&name, &mut connection)?;
    let following = match current_user {
        Some(current) => is_following(&mut connection, &user.email, &current.email)?,
        None => false,
    };

    Ok(Json(ProfileResponse {
        profile: Profile::owned(user, following),
    }))
}

#[post("/profiles/<name>/follow", format = "json")]
pub fn follow(
    mut connection: DbConnection,
    current_user: CurrentUser,
    name: String,
) -> ApiResult<ProfileResponse<'static>> {
    let current = current_user?;
    let target = follow_user(&mut connection, &current, &name)?;
    Ok(Json(ProfileResponse {
        profile: Profile::owned(target, true),
    }))
}

#[delete("/profiles/<name>/follow", format = "json")]
pub fn unfollow(
    mut connection: DbConnection,
    current_user: CurrentUser,
    name: String,
) -> ApiResult<ProfileResponse<'static>> {
    let current = current_user?;
    let target = unfollow_user(&mut connection, &current, &name)?;
    Ok(Json(ProfileResponse {
        profile: Profile::owned(target, false),
    }))
}
