use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_into, select};
use rocket::serde::json::Json;
use rocket::{delete, post};

use crate::animals::models::{Animal, AnimalResponse};
use crate::animals::repository;
use crate::db::schema::favorites;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult};
use crate::users::models::User;
use crate::users::CurrentUser;

/// Links the user to the animal. Favoriting twice is a no-op, so the pair
/// stays unique and the count stable.
pub fn add_favorite(
    connection: &mut PgConnection,
    animal: &Animal,
    user: &User,
) -> Result<(), ApiError> {
    insert_into(favorites::table)
        .values((
            favorites::user_email.eq(&user.email),
            favorites::animal_slug.eq(&animal.slug),
        ))
        .on_conflict((favorites::user_email, favorites::animal_slug))
        .do_nothing()
        .execute(connection)?;
    Ok(())
}

/// Unlinks the user from the animal; unfavoriting something never favorited
/// is a no-op, not an error.
pub fn remove_favorite(
    connection: &mut PgConnection,
    animal: &Animal,
    user: &User,
) -> Result<(), ApiError> {
    diesel_delete(favorites::table.find((&user.email, &animal.slug))).execute(connection)?;
    Ok(())
}

pub fn favorited_count(connection: &mut PgConnection, slug: &str) -> Result<i64, ApiError> {
    favorites::table
        .filter(favorites::animal_slug.eq(slug))
        .count()
        .get_result::<i64>(connection)
        .map_err(ApiError::from)
}

pub fn is_favorited_by(
    connection: &mut PgConnection,
    slug: &str,
    viewer: &str,
) -> Result<bool, ApiError> {
    select(exists(favorites::table.find((viewer, slug))))
        .get_result::<bool>(connection)
        .map_err(ApiError::from)
}

#[post("/<slug>/favorite", format = "json")]
pub fn favorite(
    mut connection: DbConnection,
    user: CurrentUser,
    slug: String,
) -> ApiResult<AnimalResponse> {
    let user = user?;
    let animal = repository::find_by_slug(&mut connection, &slug)?;
    add_favorite(&mut connection, &animal, &user)?;
    let author = User::load_by_email(&animal.author_email, &mut connection)?;
    let animal = repository::project_one(&mut connection, animal, &author, Some(&user))?;
    Ok(Json(AnimalResponse { animal }))
}

#[delete("/<slug>/favorite", format = "json")]
pub fn unfavorite(
    mut connection: DbConnection,
    user: CurrentUser,
    slug: String,
) -> ApiResult<AnimalResponse> {
    let user = user?;
    let animal = repository::find_by_slug(&mut connection, &slug)?;
    remove_favorite(&mut connection, &animal, &user)?;
    let author = User::load_by_email(&animal.author_email, &mut connection)?;
    let animal = repository::project_one(&mut connection, animal, &author, Some(&user))?;
    Ok(Json(AnimalResponse { animal }))
}
