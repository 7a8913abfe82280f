use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put};

use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate};
use crate::users::models::User;
use crate::users::CurrentUser;

pub mod models;
pub mod repository;

use self::models::{AnimalResponse, AnimalsResponse, CreateAnimal, UpdateAnimal};
use self::repository::AnimalFilter;

#[get("/?<tag>&<author>&<limit>&<offset>", format = "json")]
pub fn list(
    mut connection: DbConnection,
    viewer: Option<User>,
    tag: Option<String>,
    author: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<AnimalsResponse> {
    let filter = AnimalFilter {
        tag,
        author,
        limit,
        offset,
    };
    let rows = repository::list(&mut connection, &filter)?;
    let animals = repository::project_many(&mut connection, rows, viewer.as_ref())?;
    Ok(Json(AnimalsResponse { animals }))
}

#[get("/feed?<limit>&<offset>", format = "json")]
pub fn feed(
    mut connection: DbConnection,
    user: CurrentUser,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<AnimalsResponse> {
    let user = user?;
    let rows = repository::feed(&mut connection, &user, limit, offset)?;
    let animals = repository::project_many(&mut connection, rows, Some(&user))?;
    Ok(Json(AnimalsResponse { animals }))
}

#[get("/<slug>", format = "json")]
pub fn get(
    mut connection: DbConnection,
    viewer: Option<User>,
    slug: String,
) -> ApiResult<AnimalResponse> {
    let animal = repository::find_by_slug(&mut connection, &slug)?;
    let author = User::load_by_email(&animal.author_email, &mut connection)?;
    let animal = repository::project_one(&mut connection, animal, &author, viewer.as_ref())?;
    Ok(Json(AnimalResponse { animal }))
}

#[post("/", format = "json", data = "<create>")]
pub fn create(
    mut connection: DbConnection,
    user: CurrentUser,
    create: Json<CreateAnimal>,
) -> Result<Created<Json<AnimalResponse>>, ApiError> {
    let user = user?;
    let create = create.into_inner().validate(&mut connection)?;
    let animal = repository::create(&mut connection, &user, create.animal)?;
    let location = format!("/api/animals/{}", animal.slug);
    let animal = repository::project_one(&mut connection, animal, &user, Some(&user))?;
    Ok(Created::new(location).body(Json(AnimalResponse { animal })))
}

#[put("/<slug>", format = "json", data = "<update>")]
pub fn update(
    mut connection: DbConnection,
    user: CurrentUser,
    slug: String,
    update: Json<UpdateAnimal>,
) -> ApiResult<AnimalResponse> {
    let user = user?;
    let update = update.into_inner().validate(&mut connection)?;
    let animal = repository::update(&mut connection, &slug, &user, update.animal)?;
    let animal = repository::project_one(&mut connection, animal, &user, Some(&user))?;
    Ok(Json(AnimalResponse { animal }))
}

#[delete("/<slug>", format = "json")]
pub fn delete(
    mut connection: DbConnection,
    user: CurrentUser,
    slug: String,
) -> Result<(), ApiError> {
    let user = user?;
    repository::delete(&mut connection, &slug, &user)
}
