use diesel::prelude::*;
use rocket::get;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::db::schema::tags;
use crate::db::DbConnection;
use crate::types::ApiResult;

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[get("/", format = "json")]
pub fn list(mut connection: DbConnection) -> ApiResult<TagsResponse> {
    let tags = tags::table
        .select(tags::name)
        .order(tags::name.asc())
        .load::<String>(&mut *connection)?;
    Ok(Json(TagsResponse { tags }))
}
