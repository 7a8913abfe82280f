use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_into};
use rocket::serde::json::Json;
use rocket::{delete, get, post};
use serde::{Deserialize, Serialize};

use crate::animals::models::Animal;
use crate::animals::repository;
use crate::db::schema::{comments, users};
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, ValidationError};
use crate::users::models::{Author, User};
use crate::users::CurrentUser;
use crate::utils::serialize_date;

#[derive(Debug, PartialEq, Queryable, Selectable, Identifiable, Associations)]
#[diesel(
    table_name = comments,
    belongs_to(Animal, foreign_key = animal_slug),
    check_for_backend(diesel::pg::Pg)
)]
pub struct Comment {
    pub id: i32,
    pub animal_slug: String,
    pub author_email: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
struct NewComment {
    animal_slug: String,
    author_email: String,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub body: String,
    pub author: Author,
}

impl CommentView {
    fn from_parts(comment: Comment, author: &User) -> CommentView {
        CommentView {
            id: comment.id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            body: comment.body,
            author: Author::from(author),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentContainer<T> {
    pub comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentsContainer<T> {
    pub comments: T,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    body: String,
}

/// Creates a comment owned by `author` against `animal`.
pub fn insert(
    connection: &mut PgConnection,
    animal: &Animal,
    author: &User,
    body: String,
) -> Result<Comment, ApiError> {
    if body.trim().is_empty() {
        return Err(ValidationError::from("body", "can't be empty").into());
    }
    let now = Utc::now();
    let new_comment = NewComment {
        animal_slug: animal.slug.clone(),
        author_email: author.email.clone(),
        body,
        created_at: now,
        updated_at: now,
    };
    insert_into(comments::table)
        .values(&new_comment)
        .get_result::<Comment>(connection)
        .map_err(ApiError::from)
}

/// Comments for one animal with their authors, creation order.
pub fn list_for(
    connection: &mut PgConnection,
    animal: &Animal,
) -> Result<Vec<(Comment, User)>, ApiError> {
    Comment::belonging_to(animal)
        .inner_join(users::table)
        .order(comments::created_at.asc())
        .select((Comment::as_select(), User::as_select()))
        .load::<(Comment, User)>(connection)
        .map_err(ApiError::from)
}

/// Deletes one comment. The comment must belong to the given animal, and the
/// caller must be the comment's author or the animal's author.
pub fn remove(
    connection: &mut PgConnection,
    animal: &Animal,
    id: i32,
    caller: &User,
) -> Result<(), ApiError> {
    let comment = comments::table
        .find(id)
        .first::<Comment>(connection)
        .optional()?
        .ok_or(ApiError::NotFound("comment"))?;
    if comment.animal_slug != animal.slug {
        return Err(ApiError::NotFound("comment"));
    }
    if comment.author_email != caller.email && animal.author_email != caller.email {
        return Err(ApiError::Forbidden(
            "you must be the comment author or the animal author to delete this comment",
        ));
    }
    diesel_delete(&comment).execute(connection)?;
    Ok(())
}

#[post("/<slug>/comments", format = "json", data = "<details>")]
pub fn add(
    mut connection: DbConnection,
    user: CurrentUser,
    slug: String,
    details: Json<CommentContainer<CommentBody>>,
) -> ApiResult<CommentContainer<CommentView>> {
    let user = user?;
    let animal = repository::find_by_slug(&mut connection, &slug)?;
    let comment = insert(
        &mut connection,
        &animal,
        &user,
        details.into_inner().comment.body,
    )?;
    Ok(Json(CommentContainer {
        comment: CommentView::from_parts(comment, &user),
    }))
}

#[get("/<slug>/comments", format = "json")]
pub fn get(
    mut connection: DbConnection,
    slug: String,
) -> ApiResult<CommentsContainer<Vec<CommentView>>> {
    let animal = repository::find_by_slug(&mut connection, &slug)?;
    let rows = list_for(&mut connection, &animal)?;
    let comments = rows
        .into_iter()
        .map(|(comment, author)| CommentView::from_parts(comment, &author))
        .collect();
    Ok(Json(CommentsContainer { comments }))
}

#[delete("/<slug>/comments/<id>", format = "json")]
pub fn delete(
    mut connection: DbConnection,
    user: CurrentUser,
    slug: String,
    id: i32,
) -> Result<(), ApiError> {
    let user = user?;
    let animal = repository::find_by_slug(&mut connection, &slug)?;
    remove(&mut connection, &animal, id, &user)
}
