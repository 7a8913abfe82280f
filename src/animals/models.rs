use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use slug::slugify;

use crate::db::schema::animals;
use crate::types::{Validate, ValidationError};
use crate::users::models::{Author, User};
use crate::utils::serialize_date;

/// An animal post. The slug is derived from the title once at creation and is
/// immutable afterwards, so it stays a stable primary key even when the title
/// changes.
#[derive(Debug, PartialEq, Queryable, Selectable, Identifiable, Associations)]
#[diesel(
    table_name = animals,
    primary_key(slug),
    belongs_to(User, foreign_key = author_email),
    check_for_backend(diesel::pg::Pg)
)]
pub struct Animal {
    pub slug: String,
    pub author_email: String,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = animals)]
pub struct NewAnimal {
    pub slug: String,
    pub author_email: String,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = animals)]
pub struct AnimalChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AnimalDetails {
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    #[serde(default, rename = "tagList")]
    pub tag_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnimal {
    pub animal: AnimalDetails,
}

fn check_details(details: &AnimalDetails) -> ValidationError {
    let mut error = ValidationError::default();
    if details.title.trim().is_empty() {
        error.add("title", "can't be empty");
    } else if slugify(&details.title).is_empty() {
        error.add("title", "must contain at least one alphanumeric character");
    }

    if details.body.trim().is_empty() {
        error.add("body", "can't be empty");
    }
    error
}

impl Validate for CreateAnimal {
    type Error = ValidationError;

    fn validate(self, _connection: &mut PgConnection) -> Result<Self, ValidationError> {
        let error = check_details(&self.animal);
        if error.empty() {
            Ok(self)
        } else {
            Err(error)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateDetails {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAnimal {
    pub animal: UpdateDetails,
}

fn check_changes(details: &UpdateDetails) -> ValidationError {
    let mut error = ValidationError::default();
    if let Some(title) = &details.title {
        if title.trim().is_empty() {
            error.add("title", "can't be empty");
        }
    }
    if let Some(body) = &details.body {
        if body.trim().is_empty() {
            error.add("body", "can't be empty");
        }
    }
    error
}

impl Validate for UpdateAnimal {
    type Error = ValidationError;

    fn validate(self, _connection: &mut PgConnection) -> Result<Self, ValidationError> {
        let error = check_changes(&self.animal);
        if error.empty() {
            Ok(self)
        } else {
            Err(error)
        }
    }
}

/// The public shape of a single animal: post fields, ordered tag names, the
/// stripped author projection, and the viewer-relative favorite fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalView {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub favorited: bool,
    pub favorited_count: i64,
    pub author: Author,
}

impl AnimalView {
    pub fn from_parts(
        animal: Animal,
        author: &User,
        tag_list: Vec<String>,
        favorited: bool,
        favorited_count: i64,
    ) -> AnimalView {
        AnimalView {
            slug: animal.slug,
            title: animal.title,
            body: animal.body,
            image: animal.image,
            tag_list,
            created_at: animal.created_at,
            updated_at: animal.updated_at,
            favorited,
            favorited_count,
            author: Author::from(author),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnimalResponse {
    pub animal: AnimalView,
}

#[derive(Debug, Serialize)]
pub struct AnimalsResponse {
    pub animals: Vec<AnimalView>,
}
