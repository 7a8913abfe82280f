use chrono::Utc;
use diesel::dsl::count_star;
use diesel::insert_into;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use slug::slugify;
use std::collections::{HashMap, HashSet};

use crate::db::schema::{animal_tags, animals, favorites, followers, tags, users};
use crate::favorite;
use crate::types::ApiError;
use crate::users::models::User;

use super::models::{Animal, AnimalChanges, AnimalDetails, AnimalView, NewAnimal, UpdateDetails};

const DEFAULT_PAGE_SIZE: i64 = 20;

/// Optional filters for the animal listing; both may be combined.
#[derive(Debug, Default)]
pub struct AnimalFilter {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).max(0),
        offset.unwrap_or(0).max(0),
    )
}

pub fn find_by_slug(connection: &mut PgConnection, slug: &str) -> Result<Animal, ApiError> {
    animals::table
        .find(slug)
        .first::<Animal>(connection)
        .optional()?
        .ok_or(ApiError::NotFound("animal"))
}

fn link_tags(
    connection: &mut PgConnection,
    slug: &str,
    tag_list: &[String],
) -> Result<(), DieselError> {
    for name in tag_list {
        insert_into(tags::table)
            .values(tags::name.eq(name))
            .on_conflict_do_nothing()
            .execute(connection)?;
        insert_into(animal_tags::table)
            .values((
                animal_tags::animal_slug.eq(slug),
                animal_tags::tag_name.eq(name),
            ))
            .on_conflict_do_nothing()
            .execute(connection)?;
    }
    Ok(())
}

/// Persists a new animal and its tag links in one transaction. The slug is
/// `slugify(title)`; a collision with an existing animal is a conflict, not a
/// silent overwrite.
pub fn create(
    connection: &mut PgConnection,
    author: &User,
    details: AnimalDetails,
) -> Result<Animal, ApiError> {
    let now = Utc::now();
    let new_animal = NewAnimal {
        slug: slugify(&details.title),
        author_email: author.email.clone(),
        title: details.title,
        body: details.body,
        image: details.image,
        created_at: now,
        updated_at: now,
    };

    connection.transaction::<Animal, ApiError, _>(|connection| {
        let animal = insert_into(animals::table)
            .values(&new_animal)
            .get_result::<Animal>(connection)
            .map_err(|error| match error {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    ApiError::Conflict(format!(
                        "an animal with the slug \"{}\" already exists",
                        new_animal.slug
                    ))
                }
                other => other.into(),
            })?;
        link_tags(connection, &animal.slug, &details.tag_list)?;
        Ok(animal)
    })
}

/// Applies the supplied fields only. The slug stays what creation derived,
/// whatever happens to the title.
pub fn update(
    connection: &mut PgConnection,
    slug: &str,
    caller: &User,
    details: UpdateDetails,
) -> Result<Animal, ApiError> {
    let animal = find_by_slug(connection, slug)?;
    if animal.author_email != caller.email {
        return Err(ApiError::Forbidden(
            "you must be the author to modify this animal",
        ));
    }

    let changes = AnimalChanges {
        title: details.title,
        body: details.body,
        updated_at: Utc::now(),
    };
    diesel::update(&animal)
        .set(&changes)
        .get_result::<Animal>(connection)
        .map_err(ApiError::from)
}

pub fn delete(connection: &mut PgConnection, slug: &str, caller: &User) -> Result<(), ApiError> {
    let animal = find_by_slug(connection, slug)?;
    if animal.author_email != caller.email {
        return Err(ApiError::Forbidden(
            "you must be the author to delete this animal",
        ));
    }
    diesel::delete(&animal).execute(connection)?;
    Ok(())
}

/// Most recent first, page-sized by limit/offset. Filtering by an unknown tag
/// or author yields an empty page, not an error.
pub fn list(
    connection: &mut PgConnection,
    filter: &AnimalFilter,
) -> Result<Vec<(Animal, User)>, ApiError> {
    let (limit, offset) = page(filter.limit, filter.offset);
    let rows = match (&filter.tag, &filter.author) {
        (Some(tag), Some(author)) => animals::table
            .inner_join(users::table)
            .inner_join(animal_tags::table)
            .filter(animal_tags::tag_name.eq(tag))
            .filter(users::username.eq(author))
            .order(animals::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select((Animal::as_select(), User::as_select()))
            .load::<(Animal, User)>(connection)?,
        (Some(tag), None) => animals::table
            .inner_join(users::table)
            .inner_join(animal_tags::table)
            .filter(animal_tags::tag_name.eq(tag))
            .order(animals::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select((Animal::as_select(), User::as_select()))
            .load::<(Animal, User)>(connection)?,
        (None, Some(author)) => animals::table
            .inner_join(users::table)
            .filter(users::username.eq(author))
            .order(animals::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select((Animal::as_select(), User::as_select()))
            .load::<(Animal, User)>(connection)?,
        (None, None) => animals::table
            .inner_join(users::table)
            .order(animals::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select((Animal::as_select(), User::as_select()))
            .load::<(Animal, User)>(connection)?,
    };
    Ok(rows)
}

/// Everything authored by users the viewer follows, most recent first. The
/// follow lookup is a parameterized query against the followers table.
pub fn feed(
    connection: &mut PgConnection,
    viewer: &User,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<(Animal, User)>, ApiError> {
    let followed = followers::table
        .filter(followers::follower_email.eq(&viewer.email))
        .select(followers::user_email)
        .load::<String>(connection)?;
    if followed.is_empty() {
        return Ok(Vec::new());
    }

    let (limit, offset) = page(limit, offset);
    animals::table
        .inner_join(users::table)
        .filter(animals::author_email.eq_any(&followed))
        .order(animals::created_at.desc())
        .limit(limit)
        .offset(offset)
        .select((Animal::as_select(), User::as_select()))
        .load::<(Animal, User)>(connection)
        .map_err(ApiError::from)
}

/// Tag names linked to one animal, name order.
pub fn tag_list(connection: &mut PgConnection, slug: &str) -> Result<Vec<String>, ApiError> {
    animal_tags::table
        .filter(animal_tags::animal_slug.eq(slug))
        .select(animal_tags::tag_name)
        .order(animal_tags::tag_name.asc())
        .load::<String>(connection)
        .map_err(ApiError::from)
}

/// Projects one animal into the single-post shape. `favorited` is a
/// membership test for the viewer, false for anonymous viewers.
pub fn project_one(
    connection: &mut PgConnection,
    animal: Animal,
    author: &User,
    viewer: Option<&User>,
) -> Result<AnimalView, ApiError> {
    let tag_list = tag_list(connection, &animal.slug)?;
    let favorited_count = favorite::favorited_count(connection, &animal.slug)?;
    let favorited = match viewer {
        Some(user) => favorite::is_favorited_by(connection, &animal.slug, &user.email)?,
        None => false,
    };
    Ok(AnimalView::from_parts(
        animal,
        author,
        tag_list,
        favorited,
        favorited_count,
    ))
}

/// Projects a page of (animal, author) rows, batching the tag, count and
/// viewer-favorite lookups instead of querying per row.
pub fn project_many(
    connection: &mut PgConnection,
    rows: Vec<(Animal, User)>,
    viewer: Option<&User>,
) -> Result<Vec<AnimalView>, ApiError> {
    let slugs: Vec<&str> = rows.iter().map(|(animal, _)| animal.slug.as_str()).collect();

    let mut tags_by_slug: HashMap<String, Vec<String>> = HashMap::new();
    let tag_rows = animal_tags::table
        .filter(animal_tags::animal_slug.eq_any(&slugs))
        .order((animal_tags::animal_slug.asc(), animal_tags::tag_name.asc()))
        .load::<(String, String)>(connection)?;
    for (slug, tag) in tag_rows {
        tags_by_slug.entry(slug).or_default().push(tag);
    }

    let counts: HashMap<String, i64> = favorites::table
        .filter(favorites::animal_slug.eq_any(&slugs))
        .group_by(favorites::animal_slug)
        .select((favorites::animal_slug, count_star()))
        .load::<(String, i64)>(connection)?
        .into_iter()
        .collect();

    let viewer_favorites: HashSet<String> = match viewer {
        Some(user) => favorites::table
            .filter(favorites::user_email.eq(&user.email))
            .filter(favorites::animal_slug.eq_any(&slugs))
            .select(favorites::animal_slug)
            .load::<String>(connection)?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    Ok(rows
        .into_iter()
        .map(|(animal, author)| {
            let tag_list = tags_by_slug.remove(&animal.slug).unwrap_or_default();
            let favorited_count = counts.get(&animal.slug).copied().unwrap_or(0);
            let favorited = viewer_favorites.contains(&animal.slug);
            AnimalView::from_parts(animal, &author, tag_list, favorited, favorited_count)
        })
        .collect())
}
