//! Repository-level tests against a real Postgres database. Each test opens a
//! test transaction that is rolled back on drop, so nothing persists between
//! runs. Tests are skipped when DATABASE_URL is not set.

use diesel::prelude::*;

use menagerie::animals::models::{AnimalDetails, UpdateDetails};
use menagerie::animals::repository::{self, AnimalFilter};
use menagerie::comment;
use menagerie::db::schema::{comments, followers, users};
use menagerie::favorite;
use menagerie::profile;
use menagerie::types::ApiError;
use menagerie::users::models::User;

fn connection() -> Option<PgConnection> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;
    let mut connection = PgConnection::establish(&url).expect("failed to connect to DATABASE_URL");
    connection
        .begin_test_transaction()
        .expect("failed to open test transaction");
    Some(connection)
}

fn seed_user(connection: &mut PgConnection, email: &str, username: &str) -> User {
    diesel::insert_into(users::table)
        .values((
            users::email.eq(email),
            users::username.eq(username),
            users::password.eq("not-a-real-hash"),
        ))
        .get_result::<User>(connection)
        .expect("failed to seed user")
}

fn details(title: &str, body: &str, tag_list: &[&str]) -> AnimalDetails {
    AnimalDetails {
        title: title.to_string(),
        body: body.to_string(),
        image: None,
        tag_list: tag_list.iter().map(|tag| tag.to_string()).collect(),
    }
}

#[test]
fn creating_an_animal_derives_the_slug_and_links_tags() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");

    let animal = repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &["dragons", "training"]),
    )
    .unwrap();
    assert_eq!(animal.slug, "baby-dragon-care");
    assert_eq!(animal.author_email, jake.email);

    let view = repository::project_one(&mut connection, animal, &jake, None).unwrap();
    assert_eq!(view.tag_list, vec!["dragons", "training"]);
    assert_eq!(view.favorited_count, 0);
    assert!(!view.favorited);
}

#[test]
fn colliding_slugs_are_a_conflict() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");

    repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();
    let error = repository::create(
        &mut connection,
        &jake,
        details("Baby dragon CARE", "Same slug, different casing.", &[]),
    )
    .unwrap_err();
    assert!(matches!(error, ApiError::Conflict(_)));
}

#[test]
fn updating_the_title_keeps_the_slug() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();

    let updated = repository::update(
        &mut connection,
        "baby-dragon-care",
        &jake,
        UpdateDetails {
            title: Some("Adult Dragon Care".to_string()),
            body: None,
        },
    )
    .unwrap();
    assert_eq!(updated.slug, "baby-dragon-care");
    assert_eq!(updated.title, "Adult Dragon Care");
    assert_eq!(updated.body, "Feed them often.");
}

#[test]
fn only_the_author_may_modify_or_delete() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let intruder = seed_user(&mut connection, "mallory@example.com", "mallory");
    repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();

    let error = repository::update(
        &mut connection,
        "baby-dragon-care",
        &intruder,
        UpdateDetails {
            title: None,
            body: Some("mine now".to_string()),
        },
    )
    .unwrap_err();
    assert!(matches!(error, ApiError::Forbidden(_)));

    let error = repository::delete(&mut connection, "baby-dragon-care", &intruder).unwrap_err();
    assert!(matches!(error, ApiError::Forbidden(_)));

    let untouched = repository::find_by_slug(&mut connection, "baby-dragon-care").unwrap();
    assert_eq!(untouched.body, "Feed them often.");
}

#[test]
fn deleting_an_animal_cascades_to_its_comments() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let animal = repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();
    comment::insert(&mut connection, &animal, &jake, "So fluffy.".to_string()).unwrap();

    repository::delete(&mut connection, "baby-dragon-care", &jake).unwrap();
    let error = repository::find_by_slug(&mut connection, "baby-dragon-care").unwrap_err();
    assert!(matches!(error, ApiError::NotFound(_)));

    let remaining: i64 = comments::table
        .filter(comments::animal_slug.eq("baby-dragon-care"))
        .count()
        .get_result(&mut connection)
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn favoriting_is_idempotent_and_round_trips() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let fan = seed_user(&mut connection, "fan@example.com", "dragonfan");
    let animal = repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();

    favorite::add_favorite(&mut connection, &animal, &fan).unwrap();
    favorite::add_favorite(&mut connection, &animal, &fan).unwrap();
    assert_eq!(favorite::favorited_count(&mut connection, &animal.slug).unwrap(), 1);
    assert!(favorite::is_favorited_by(&mut connection, &animal.slug, &fan.email).unwrap());
    assert!(!favorite::is_favorited_by(&mut connection, &animal.slug, &jake.email).unwrap());

    favorite::remove_favorite(&mut connection, &animal, &fan).unwrap();
    assert_eq!(favorite::favorited_count(&mut connection, &animal.slug).unwrap(), 0);
    assert!(!favorite::is_favorited_by(&mut connection, &animal.slug, &fan.email).unwrap());

    // Unfavoriting something never favorited is a no-op, not an error.
    favorite::remove_favorite(&mut connection, &animal, &fan).unwrap();
}

#[test]
fn listing_filters_by_tag_and_author() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let mia = seed_user(&mut connection, "mia@example.com", "mia");
    repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &["dragons"]),
    )
    .unwrap();
    repository::create(
        &mut connection,
        &mia,
        details("Griffin Grooming", "Brush the feathers.", &["griffins"]),
    )
    .unwrap();

    let tagged = repository::list(
        &mut connection,
        &AnimalFilter {
            tag: Some("dragons".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].0.slug, "baby-dragon-care");

    let by_author = repository::list(
        &mut connection,
        &AnimalFilter {
            author: Some("mia".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].0.slug, "griffin-grooming");

    let none = repository::list(
        &mut connection,
        &AnimalFilter {
            tag: Some("unicorns".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(none.is_empty());
}

#[test]
fn the_feed_is_the_union_of_followed_authors() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let mia = seed_user(&mut connection, "mia@example.com", "mia");
    let stranger = seed_user(&mut connection, "sam@example.com", "sam");
    let reader = seed_user(&mut connection, "reader@example.com", "reader");
    repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();
    repository::create(
        &mut connection,
        &mia,
        details("Griffin Grooming", "Brush the feathers.", &[]),
    )
    .unwrap();
    repository::create(
        &mut connection,
        &stranger,
        details("Unnoticed Unicorns", "Nobody follows sam.", &[]),
    )
    .unwrap();

    assert!(repository::feed(&mut connection, &reader, None, None)
        .unwrap()
        .is_empty());

    profile::follow_user(&mut connection, &reader, "jake").unwrap();
    profile::follow_user(&mut connection, &reader, "mia").unwrap();
    let feed = repository::feed(&mut connection, &reader, None, None).unwrap();
    let mut slugs: Vec<&str> = feed.iter().map(|(animal, _)| animal.slug.as_str()).collect();
    slugs.sort();
    assert_eq!(slugs, vec!["baby-dragon-care", "griffin-grooming"]);
}

#[test]
fn deleting_a_user_cascades_everywhere() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let mia = seed_user(&mut connection, "mia@example.com", "mia");
    repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();
    let kept = repository::create(
        &mut connection,
        &mia,
        details("Griffin Grooming", "Brush the feathers.", &[]),
    )
    .unwrap();
    comment::insert(&mut connection, &kept, &jake, "Lovely griffin.".to_string()).unwrap();
    profile::follow_user(&mut connection, &jake, "mia").unwrap();

    User::delete(&jake.email, &mut connection).unwrap();

    let error = repository::find_by_slug(&mut connection, "baby-dragon-care").unwrap_err();
    assert!(matches!(error, ApiError::NotFound(_)));

    // Mia's animal survives but loses Jake's comment.
    let survivor = repository::find_by_slug(&mut connection, "griffin-grooming").unwrap();
    assert!(comment::list_for(&mut connection, &survivor).unwrap().is_empty());

    let edges: i64 = followers::table
        .filter(followers::follower_email.eq(&jake.email))
        .count()
        .get_result(&mut connection)
        .unwrap();
    assert_eq!(edges, 0);
}

#[test]
fn comments_list_in_creation_order_and_enforce_deletion_rights() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let mia = seed_user(&mut connection, "mia@example.com", "mia");
    let bystander = seed_user(&mut connection, "sam@example.com", "sam");
    let animal = repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();

    let first = comment::insert(&mut connection, &animal, &mia, "First!".to_string()).unwrap();
    let second = comment::insert(&mut connection, &animal, &mia, "Second.".to_string()).unwrap();
    let listed = comment::list_for(&mut connection, &animal).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].0.id, first.id);
    assert_eq!(listed[1].0.id, second.id);

    let error = comment::insert(&mut connection, &animal, &mia, "   ".to_string()).unwrap_err();
    assert!(matches!(error, ApiError::Validation(_)));

    // A bystander may not delete; the comment author and the animal author may.
    let error = comment::remove(&mut connection, &animal, first.id, &bystander).unwrap_err();
    assert!(matches!(error, ApiError::Forbidden(_)));
    comment::remove(&mut connection, &animal, first.id, &mia).unwrap();
    comment::remove(&mut connection, &animal, second.id, &jake).unwrap();

    let error = comment::remove(&mut connection, &animal, second.id, &jake).unwrap_err();
    assert!(matches!(error, ApiError::NotFound(_)));
}

#[test]
fn comments_must_belong_to_the_animal_in_the_path() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let dragon = repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &[]),
    )
    .unwrap();
    let griffin = repository::create(
        &mut connection,
        &jake,
        details("Griffin Grooming", "Brush the feathers.", &[]),
    )
    .unwrap();
    let comment = comment::insert(&mut connection, &dragon, &jake, "Cute.".to_string()).unwrap();

    let error = comment::remove(&mut connection, &griffin, comment.id, &jake).unwrap_err();
    assert!(matches!(error, ApiError::NotFound(_)));
}

#[test]
fn follow_edges_are_directed_and_self_follow_is_rejected() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let mia = seed_user(&mut connection, "mia@example.com", "mia");

    profile::follow_user(&mut connection, &jake, "mia").unwrap();
    assert!(profile::is_following(&mut connection, &mia.email, &jake.email).unwrap());
    assert!(!profile::is_following(&mut connection, &jake.email, &mia.email).unwrap());

    // Following twice leaves a single edge.
    profile::follow_user(&mut connection, &jake, "mia").unwrap();
    let edges: i64 = followers::table
        .filter(followers::follower_email.eq(&jake.email))
        .count()
        .get_result(&mut connection)
        .unwrap();
    assert_eq!(edges, 1);

    let error = profile::follow_user(&mut connection, &jake, "jake").unwrap_err();
    assert!(matches!(error, ApiError::Validation(_)));

    let error = profile::follow_user(&mut connection, &jake, "nobody").unwrap_err();
    assert!(matches!(error, ApiError::NotFound(_)));

    profile::unfollow_user(&mut connection, &jake, "mia").unwrap();
    assert!(!profile::is_following(&mut connection, &mia.email, &jake.email).unwrap());
}

#[test]
fn list_projection_reports_viewer_relative_favorites() {
    let Some(mut connection) = connection() else {
        return;
    };
    let jake = seed_user(&mut connection, "jake@statefarm.com", "jake");
    let fan = seed_user(&mut connection, "fan@example.com", "dragonfan");
    let dragon = repository::create(
        &mut connection,
        &jake,
        details("Baby Dragon Care", "Feed them often.", &["dragons"]),
    )
    .unwrap();
    repository::create(
        &mut connection,
        &jake,
        details("Griffin Grooming", "Brush the feathers.", &[]),
    )
    .unwrap();
    favorite::add_favorite(&mut connection, &dragon, &fan).unwrap();

    let rows = repository::list(&mut connection, &AnimalFilter::default()).unwrap();
    let views = repository::project_many(&mut connection, rows, Some(&fan)).unwrap();
    assert_eq!(views.len(), 2);
    let dragon_view = views.iter().find(|v| v.slug == "baby-dragon-care").unwrap();
    assert!(dragon_view.favorited);
    assert_eq!(dragon_view.favorited_count, 1);
    assert_eq!(dragon_view.tag_list, vec!["dragons"]);
    let griffin_view = views.iter().find(|v| v.slug == "griffin-grooming").unwrap();
    assert!(!griffin_view.favorited);
    assert_eq!(griffin_view.favorited_count, 0);

    // Anonymous viewers never see favorited: true.
    let rows = repository::list(&mut connection, &AnimalFilter::default()).unwrap();
    let views = repository::project_many(&mut connection, rows, None).unwrap();
    assert!(views.iter().all(|view| !view.favorited));
}
