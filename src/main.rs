use rocket::serde::json::Json;
use rocket::{catch, catchers, launch, routes, Build, Rocket};

use menagerie::types::ErrorBody;
use menagerie::{animals, comment, db, favorite, profile, tags, users};

#[catch(400)]
fn bad_request() -> Json<ErrorBody> {
    Json(ErrorBody::single("request body is malformed"))
}

#[catch(401)]
fn unauthorized() -> Json<ErrorBody> {
    Json(ErrorBody::single("unauthorized"))
}

#[catch(404)]
fn not_found() -> Json<ErrorBody> {
    Json(ErrorBody::single("entity not found"))
}

#[catch(422)]
fn unprocessable() -> Json<ErrorBody> {
    Json(ErrorBody::single("request could not be processed"))
}

#[catch(500)]
fn internal() -> Json<ErrorBody> {
    Json(ErrorBody::single("internal server error"))
}

#[catch(503)]
fn unavailable() -> Json<ErrorBody> {
    Json(ErrorBody::single("service unavailable"))
}

#[launch]
fn rocket() -> Rocket<Build> {
    let pool = db::init_pool().expect("failed to create database pool");
    rocket::build()
        .manage(pool)
        .mount("/api/users", routes![users::register, users::login])
        .mount("/api", routes![users::current, users::update])
        .mount(
            "/api",
            routes![profile::profile, profile::follow, profile::unfollow],
        )
        .mount(
            "/api/animals",
            routes![
                animals::list,
                animals::feed,
                animals::get,
                animals::create,
                animals::update,
                animals::delete,
                favorite::favorite,
                favorite::unfavorite,
                comment::add,
                comment::get,
                comment::delete,
            ],
        )
        .mount("/api/tags", routes![tags::list])
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                not_found,
                unprocessable,
                internal,
                unavailable,
            ],
        )
}
