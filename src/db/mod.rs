use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use dotenvy::dotenv;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use std::env;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

pub mod schema;

// An alias to the type for a pool of Diesel Postgres connections.
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub struct DbConnection(pub r2d2::PooledConnection<ConnectionManager<PgConnection>>);

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("DATABASE_URL is not set")]
    Var(#[from] env::VarError),
    #[error("failed to build connection pool: {0}")]
    R2d2(#[from] r2d2::Error),
}

pub fn init_pool() -> Result<Pool, PoolError> {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL")?;
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().build(manager)?;
    log::info!("database pool initialized");
    Ok(pool)
}

/// Retrieves a single connection from the managed database pool. If no pool is
/// currently managed, fails with an `InternalServerError` status. If no
/// connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let Some(pool) = request.rocket().state::<Pool>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        match pool.get() {
            Ok(connection) => Outcome::Success(DbConnection(connection)),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

// For the convenience of using a &mut DbConnection as a &mut PgConnection.
impl Deref for DbConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
