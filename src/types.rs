use diesel::pg::PgConnection;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::Serialize;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut PgConnection) -> Result<Self, Self::Error>;
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Serialize)]
pub struct ValidationError(Vec<String>);

impl ValidationError {
    pub fn add<F: AsRef<str>, M: AsRef<str>>(&mut self, field: F, message: M) {
        self.0.push(format!("{} {}", field.as_ref(), message.as_ref()));
    }

    pub fn from<F: AsRef<str>, M: AsRef<str>>(field: F, message: M) -> Self {
        let mut error = ValidationError::default();
        error.add(field, message);
        error
    }

    pub fn merge(&mut self, other: ValidationError) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_messages(self) -> Vec<String> {
        self.0
    }
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    NotFound(&'static str),
    Forbidden(&'static str),
    Conflict(String),
    Unauthorized,
    Internal,
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => Status::UnprocessableEntity,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::Internal => Status::InternalServerError,
        }
    }

    fn into_messages(self) -> Vec<String> {
        match self {
            ApiError::Validation(errors) => errors.into_messages(),
            ApiError::NotFound(entity) => vec![format!("{} not found", entity)],
            ApiError::Forbidden(message) => vec![message.to_string()],
            ApiError::Conflict(message) => vec![message],
            ApiError::Unauthorized => vec!["unauthorized".to_string()],
            ApiError::Internal => vec!["internal server error".to_string()],
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> ApiError {
        ApiError::Validation(error)
    }
}

impl From<DieselError> for ApiError {
    fn from(error: DieselError) -> ApiError {
        match error {
            DieselError::NotFound => ApiError::NotFound("entity"),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ApiError::Conflict("already exists".to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                ApiError::NotFound("entity")
            }
            other => {
                log::error!("database error: {}", other);
                ApiError::Internal
            }
        }
    }
}

/// The failure envelope every non-2xx response carries:
/// `{ "errors": { "body": [ ... ] } }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    errors: ErrorMessages,
}

#[derive(Debug, Serialize)]
struct ErrorMessages {
    body: Vec<String>,
}

impl ErrorBody {
    pub fn new(messages: Vec<String>) -> Self {
        ErrorBody {
            errors: ErrorMessages { body: messages },
        }
    }

    pub fn single<M: Into<String>>(message: M) -> Self {
        ErrorBody::new(vec![message.into()])
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = Json(ErrorBody::new(self.into_messages()));
        (status, body).respond_to(request)
    }
}
