pub mod fairings;
pub mod handlers;

use rocket::figment::Figment;
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::{Build, Rocket};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

use crate::common::errors::JobError;
use crate::workflow::SessionService;

/// Rocket managed state. Everything a handler needs hangs off the service.
pub struct AppState {
    pub sessions: Arc<SessionService>,
}

pub fn build_rocket(figment: Figment, state: AppState) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .attach(fairings::cache::cache_control_fairing())
        .mount("/", handlers::generate_session_routes())
        .mount("/", handlers::generate_file_routes())
}

#[derive(Debug)]
pub struct AppError {
    pub status: Status,
    pub error: anyhow::Error,
}

#[rocket::async_trait]
impl<'r, 'o: 'r> Responder<'r, 'o> for AppError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'o> {
        let outer_msg = self.error.to_string();

        let chain: Vec<String> = self.error.chain().map(|e| e.to_string()).collect();

        let body = json!({
            "error": outer_msg,
            "chain": chain,
        })
        .to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        let status = match &err {
            JobError::Usage(_) => Status::BadRequest,
            JobError::SourceNotFound(_) => Status::NotFound,
            JobError::Io { .. } | JobError::Adapter(_) => Status::InternalServerError,
        };
        AppError {
            status,
            error: anyhow::Error::from(err),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError {
            status: Status::InternalServerError,
            error: err,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError {
            status: Status::InternalServerError,
            error: anyhow::Error::from(err).context("blocking task failed"),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError {
            status: Status::InternalServerError,
            error: anyhow::Error::from(err),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct GuardError {
    pub status: Status,
    pub error: anyhow::Error,
}

impl From<GuardError> for AppError {
    fn from(err: GuardError) -> Self {
        AppError {
            status: err.status,
            error: err.error,
        }
    }
}

pub type GuardResult<T> = Result<T, GuardError>;

impl<E> From<E> for GuardError
where
    anyhow::Error: From<E>,
{
    fn from(err: E) -> Self {
        GuardError {
            status: Status::InternalServerError,
            error: anyhow::Error::from(err),
        }
    }
}
