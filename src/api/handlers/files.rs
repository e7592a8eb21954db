use anyhow::anyhow;
use log::error;
use rocket::State;
use rocket::fs::NamedFile;
use rocket::get;
use rocket::http::Status;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::task::spawn_blocking;

use crate::api::fairings::guards::session::GuardSession;
use crate::api::{AppError, AppResult, AppState, GuardResult};

/// Serve an input or output of the caller's own workspace.
#[get("/files/<kind>/<name>")]
pub async fn workspace_file(
    session: GuardResult<GuardSession>,
    state: &State<AppState>,
    kind: &str,
    name: &str,
) -> AppResult<NamedFile> {
    let GuardSession(token) = session?;
    let service = Arc::clone(&state.sessions);
    let (kind, name) = (kind.to_string(), name.to_string());
    let path = spawn_blocking(move || service.file(&token, &kind, &name)).await??;

    NamedFile::open(&path).await.map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            AppError {
                status: Status::NotFound,
                error: anyhow!("File not found: {}", path.display()),
            }
        } else {
            error!("Error opening workspace file: {:#?}", err);
            anyhow!("Error opening workspace file {}: {}", path.display(), err).into()
        }
    })
}
