use anyhow::{Context, anyhow};
use log::{info, warn};
use rocket::State;
use rocket::form::{Errors, Form, FromForm};
use rocket::fs::TempFile;
use rocket::http::{Cookie, CookieJar};
use rocket::serde::json::Json;
use rocket::{get, post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::spawn_blocking;

use crate::api::fairings::guards::session::GuardSession;
use crate::api::{AppResult, AppState, GuardResult};
use crate::common::{OUTPUTS_DIR, SESSION_COOKIE};
use crate::monitor::ResourceSummary;
use crate::workspace::ImagePair;

#[derive(Debug, Serialize)]
pub struct ImageList {
    pub pairs: Vec<ImagePair>,
}

#[get("/api/images")]
pub async fn list_images(
    session: GuardResult<GuardSession>,
    state: &State<AppState>,
) -> AppResult<Json<ImageList>> {
    let GuardSession(token) = session?;
    let service = Arc::clone(&state.sessions);
    let pairs = spawn_blocking(move || service.images(&token)).await??;
    Ok(Json(ImageList { pairs }))
}

#[derive(FromForm, Debug)]
pub struct UploadForm<'r> {
    #[field(name = "images")]
    pub files: Vec<TempFile<'r>>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: Vec<String>,
}

/// Name as the client sent it; sanitizing happens in the workspace layer.
fn raw_file_name<'a>(file: &'a TempFile<'_>) -> &'a str {
    file.raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str())
        .unwrap_or("")
}

#[post("/api/upload", data = "<form>")]
pub async fn upload(
    session: GuardResult<GuardSession>,
    state: &State<AppState>,
    form: Result<Form<UploadForm<'_>>, Errors<'_>>,
) -> AppResult<Json<UploadResponse>> {
    let GuardSession(token) = session?;
    let mut inner_form = match form {
        Ok(form) => form.into_inner(),
        Err(errors) => {
            let error_chain = errors
                .iter()
                .map(|e| anyhow!(e.to_string()))
                .reduce(|acc, e| acc.context(e.to_string()));

            return match error_chain {
                Some(chain) => Err(chain.context("Failed to parse form").into()),
                None => Err(anyhow!("Failed to parse form with unknown error").into()),
            };
        }
    };

    let mut uploaded = Vec::with_capacity(inner_form.files.len());
    for file in inner_form.files.iter_mut() {
        let raw_name = raw_file_name(file).to_string();
        // browsers send an empty part when nothing was picked
        if raw_name.is_empty() {
            continue;
        }

        let service = Arc::clone(&state.sessions);
        let target = spawn_blocking(move || service.upload_target(&token, &raw_name)).await??;

        if let Err(err) = file.move_copy_to(&target.tmp_path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&target.tmp_path).await {
                warn!("Failed to remove staged upload {:?}: {}", target.tmp_path, cleanup);
            }
            return Err(anyhow::Error::from(err)
                .context(format!("failed to stage upload {:?}", target.name))
                .into());
        }

        let name = spawn_blocking(move || target.commit().map(|_| target.name)).await??;
        uploaded.push(name);
    }

    info!("Session {} uploaded {} file(s)", token, uploaded.len());
    Ok(Json(UploadResponse { uploaded }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub img_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorizeResponse {
    /// URL of the colorized output under `/files/outputs/`
    pub colorized: String,
    pub cached: bool,
    pub summary: Option<ResourceSummary>,
}

#[post("/api/colorize", format = "json", data = "<json_data>")]
pub async fn colorize(
    session: GuardResult<GuardSession>,
    state: &State<AppState>,
    json_data: Json<ImageRequest>,
) -> AppResult<Json<ColorizeResponse>> {
    let GuardSession(token) = session?;
    let start_time = Instant::now();
    let service = Arc::clone(&state.sessions);
    let request = json_data.into_inner();

    let outcome = spawn_blocking(move || service.colorize(&token, &request.img_name)).await??;
    let output_name = outcome
        .output_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context(format!("output path has no file name: {:?}", outcome.output_path))?;

    info!(duration = &*format!("{:?}", start_time.elapsed()); "Colorize request for {}", output_name);
    Ok(Json(ColorizeResponse {
        colorized: format!("/files/{}/{}", OUTPUTS_DIR, output_name),
        cached: outcome.cached,
        summary: outcome.summary,
    }))
}

#[post("/api/delete", format = "json", data = "<json_data>")]
pub async fn delete(
    session: GuardResult<GuardSession>,
    state: &State<AppState>,
    json_data: Json<ImageRequest>,
) -> AppResult<()> {
    let GuardSession(token) = session?;
    let service = Arc::clone(&state.sessions);
    let request = json_data.into_inner();
    spawn_blocking(move || service.delete(&token, &request.img_name)).await??;
    Ok(())
}

#[post("/api/end-session")]
pub async fn end_session(
    session: GuardResult<GuardSession>,
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
) -> AppResult<()> {
    let GuardSession(token) = session?;
    let service = Arc::clone(&state.sessions);
    spawn_blocking(move || service.end(&token)).await??;
    cookies.remove(Cookie::build(SESSION_COOKIE).path("/"));
    info!("Session {} ended", token);
    Ok(())
}
