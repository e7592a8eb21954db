use anyhow::anyhow;
use rocket::Request;
use rocket::http::{Cookie, SameSite, Status};
use rocket::request::{FromRequest, Outcome};

use crate::api::{AppState, GuardError};
use crate::common::SESSION_COOKIE;
use crate::workspace::SessionToken;

/// The caller's session. A missing or malformed cookie starts a new session
/// and the fresh token is sent back in the response.
pub struct GuardSession(pub SessionToken);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for GuardSession {
    type Error = GuardError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = req.rocket().state::<AppState>() else {
            return Outcome::Error((
                Status::InternalServerError,
                anyhow!("application state is not managed").into(),
            ));
        };

        let presented = req
            .cookies()
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string());
        let token = state.sessions.open(presented.as_deref());
        let token_str = token.to_string();

        if presented.as_deref() != Some(token_str.as_str()) {
            req.cookies().add(
                Cookie::build((SESSION_COOKIE, token_str))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax),
            );
        }

        Outcome::Success(GuardSession(token))
    }
}
