use rocket::fairing::AdHoc;
use rocket::http::Header;

/// Workspace files change under the same URL when an image is deleted and
/// colorized again, so none of them may be cached.
pub fn cache_control_fairing() -> AdHoc {
    AdHoc::on_response("Cache-Control", |req, res| {
        Box::pin(async move {
            if req.uri().path().as_str().starts_with("/files/") {
                res.set_header(Header::new("Cache-Control", "no-store"));
            }
        })
    })
}
