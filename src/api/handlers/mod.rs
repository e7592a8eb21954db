use rocket::Route;

pub mod files;
pub mod session;

pub fn generate_session_routes() -> Vec<Route> {
    routes![
        session::list_images,
        session::upload,
        session::colorize,
        session::delete,
        session::end_session
    ]
}

pub fn generate_file_routes() -> Vec<Route> {
    routes![files::workspace_file]
}
