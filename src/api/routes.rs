use actix_web::{error, web, HttpResponse};

use super::handlers;

/// Configures the API routes
///
/// Paths sit at the root because peers fetch each other's chain from
/// `GET /chain`.
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/index", web::get().to(handlers::index))
        .route("/transactions/new", web::post().to(handlers::new_transaction))
        .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
        .route("/mine", web::get().to(handlers::mine))
        .route("/chain", web::get().to(handlers::full_chain))
        .route("/validate", web::get().to(handlers::validate_chain))
        .route("/nodes", web::get().to(handlers::list_nodes))
        .route("/nodes/register", web::post().to(handlers::register_nodes))
        .route("/nodes/resolve", web::get().to(handlers::consensus));
}

/// Reports unreadable JSON bodies as `400 {"error": ...}` like every other
/// client error
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = serde_json::json!({ "error": format!("Invalid input: {}", err) });
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}
