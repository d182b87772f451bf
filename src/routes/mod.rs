// Route exports
pub mod groups;

use actix_web::web;

pub use groups::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/v1").configure(groups::configure));
}
