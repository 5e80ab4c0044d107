use actix_web::web;

pub mod health;
pub mod realtime;
pub mod sessions;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure_routes).service(
        web::scope("/api")
            .configure(realtime::configure_routes)
            .service(web::scope("/sessions").configure(sessions::configure_routes)),
    );
}
