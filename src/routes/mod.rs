pub mod abonnements;
pub mod calendriers;
pub mod health;
pub mod maintenance;
pub mod paiements;
pub mod programmations;
pub mod sirenes;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(abonnements::abonnements_routes)
            .configure(paiements::paiements_routes)
            .configure(sirenes::sirenes_routes)
            .configure(programmations::programmations_routes)
            .configure(calendriers::calendriers_routes)
            .configure(maintenance::maintenance_routes)
    );
}
