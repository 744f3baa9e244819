pub mod ask;
pub mod health_route;
pub mod reload_route;
pub mod status_route;
