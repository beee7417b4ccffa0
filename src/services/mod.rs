pub mod csv_service;
pub mod stats_service;
pub mod user_service;
pub mod visit_service;
