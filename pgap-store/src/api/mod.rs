//! HTTP API handlers for pgap-store

pub mod access_codes;
pub mod analytics;
pub mod assessments;
pub mod buildinfo;
pub mod health;
pub mod maintenance;
pub mod responses;

pub use access_codes::access_code_routes;
pub use analytics::analytics_routes;
pub use assessments::assessment_routes;
pub use buildinfo::{get_build_info, BuildInfo};
pub use health::health_routes;
pub use maintenance::maintenance_routes;
pub use responses::response_routes;
