//! Entity model
//!
//! Canonical shapes shared by both storage tiers, the aggregation engine and
//! the HTTP API. Serialized field names are the local-cache layout.

pub mod aggregate;
pub mod assessment;
pub mod department;
pub mod response;

pub use aggregate::*;
pub use assessment::*;
pub use department::*;
pub use response::*;
