//! API handlers for the library lending REST endpoints

pub mod books;
pub mod health;
pub mod imports;
pub mod loans;
pub mod members;
pub mod openapi;
pub mod settings;
pub mod stats;

use serde::Deserialize;
use utoipa::IntoParams;

/// Tenancy scope for operations addressed by path id. Authentication is
/// owned by the platform gateway; the school is passed explicitly.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SchoolScope {
    pub school_id: i64,
}
