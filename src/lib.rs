//! Campus Library Lending Service
//!
//! The library lending engine of the Campus school-administration platform:
//! catalog availability, borrowing memberships, the loan lifecycle with
//! late fines, and bulk membership provisioning, exposed as a REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod fines;
pub mod imports;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
