//! Business logic services

pub mod catalog;
pub mod lending;
pub mod members;
pub mod provisioning;
pub mod settings;
pub mod stats;

use std::sync::Arc;

use crate::{
    config::LendingConfig,
    directory::{PgPersonDirectory, PgRosterSource},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub lending: lending::LendingService,
    pub provisioning: provisioning::ProvisioningService,
    pub settings: settings::SettingsService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, lending_config: LendingConfig) -> Self {
        let settings =
            settings::SettingsService::new(repository.clone(), lending_config);
        let directory = Arc::new(PgPersonDirectory::new(repository.pool.clone()));
        let roster = Arc::new(PgRosterSource::new(repository.pool.clone()));

        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            members: members::MembersService::new(repository.clone(), directory.clone()),
            lending: lending::LendingService::new(repository.clone(), settings.clone()),
            provisioning: provisioning::ProvisioningService::new(
                Arc::new(repository.members.clone()),
                roster,
                directory,
            ),
            stats: stats::StatsService::new(repository),
            settings,
        }
    }
}
