use std::{fmt, sync::Arc};

use clipdock_core::{FolderSyncEngine, JobBroker, TargetStore};

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<TargetStore>,
    pub broker: Arc<JobBroker>,
    pub sync_engine: Arc<FolderSyncEngine>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
