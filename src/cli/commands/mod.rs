pub mod analytics;
pub mod component;
pub mod config;
pub mod export;
pub mod init;
pub mod log;
pub mod notifications;
pub mod process;
pub mod project;
pub mod session;
pub mod user;
pub mod watch;
pub mod whoami;

use crate::config::Config;
use crate::core::delivery::LogTransport;
use crate::core::identity::StoreIdentity;
use crate::core::pipeline::{Pipeline, Services};
use crate::errors::{AppError, AppResult};
use crate::models::ids::UserId;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

pub(crate) fn runtime() -> AppResult<Runtime> {
    Builder::new_multi_thread()
        .enable_all()
        .thread_name("shopfloor-worker")
        .build()
        .map_err(AppError::from)
}

pub(crate) fn identity(services: &Services, actor: Option<&UserId>) -> StoreIdentity {
    StoreIdentity::new(Arc::clone(&services.directory), actor.cloned())
}

/// Run a state-changing action with the feed consumers up, then shut them
/// down so the commit has been routed before the process exits.
pub(crate) fn with_pipeline<T, F>(cfg: &Config, action: F) -> AppResult<T>
where
    F: FnOnce(&Pipeline) -> AppResult<T>,
{
    let rt = runtime()?;
    let pipeline = Pipeline::start(cfg, Arc::new(LogTransport), rt.handle())?;
    let result = action(&pipeline);
    rt.block_on(pipeline.shutdown());
    result
}
