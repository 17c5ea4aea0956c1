//! Wiring: one store, one feed, and the long-lived feed consumers.
//!
//! `Services` is the synchronous part (store, directory, notifications)
//! every command needs. `Pipeline` adds the consumer tasks on a tokio
//! runtime. Consumers subscribe to the feed before `start` returns, so no
//! commit made afterwards can be missed; `shutdown` lets each of them drain
//! what is buffered before the tasks are joined.

use crate::config::Config;
use crate::core::analytics::{self, DashboardSummary, PerformancePoint, ProjectAnalytics};
use crate::core::delivery::DeliveryTransport;
use crate::core::directory::Directory;
use crate::core::fanout::LiveFanout;
use crate::core::feed::ChangeFeed;
use crate::core::notifications::NotificationStore;
use crate::core::poller::FeedPoller;
use crate::core::registry::{SubscriberRegistry, run_reaper};
use crate::core::router::{NotificationRouter, ProjectResolver};
use crate::core::store::SessionStore;
use crate::db::initialize::init_db;
use crate::db::pool::DbPool;
use crate::db::retry::RetryPolicy;
use crate::errors::AppResult;
use crate::models::ids::{ProjectId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Clone)]
pub struct Services {
    pub pool: Arc<DbPool>,
    pub feed: ChangeFeed,
    pub store: Arc<SessionStore>,
    pub directory: Arc<Directory>,
    pub notifications: NotificationStore,
}

impl Services {
    /// Open the database named in `cfg` and apply pending migrations.
    pub fn open(cfg: &Config) -> AppResult<Self> {
        let pool = Arc::new(DbPool::open(&cfg.database, cfg.busy_timeout())?);
        pool.with_conn(|conn| init_db(conn))?;

        let feed = ChangeFeed::new(cfg.feed_buffer_capacity);
        let retry = RetryPolicy::from_config(cfg);

        Ok(Self {
            store: Arc::new(SessionStore::new(Arc::clone(&pool), feed.clone(), retry)),
            directory: Arc::new(Directory::new(Arc::clone(&pool), feed.clone(), retry)),
            notifications: NotificationStore::new(Arc::clone(&pool), retry),
            pool,
            feed,
        })
    }

    pub fn project_analytics(&self, project_id: &ProjectId) -> AppResult<ProjectAnalytics> {
        self.directory.project(project_id)?;
        let components = self.directory.components_for(project_id)?;
        let sessions = self.store.sessions_for_project(project_id)?;
        Ok(analytics::project_analytics(project_id, &components, &sessions))
    }

    pub fn assembler_performance(&self, assembler_id: &UserId) -> AppResult<Vec<PerformancePoint>> {
        let sessions = self.store.history_for_assembler(assembler_id)?;
        Ok(analytics::assembler_performance(assembler_id, &sessions))
    }

    pub fn dashboard_summary(&self) -> AppResult<DashboardSummary> {
        let projects = self.directory.list_projects()?;
        let components = self.directory.all_components()?;
        let sessions = self.store.all()?;
        Ok(analytics::dashboard_summary(&projects, &components, &sessions))
    }
}

pub struct Pipeline {
    pub services: Services,
    pub registry: Arc<SubscriberRegistry>,
    runtime: Handle,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Start the router, the live fan-out and the subscription reaper.
    pub fn start(
        cfg: &Config,
        transport: Arc<dyn DeliveryTransport>,
        runtime: &Handle,
    ) -> AppResult<Self> {
        let services = Services::open(cfg)?;
        Ok(Self::with_services(services, cfg, transport, runtime))
    }

    pub fn with_services(
        services: Services,
        cfg: &Config,
        transport: Arc<dyn DeliveryTransport>,
        runtime: &Handle,
    ) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(
            cfg.liveness_window(),
            cfg.subscriber_buffer_capacity,
        ));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let resolver: Arc<dyn ProjectResolver> = services.directory.clone();
        let router = NotificationRouter::new(services.notifications.clone(), resolver, transport);
        let fanout = LiveFanout::new(Arc::clone(&registry));

        let tasks = vec![
            runtime.spawn(router.run(
                services.feed.subscribe(),
                Arc::clone(&services.store),
                shutdown_rx.clone(),
            )),
            runtime.spawn(fanout.run(services.feed.subscribe(), shutdown_rx.clone())),
            runtime.spawn(run_reaper(
                Arc::clone(&registry),
                cfg.reaper_interval(),
                shutdown_rx,
            )),
        ];
        debug!(consumers = services.feed.consumer_count(), "pipeline started");

        Self {
            services,
            registry,
            runtime: runtime.clone(),
            shutdown,
            tasks,
        }
    }

    /// Also republish changes committed by other processes, checked every
    /// `interval`.
    pub fn poll_external_changes(&mut self, interval: Duration) -> AppResult<()> {
        let mut poller = FeedPoller::new(Arc::clone(&self.services.pool), self.services.feed.clone());
        poller.prime()?;
        let task = self
            .runtime
            .spawn(poller.run(interval, self.shutdown.subscribe()));
        self.tasks.push(task);
        Ok(())
    }

    pub fn store(&self) -> &SessionStore {
        &self.services.store
    }

    pub fn directory(&self) -> &Directory {
        &self.services.directory
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.services.notifications
    }

    /// Signal shutdown and wait until every consumer has drained the feed.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "pipeline task failed");
            }
        }
        debug!("pipeline stopped");
    }
}
