pub mod analytics;
pub mod delivery;
pub mod directory;
pub mod fanout;
pub mod feed;
pub mod identity;
pub mod lifecycle;
pub mod log;
pub mod notifications;
pub mod pipeline;
pub mod poller;
pub mod registry;
pub mod router;
pub mod store;
