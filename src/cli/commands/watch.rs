//! `watch`: register a live subscription and print matching changes.

use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::delivery::LogTransport;
use crate::core::pipeline::Pipeline;
use crate::core::registry::{SubscriberHandle, SubscriptionFilter};
use crate::errors::AppResult;
use crate::models::change_event::{ChangeEvent, Snapshot};
use crate::models::ids::{ConnectionId, ProjectId, UserId};
use crate::ui::messages::{info, warning};
use crate::utils::colors::colorize_status;
use std::sync::Arc;
use std::time::Duration;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Watch {
        project,
        assembler,
        seconds,
        poll_ms,
    } = cmd
    else {
        return Ok(());
    };

    let filter = match (project, assembler) {
        (Some(p), _) => SubscriptionFilter::Project(ProjectId::from(p.as_str())),
        (None, Some(a)) => SubscriptionFilter::Assembler(UserId::from(a.as_str())),
        (None, None) => SubscriptionFilter::All,
    };

    let rt = super::runtime()?;
    let mut pipeline = Pipeline::start(cfg, Arc::new(LogTransport), rt.handle())?;
    pipeline.poll_external_changes(Duration::from_millis((*poll_ms).max(50)))?;

    let connection = ConnectionId::generate();
    let handle = pipeline.registry.register(connection.clone(), filter.clone());
    info(format!("Watching {filter:?} as connection {connection}"));

    let heartbeat = (pipeline.registry.liveness_window() / 3).max(Duration::from_millis(100));
    let deadline = seconds.map(Duration::from_secs);

    let printed = rt.block_on(watch_loop(&pipeline, handle, heartbeat, deadline));
    pipeline.registry.unregister(&connection);
    rt.block_on(pipeline.shutdown());

    info(format!("{printed} change(s) received"));
    Ok(())
}

async fn watch_loop(
    pipeline: &Pipeline,
    mut handle: SubscriberHandle,
    heartbeat: Duration,
    deadline: Option<Duration>,
) -> usize {
    let stop = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };
    tokio::pin!(stop);

    let connection = handle.connection_id.clone();
    let mut beat = tokio::time::interval(heartbeat);
    let mut printed = 0;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = beat.tick() => {
                if !pipeline.registry.heartbeat(&connection) {
                    warning("Subscription lost; re-read current state with `shopfloor sessions`.");
                    break;
                }
            }
            event = handle.recv() => match event {
                Some(event) => {
                    print_event(&event);
                    printed += 1;
                }
                None => {
                    warning("Subscription closed by the server.");
                    break;
                }
            },
        }
    }
    printed
}

fn print_event(event: &ChangeEvent) {
    let at = event.committed_at.format("%H:%M:%S");
    match &event.snapshot {
        Snapshot::Session(s) => println!(
            "[{at}] session {} {} #{} → {} (parts {})",
            s.id,
            event.kind.as_str(),
            event.sequence,
            colorize_status(s.status),
            s.parts_completed
        ),
        Snapshot::Project(p) => println!(
            "[{at}] project {} {} #{} → {} ({})",
            p.id,
            event.kind.as_str(),
            event.sequence,
            p.status.to_db_str(),
            p.name
        ),
    }
}
