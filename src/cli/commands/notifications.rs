use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::identity::IdentityProvider;
use crate::core::pipeline::Services;
use crate::errors::AppResult;
use crate::models::ids::{NotificationId, UserId};
use crate::models::role::Route;
use crate::ui::messages::{info, success};
use crate::utils::formatting::fmt_local;
use crate::utils::table::Table;

pub fn handle(cmd: &Commands, cfg: &Config, actor: Option<&UserId>) -> AppResult<()> {
    let Commands::Notifications { read } = cmd else {
        return Ok(());
    };

    let services = Services::open(cfg)?;
    let user = super::identity(&services, actor).authorize(Route::WorkHistory)?;

    if let Some(id) = read {
        services.notifications.mark_read(&NotificationId::from(id.as_str()))?;
        success(format!("Notification {id} marked as read"));
        return Ok(());
    }

    let list = services.notifications.for_recipient(&user.id)?;
    if list.is_empty() {
        info("No notifications.");
        return Ok(());
    }

    let unread = services.notifications.unread_count(&user.id)?;
    println!("🔔 {} notification(s), {unread} unread\n", list.len());

    let mut table = Table::new(["ID", "KIND", "SESSION", "PARTS", "CREATED", "READ"]);
    for n in &list {
        table.add_row(vec![
            n.id.to_string(),
            n.kind.to_db_str().to_string(),
            n.session_id().to_string(),
            n.payload.parts_completed.to_string(),
            fmt_local(&n.created_at),
            if n.read { "yes" } else { "no" }.to_string(),
        ]);
    }
    print!("{}", table.render());

    // Listing is what delivers them to this client.
    for n in list.iter().filter(|n| !n.delivered) {
        services.notifications.mark_delivered(&n.id)?;
    }
    Ok(())
}
