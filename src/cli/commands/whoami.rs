use crate::config::Config;
use crate::core::identity::IdentityProvider;
use crate::core::pipeline::Services;
use crate::errors::AppResult;
use crate::models::ids::UserId;
use crate::models::role::Route;

pub fn handle(cfg: &Config, actor: Option<&UserId>) -> AppResult<()> {
    let services = Services::open(cfg)?;
    let user = super::identity(&services, actor).current_user()?;
    let home = user.role.home_route();

    println!("👤 {} ({})", user.id, user.role);
    println!("🏠 Home view : {}", home.path());

    let views: Vec<&str> = [
        Route::Dashboard,
        Route::Projects,
        Route::AssemblerConsole,
        Route::WorkHistory,
    ]
    .iter()
    .filter(|r| r.permits(user.role))
    .map(|r| r.path())
    .collect();
    println!("🔓 Views     : {}", views.join(", "));
    Ok(())
}
