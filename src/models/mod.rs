pub mod change_event;
pub mod ids;
pub mod notification;
pub mod project;
pub mod role;
pub mod session_status;
pub mod work_session;
