pub mod activity;
pub mod attendance;
pub mod role;
pub mod user;
