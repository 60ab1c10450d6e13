pub mod get;
pub mod watch;
