pub mod dispatch;
pub mod push;
pub mod user;
