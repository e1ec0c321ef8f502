pub mod billing;
pub mod connect;
pub mod health;
pub mod settings;
pub mod users;
