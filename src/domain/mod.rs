pub mod collision;
pub mod models;
pub mod motion;
pub mod session;
pub mod settings;
