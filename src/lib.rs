pub mod actors;
pub mod alerts;
pub mod config;
pub mod error;
pub mod mail;
pub mod monitors;
pub mod resolver;
pub mod util;
