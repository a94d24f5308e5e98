pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod startup;
pub mod uploads;
