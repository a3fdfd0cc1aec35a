pub mod advisory;
pub mod aggregate;
pub mod catalog;
pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod profile;
pub mod reference;
pub mod session;
