pub mod config;
pub mod error;
pub mod logger;
pub mod routes;
pub mod state;
pub mod static_files;
