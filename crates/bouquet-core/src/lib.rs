// Core bouquet builder functionality without transport dependencies

pub mod catalog;
pub mod config;
pub mod error;
pub mod flow;
pub mod media;
pub mod repository;
pub mod session;
pub mod test_utils;
pub mod types;
pub mod upload;
pub mod utils;
