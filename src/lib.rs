// Library for tests to access modules

pub mod battery;
pub mod collector;
pub mod config;
pub mod error;
pub mod host_repo;
pub mod models;
pub mod power;
pub mod registry;
pub mod routes;
pub mod state;
pub mod worker;
