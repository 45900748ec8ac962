//! Nollesystemet kernel library.
//!
//! Access control, the menu engine and the HTTP surface of the two sites.
//! The `nollesystemet` binary wires these together; integration tests drive
//! [`routes::app_router`] directly.

pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod menu;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod session;
pub mod sites;
pub mod state;
pub mod store;
