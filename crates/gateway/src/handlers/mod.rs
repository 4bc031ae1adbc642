//! API handlers module

pub mod auth;
pub mod classes;
pub mod dashboard;
pub mod health;
pub mod profile;
pub mod upload;
