// src/handlers/mod.rs

pub mod assessments;
pub mod attempts;
pub mod auth;
pub mod batches;
pub mod health;
pub mod orgs;
