// src/models/mod.rs

pub mod assessment;
pub mod attempt;
pub mod batch;
pub mod organization;
pub mod refresh_token;
pub mod role;
pub mod user;
