// src/services/mod.rs

pub mod access;
pub mod attempt;
pub mod auth;
