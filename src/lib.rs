// src/lib.rs

//! discodump library

pub mod api;
pub mod enrich;
pub mod error;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod state;
pub mod utils;
