// src/lib.rs

//! PhishTank feed updater library

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod utils;
