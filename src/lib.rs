// src/lib.rs

//! BASE procurement synchronizer library

pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
