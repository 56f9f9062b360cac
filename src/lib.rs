//! Library exports for the knowledge base service
//!
//! This module exposes internal components for testing and potential library usage.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod repository;
pub mod route;
pub mod sanitize;
pub mod search;
pub mod stats;
pub mod upload;
