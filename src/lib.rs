//! Url shortener that keeps every destination encrypted at rest.
//!
//! [`storage::UrlCoreService`] creates and projects records,
//! [`visit::UrlVisitService`] enforces the access policy and counts visits,
//! and [`routes`] exposes both over HTTP.

pub mod config;
pub mod crypto;
mod dao;
pub mod error;
pub mod model;
pub mod routes;
pub mod safety;
pub mod storage;
pub mod utils;
pub mod visit;
