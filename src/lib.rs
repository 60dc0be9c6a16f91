//! Perfume catalog scraper
//!
//! This library provides the scrape pipeline behind the perfume catalog: a
//! durable PostgreSQL queue of product URLs, a headless-browser page fetcher,
//! a fault-tolerant HTML extractor and the worker loop that paces requests
//! against the source site. The admin HTTP API drives all of it.

pub mod app_state;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;
