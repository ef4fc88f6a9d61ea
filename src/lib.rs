//! Incoming-transfer scraper and aggregation engine for Bitcoin, Ethereum and
//! Tron wallets grouped by network.

pub mod chains;
pub mod config;
pub mod db;
pub mod domain;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
