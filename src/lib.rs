//! # SteamSense Backend
//!
//! Price-tracking analytics backend for Steam games.
//!
//! This crate ingests price observations from an upstream catalog/price
//! source into an append-only record store, derives summary statistics and
//! seasonal discount patterns per game, infers a BUY/WAIT signal with a
//! cached prediction engine, and serves everything over a REST API via Axum
//! for the dashboard frontend.
//!
//! ## Features
//!
//! - **Price Record Store**: durable, append-only storage of price
//!   observations with idempotent ingest
//! - **Stats Aggregation**: min/max/avg price, discount records, and
//!   seasonal patterns derived deterministically from a game's history
//! - **Prediction Engine**: BUY/WAIT scoring with a per-game cache and
//!   single-flight recomputation
//! - **Sync Jobs**: background ingestion from the upstream source with
//!   progress logs streamed over SSE
//! - **HTTP API**: RESTful endpoints for frontend integration
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`models`]: Domain entities owned by the store (games, price records)
//! - [`api`]: Derived view types shared by services and the HTTP layer
//! - [`db`]: Repository pattern, in-memory store, and journal persistence
//! - [`services`]: Stats aggregation, prediction engine, sync orchestration
//! - [`upstream`]: Client for the external catalog/price API
//! - [`http`]: Axum-based HTTP server and request handlers

pub mod api;

pub mod config;

pub mod db;
pub mod models;

pub mod services;

pub mod upstream;

#[cfg(feature = "http-server")]
pub mod http;
