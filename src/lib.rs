//! Incremental search over a catalog of things to open.
//!
//! A [`runner::QueryRunner`] is told what the user is typing and pushes
//! matching [`model::SearchResult`]s through a [`result_queue`] to the
//! thread that owns the event loop. The [`catalog`] is an SQLite file filled
//! by the [`indexer`] from the configured [`sources`].

pub mod catalog;
pub mod config;
pub mod executor;
pub mod indexer;
pub mod matcher;
pub mod model;
pub mod result_queue;
pub mod runner;
pub mod schedule;
pub mod sources;
