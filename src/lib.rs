#![forbid(unsafe_code)]

//! Harvests public YouTube channel metadata into a document store and
//! projects it into relational tables for a fixed set of analytical
//! questions.

pub mod analytics;
pub mod config;
mod db;
pub mod document_store;
pub mod duration;
pub mod error;
pub mod harvest;
pub mod logging;
pub mod metadata;
pub mod pagination;
pub mod pipeline;
pub mod projection;
pub mod relational_store;
pub mod youtube;
