//! # PocketFridge Core
//!
//! Core logic for a perishable-food tracker: an in-memory inventory store
//! with merge-on-insert semantics, a receipt scanner backed by an external
//! multimodal model, and a recipe engine that prioritizes soon-to-expire
//! ingredients and degrades to deterministic fallback recipes when the
//! model is unreachable.

pub mod config;
pub mod dates;
pub mod errors;
pub mod extraction;
pub mod generation;
pub mod images;
pub mod inventory;
pub mod model;
