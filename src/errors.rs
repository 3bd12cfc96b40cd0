//! # Error Types Module
//!
//! This module defines the error taxonomy shared by the receipt scanner and
//! the recipe engine. Validation errors fail fast before any network call;
//! extraction and transport errors surface to the caller; generation errors
//! never escape the engine, which always falls back to deterministic recipes.

/// Errors produced by the extraction and generation pipeline
#[derive(Debug, Clone)]
pub enum FridgeError {
    /// Caller supplied empty or malformed input (no network call performed)
    Validation(String),
    /// Model responded, but the payload could not be parsed into receipt items
    Extraction(String),
    /// Model responded, but the payload could not be parsed into recipes
    Generation(String),
    /// Network or provider failure (timeout, non-2xx, missing credentials)
    Transport(String),
}

impl std::fmt::Display for FridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FridgeError::Validation(msg) => write!(f, "Validation error: {msg}"),
            FridgeError::Extraction(msg) => write!(f, "Extraction error: {msg}"),
            FridgeError::Generation(msg) => write!(f, "Generation error: {msg}"),
            FridgeError::Transport(msg) => write!(f, "Transport error: {msg}"),
        }
    }
}

impl std::error::Error for FridgeError {}

impl From<reqwest::Error> for FridgeError {
    fn from(err: reqwest::Error) -> Self {
        FridgeError::Transport(err.to_string())
    }
}

impl From<anyhow::Error> for FridgeError {
    fn from(err: anyhow::Error) -> Self {
        FridgeError::Generation(err.to_string())
    }
}
