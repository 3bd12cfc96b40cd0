//! # Visual Catalog Module
//!
//! Deterministic mapping from recipe text and inventory names to a fixed,
//! finite catalog of stock food visuals. Remote images returned by the model
//! are never trusted as primary source; every recipe always gets a catalog
//! key, and the remote URL survives only when a reachability probe confirms
//! it actually loads.
//!
//! Matching is a fixed, ordered table of keyword rules (proteins first, then
//! produce, then dairy/pantry, then starches), evaluated as plain substring
//! checks over a lowercased text blob. Data-driven on purpose: the policy is
//! testable without touching the engine.

use async_trait::async_trait;
use log::debug;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::RecoveryConfig;
use crate::errors::FridgeError;

/// Catalog key used when nothing matches and the catalog is exhausted
pub const GENERIC_KEY: &str = "broccoli";

/// The closed set of stock visuals, one asset per key
pub const CATALOG: &[&str] = &[
    "beefsteak",
    "broccoli",
    "butter",
    "carrot",
    "chickenbreast",
    "chickenbroth",
    "cucumber",
    "egg",
    "garlic",
    "greenbean",
    "greenbellpepper",
    "heavycream",
    "impossibleburger",
    "jalapeno",
    "ketchup",
    "lime",
    "milk",
    "parmesan",
    "peanutbutter",
    "potato",
    "redbellpepper",
    "rigatoni",
    "salmon",
    "shallot",
    "shrimp",
    "spaghetti",
    "tomato",
    "tomatopaste",
    "wheatbread",
    "yogurt",
];

/// One keyword rule: any pattern match selects the catalog key
pub struct KeywordRule {
    pub patterns: &'static [&'static str],
    pub key: &'static str,
}

/// Ordered matching rules. Order is part of the contract: earlier rules take
/// priority, and multi-word patterns come before their substrings (e.g.
/// "tomato paste" before "tomato").
pub const RULES: &[KeywordRule] = &[
    // proteins first
    KeywordRule { patterns: &["chicken"], key: "chickenbreast" },
    KeywordRule { patterns: &["beef", "steak"], key: "beefsteak" },
    KeywordRule { patterns: &["salmon"], key: "salmon" },
    KeywordRule { patterns: &["shrimp"], key: "shrimp" },
    KeywordRule { patterns: &["egg"], key: "egg" },
    KeywordRule { patterns: &["impossible"], key: "impossibleburger" },
    // veg / produce
    KeywordRule { patterns: &["green bell pepper", "green pepper"], key: "greenbellpepper" },
    KeywordRule { patterns: &["red bell pepper", "red pepper"], key: "redbellpepper" },
    KeywordRule { patterns: &["bell pepper"], key: "greenbellpepper" },
    KeywordRule { patterns: &["green bean"], key: "greenbean" },
    KeywordRule { patterns: &["broccoli"], key: "broccoli" },
    KeywordRule { patterns: &["carrot"], key: "carrot" },
    KeywordRule { patterns: &["cucumber"], key: "cucumber" },
    KeywordRule { patterns: &["tomato paste"], key: "tomatopaste" },
    KeywordRule { patterns: &["tomato"], key: "tomato" },
    KeywordRule { patterns: &["potato"], key: "potato" },
    KeywordRule { patterns: &["garlic"], key: "garlic" },
    KeywordRule { patterns: &["shallot"], key: "shallot" },
    KeywordRule { patterns: &["jalape"], key: "jalapeno" },
    KeywordRule { patterns: &["lime"], key: "lime" },
    // dairy / pantry
    KeywordRule { patterns: &["heavy cream"], key: "heavycream" },
    KeywordRule { patterns: &["milk"], key: "milk" },
    KeywordRule { patterns: &["yogurt"], key: "yogurt" },
    KeywordRule { patterns: &["parmesan"], key: "parmesan" },
    KeywordRule { patterns: &["peanut butter"], key: "peanutbutter" },
    KeywordRule { patterns: &["butter"], key: "butter" },
    KeywordRule { patterns: &["ketchup"], key: "ketchup" },
    KeywordRule { patterns: &["chicken broth", "broth"], key: "chickenbroth" },
    KeywordRule { patterns: &["wheat bread", "bread", "sandwich", "toast"], key: "wheatbread" },
    // starches
    KeywordRule { patterns: &["spaghetti"], key: "spaghetti" },
    KeywordRule { patterns: &["rigatoni"], key: "rigatoni" },
    KeywordRule { patterns: &["pasta"], key: "spaghetti" },
];

/// Bundled asset path for a catalog key
pub fn url_for(key: &str) -> String {
    let key = if CATALOG.contains(&key) { key } else { GENERIC_KEY };
    format!("assets/images/food/{key}.png")
}

/// All catalog keys matched by the text, in rule order, deduplicated
pub fn candidate_keys(text: &str) -> Vec<&'static str> {
    let blob = text.to_lowercase();
    let mut out: Vec<&'static str> = Vec::new();
    for rule in RULES {
        if rule.patterns.iter().any(|p| blob.contains(p)) && !out.contains(&rule.key) {
            out.push(rule.key);
        }
    }
    out
}

/// Pick a catalog key for one recipe within a render batch
///
/// Preference order:
/// 1. first matching key not yet used in the batch
/// 2. first matching key, allowing a repeat, rather than an unrelated image
/// 3. no match at all: first catalog key not yet used
/// 4. catalog exhausted: the generic key
pub fn assign_key(text: &str, used: &HashSet<&'static str>) -> &'static str {
    let candidates = candidate_keys(text);

    for &key in &candidates {
        if !used.contains(key) {
            return key;
        }
    }
    if let Some(&first) = candidates.first() {
        debug!("All matching catalog keys in use, repeating '{first}'");
        return first;
    }
    for &key in CATALOG {
        if !used.contains(key) {
            return key;
        }
    }
    GENERIC_KEY
}

/// Single best catalog key for a raw inventory food name
///
/// Used for the "expiring soon" display slots; unmatched names fall back to
/// the generic key.
pub fn key_for_food(food_type: &str) -> &'static str {
    candidate_keys(food_type)
        .first()
        .copied()
        .unwrap_or(GENERIC_KEY)
}

/// Reachability check for a model-supplied image URL
///
/// Inherently racy against a live network, so it sits behind a trait and is
/// mocked in tests.
#[async_trait]
pub trait ImageProber: Send + Sync {
    async fn probe(&self, url: &str) -> bool;
}

/// `reqwest`-backed prober: HEAD request, success status, image content type
pub struct HttpImageProber {
    client: reqwest::Client,
}

impl HttpImageProber {
    pub fn new(recovery: &RecoveryConfig) -> Result<Self, FridgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(recovery.probe_timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageProber for HttpImageProber {
    async fn probe(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        match self.client.head(url).send().await {
            Ok(response) => {
                let is_image = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.starts_with("image/"))
                    .unwrap_or(false);
                let ok = response.status().is_success() && is_image;
                debug!("Probed image url {url}: reachable={ok}");
                ok
            }
            Err(err) => {
                debug!("Image probe failed for {url}: {err}");
                false
            }
        }
    }
}
