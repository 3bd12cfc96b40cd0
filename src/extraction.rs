//! # Receipt Extraction Module
//!
//! Turns a photographed receipt into structured food items via one
//! multimodal model call. The adapter owns the instruction contract and the
//! response-repair rules; it does not write the inventory store. Callers
//! convert the relative `expiration_days` into absolute dates and upsert.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;

use crate::dates;
use crate::errors::FridgeError;
use crate::inventory::{Category, InventoryItem};
use crate::model::{strip_code_fences, ChatModel, ChatRequest};

/// Fixed instruction contract for receipt extraction
const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a smart fridge assistant. Analyze the receipt image.
Extract every food item found.
CRITICAL INSTRUCTION: If an item is a meal (like "Hotbar Meal"), break it down into its main components if listed (e.g., "Chicken Tikka", "Rice").
If quantity is not listed, assume 1.
Return ONLY a valid JSON object with this EXACT structure:
{
  "items": [
    {
      "food_type": "Carrot",
      "quantity": 10,
      "price": 3.99,
      "expiration_days": 7
    }
  ]
}
For "expiration_days", use your general knowledge to estimate how long the food lasts in a fridge (e.g., Milk = 7, Rice = 4, Canned Goods = 365).
Do not include markdown formatting."#;

const DEFAULT_EXPIRATION_DAYS: i64 = 7;

/// One raw item extracted from a receipt
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptItem {
    pub food_type: String,
    pub quantity: f64,
    pub price: Option<f64>,
    /// Estimated shelf life relative to the scan date
    pub expiration_days: i64,
}

/// Adapter around the external multimodal model for receipt scanning
pub struct ReceiptScanner {
    model: Arc<dyn ChatModel>,
}

impl ReceiptScanner {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Extract food items from receipt image bytes
    ///
    /// Fails fast with a validation error on an empty payload (no network
    /// call). Individual malformed fields in the response are defaulted;
    /// only an unparsable response as a whole becomes an extraction error.
    pub async fn scan(&self, image_bytes: &[u8]) -> Result<Vec<ReceiptItem>, FridgeError> {
        if image_bytes.is_empty() {
            return Err(FridgeError::Validation(
                "receipt image is empty".to_string(),
            ));
        }

        info!("Scanning receipt image ({} bytes)", image_bytes.len());

        let request = ChatRequest {
            system: EXTRACTION_SYSTEM_PROMPT.to_string(),
            user_text: "Scan this receipt.".to_string(),
            user_image_b64: Some(BASE64.encode(image_bytes)),
            temperature: 0.2,
        };

        let raw = self.model.complete(&request).await?;
        let clean = strip_code_fences(&raw);

        let parsed: Value = serde_json::from_str(&clean).map_err(|err| {
            FridgeError::Extraction(format!("receipt response is not valid JSON: {err}"))
        })?;

        let rows = parsed
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let items: Vec<ReceiptItem> = rows.iter().filter_map(coerce_item).collect();
        info!("Extracted {} food items from receipt", items.len());
        Ok(items)
    }
}

/// Repair one raw item row field by field
///
/// Rows without a usable name are dropped; everything else is defaulted.
fn coerce_item(row: &Value) -> Option<ReceiptItem> {
    let food_type = row
        .get("food_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    if food_type.is_empty() {
        warn!("Dropping receipt row without a food name: {row}");
        return None;
    }

    let quantity = loose_number(row.get("quantity")).unwrap_or(1.0);
    let price = loose_number(row.get("price")).filter(|p| p.is_finite() && *p >= 0.0);
    let expiration_days = loose_number(row.get("expiration_days"))
        .map(|d| d as i64)
        .unwrap_or(DEFAULT_EXPIRATION_DAYS);

    Some(ReceiptItem {
        food_type,
        quantity,
        price,
        expiration_days,
    })
}

/// Accept numbers that arrive either as JSON numbers or numeric strings
fn loose_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Convert extracted items into inventory records dated from `today`
///
/// Receipts carry no category information, so items enter as `Other`; a
/// later merge may upgrade the category.
pub fn to_inventory_items(items: &[ReceiptItem], today: &str) -> Vec<InventoryItem> {
    items
        .iter()
        .map(|item| InventoryItem {
            food_type: item.food_type.clone(),
            quantity: item.quantity,
            price: item.price,
            category: Category::Other,
            date_added: today.to_string(),
            date_expiring: dates::add_days(today, item.expiration_days),
        })
        .collect()
}
