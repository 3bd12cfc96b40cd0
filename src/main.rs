use anyhow::Result;
use log::info;
use std::sync::Arc;

use pocketfridge::config::{ModelConfig, RecoveryConfig};
use pocketfridge::generation::{GenerateOptions, RecipeEngine};
use pocketfridge::images::{key_for_food, HttpImageProber};
use pocketfridge::inventory::{seed_demo_inventory, sorted_by_expiry, InventoryStore};
use pocketfridge::model::OpenAiChatModel;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    info!("Starting PocketFridge demo");

    let store = Arc::new(InventoryStore::new());
    seed_demo_inventory(&store);

    let snapshot = store.snapshot();
    println!("Expiring soon:");
    for item in sorted_by_expiry(&snapshot).iter().take(3) {
        println!(
            "  {} (expires {}, icon {})",
            item.food_type,
            item.date_expiring,
            key_for_food(&item.food_type)
        );
    }

    let recovery = RecoveryConfig::default();
    let model = Arc::new(OpenAiChatModel::new(ModelConfig::default(), recovery.clone())?);
    let prober = Arc::new(HttpImageProber::new(&recovery)?);
    let engine = RecipeEngine::new(model, prober);

    // Without an API key this degrades to the deterministic fallback set.
    let recipes = engine.generate(&snapshot, &GenerateOptions::default()).await;
    println!("\nGenerated {} recipes:", recipes.len());
    for recipe in &recipes {
        println!(
            "  [{}] {} ({} steps, image {})",
            recipe.id,
            recipe.title,
            recipe.steps.len(),
            recipe.image_key
        );
    }

    store.clear_listeners();
    Ok(())
}
