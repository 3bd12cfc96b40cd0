//! # Recipe Generation Module
//!
//! Produces candidate recipes biased toward consuming the soonest-expiring
//! inventory. The external model is treated as untrusted input: its response
//! is repaired field by field into a strict schema, and any failure (network,
//! timeout, unparsable payload) degrades to a fixed, deterministic fallback
//! set derived from the inventory. Callers never need an error branch.
//!
//! Overlapping calls are serialized by a monotonically increasing generation
//! token: a result is committed to the visible state only if its token is
//! still the most recent at completion time, otherwise it is silently
//! discarded and the caller receives the latest committed list instead.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::config::{DEFAULT_RECIPE_COUNT, TOP_EXPIRING_LIMIT};
use crate::errors::FridgeError;
use crate::images::{self, ImageProber};
use crate::inventory::{sorted_by_expiry, InventoryItem, InventorySnapshot};
use crate::model::{strip_code_fences, ChatModel, ChatRequest};

/// Recipe difficulty as reported by the model; invalid values are omitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// One ingredient reference inside a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
}

/// One generated recipe, schema-valid by construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRecipe {
    /// Unique within one generation batch
    pub id: String,
    pub title: String,
    pub why_this_recipe: String,
    /// Never empty after normalization
    pub ingredients_used: Vec<IngredientRef>,
    pub ingredients_optional: Vec<IngredientRef>,
    /// Never empty after normalization
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Catalog key stamped before the recipe is returned; never empty
    pub image_key: String,
    /// Renderable image reference; never empty
    pub image_url: String,
    /// UI-owned flag, defaults false
    pub is_favorite: bool,
}

/// Options for one generation call
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub count: usize,
    /// Titles already shown, forwarded to the model to avoid repeats across
    /// "generate more" calls
    pub exclude_titles: Vec<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_RECIPE_COUNT,
            exclude_titles: Vec::new(),
        }
    }
}

/// Inventory view serialized into the prompt
#[derive(Serialize)]
struct PromptItem<'a> {
    food_type: &'a str,
    quantity: f64,
    category: crate::inventory::Category,
    date_expiring: &'a str,
}

#[derive(Default)]
struct EngineState {
    /// Detail-lookup cache, fully overwritten on each committed generation
    cache: HashMap<String, GeneratedRecipe>,
    /// Latest committed recipe list
    current: Vec<GeneratedRecipe>,
}

/// Recipe generation engine
///
/// Owns the recipe cache and the generation-sequence token. Cheap to share
/// behind an `Arc`; all mutation goes through the internal mutex.
pub struct RecipeEngine {
    model: Arc<dyn ChatModel>,
    prober: Arc<dyn ImageProber>,
    state: Mutex<EngineState>,
    seq: AtomicU64,
}

impl RecipeEngine {
    pub fn new(model: Arc<dyn ChatModel>, prober: Arc<dyn ImageProber>) -> Self {
        Self {
            model,
            prober,
            state: Mutex::new(EngineState::default()),
            seq: AtomicU64::new(0),
        }
    }

    /// Generate recipes from an inventory snapshot
    ///
    /// Infallible: an empty inventory returns an empty list without any
    /// external call, and every failure path lands on the deterministic
    /// fallback set. The returned list reflects the latest committed
    /// generation, so a stale overlapping call observes its successor's
    /// result rather than clobbering it.
    pub async fn generate(
        &self,
        snapshot: &InventorySnapshot,
        opts: &GenerateOptions,
    ) -> Vec<GeneratedRecipe> {
        if snapshot.is_empty() {
            debug!("Inventory is empty, skipping generation");
            return Vec::new();
        }

        let sorted = sorted_by_expiry(snapshot);
        let top_count = TOP_EXPIRING_LIMIT.min(sorted.len());
        let top_expiring = &sorted[..top_count];

        let token = self.seq.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        info!(
            "Generating {} recipes from {} items (token {token})",
            opts.count,
            sorted.len()
        );

        let recipes = match self.call_model(&sorted, top_expiring, opts).await {
            Ok(recipes) => recipes,
            Err(err) => {
                warn!("Recipe generation failed, serving fallback: {err}");
                fallback_recipes(&sorted, opts.count)
            }
        };

        let recipes = self.stamp_images(recipes).await;
        self.commit(token, recipes)
    }

    async fn call_model(
        &self,
        sorted: &[InventoryItem],
        top_expiring: &[InventoryItem],
        opts: &GenerateOptions,
    ) -> Result<Vec<GeneratedRecipe>, FridgeError> {
        let request = ChatRequest {
            system: build_system_prompt(opts.count),
            user_text: build_user_prompt(sorted, top_expiring, opts),
            user_image_b64: None,
            temperature: 0.7,
        };

        let raw = self.model.complete(&request).await?;
        let clean = strip_code_fences(&raw);

        let parsed: Value = serde_json::from_str(&clean).map_err(|err| {
            FridgeError::Generation(format!("recipe response is not valid JSON: {err}"))
        })?;

        let rows = parsed
            .get("recipes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if rows.is_empty() {
            return Err(FridgeError::Generation(
                "recipe response contains no recipes".to_string(),
            ));
        }

        Ok(rows
            .iter()
            .take(opts.count)
            .enumerate()
            .map(|(idx, row)| normalize_recipe(row, idx))
            .collect())
    }

    /// Stamp every recipe with a batch-unique catalog key and a renderable
    /// image reference
    ///
    /// A model-supplied URL survives only when the prober confirms it loads;
    /// everything else resolves to the catalog asset for the stamped key.
    async fn stamp_images(&self, mut recipes: Vec<GeneratedRecipe>) -> Vec<GeneratedRecipe> {
        let mut used: HashSet<&'static str> = HashSet::new();

        for recipe in &mut recipes {
            let blob = recipe_text_blob(recipe);
            let key = images::assign_key(&blob, &used);
            used.insert(key);
            recipe.image_key = key.to_string();

            let candidate = recipe.image_url.trim().to_string();
            let keep_remote = !candidate.is_empty() && self.prober.probe(&candidate).await;
            recipe.image_url = if keep_remote {
                candidate
            } else {
                images::url_for(key)
            };
        }
        recipes
    }

    /// Apply a finished generation to visible state unless it has been
    /// superseded
    fn commit(&self, token: u64, recipes: Vec<GeneratedRecipe>) -> Vec<GeneratedRecipe> {
        let mut state = self.state.lock().unwrap();
        if token == self.seq.load(AtomicOrdering::SeqCst) {
            state.cache = recipes
                .iter()
                .map(|r| (r.id.clone(), r.clone()))
                .collect();
            state.current = recipes.clone();
            recipes
        } else {
            debug!("Discarding stale generation result (token {token})");
            state.current.clone()
        }
    }

    /// Look up a recipe from the latest committed generation
    pub fn cached_recipe(&self, id: &str) -> Option<GeneratedRecipe> {
        self.state.lock().unwrap().cache.get(id).cloned()
    }

    /// Latest committed recipe list
    pub fn current_recipes(&self) -> Vec<GeneratedRecipe> {
        self.state.lock().unwrap().current.clone()
    }

    /// Flip the favorite flag on a cached recipe; returns false when the id
    /// is unknown
    pub fn set_favorite(&self, id: &str, favorite: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        let mut found = false;
        if let Some(recipe) = state.cache.get_mut(id) {
            recipe.is_favorite = favorite;
            found = true;
        }
        for recipe in &mut state.current {
            if recipe.id == id {
                recipe.is_favorite = favorite;
            }
        }
        found
    }
}

fn build_system_prompt(count: usize) -> String {
    format!(
        r#"You are a recipe generator for a "Pocket Fridge" app.
Goal: reduce food waste by prioritizing ingredients closest to expiration.

Rules:
- Assume user already has basics: salt, pepper, oil, butter, water, common spices, and common condiments.
- Use the most-perishable items first (closest date_expiring).
- Generate EXACTLY {count} DIFFERENT recipes.
- Each recipe must use at least 1 of the top-expiring ingredients.
- Do NOT repeat any recipe titles listed in "Existing recipe titles to avoid repeating".
- image_url is OPTIONAL. If you provide it, it must be a DIRECT publicly accessible image link (https://...jpg/png/webp).
  Do NOT return Google redirect links. Do NOT return HTML pages. Prefer stable CDN-style direct image links.

Return ONLY valid JSON:
{{
  "recipes": [
    {{
      "id": "r1",
      "title": "string",
      "why_this_recipe": "string",
      "ingredients_used": [ {{ "name": "string", "quantity": "string optional" }} ],
      "ingredients_optional": [ {{ "name": "string", "quantity": "string optional" }} ],
      "steps": ["string"],
      "time_minutes": 25,
      "difficulty": "easy",
      "source_url": "string optional",
      "image_url": "string optional"
    }}
  ]
}}
No markdown. No extra keys."#
    )
}

fn build_user_prompt(
    sorted: &[InventoryItem],
    top_expiring: &[InventoryItem],
    opts: &GenerateOptions,
) -> String {
    let inventory_view: Vec<PromptItem<'_>> = sorted
        .iter()
        .map(|it| PromptItem {
            food_type: &it.food_type,
            quantity: it.quantity,
            category: it.category,
            date_expiring: &it.date_expiring,
        })
        .collect();

    let top_view: Vec<Value> = top_expiring
        .iter()
        .map(|it| json!({ "food_type": it.food_type, "date_expiring": it.date_expiring }))
        .collect();

    format!(
        "Fridge inventory (soonest expiring first):\n{}\n\n\
         Top expiring to prioritize:\n{}\n\n\
         Existing recipe titles to avoid repeating:\n{}\n\n\
         Generate {} recipes now.",
        serde_json::to_string_pretty(&inventory_view).unwrap_or_default(),
        serde_json::to_string_pretty(&top_view).unwrap_or_default(),
        serde_json::to_string_pretty(&opts.exclude_titles).unwrap_or_default(),
        opts.count,
    )
}

/// Repair one raw recipe row into the strict schema
///
/// Total by construction: every field independently validated against its
/// expected shape, falling back to a documented default. Image fields are
/// left for the stamping pass, which always resolves them.
fn normalize_recipe(row: &Value, idx: usize) -> GeneratedRecipe {
    let id = row
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("r{}", idx + 1));

    let title = row
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Recipe {}", idx + 1));

    let why_this_recipe = row
        .get("why_this_recipe")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "Uses ingredients expiring soon.".to_string());

    let mut steps = normalize_strings(row.get("steps"));
    if steps.is_empty() {
        steps = vec!["Prep ingredients.".to_string(), "Cook and serve.".to_string()];
    }

    let mut ingredients_used = normalize_ingredients(row.get("ingredients_used"));
    if ingredients_used.is_empty() {
        ingredients_used.push(IngredientRef {
            name: "Your ingredients".to_string(),
            quantity: None,
        });
    }
    let ingredients_optional = normalize_ingredients(row.get("ingredients_optional"));

    let time_minutes = match row.get("time_minutes") {
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|t| t.is_finite() && *t >= 0.0)
            .map(|t| t as u32),
        _ => None,
    };

    let difficulty = row
        .get("difficulty")
        .and_then(Value::as_str)
        .and_then(Difficulty::from_label);

    let source_url = row
        .get("source_url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let image_url = row
        .get("image_url")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    GeneratedRecipe {
        id,
        title,
        why_this_recipe,
        ingredients_used,
        ingredients_optional,
        steps,
        time_minutes,
        difficulty,
        source_url,
        image_key: String::new(),
        image_url,
        is_favorite: false,
    }
}

fn normalize_strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_ingredients(value: Option<&Value>) -> Vec<IngredientRef> {
    match value {
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(|row| match row {
                Value::Object(_) => Some(IngredientRef {
                    name: row
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    quantity: match row.get("quantity") {
                        Some(Value::String(s)) => Some(s.clone()),
                        Some(Value::Number(n)) => Some(n.to_string()),
                        _ => None,
                    },
                }),
                Value::String(name) => Some(IngredientRef {
                    name: name.clone(),
                    quantity: None,
                }),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn recipe_text_blob(recipe: &GeneratedRecipe) -> String {
    let names = recipe
        .ingredients_used
        .iter()
        .chain(recipe.ingredients_optional.iter())
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {}", recipe.title, names)
}

/// Fixed fallback templates seeded with the soonest-expiring item names
///
/// Network-free and side-effect-free: the same inventory always yields the
/// same recipes. Image references are resolved by the usual stamping pass.
pub fn fallback_recipes(sorted_soonest: &[InventoryItem], count: usize) -> Vec<GeneratedRecipe> {
    let pick = |i: usize| -> String {
        sorted_soonest
            .get(i)
            .map(|it| it.food_type.clone())
            .unwrap_or_else(|| "Your ingredients".to_string())
    };

    let template = |id: &str,
                    title: &str,
                    why: String,
                    used: Vec<&str>,
                    steps: Vec<&str>,
                    time_minutes: u32,
                    source_url: &str| GeneratedRecipe {
        id: id.to_string(),
        title: title.to_string(),
        why_this_recipe: why,
        ingredients_used: used
            .into_iter()
            .map(|name| IngredientRef {
                name: name.to_string(),
                quantity: None,
            })
            .collect(),
        ingredients_optional: Vec::new(),
        steps: steps.into_iter().map(str::to_string).collect(),
        time_minutes: Some(time_minutes),
        difficulty: Some(Difficulty::Easy),
        source_url: Some(source_url.to_string()),
        image_key: String::new(),
        image_url: String::new(),
        is_favorite: false,
    };

    let first = pick(0);
    let base = vec![
        template(
            "r1",
            "Chicken & Pepper Skillet",
            format!("Uses {first} and peppers that are expiring soon."),
            vec![first.as_str(), "Bell peppers", "Shallots"],
            vec!["Slice ingredients.", "Sauté until cooked.", "Season and serve."],
            25,
            "https://en.wikipedia.org/wiki/Fajita",
        ),
        template(
            "r2",
            "Green Bean Stir-Fry",
            "Uses green beans before they spoil.".to_string(),
            vec!["Green beans", "Shallots"],
            vec!["Trim beans.", "Stir-fry with aromatics.", "Season and serve."],
            20,
            "https://en.wikipedia.org/wiki/Stir_frying",
        ),
        template(
            "r3",
            "Tomato Parmesan Soup",
            "Uses tomato products and dairy for a quick soup.".to_string(),
            vec!["Diced tomatoes", "Parmesan", "Broth"],
            vec!["Simmer tomatoes + broth.", "Blend if desired.", "Finish with parmesan."],
            30,
            "https://en.wikipedia.org/wiki/Tomato_soup",
        ),
        template(
            "r4",
            "Bread & Chicken Sandwich",
            "Uses bread and chicken while they're freshest.".to_string(),
            vec!["Wheat bread", "Chicken"],
            vec!["Cook chicken.", "Toast bread.", "Assemble and serve."],
            15,
            "https://en.wikipedia.org/wiki/Chicken_sandwich",
        ),
    ];

    base.into_iter().take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Category;
    use serde_json::json;

    fn inv_item(name: &str, expiring: &str) -> InventoryItem {
        InventoryItem {
            food_type: name.to_string(),
            quantity: 1.0,
            price: None,
            category: Category::Other,
            date_added: "2025-01-01".to_string(),
            date_expiring: expiring.to_string(),
        }
    }

    #[test]
    fn test_normalize_recipe_defaults_everything() {
        let recipe = normalize_recipe(&json!({}), 0);

        assert_eq!(recipe.id, "r1");
        assert_eq!(recipe.title, "Recipe 1");
        assert_eq!(recipe.why_this_recipe, "Uses ingredients expiring soon.");
        assert_eq!(recipe.steps.len(), 2);
        assert_eq!(recipe.ingredients_used[0].name, "Your ingredients");
        assert!(recipe.ingredients_optional.is_empty());
        assert_eq!(recipe.time_minutes, None);
        assert_eq!(recipe.difficulty, None);
        assert!(!recipe.is_favorite);
    }

    #[test]
    fn test_normalize_recipe_keeps_valid_fields() {
        let row = json!({
            "id": "abc",
            "title": "Lime Chicken",
            "why_this_recipe": "Limes expire soon.",
            "ingredients_used": [ { "name": "Chicken", "quantity": 2 }, "Limes" ],
            "steps": ["Marinate.", "Grill."],
            "time_minutes": 35,
            "difficulty": "medium",
            "source_url": "https://example.com/lime-chicken"
        });

        let recipe = normalize_recipe(&row, 3);
        assert_eq!(recipe.id, "abc");
        assert_eq!(recipe.title, "Lime Chicken");
        assert_eq!(recipe.ingredients_used[0].quantity.as_deref(), Some("2"));
        assert_eq!(recipe.ingredients_used[1].name, "Limes");
        assert_eq!(recipe.time_minutes, Some(35));
        assert_eq!(recipe.difficulty, Some(Difficulty::Medium));
    }

    #[test]
    fn test_normalize_recipe_rejects_invalid_enum_and_time() {
        let row = json!({
            "title": "Odd Recipe",
            "difficulty": "impossible",
            "time_minutes": -5,
            "steps": "not an array",
            "ingredients_used": { "name": "not an array" }
        });

        let recipe = normalize_recipe(&row, 1);
        assert_eq!(recipe.difficulty, None);
        assert_eq!(recipe.time_minutes, None);
        assert_eq!(recipe.steps.len(), 2);
        assert_eq!(recipe.ingredients_used[0].name, "Your ingredients");
    }

    #[test]
    fn test_fallback_recipes_are_deterministic_and_truncated() {
        let sorted = vec![
            inv_item("Boneless Chicken Breast", "2025-01-03"),
            inv_item("Green Beans", "2025-01-05"),
        ];

        let a = fallback_recipes(&sorted, 4);
        let b = fallback_recipes(&sorted, 4);
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(a[0]
            .why_this_recipe
            .contains("Boneless Chicken Breast"));

        let truncated = fallback_recipes(&sorted, 2);
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated[1].title, "Green Bean Stir-Fry");
    }

    #[test]
    fn test_fallback_recipes_empty_inventory_names() {
        let recipes = fallback_recipes(&[], 1);
        assert!(recipes[0].why_this_recipe.contains("Your ingredients"));
    }

    #[test]
    fn test_recipe_text_blob_includes_title_and_ingredients() {
        let mut recipe = fallback_recipes(&[], 1).remove(0);
        recipe.ingredients_optional.push(IngredientRef {
            name: "Garlic".to_string(),
            quantity: None,
        });
        let blob = recipe_text_blob(&recipe);
        assert!(blob.contains("Chicken & Pepper Skillet"));
        assert!(blob.contains("Garlic"));
    }
}
