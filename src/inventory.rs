//! # Inventory Store Module
//!
//! Single source of truth for current food quantities and expirations.
//! Items are keyed by the normalized (trimmed, lowercased) food name, and
//! inserting an observation for an existing key merges rather than replaces:
//! quantities sum, the soonest expiration wins, and the category never
//! regresses to `Other`.
//!
//! Listeners are notified synchronously with a post-merge snapshot after
//! every upsert batch; a batch is never partially visible.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::dates;

/// Food category of an inventory item
///
/// Unknown category strings decode to `Other` so a noisy model response can
/// never make an item unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Vegetable,
    Fruit,
    Carbs,
    Meat,
    Seafood,
    Dairy,
    Condiment,
    Other,
}

impl Category {
    /// Map a raw category string to a variant, defaulting to `Other`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "vegetable" => Category::Vegetable,
            "fruit" => Category::Fruit,
            "carbs" => Category::Carbs,
            "meat" => Category::Meat,
            "seafood" => Category::Seafood,
            "dairy" => Category::Dairy,
            "condiment" => Category::Condiment,
            _ => Category::Other,
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Category::from_label(&label))
    }
}

/// One tracked food item
///
/// `quantity` is a unitless count; negative incoming quantities are accepted
/// on merge and simply subtract (permissive by design, so fractional or
/// corrective observations are never rejected).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(default)]
    pub food_type: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: Category,
    /// Calendar date in `YYYY-MM-DD` form
    #[serde(default)]
    pub date_added: String,
    /// Calendar date in `YYYY-MM-DD` form
    #[serde(default)]
    pub date_expiring: String,
}

/// Immutable copy of the inventory mapping at a point in time
///
/// `BTreeMap` keeps key iteration deterministic, which makes expiry-sort
/// tie-breaking reproducible.
pub type InventorySnapshot = BTreeMap<String, InventoryItem>;

/// Callback invoked with a fresh snapshot at subscribe time and after every
/// upsert batch
pub type InventoryListener = Arc<dyn Fn(&InventorySnapshot) + Send + Sync>;

/// Handle returned by [`InventoryStore::subscribe`]
pub type ListenerId = u64;

/// Compute the store key for a display name
pub fn normalize_key(food_type: &str) -> String {
    food_type.trim().to_lowercase()
}

#[derive(Default)]
struct StoreInner {
    items: InventorySnapshot,
    listeners: BTreeMap<ListenerId, InventoryListener>,
    next_listener_id: ListenerId,
}

/// In-memory inventory store with merge-on-insert and change notification
///
/// Constructed once at app start and passed by handle to whoever needs it;
/// no ambient global. Mutations are atomic at upsert-batch granularity, and
/// notification uses a copy of the listener set taken at notification time,
/// so listeners may subscribe or unsubscribe concurrently without corrupting
/// iteration.
#[derive(Default)]
pub struct InventoryStore {
    inner: Mutex<StoreInner>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of incoming items into the store and notify listeners
    /// once with the post-merge snapshot.
    ///
    /// Never fails: malformed entries have already been defaulted field by
    /// field during decoding, and the merge itself is total.
    pub fn upsert(&self, new_items: &[InventoryItem]) {
        let (snapshot, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            for item in new_items {
                let key = normalize_key(&item.food_type);
                match inner.items.entry(key) {
                    Entry::Occupied(mut entry) => merge_item(entry.get_mut(), item),
                    Entry::Vacant(entry) => {
                        let mut inserted = item.clone();
                        inserted.food_type = item.food_type.trim().to_string();
                        entry.insert(inserted);
                    }
                }
            }
            let listeners: Vec<InventoryListener> = inner.listeners.values().cloned().collect();
            (inner.items.clone(), listeners)
        };

        debug!(
            "Upserted {} items, inventory now holds {} entries",
            new_items.len(),
            snapshot.len()
        );

        // Notify outside the lock so a listener may touch the store.
        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Immutable copy of the current mapping
    pub fn snapshot(&self) -> InventorySnapshot {
        self.inner.lock().unwrap().items.clone()
    }

    /// Register a listener; it is invoked synchronously with the current
    /// snapshot before this call returns, and again after every upsert.
    pub fn subscribe(&self, listener: InventoryListener) -> ListenerId {
        let (id, snapshot) = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.listeners.insert(id, listener.clone());
            (id, inner.items.clone())
        };
        listener(&snapshot);
        id
    }

    /// Remove a previously registered listener
    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner.lock().unwrap().listeners.remove(&id);
    }

    /// Drop all listeners (shutdown teardown)
    pub fn clear_listeners(&self) {
        self.inner.lock().unwrap().listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merge an incoming observation into an existing record
///
/// - quantity sums (not idempotent by design)
/// - the soonest `date_expiring` wins, since it drives prioritization
/// - the earlier `date_added` wins
/// - category upgrades from `Other` but never regresses to it
/// - price and display name keep the existing value when present
fn merge_item(existing: &mut InventoryItem, incoming: &InventoryItem) {
    existing.quantity += incoming.quantity;

    if dates::compare(&incoming.date_expiring, &existing.date_expiring) == std::cmp::Ordering::Less
    {
        existing.date_expiring = incoming.date_expiring.clone();
    }
    if dates::compare(&incoming.date_added, &existing.date_added) == std::cmp::Ordering::Less {
        existing.date_added = incoming.date_added.clone();
    }

    if existing.category == Category::Other && incoming.category != Category::Other {
        existing.category = incoming.category;
    }

    if existing.price.is_none() {
        existing.price = incoming.price;
    }

    if existing.food_type.is_empty() {
        existing.food_type = incoming.food_type.trim().to_string();
    }
}

/// Items of a snapshot sorted by soonest expiration first
///
/// The sort is stable, so ties keep the snapshot's deterministic key order.
pub fn sorted_by_expiry(snapshot: &InventorySnapshot) -> Vec<InventoryItem> {
    let mut items: Vec<InventoryItem> = snapshot.values().cloned().collect();
    items.sort_by(|a, b| dates::compare(&a.date_expiring, &b.date_expiring));
    items
}

/// Seed the store with the fixed demo grocery run
///
/// Expiration dates are computed from today's date and a per-item shelf life
/// in days.
pub fn seed_demo_inventory(store: &InventoryStore) {
    let today = dates::today();
    let demo: &[(&str, f64, f64, Category, i64)] = &[
        ("Diced Tomatoes", 1.0, 0.67, Category::Vegetable, 365),
        ("Tomato Paste", 1.0, 0.75, Category::Condiment, 365),
        ("Wheat Bread", 1.0, 4.49, Category::Carbs, 7),
        ("Parmesan Shredded", 1.0, 3.89, Category::Dairy, 30),
        ("Impos Burg", 1.0, 7.59, Category::Other, 7),
        ("Boneless Chicken Breast", 1.0, 12.18, Category::Meat, 2),
        ("Vanilla Frozen Yogurt", 1.0, 2.0, Category::Dairy, 30),
        ("Limes Persian", 3.0, 1.74, Category::Fruit, 21),
        ("Chicken Broth", 1.0, 5.99, Category::Other, 365),
        ("Creamy Peanut Butter", 1.0, 5.75, Category::Condiment, 180),
        ("Green Beans", 1.0, 0.89, Category::Vegetable, 7),
        ("Tomato Ketchup", 1.0, 6.39, Category::Condiment, 180),
        ("Green Bell Peppers", 1.0, 2.84, Category::Vegetable, 7),
        ("Red Bell Peppers", 1.0, 2.19, Category::Vegetable, 7),
        ("Organic Carrots", 1.0, 1.69, Category::Vegetable, 30),
        ("Banana Shallots", 0.2, 1.4, Category::Vegetable, 30),
    ];

    let items: Vec<InventoryItem> = demo
        .iter()
        .map(|(name, quantity, price, category, shelf_days)| InventoryItem {
            food_type: name.to_string(),
            quantity: *quantity,
            price: Some(*price),
            category: *category,
            date_added: today.clone(),
            date_expiring: dates::add_days(&today, *shelf_days),
        })
        .collect();

    info!("Seeding demo inventory with {} items", items.len());
    store.upsert(&items);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: f64, expiring: &str) -> InventoryItem {
        InventoryItem {
            food_type: name.to_string(),
            quantity,
            price: None,
            category: Category::Other,
            date_added: "2025-01-01".to_string(),
            date_expiring: expiring.to_string(),
        }
    }

    #[test]
    fn test_upsert_inserts_with_trimmed_display_name() {
        let store = InventoryStore::new();
        store.upsert(&[item("  Milk ", 1.0, "2025-01-10")]);

        let snapshot = store.snapshot();
        let milk = snapshot.get("milk").expect("keyed by normalized name");
        assert_eq!(milk.food_type, "Milk");
    }

    #[test]
    fn test_quantity_sums_on_merge() {
        let store = InventoryStore::new();
        let milk = item("Milk", 1.0, "2025-01-10");
        store.upsert(&[milk.clone()]);
        store.upsert(&[milk]);

        assert_eq!(store.snapshot()["milk"].quantity, 2.0);
    }

    #[test]
    fn test_negative_quantity_subtracts() {
        let store = InventoryStore::new();
        store.upsert(&[item("Shallot", 1.0, "2025-01-10")]);
        store.upsert(&[item("Shallot", -0.2, "2025-01-10")]);

        assert!((store.snapshot()["shallot"].quantity - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_soonest_expiry_wins() {
        let store = InventoryStore::new();
        store.upsert(&[item("Milk", 1.0, "2025-01-10")]);
        store.upsert(&[item("Milk", 1.0, "2025-01-05")]);
        assert_eq!(store.snapshot()["milk"].date_expiring, "2025-01-05");

        // A later incoming date never replaces a sooner existing one.
        store.upsert(&[item("Milk", 1.0, "2025-03-01")]);
        assert_eq!(store.snapshot()["milk"].date_expiring, "2025-01-05");
    }

    #[test]
    fn test_earlier_date_added_wins() {
        let store = InventoryStore::new();
        let mut first = item("Milk", 1.0, "2025-01-10");
        first.date_added = "2025-01-03".to_string();
        let mut second = item("Milk", 1.0, "2025-01-10");
        second.date_added = "2025-01-01".to_string();

        store.upsert(&[first]);
        store.upsert(&[second]);
        assert_eq!(store.snapshot()["milk"].date_added, "2025-01-01");
    }

    #[test]
    fn test_category_never_regresses_to_other() {
        let store = InventoryStore::new();
        let mut dairy = item("Milk", 1.0, "2025-01-10");
        dairy.category = Category::Dairy;
        store.upsert(&[dairy]);
        store.upsert(&[item("Milk", 1.0, "2025-01-10")]);

        assert_eq!(store.snapshot()["milk"].category, Category::Dairy);
    }

    #[test]
    fn test_category_upgrades_from_other() {
        let store = InventoryStore::new();
        store.upsert(&[item("Milk", 1.0, "2025-01-10")]);
        let mut dairy = item("Milk", 1.0, "2025-01-10");
        dairy.category = Category::Dairy;
        store.upsert(&[dairy]);

        assert_eq!(store.snapshot()["milk"].category, Category::Dairy);
    }

    #[test]
    fn test_existing_price_is_kept() {
        let store = InventoryStore::new();
        let mut priced = item("Milk", 1.0, "2025-01-10");
        priced.price = Some(2.49);
        store.upsert(&[priced]);

        let mut repriced = item("Milk", 1.0, "2025-01-10");
        repriced.price = Some(9.99);
        store.upsert(&[repriced]);

        assert_eq!(store.snapshot()["milk"].price, Some(2.49));
    }

    #[test]
    fn test_missing_price_adopts_incoming() {
        let store = InventoryStore::new();
        store.upsert(&[item("Milk", 1.0, "2025-01-10")]);
        let mut priced = item("Milk", 1.0, "2025-01-10");
        priced.price = Some(2.49);
        store.upsert(&[priced]);

        assert_eq!(store.snapshot()["milk"].price, Some(2.49));
    }

    #[test]
    fn test_snapshot_does_not_observe_later_mutations() {
        let store = InventoryStore::new();
        store.upsert(&[item("Milk", 1.0, "2025-01-10")]);
        let snapshot = store.snapshot();
        store.upsert(&[item("Eggs", 12.0, "2025-01-20")]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_sorted_by_expiry_is_stable_on_ties() {
        let store = InventoryStore::new();
        store.upsert(&[
            item("Carrot", 1.0, "2025-01-10"),
            item("Apple", 1.0, "2025-01-10"),
            item("Milk", 1.0, "2025-01-05"),
        ]);

        let sorted = sorted_by_expiry(&store.snapshot());
        assert_eq!(sorted[0].food_type, "Milk");
        // Tie broken by deterministic snapshot key order.
        assert_eq!(sorted[1].food_type, "Apple");
        assert_eq!(sorted[2].food_type, "Carrot");
    }

    #[test]
    fn test_unknown_category_string_decodes_to_other() {
        let parsed: Category = serde_json::from_str("\"charcuterie\"").unwrap();
        assert_eq!(parsed, Category::Other);
        let parsed: Category = serde_json::from_str("\"dairy\"").unwrap();
        assert_eq!(parsed, Category::Dairy);
    }

    #[test]
    fn test_seed_demo_inventory_counts() {
        let store = InventoryStore::new();
        seed_demo_inventory(&store);
        assert_eq!(store.len(), 16);

        let sorted = sorted_by_expiry(&store.snapshot());
        assert_eq!(sorted[0].food_type, "Boneless Chicken Breast");
    }
}
