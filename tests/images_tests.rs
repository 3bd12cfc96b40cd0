//! # Visual Catalog Tests
//!
//! Integration tests for the keyword-priority matching policy and the
//! collision-avoiding batch assignment.

#[cfg(test)]
mod tests {
    use pocketfridge::images::{assign_key, candidate_keys, key_for_food, url_for, CATALOG, GENERIC_KEY};
    use std::collections::HashSet;

    #[test]
    fn test_disjoint_recipes_get_unique_keys() {
        let blobs = [
            "Chicken & Pepper Skillet chicken bell peppers shallots",
            "Green Bean Stir-Fry green beans garlic",
            "Tomato Parmesan Soup diced tomatoes parmesan broth",
            "Salmon Rice Bowl salmon cucumber lime",
        ];

        let mut used: HashSet<&'static str> = HashSet::new();
        for blob in &blobs {
            let key = assign_key(blob, &used);
            assert!(!used.contains(key), "duplicate key {key} in batch");
            used.insert(key);
        }
        assert_eq!(used.len(), blobs.len());
    }

    #[test]
    fn test_overlapping_recipes_shift_to_next_candidate() {
        let mut used: HashSet<&'static str> = HashSet::new();

        let first = assign_key("Chicken tomato skillet", &used);
        used.insert(first);
        let second = assign_key("Chicken tomato bake", &used);
        used.insert(second);

        assert_eq!(first, "chickenbreast");
        assert_eq!(second, "tomato");
    }

    #[test]
    fn test_repeat_only_when_candidates_exhausted() {
        let mut used: HashSet<&'static str> = HashSet::new();
        used.insert("chickenbreast");

        // The only matching key is taken: repeat it rather than show an
        // unrelated image.
        assert_eq!(assign_key("plain chicken", &used), "chickenbreast");
    }

    #[test]
    fn test_unmatched_recipe_takes_first_unused_catalog_key() {
        let mut used: HashSet<&'static str> = HashSet::new();
        used.insert(CATALOG[0]);
        let key = assign_key("mystery stew of nothing known", &used);
        assert_eq!(key, CATALOG[1]);
    }

    #[test]
    fn test_full_catalog_falls_back_to_generic() {
        let used: HashSet<&'static str> = CATALOG.iter().copied().collect();
        assert_eq!(assign_key("mystery stew", &used), GENERIC_KEY);
    }

    #[test]
    fn test_rule_priority_proteins_before_produce() {
        let keys = candidate_keys("garlic broccoli salmon dinner");
        assert_eq!(keys[0], "salmon");
    }

    #[test]
    fn test_inventory_food_type_mapping() {
        assert_eq!(key_for_food("Boneless Chicken Breast"), "chickenbreast");
        assert_eq!(key_for_food("Limes Persian"), "lime");
        assert_eq!(key_for_food("Vanilla Frozen Yogurt"), "yogurt");
        assert_eq!(key_for_food("Banana Shallots"), "shallot");
        assert_eq!(key_for_food("Diced Tomatoes"), "tomato");
        assert_eq!(key_for_food("Unknown Delicacy"), GENERIC_KEY);
    }

    #[test]
    fn test_every_catalog_key_resolves_to_an_asset() {
        for key in CATALOG {
            let url = url_for(key);
            assert!(url.ends_with(&format!("{key}.png")));
        }
    }
}
