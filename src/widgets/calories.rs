//! Today's calorie log, held in memory only.

use serde::Serialize;

const SAMPLE_ITEMS: [(&str, u32); 3] = [
    ("Apple", 95),
    ("Chicken Breast (100g)", 165),
    ("Salad", 150),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoodItem {
    pub id: u64,
    pub name: String,
    pub calories: u32,
}

#[derive(Debug, Default)]
pub struct CalorieLog {
    items: Vec<FoodItem>,
    next_id: u64,
}

impl CalorieLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log pre-filled with a few common foods, as shown on first open.
    pub fn with_sample_items() -> Self {
        let mut log = Self::new();
        for (name, calories) in SAMPLE_ITEMS {
            log.add(name, calories);
        }
        log
    }

    /// Append an item. Blank names and zero calories are rejected.
    pub fn add(&mut self, name: &str, calories: u32) -> Option<&FoodItem> {
        let name = name.trim();
        if name.is_empty() || calories == 0 {
            return None;
        }
        self.next_id += 1;
        self.items.push(FoodItem { id: self.next_id, name: name.to_string(), calories });
        self.items.last()
    }

    /// Remove by id; `false` if no such item.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn total(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.calories)).sum()
    }

    pub fn items(&self) -> &[FoodItem] {
        &self.items
    }
}
