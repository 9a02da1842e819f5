//! Icon and color assignment for event categories.
//!
//! Lookup order for a category (an event's `title`):
//!
//! 1. configured presets, exact match
//! 2. built-in styles keyed on the last `.`/`_`/`:` separated word
//!    (`order.created`, `user_deleted`, ...)
//! 3. a previously assigned random style
//! 4. a new pick from the palettes, drawn from a seeded RNG and memoized
//!
//! Given the same seed and the same first-seen order of categories, the
//! assignment is identical across runs.

use std::collections::{BTreeMap, HashMap};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use tideline_types::CategoryStyle;

const ICONS: &[&str] = &[
    "bolt", "bell", "flag", "star", "tag", "cube", "cloud", "gear", "rocket", "leaf",
];

const COLORS: &[&str] = &[
    "#58a6ff", "#7ee787", "#d2a8ff", "#ffa657", "#79c0ff", "#f2cc60", "#a5d6ff", "#ffbedd",
];

const FALLBACK_ICON: &str = "circle";
const FALLBACK_COLOR: &str = "#8b949e";

/// Style cache keyed by category name.
#[derive(Debug)]
pub struct CategoryStyles {
    presets: BTreeMap<String, CategoryStyle>,
    assigned: HashMap<String, CategoryStyle>,
    rng: SmallRng,
}

impl CategoryStyles {
    /// Create a cache with fixed `presets` and a reproducible `seed` for
    /// everything else.
    pub fn new(presets: BTreeMap<String, CategoryStyle>, seed: u64) -> Self {
        Self {
            presets,
            assigned: HashMap::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Style for `category`, assigning one on first sight if needed.
    pub fn style_for(&mut self, category: &str) -> CategoryStyle {
        if let Some(style) = self.presets.get(category) {
            return style.clone();
        }
        if let Some(style) = builtin(category) {
            return style;
        }
        if let Some(style) = self.assigned.get(category) {
            return style.clone();
        }
        let style = CategoryStyle {
            icon: ICONS
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(FALLBACK_ICON)
                .to_owned(),
            color: COLORS
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(FALLBACK_COLOR)
                .to_owned(),
        };
        self.assigned.insert(category.to_owned(), style.clone());
        style
    }

    /// Number of categories that received a random style.
    pub fn assigned_len(&self) -> usize {
        self.assigned.len()
    }
}

impl Default for CategoryStyles {
    fn default() -> Self {
        Self::new(BTreeMap::new(), 0)
    }
}

fn builtin(category: &str) -> Option<CategoryStyle> {
    let word = category.rsplit(['.', '_', ':']).next().unwrap_or(category);
    let (icon, color) = match word.to_ascii_lowercase().as_str() {
        "created" => ("plus", "#3fb950"),
        "updated" => ("pencil", "#58a6ff"),
        "deleted" => ("trash", "#f85149"),
        "error" | "failed" => ("alert", "#ff7b72"),
        _ => return None,
    };
    Some(CategoryStyle {
        icon: icon.to_owned(),
        color: color.to_owned(),
    })
}
