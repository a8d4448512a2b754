//! Label categories and the registry the renderer asks for display colors.

use labelkit_render::Color;
use serde::{Deserialize, Serialize};

/// A label category with a display name and color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier for the category
    pub id: u32,
    /// Label key stored on annotations
    pub name: String,
    /// Human readable name; falls back to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// RGB color for the category
    pub color: [u8; 3],
}

impl Category {
    /// Create a category with a color derived from its ID.
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            display_name: None,
            color: generated_color(id),
        }
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_string());
        self
    }

    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Spread hues along the golden angle so neighbouring IDs look different.
fn generated_color(id: u32) -> [u8; 3] {
    let hue = (id as f32 * 137.5) % 360.0;
    let (r, g, b) = hsv_to_rgb(hue, 0.7, 0.9);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Convert HSV to RGB (h in degrees, s and v in 0-1).
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}

/// Known labels. Lookups are by the label key stored on an annotation.
#[derive(Debug, Clone, Default)]
pub struct LabelRegistry {
    categories: Vec<Category>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_categories(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Add a category, replacing any existing one with the same name.
    pub fn add(&mut self, category: Category) {
        match self.categories.iter_mut().find(|c| c.name == category.name) {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Display color for a label. Unknown labels get a stable color hashed
    /// from the label text so they stay distinguishable.
    pub fn color_for(&self, label: &str) -> Color {
        match self.get(label) {
            Some(cat) => Color::from_rgb8(cat.color),
            None => {
                let hash = label
                    .bytes()
                    .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
                Color::from_rgb8(generated_color(hash % 360))
            }
        }
    }

    /// Text shown in a label chip.
    pub fn display_name<'a>(&'a self, label: &'a str) -> &'a str {
        self.get(label).map(Category::title).unwrap_or(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_color_generation() {
        let c1 = Category::new(1, "A");
        let c2 = Category::new(2, "B");
        assert_ne!(c1.color, c2.color);
    }

    #[test]
    fn test_registry_lookup_and_fallback() {
        let mut registry = LabelRegistry::new();
        registry.add(Category::new(1, "car").with_color([255, 0, 0]).with_display_name("Car"));

        assert_eq!(registry.color_for("car"), Color::from_rgb8([255, 0, 0]));
        assert_eq!(registry.display_name("car"), "Car");
        assert_eq!(registry.display_name("bus"), "bus");

        // Unknown labels are stable across calls
        assert_eq!(registry.color_for("bus"), registry.color_for("bus"));
    }

    #[test]
    fn test_add_replaces_same_name() {
        let mut registry = LabelRegistry::new();
        registry.add(Category::new(1, "car"));
        registry.add(Category::new(2, "car").with_color([1, 2, 3]));
        assert_eq!(registry.categories().len(), 1);
        assert_eq!(registry.get("car").map(|c| c.id), Some(2));
    }
}
