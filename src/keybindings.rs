//! Tool hotkeys.

use serde::{Deserialize, Serialize};

use crate::tools::Tool;

/// Keys the canvas reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Delete,
    Backspace,
    Char(char),
}

/// Character hotkeys for switching tools. Matching ignores case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_select")]
    pub tool_select: char,
    #[serde(default = "default_box")]
    pub tool_box: char,
    #[serde(default = "default_polygon")]
    pub tool_polygon: char,
    #[serde(default = "default_smart_polygon")]
    pub tool_smart_polygon: char,
}

fn default_select() -> char {
    'v'
}

fn default_box() -> char {
    'b'
}

fn default_polygon() -> char {
    'p'
}

fn default_smart_polygon() -> char {
    's'
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            tool_select: default_select(),
            tool_box: default_box(),
            tool_polygon: default_polygon(),
            tool_smart_polygon: default_smart_polygon(),
        }
    }
}

impl KeyBindings {
    /// The tool bound to `c`, if any.
    pub fn tool_for(&self, c: char) -> Option<Tool> {
        let c = c.to_ascii_lowercase();
        [
            (self.tool_select, Tool::Select),
            (self.tool_box, Tool::Box),
            (self.tool_polygon, Tool::Polygon),
            (self.tool_smart_polygon, Tool::SmartPolygon),
        ]
        .into_iter()
        .find(|(key, _)| key.to_ascii_lowercase() == c)
        .map(|(_, tool)| tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let kb = KeyBindings::default();
        assert_eq!(kb.tool_for('b'), Some(Tool::Box));
        assert_eq!(kb.tool_for('S'), Some(Tool::SmartPolygon));
        assert_eq!(kb.tool_for('x'), None);
    }
}
