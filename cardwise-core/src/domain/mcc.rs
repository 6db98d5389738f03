//! Merchant category code mapping
//!
//! Maps four-digit MCCs to the expense categories shown to the user. A
//! built-in table covers the common codes; users can override individual
//! codes, and their mappings always win.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Category used when neither an override nor an MCC mapping applies
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Exact built-in code mappings
const BUILTIN_CODES: &[(&str, &str)] = &[
    ("4111", "Transport"),
    ("4112", "Transport"),
    ("4121", "Transport"),
    ("4131", "Transport"),
    ("4511", "Travel"),
    ("4722", "Travel"),
    ("4784", "Transport"),
    ("4814", "Utilities"),
    ("4899", "Utilities"),
    ("4900", "Utilities"),
    ("5045", "Shopping"),
    ("5200", "Shopping"),
    ("5311", "Shopping"),
    ("5331", "Shopping"),
    ("5399", "Shopping"),
    ("5411", "Groceries"),
    ("5422", "Groceries"),
    ("5441", "Groceries"),
    ("5451", "Groceries"),
    ("5462", "Groceries"),
    ("5499", "Groceries"),
    ("5541", "Fuel"),
    ("5542", "Fuel"),
    ("5651", "Shopping"),
    ("5691", "Shopping"),
    ("5732", "Shopping"),
    ("5812", "Dining"),
    ("5813", "Dining"),
    ("5814", "Dining"),
    ("5912", "Health"),
    ("5942", "Shopping"),
    ("5999", "Shopping"),
    ("6300", "Insurance"),
    ("7011", "Travel"),
    ("7832", "Entertainment"),
    ("7841", "Entertainment"),
    ("7997", "Entertainment"),
    ("8011", "Health"),
    ("8062", "Health"),
    ("8099", "Health"),
    ("8220", "Education"),
    ("8299", "Education"),
    ("9311", "Government"),
    ("9399", "Government"),
];

/// Inclusive built-in code ranges, checked after exact codes
const BUILTIN_RANGES: &[(u16, u16, &str)] = &[
    (3000, 3299, "Travel"),
    (3351, 3441, "Transport"),
    (3501, 3999, "Travel"),
    (5960, 5969, "Shopping"),
    (8000, 8099, "Health"),
];

/// MCC → category lookup table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryMap {
    user_mappings: HashMap<String, String>,
}

impl CategoryMap {
    /// Built-in mappings only
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Built-in mappings with user overrides layered on top
    pub fn with_user_mappings(mappings: HashMap<String, String>) -> Self {
        let mut map = Self::default();
        for (code, category) in &mappings {
            map.set_user_mapping(code, category);
        }
        map
    }

    /// Override a single code. Blank codes or categories are ignored.
    pub fn set_user_mapping(&mut self, code: &str, category: &str) {
        let (code, category) = (code.trim(), category.trim());
        if code.is_empty() || category.is_empty() {
            return;
        }
        self.user_mappings.insert(code.to_string(), category.to_string());
    }

    /// Look up the category for an MCC
    pub fn category_for(&self, mcc: &str) -> Option<String> {
        let code = mcc.trim();
        if code.is_empty() {
            return None;
        }

        if let Some(category) = self.user_mappings.get(code) {
            return Some(category.clone());
        }

        if let Some((_, category)) = BUILTIN_CODES.iter().find(|(c, _)| *c == code) {
            return Some((*category).to_string());
        }

        let numeric: u16 = code.parse().ok()?;
        BUILTIN_RANGES
            .iter()
            .find(|(lo, hi, _)| numeric >= *lo && numeric <= *hi)
            .map(|(_, _, category)| (*category).to_string())
    }

    /// Resolve the effective category: override, then MCC, then "Uncategorized"
    pub fn resolve(&self, category_override: Option<&str>, mcc: Option<&str>) -> String {
        if let Some(category) = category_override.map(str::trim).filter(|c| !c.is_empty()) {
            return category.to_string();
        }
        mcc.and_then(|code| self.category_for(code))
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }
}
