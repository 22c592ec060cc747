//! Inventory file extraction.
//!
//! Inventory configs are keyed by inventory id at the top level. The
//! translatable surface is the inventory `title` and, per item slot, the
//! `name` and `lore`. Everything mechanical (materials, actions,
//! conditions, NBT) stays out of the translation files.

use serde_yaml::{Mapping, Value};

/// Item-level keys that are never translatable.
const IGNORED_ITEM_KEYS: &[&str] = &[
    "material",
    "slot",
    "amount",
    "type",
    "actions",
    "action",
    "conditions",
    "condition",
    "nbt",
    "custom-model-data",
    "enchantments",
    "flags",
    "glow",
    "commands",
    "sound",
    "permission",
    "close-on-click",
    "update-interval",
];

/// Extracts titles and item names/lore from inventory definition files.
///
/// Rules:
/// - every top-level key is an inventory id; its `title` is extracted;
/// - items under `items.<slot>` contribute `name` and `lore`, keyed by the
///   item's `type` (falling back to `slot-<slot>`) so translations survive
///   slot reshuffles;
/// - filler items (blank `name`) are skipped;
/// - items whose `material` starts with `item:` are template references and
///   skipped entirely;
/// - `variant0..N` child sections are recursed into like inventories.
#[derive(Debug, Default)]
pub struct InventoryExtractor;

impl InventoryExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the translatable mapping from an inventory document.
    pub fn extract(&self, doc: &Value) -> Mapping {
        let mut out = Mapping::new();
        let Value::Mapping(inventories) = doc else {
            return out;
        };
        for (id, section) in inventories {
            if let Value::Mapping(section) = section {
                let extracted = self.extract_section(section);
                if !extracted.is_empty() {
                    out.insert(id.clone(), Value::Mapping(extracted));
                }
            }
        }
        out
    }

    /// One inventory (or variant) section.
    fn extract_section(&self, section: &Mapping) -> Mapping {
        let mut out = Mapping::new();

        if let Some(title) = section.get("title")
            && matches!(title, Value::String(_))
        {
            out.insert(Value::String("title".to_string()), title.clone());
        }

        if let Some(Value::Mapping(items)) = section.get("items") {
            let extracted = self.extract_items(items);
            if !extracted.is_empty() {
                out.insert(Value::String("items".to_string()), Value::Mapping(extracted));
            }
        }

        // variant0..N sections nest further inventory content.
        for (key, value) in section {
            if let (Value::String(name), Value::Mapping(child)) = (key, value)
                && is_variant_key(name)
            {
                let extracted = self.extract_section(child);
                if !extracted.is_empty() {
                    out.insert(key.clone(), Value::Mapping(extracted));
                }
            }
        }
        out
    }

    fn extract_items(&self, items: &Mapping) -> Mapping {
        let mut out = Mapping::new();
        for (slot, item) in items {
            let Value::Mapping(item) = item else { continue };
            if is_template_reference(item) {
                continue;
            }
            let name = string_field(item, "name");
            // Fillers carry a blank name and exist only to pad the grid.
            if name.is_some_and(|n| n.trim().is_empty()) {
                continue;
            }

            let segment = string_field(item, "type")
                .map(str::to_string)
                .unwrap_or_else(|| format!("slot-{}", scalar_to_string(slot)));

            let mut fields = Mapping::new();
            if let Some(name) = name {
                fields.insert(
                    Value::String("name".to_string()),
                    Value::String(name.to_string()),
                );
            }
            if let Some(lore) = item.get("lore")
                && is_lore_value(lore)
            {
                fields.insert(Value::String("lore".to_string()), lore.clone());
            }
            if !fields.is_empty() {
                out.insert(Value::String(segment), Value::Mapping(fields));
            }
        }
        out
    }
}

/// `material: item:<id>` marks a reference to an item template defined
/// elsewhere; its display fields belong to that template.
fn is_template_reference(item: &Mapping) -> bool {
    string_field(item, "material").is_some_and(|material| material.starts_with("item:"))
}

fn is_variant_key(key: &str) -> bool {
    key.strip_prefix("variant")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

fn is_lore_value(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::Sequence(items) => items.iter().all(|item| matches!(item, Value::String(_))),
        _ => false,
    }
}

fn string_field<'a>(mapping: &'a Mapping, field: &str) -> Option<&'a str> {
    match mapping.get(field)? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => format!("{other:?}"),
    }
}

/// Keys an item mapping may carry that we deliberately ignore. Referenced
/// here so the list stays documented next to the extractor.
pub fn ignored_item_keys() -> &'static [&'static str] {
    IGNORED_ITEM_KEYS
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn extract(yaml: &str) -> BTreeMap<String, String> {
        let doc: Value = serde_yaml::from_str(yaml).unwrap();
        let out = InventoryExtractor::new().extract(&doc);
        let rendered = serde_yaml::to_string(&Value::Mapping(out)).unwrap();
        crate::loader::load_str(&rendered).unwrap()
    }

    #[test]
    fn extracts_title_and_items_by_type() {
        let flat = extract(
            r#"
main-shop:
  title: "Shop"
  size: 54
  items:
    "10":
      type: sword
      material: DIAMOND_SWORD
      name: "&bSword"
      lore:
        - "Sharp"
        - "Shiny"
    "11":
      material: STONE
      name: "Plain stone"
"#,
        );
        assert_eq!(flat["main-shop.title"], "Shop");
        assert_eq!(flat["main-shop.items.sword.name"], "&bSword");
        assert_eq!(flat["main-shop.items.sword.lore"], "Sharp\nShiny");
        assert_eq!(flat["main-shop.items.slot-11.name"], "Plain stone");
        assert!(!flat.contains_key("main-shop.size"));
    }

    #[test]
    fn skips_fillers_and_template_references() {
        let flat = extract(
            r#"
menu:
  title: "Menu"
  items:
    "0":
      material: GRAY_STAINED_GLASS_PANE
      name: " "
    "1":
      material: "item:common_back_button"
      name: "Back"
"#,
        );
        assert_eq!(flat["menu.title"], "Menu");
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn recurses_into_variants() {
        let flat = extract(
            r#"
kit-menu:
  title: "Kits"
  variant0:
    title: "Kits (VIP)"
    items:
      "4":
        type: vip-kit
        name: "VIP Kit"
"#,
        );
        assert_eq!(flat["kit-menu.title"], "Kits");
        assert_eq!(flat["kit-menu.variant0.title"], "Kits (VIP)");
        assert_eq!(flat["kit-menu.variant0.items.vip-kit.name"], "VIP Kit");
    }
}
