//! Name derivations for relation fields and model info.

use convert_case::{Case, Casing};

/// Nouns with no distinct plural form.
const UNCOUNTABLE: &[&str] = &[
    "audio", "data", "equipment", "feedback", "fish", "information", "media", "metadata", "money",
    "news", "series", "sheep", "species",
];

/// English plural of a singular noun (`category` → `categories`, `status` → `statuses`).
pub fn pluralize(value: &str) -> String {
    let last_word = value
        .rsplit(['-', '_', ' '])
        .next()
        .unwrap_or(value)
        .to_lowercase();
    if value.is_empty() || UNCOUNTABLE.contains(&last_word.as_str()) {
        return value.to_string();
    }

    let consonant_y = value
        .strip_suffix('y')
        .filter(|stem| !stem.is_empty() && !stem.ends_with(['a', 'e', 'i', 'o', 'u', 'A', 'E', 'I', 'O', 'U']));
    if let Some(stem) = consonant_y {
        return format!("{stem}ies");
    }
    if let Some(stem) = value.strip_suffix("is") {
        return format!("{stem}es");
    }
    if value.ends_with(['s', 'x', 'z']) || value.ends_with("ch") || value.ends_with("sh") {
        return format!("{value}es");
    }
    format!("{value}s")
}

pub fn to_snake_case(value: &str) -> String {
    value.to_case(Case::Snake)
}

/// REST endpoint segment of a type: lowercase plural kebab-case.
pub fn endpoint_for(type_name: &str) -> String {
    pluralize(&type_name.to_case(Case::Kebab)).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralizes_common_nouns() {
        assert_eq!(pluralize("tag"), "tags");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("news"), "news");
        assert_eq!(pluralize("Address"), "Addresses");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("church"), "churches");
        assert_eq!(pluralize("analysis"), "analyses");
        assert_eq!(pluralize("blog-media"), "blog-media");
    }

    #[test]
    fn test_endpoint_is_plural_kebab() {
        assert_eq!(endpoint_for("BlogPost"), "blog-posts");
        assert_eq!(endpoint_for("Category"), "categories");
        assert_eq!(endpoint_for("Address"), "addresses");
        assert_eq!(endpoint_for("OrderStatus"), "order-statuses");
        assert_eq!(to_snake_case("relatedArticles"), "related_articles");
    }
}
