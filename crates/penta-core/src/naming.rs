//! Naming helpers shared by operation metadata and documentation.

/// Title-cases a snake_case identifier: `get_item` becomes `Get Item`.
///
/// Underscores become spaces and the first letter of every alphabetic run is
/// uppercased, so `category__in` becomes `Category  In`.
#[must_use]
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c == '_' {
            out.push(' ');
            at_word_start = true;
        } else if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Derives an operation id from a qualified handler name.
///
/// Path separators (`::` and `.`) become `_`, so `items::get_item` becomes
/// `items_get_item`.
#[must_use]
pub fn operation_id_from_name(name: &str) -> String {
    name.replace("::", "_").replace('.', "_")
}

/// Returns the last segment of a qualified handler name.
#[must_use]
pub fn short_name(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("item_id"), "Item Id");
        assert_eq!(title_case("limit"), "Limit");
        assert_eq!(title_case("category__in"), "Category  In");
        assert_eq!(title_case("x2y"), "X2Y");
    }

    #[test]
    fn test_operation_ids() {
        assert_eq!(operation_id_from_name("items::get_item"), "items_get_item");
        assert_eq!(operation_id_from_name("app.views.list"), "app_views_list");
        assert_eq!(short_name("items::get_item"), "get_item");
        assert_eq!(short_name("plain"), "plain");
    }
}
