//! Cache key namespaces
//!
//! Keys are `{resource}:{parameters}` so a whole resource can be dropped with
//! a prefix clear.

pub const DISH_PREFIX: &str = "dish:";
pub const PAIRINGS_PREFIX: &str = "pairings:";
pub const SEARCH_PREFIX: &str = "search:";
pub const DISHES_PREFIX: &str = "dishes:";
pub const POPULAR_PREFIX: &str = "popular:";
pub const CATEGORIES: &str = "categories";

/// `dish:{slug}`
pub fn dish(slug: &str) -> String {
    format!("{DISH_PREFIX}{slug}")
}

/// `pairings:{slug}`
pub fn pairings(slug: &str) -> String {
    format!("{PAIRINGS_PREFIX}{slug}")
}

/// `search:{query}:{page}:{limit}` with the query trimmed and ASCII-lowercased
///
/// SQLite's `LIKE` and `lower()` fold ASCII case only, so only ASCII case may
/// share a key.
pub fn search(query: &str, page: i64, limit: i64) -> String {
    format!(
        "{SEARCH_PREFIX}{}:{}:{}",
        query.trim().to_ascii_lowercase(),
        page,
        limit
    )
}

/// `dishes:{type|all}:{limit}:{offset}`
pub fn dishes(dish_type: Option<&str>, limit: i64, offset: i64) -> String {
    format!(
        "{DISHES_PREFIX}{}:{}:{}",
        dish_type.unwrap_or("all"),
        limit,
        offset
    )
}

/// `popular:{limit}`
pub fn popular(limit: i64) -> String {
    format!("{POPULAR_PREFIX}{limit}")
}
