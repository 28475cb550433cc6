//! Cache key layout.
//!
//! Every key is namespaced under `menuqr:` so a shared Redis can host other
//! tenants. Per-menu entries are enumerated by [`CacheKey::menu_entries`] so
//! invalidation never needs a key scan.

use uuid::Uuid;

const NAMESPACE: &str = "menuqr";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Shaped public menu looked up by slug.
    PublicMenu(String),
    /// Owner-facing view statistics for a menu.
    MenuStats(Uuid),
}

impl CacheKey {
    pub fn render(&self) -> String {
        match self {
            CacheKey::PublicMenu(slug) => format!("{NAMESPACE}:menu:public:{slug}"),
            CacheKey::MenuStats(id) => format!("{NAMESPACE}:menu:{id}:stats"),
        }
    }

    /// All cached entries derived from one menu.
    pub fn menu_entries(menu_id: Uuid, slug: &str) -> Vec<String> {
        vec![
            CacheKey::PublicMenu(slug.to_string()).render(),
            CacheKey::MenuStats(menu_id).render(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(
            CacheKey::PublicMenu("harbor-cafe".into()).render(),
            "menuqr:menu:public:harbor-cafe"
        );
        let id = Uuid::nil();
        assert_eq!(
            CacheKey::MenuStats(id).render(),
            "menuqr:menu:00000000-0000-0000-0000-000000000000:stats"
        );
    }

    #[test]
    fn menu_entries_cover_slug_and_stats() {
        let id = Uuid::new_v4();
        let entries = CacheKey::menu_entries(id, "harbor-cafe");
        assert!(entries.contains(&CacheKey::PublicMenu("harbor-cafe".into()).render()));
        assert!(entries.contains(&CacheKey::MenuStats(id).render()));
    }
}
