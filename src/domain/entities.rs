//! Domain entities mirrored from persistent storage, plus the hydrated
//! menu tree used by owners and the public viewer.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::localized::LocalizedText;
use crate::domain::types::{DeviceType, MenuStatus, SubscriptionPlan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub plan: SubscriptionPlan,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A user together with the stored bcrypt hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: UserRecord,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuStyling {
    pub theme: String,
    pub primary_color: Option<String>,
    pub accent_color: Option<String>,
    pub font_family: Option<String>,
    pub logo_url: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub status: MenuStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub styling: MenuStyling,
    pub currency: String,
    pub default_locale: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    /// Price in minor currency units.
    pub price: i64,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: LocalizedText,
    /// Overrides the product price when set.
    pub price: Option<i64>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRecord {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub title: LocalizedText,
    pub description: Option<LocalizedText>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PromotionRecord {
    /// Active flag set and `now` inside the inclusive window.
    pub fn is_displayable(&self, now: OffsetDateTime) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuViewRecord {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub device: DeviceType,
    pub browser: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductRecord,
    pub variations: Vec<VariationRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: CategoryRecord,
    pub products: Vec<ProductDetail>,
}

/// A menu with its full content tree, ordered by `sort_order` at every level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuDetail {
    #[serde(flatten)]
    pub menu: MenuRecord,
    pub categories: Vec<CategoryDetail>,
    pub promotions: Vec<PromotionRecord>,
}

/// The representation served to diners and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMenu {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub styling: MenuStyling,
    pub currency: String,
    pub default_locale: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    pub categories: Vec<CategoryDetail>,
    pub promotions: Vec<PromotionRecord>,
}

impl PublicMenu {
    /// Shape a hydrated menu for public display: unavailable products are
    /// dropped and only promotions displayable at `now` are kept.
    pub fn from_detail(detail: MenuDetail, now: OffsetDateTime) -> Self {
        let MenuDetail {
            menu,
            categories,
            promotions,
        } = detail;

        let categories = categories
            .into_iter()
            .map(|mut category| {
                category
                    .products
                    .retain(|product| product.product.is_available);
                category
            })
            .collect();

        let promotions = promotions
            .into_iter()
            .filter(|promotion| promotion.is_displayable(now))
            .collect();

        Self {
            id: menu.id,
            slug: menu.slug,
            name: menu.name,
            description: menu.description,
            styling: menu.styling,
            currency: menu.currency,
            default_locale: menu.default_locale,
            published_at: menu.published_at,
            categories,
            promotions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn menu(now: OffsetDateTime) -> MenuRecord {
        MenuRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            slug: "harbor-cafe".into(),
            name: "Harbor Cafe".into(),
            description: None,
            status: MenuStatus::Published,
            published_at: Some(now),
            styling: MenuStyling::default(),
            currency: "EUR".into(),
            default_locale: "en".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn product(category_id: Uuid, available: bool, now: OffsetDateTime) -> ProductDetail {
        ProductDetail {
            product: ProductRecord {
                id: Uuid::new_v4(),
                category_id,
                name: LocalizedText::from([("en", "Espresso")]),
                description: None,
                price: 250,
                image_url: None,
                is_available: available,
                sort_order: 0,
                created_at: now,
                updated_at: now,
            },
            variations: Vec::new(),
        }
    }

    fn promotion(menu_id: Uuid, active: bool, starts_at: OffsetDateTime, ends_at: OffsetDateTime) -> PromotionRecord {
        PromotionRecord {
            id: Uuid::new_v4(),
            menu_id,
            title: LocalizedText::from([("en", "Happy hour")]),
            description: None,
            image_url: None,
            starts_at,
            ends_at,
            is_active: active,
            created_at: starts_at,
        }
    }

    #[test]
    fn promotion_window_is_inclusive() {
        let now = datetime!(2026-05-01 12:00 UTC);
        let promo = promotion(Uuid::new_v4(), true, now, now);
        assert!(promo.is_displayable(now));
        assert!(!promo.is_displayable(now + Duration::seconds(1)));
    }

    #[test]
    fn public_shape_filters_products_and_promotions() {
        let now = datetime!(2026-05-01 12:00 UTC);
        let menu = menu(now);
        let category_id = Uuid::new_v4();
        let detail = MenuDetail {
            categories: vec![CategoryDetail {
                category: CategoryRecord {
                    id: category_id,
                    menu_id: menu.id,
                    name: LocalizedText::from([("en", "Coffee")]),
                    description: None,
                    sort_order: 0,
                    created_at: now,
                    updated_at: now,
                },
                products: vec![
                    product(category_id, true, now),
                    product(category_id, false, now),
                ],
            }],
            promotions: vec![
                promotion(menu.id, true, now - Duration::days(1), now + Duration::days(1)),
                promotion(menu.id, false, now - Duration::days(1), now + Duration::days(1)),
                promotion(menu.id, true, now + Duration::days(1), now + Duration::days(2)),
            ],
            menu,
        };

        let public = PublicMenu::from_detail(detail, now);

        assert_eq!(public.categories.len(), 1);
        assert_eq!(public.categories[0].products.len(), 1);
        assert!(public.categories[0].products[0].product.is_available);
        assert_eq!(public.promotions.len(), 1);
    }

    #[test]
    fn public_menu_survives_a_cache_round_trip() {
        let now = datetime!(2026-05-01 12:00 UTC);
        let detail = MenuDetail {
            menu: menu(now),
            categories: Vec::new(),
            promotions: Vec::new(),
        };
        let public = PublicMenu::from_detail(detail, now);
        let encoded = serde_json::to_string(&public).expect("serialize");
        let decoded: PublicMenu = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, public);
    }
}
