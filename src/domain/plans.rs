//! Subscription plan policy.
//!
//! Each tier maps to a fixed set of numeric limits and feature flags. Limits
//! never decrease from one tier to the next and `None` means unbounded. All
//! functions here are pure; callers supply the current usage counts.

use std::fmt;

use serde::Serialize;

use crate::domain::error::DomainError;
use crate::domain::types::SubscriptionPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanResource {
    Menus,
    CategoriesPerMenu,
    ProductsPerMenu,
}

impl fmt::Display for PlanResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlanResource::Menus => "menus",
            PlanResource::CategoriesPerMenu => "categories per menu",
            PlanResource::ProductsPerMenu => "products per menu",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanFeature {
    CustomBranding,
    Analytics,
    Promotions,
    MultiLanguage,
}

impl fmt::Display for PlanFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlanFeature::CustomBranding => "custom branding",
            PlanFeature::Analytics => "analytics",
            PlanFeature::Promotions => "promotions",
            PlanFeature::MultiLanguage => "multi-language menus",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub menus: Option<u32>,
    pub categories_per_menu: Option<u32>,
    pub products_per_menu: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPolicy {
    pub plan: SubscriptionPlan,
    pub limits: PlanLimits,
    pub features: &'static [PlanFeature],
}

const FREE: PlanPolicy = PlanPolicy {
    plan: SubscriptionPlan::Free,
    limits: PlanLimits {
        menus: Some(1),
        categories_per_menu: Some(5),
        products_per_menu: Some(30),
    },
    features: &[],
};

const STARTER: PlanPolicy = PlanPolicy {
    plan: SubscriptionPlan::Starter,
    limits: PlanLimits {
        menus: Some(5),
        categories_per_menu: Some(20),
        products_per_menu: Some(200),
    },
    features: &[
        PlanFeature::CustomBranding,
        PlanFeature::Analytics,
        PlanFeature::Promotions,
        PlanFeature::MultiLanguage,
    ],
};

const PRO: PlanPolicy = PlanPolicy {
    plan: SubscriptionPlan::Pro,
    limits: PlanLimits {
        menus: None,
        categories_per_menu: None,
        products_per_menu: None,
    },
    features: &[
        PlanFeature::CustomBranding,
        PlanFeature::Analytics,
        PlanFeature::Promotions,
        PlanFeature::MultiLanguage,
    ],
};

/// Look up the static policy for a tier.
pub fn policy(plan: SubscriptionPlan) -> &'static PlanPolicy {
    match plan {
        SubscriptionPlan::Free => &FREE,
        SubscriptionPlan::Starter => &STARTER,
        SubscriptionPlan::Pro => &PRO,
    }
}

impl PlanPolicy {
    pub fn limit(&self, resource: PlanResource) -> Option<u32> {
        match resource {
            PlanResource::Menus => self.limits.menus,
            PlanResource::CategoriesPerMenu => self.limits.categories_per_menu,
            PlanResource::ProductsPerMenu => self.limits.products_per_menu,
        }
    }

    pub fn has_feature(&self, feature: PlanFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn ensure_can_create(&self, resource: PlanResource, current: u64) -> Result<(), DomainError> {
        match self.limit(resource) {
            Some(limit) if current >= u64::from(limit) => Err(DomainError::PlanLimitReached {
                plan: self.plan,
                resource,
                limit,
            }),
            _ => Ok(()),
        }
    }

    pub fn ensure_feature(&self, feature: PlanFeature) -> Result<(), DomainError> {
        if self.has_feature(feature) {
            Ok(())
        } else {
            Err(DomainError::FeatureUnavailable {
                plan: self.plan,
                feature,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PLANS: [SubscriptionPlan; 3] = [
        SubscriptionPlan::Free,
        SubscriptionPlan::Starter,
        SubscriptionPlan::Pro,
    ];
    const ALL_RESOURCES: [PlanResource; 3] = [
        PlanResource::Menus,
        PlanResource::CategoriesPerMenu,
        PlanResource::ProductsPerMenu,
    ];

    fn as_ceiling(limit: Option<u32>) -> u64 {
        limit.map(u64::from).unwrap_or(u64::MAX)
    }

    #[test]
    fn limits_never_decrease_with_tier() {
        for resource in ALL_RESOURCES {
            for pair in ALL_PLANS.windows(2) {
                let lower = as_ceiling(policy(pair[0]).limit(resource));
                let higher = as_ceiling(policy(pair[1]).limit(resource));
                assert!(
                    lower <= higher,
                    "{resource} shrinks from {} to {}",
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn features_accumulate_with_tier() {
        for pair in ALL_PLANS.windows(2) {
            let lower = policy(pair[0]);
            let higher = policy(pair[1]);
            for feature in lower.features {
                assert!(higher.has_feature(*feature));
            }
        }
    }

    #[test]
    fn free_plan_allows_a_single_menu() {
        let free = policy(SubscriptionPlan::Free);
        assert!(free.ensure_can_create(PlanResource::Menus, 0).is_ok());
        assert!(free.ensure_can_create(PlanResource::Menus, 1).is_err());
    }

    #[test]
    fn pro_plan_is_unbounded() {
        let pro = policy(SubscriptionPlan::Pro);
        assert!(
            pro.ensure_can_create(PlanResource::ProductsPerMenu, 1_000_000)
                .is_ok()
        );
        assert_eq!(pro.limit(PlanResource::Menus), None);
    }

    #[test]
    fn ensure_can_create_reports_the_limit() {
        let err = policy(SubscriptionPlan::Starter)
            .ensure_can_create(PlanResource::CategoriesPerMenu, 20)
            .expect_err("limit reached");
        assert_eq!(
            err,
            DomainError::PlanLimitReached {
                plan: SubscriptionPlan::Starter,
                resource: PlanResource::CategoriesPerMenu,
                limit: 20,
            }
        );
    }

    #[test]
    fn free_plan_lacks_promotions() {
        assert!(
            policy(SubscriptionPlan::Free)
                .ensure_feature(PlanFeature::Promotions)
                .is_err()
        );
        assert!(
            policy(SubscriptionPlan::Starter)
                .ensure_feature(PlanFeature::Promotions)
                .is_ok()
        );
    }
}
