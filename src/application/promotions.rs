use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::access::{MenuAccess, PlanGate};
use crate::application::error::{Resource, ServiceError};
use crate::application::menus::MenuService;
use crate::application::realtime::MenuEvent;
use crate::application::repos::{CreatePromotionParams, PromotionsRepo};
use crate::domain::entities::PromotionRecord;
use crate::domain::localized::LocalizedText;
use crate::domain::plans::PlanFeature;

const MAX_TITLE_CHARS: usize = 120;
const MAX_DESCRIPTION_CHARS: usize = 1000;

#[derive(Debug, Clone)]
pub struct PromotionInput {
    pub title: LocalizedText,
    pub description: Option<LocalizedText>,
    pub image_url: Option<String>,
    pub starts_at: OffsetDateTime,
    pub ends_at: OffsetDateTime,
    pub is_active: bool,
}

/// Time-boxed promotions shown on the public menu.
///
/// Creating one requires the `Promotions` plan feature. Listing and deletion
/// stay available after a downgrade so owners can clean up.
#[derive(Clone)]
pub struct PromotionService {
    promotions: Arc<dyn PromotionsRepo>,
    plans: PlanGate,
    menus: MenuService,
}

impl PromotionService {
    pub fn new(promotions: Arc<dyn PromotionsRepo>, plans: PlanGate, menus: MenuService) -> Self {
        Self {
            promotions,
            plans,
            menus,
        }
    }

    pub async fn list(&self, access: MenuAccess) -> Result<Vec<PromotionRecord>, ServiceError> {
        Ok(self.promotions.list_promotions(access.menu_id()).await?)
    }

    pub async fn create(
        &self,
        access: MenuAccess,
        input: PromotionInput,
    ) -> Result<PromotionRecord, ServiceError> {
        let policy = self.plans.policy_for(access.owner_id()).await?;
        policy.ensure_feature(PlanFeature::Promotions)?;

        check_window(input.starts_at, input.ends_at)?;
        if input.title.len() > 1 || input.description.as_ref().is_some_and(|d| d.len() > 1) {
            policy.ensure_feature(PlanFeature::MultiLanguage)?;
        }
        let title = input.title.normalize("title", MAX_TITLE_CHARS)?;
        let description = match input.description {
            Some(description) if !description.is_empty() => {
                Some(description.normalize("description", MAX_DESCRIPTION_CHARS)?)
            }
            _ => None,
        };

        let promotion = self
            .promotions
            .create_promotion(CreatePromotionParams {
                menu_id: access.menu_id(),
                title,
                description,
                image_url: input.image_url,
                starts_at: input.starts_at,
                ends_at: input.ends_at,
                is_active: input.is_active,
            })
            .await?;

        self.menus
            .content_changed(
                access.menu_id(),
                MenuEvent::Updated,
                json!({ "promotionId": promotion.id, "action": "created" }),
            )
            .await;
        Ok(promotion)
    }

    pub async fn delete(&self, access: MenuAccess, promotion_id: Uuid) -> Result<(), ServiceError> {
        if !self
            .promotions
            .delete_promotion(access.menu_id(), promotion_id)
            .await?
        {
            return Err(ServiceError::NotFound(Resource::Promotion));
        }
        self.menus
            .content_changed(
                access.menu_id(),
                MenuEvent::Updated,
                json!({ "promotionId": promotion_id, "action": "deleted" }),
            )
            .await;
        Ok(())
    }
}

fn check_window(starts_at: OffsetDateTime, ends_at: OffsetDateTime) -> Result<(), ServiceError> {
    if ends_at <= starts_at {
        return Err(ServiceError::validation_with(
            "endsAt must be after startsAt",
            json!({ "endsAt": ["must be after startsAt"] }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn window_must_move_forward() {
        let start = datetime!(2026-06-01 00:00 UTC);
        assert!(check_window(start, datetime!(2026-06-30 00:00 UTC)).is_ok());
        assert!(check_window(start, start).is_err());
        assert!(check_window(start, datetime!(2026-05-01 00:00 UTC)).is_err());
    }
}
