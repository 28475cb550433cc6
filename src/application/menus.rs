//! Menu lifecycle: creation under plan limits, owner listing, edits,
//! publishing and deletion.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::access::{MenuAccess, PlanGate, ensure_owner};
use crate::application::auth::AuthUser;
use crate::application::error::{Conflict, Resource, ServiceError};
use crate::application::pagination::{Page, PageRequest};
use crate::application::realtime::MenuEvent;
use crate::application::repos::{CreateMenuParams, MenusRepo, RepoError, UpdateMenuParams};
use crate::application::side_effects::SideEffects;
use crate::cache::CacheKey;
use crate::domain::entities::{MenuDetail, MenuRecord, MenuStyling, PublicMenu};
use crate::domain::error::DomainError;
use crate::domain::plans::{PlanFeature, PlanPolicy, PlanResource};
use crate::domain::slug::{SlugAsyncError, generate_unique_slug, validate_slug};

const MENUS_SLUG_CONSTRAINT: &str = "menus_slug_key";
const DEFAULT_THEME: &str = "classic";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, Default)]
pub struct StylingInput {
    pub theme: Option<String>,
    pub primary_color: Option<String>,
    pub accent_color: Option<String>,
    pub font_family: Option<String>,
    pub logo_url: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateMenuCommand {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub styling: StylingInput,
    pub currency: Option<String>,
    pub default_locale: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateMenuCommand {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub styling: StylingInput,
    pub currency: Option<String>,
    pub default_locale: Option<String>,
}

#[derive(Clone)]
pub struct MenuService {
    menus: Arc<dyn MenusRepo>,
    plans: PlanGate,
    effects: SideEffects,
    public_ttl: Duration,
}

impl MenuService {
    pub fn new(
        menus: Arc<dyn MenusRepo>,
        plans: PlanGate,
        effects: SideEffects,
        public_ttl: Duration,
    ) -> Self {
        Self {
            menus,
            plans,
            effects,
            public_ttl,
        }
    }

    /// Check that `principal` owns `menu_id`.
    pub async fn authorize(
        &self,
        principal: &AuthUser,
        menu_id: Uuid,
    ) -> Result<MenuAccess, ServiceError> {
        ensure_owner(principal, Resource::Menu, || self.menus.menu_owner(menu_id)).await?;
        Ok(MenuAccess::granted(menu_id, principal.id))
    }

    pub async fn create_menu(
        &self,
        principal: &AuthUser,
        command: CreateMenuCommand,
    ) -> Result<MenuRecord, ServiceError> {
        let policy = self.plans.policy_for(principal.id).await?;
        let current = self.menus.count_menus_for_owner(principal.id).await?;
        policy.ensure_can_create(PlanResource::Menus, current)?;
        ensure_branding_allowed(policy, &command.styling)?;

        let name = command.name.trim().to_string();
        let slug = match command.slug {
            Some(slug) => {
                let slug = slug.trim().to_string();
                validate_slug(&slug)?;
                if self.menus.slug_exists(&slug).await? {
                    return Err(ServiceError::Conflict(Conflict::SlugExists));
                }
                slug
            }
            None => self.unique_slug_for(&name).await?,
        };

        let params = CreateMenuParams {
            owner_id: principal.id,
            slug,
            name,
            description: trim_optional(command.description),
            styling: merge_styling(MenuStyling::default(), command.styling),
            currency: command
                .currency
                .map(|c| c.trim().to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            default_locale: command
                .default_locale
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        };

        let menu = self.menus.create_menu(params).await.map_err(slug_conflict)?;
        info!(
            target = "menuqr::menus",
            menu_id = %menu.id,
            owner_id = %principal.id,
            slug = %menu.slug,
            "menu created"
        );
        Ok(menu)
    }

    pub async fn list_menus(
        &self,
        principal: &AuthUser,
        page: PageRequest,
    ) -> Result<Page<MenuRecord>, ServiceError> {
        Ok(self.menus.list_menus_for_owner(principal.id, page).await?)
    }

    pub async fn menu_detail(&self, access: MenuAccess) -> Result<MenuDetail, ServiceError> {
        self.menus
            .load_menu_detail(access.menu_id())
            .await?
            .ok_or(ServiceError::NotFound(Resource::Menu))
    }

    pub async fn find_menu(&self, access: MenuAccess) -> Result<MenuRecord, ServiceError> {
        self.menus
            .find_menu(access.menu_id())
            .await?
            .ok_or(ServiceError::NotFound(Resource::Menu))
    }

    pub async fn update_menu(
        &self,
        access: MenuAccess,
        command: UpdateMenuCommand,
    ) -> Result<MenuRecord, ServiceError> {
        let current = self.find_menu(access).await?;
        let policy = self.plans.policy_for(access.owner_id()).await?;
        ensure_branding_allowed(policy, &command.styling)?;

        let slug = match command.slug {
            Some(slug) if slug.trim() != current.slug => {
                let slug = slug.trim().to_string();
                validate_slug(&slug)?;
                if self.menus.slug_exists(&slug).await? {
                    return Err(ServiceError::Conflict(Conflict::SlugExists));
                }
                slug
            }
            _ => current.slug.clone(),
        };

        let params = UpdateMenuParams {
            id: current.id,
            slug,
            name: command
                .name
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| current.name.clone()),
            description: match command.description {
                Some(description) => trim_optional(Some(description)),
                None => current.description.clone(),
            },
            styling: merge_styling(current.styling.clone(), command.styling),
            currency: command
                .currency
                .map(|c| c.trim().to_uppercase())
                .unwrap_or_else(|| current.currency.clone()),
            default_locale: command
                .default_locale
                .unwrap_or_else(|| current.default_locale.clone()),
        };

        let updated = self.menus.update_menu(params).await.map_err(slug_conflict)?;

        let mut stale = CacheKey::menu_entries(current.id, &current.slug);
        if updated.slug != current.slug {
            stale.push(CacheKey::PublicMenu(updated.slug.clone()).render());
        }
        self.effects.invalidate(stale).await;
        self.effects
            .broadcast(
                updated.id,
                MenuEvent::Updated,
                json!({ "menuId": updated.id, "slug": updated.slug }),
            )
            .await;

        Ok(updated)
    }

    /// Move a menu between DRAFT and PUBLISHED.
    ///
    /// Publishing needs at least one category and writes the public cache
    /// entry before returning; unpublishing drops every cached entry of the menu.
    pub async fn set_published(
        &self,
        access: MenuAccess,
        publish: bool,
    ) -> Result<MenuDetail, ServiceError> {
        let menu_id = access.menu_id();

        if publish {
            let since = self.effects.epoch();
            let now = OffsetDateTime::now_utc();
            let menu = self
                .menus
                .publish_menu(menu_id, now)
                .await?
                .ok_or(DomainError::EmptyMenu)?;
            let detail = self.menu_detail(access).await?;

            let public = PublicMenu::from_detail(detail.clone(), now);
            let payload = serde_json::to_string(&public).map_err(ServiceError::internal)?;
            self.effects
                .store(
                    CacheKey::PublicMenu(menu.slug.clone()).render(),
                    payload,
                    self.public_ttl,
                    since,
                )
                .await;
            self.effects
                .broadcast(
                    menu_id,
                    MenuEvent::Published,
                    json!({
                        "menuId": menu_id,
                        "slug": menu.slug,
                        "publishedAt": menu.published_at.and_then(|at| at.format(&Rfc3339).ok()),
                    }),
                )
                .await;

            info!(target = "menuqr::menus", menu_id = %menu_id, slug = %menu.slug, "menu published");
            Ok(detail)
        } else {
            let menu = self.menus.unpublish_menu(menu_id).await?;
            self.effects
                .invalidate(CacheKey::menu_entries(menu_id, &menu.slug))
                .await;
            self.effects
                .broadcast(
                    menu_id,
                    MenuEvent::Unpublished,
                    json!({ "menuId": menu_id, "slug": menu.slug }),
                )
                .await;

            info!(target = "menuqr::menus", menu_id = %menu_id, slug = %menu.slug, "menu unpublished");
            self.menu_detail(access).await
        }
    }

    pub async fn delete_menu(&self, access: MenuAccess) -> Result<(), ServiceError> {
        let menu = self.find_menu(access).await?;
        self.menus.delete_menu(menu.id).await?;

        self.effects
            .invalidate(CacheKey::menu_entries(menu.id, &menu.slug))
            .await;
        self.effects
            .broadcast(menu.id, MenuEvent::Deleted, json!({ "menuId": menu.id }))
            .await;

        info!(target = "menuqr::menus", menu_id = %menu.id, "menu deleted");
        Ok(())
    }

    /// Drop cached public data after a content change and notify viewers.
    pub async fn content_changed(&self, menu_id: Uuid, event: MenuEvent, payload: serde_json::Value) {
        match self.menus.find_menu(menu_id).await {
            Ok(Some(menu)) => {
                self.effects
                    .invalidate(CacheKey::menu_entries(menu.id, &menu.slug))
                    .await;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    target = "menuqr::menus",
                    menu_id = %menu_id,
                    error = %err,
                    "could not resolve menu slug for cache invalidation"
                );
            }
        }
        self.effects.broadcast(menu_id, event, payload).await;
    }

    async fn unique_slug_for(&self, name: &str) -> Result<String, ServiceError> {
        let menus = self.menus.clone();
        generate_unique_slug(name, move |candidate| {
            let menus = menus.clone();
            async move { menus.slug_exists(&candidate).await.map(|exists| !exists) }
        })
        .await
        .map_err(|err| match err {
            SlugAsyncError::Slug(slug) => ServiceError::from(slug),
            SlugAsyncError::Predicate(repo) => ServiceError::from(repo),
        })
    }
}

fn ensure_branding_allowed(policy: &PlanPolicy, styling: &StylingInput) -> Result<(), DomainError> {
    let customizes = styling.primary_color.is_some()
        || styling.accent_color.is_some()
        || styling.font_family.is_some();
    if customizes {
        policy.ensure_feature(PlanFeature::CustomBranding)?;
    }
    Ok(())
}

fn merge_styling(mut base: MenuStyling, input: StylingInput) -> MenuStyling {
    if let Some(theme) = input.theme {
        base.theme = theme;
    }
    if base.theme.is_empty() {
        base.theme = DEFAULT_THEME.to_string();
    }
    if input.primary_color.is_some() {
        base.primary_color = input.primary_color;
    }
    if input.accent_color.is_some() {
        base.accent_color = input.accent_color;
    }
    if input.font_family.is_some() {
        base.font_family = input.font_family;
    }
    if input.logo_url.is_some() {
        base.logo_url = input.logo_url;
    }
    if input.cover_url.is_some() {
        base.cover_url = input.cover_url;
    }
    base
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn slug_conflict(err: RepoError) -> ServiceError {
    match err {
        RepoError::Duplicate { constraint } if constraint == MENUS_SLUG_CONSTRAINT => {
            ServiceError::Conflict(Conflict::SlugExists)
        }
        other => ServiceError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_unset_fields() {
        let base = MenuStyling {
            theme: "dark".into(),
            primary_color: Some("#112233".into()),
            ..MenuStyling::default()
        };
        let merged = merge_styling(
            base,
            StylingInput {
                cover_url: Some("https://img.example/cover.jpg".into()),
                ..StylingInput::default()
            },
        );
        assert_eq!(merged.theme, "dark");
        assert_eq!(merged.primary_color.as_deref(), Some("#112233"));
        assert_eq!(
            merged.cover_url.as_deref(),
            Some("https://img.example/cover.jpg")
        );
    }

    #[test]
    fn empty_theme_falls_back_to_default() {
        let merged = merge_styling(MenuStyling::default(), StylingInput::default());
        assert_eq!(merged.theme, DEFAULT_THEME);
    }

    #[test]
    fn custom_colors_need_branding_feature() {
        let styling = StylingInput {
            primary_color: Some("#ff0000".into()),
            ..StylingInput::default()
        };
        let free = crate::domain::plans::policy(crate::domain::types::SubscriptionPlan::Free);
        let starter =
            crate::domain::plans::policy(crate::domain::types::SubscriptionPlan::Starter);
        assert!(ensure_branding_allowed(free, &styling).is_err());
        assert!(ensure_branding_allowed(starter, &styling).is_ok());
        assert!(ensure_branding_allowed(free, &StylingInput::default()).is_ok());
    }
}
