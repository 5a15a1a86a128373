//! Profile form, follow-up intervals and the generation cache

use log::{info, warn};
use std::sync::Arc;

use crate::backend::{Backend, Bearer, CacheInfo};
use crate::banner::Banner;
use crate::error::{Result, ValidationError};
use crate::models::{ProfileUpdate, UserProfile};

/// Shortest allowed follow-up delay, in days
pub const MIN_INTERVAL_DAYS: u32 = 1;
/// Longest allowed follow-up delay, in days
pub const MAX_INTERVAL_DAYS: u32 = 30;

/// Check both delays are within 1..=30 days
pub fn validate_intervals(followup_days: u32, lastchance_days: u32) -> Result<(), ValidationError> {
    for (field, value) in [
        ("Follow-up interval", followup_days),
        ("Last-chance interval", lastchance_days),
    ] {
        if !(MIN_INTERVAL_DAYS..=MAX_INTERVAL_DAYS).contains(&value) {
            return Err(ValidationError::IntervalOutOfRange {
                field,
                value,
                min: MIN_INTERVAL_DAYS,
                max: MAX_INTERVAL_DAYS,
            });
        }
    }
    Ok(())
}

/// Editable profile fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileForm {
    pub full_name: String,
    pub position: String,
    pub company_name: String,
    pub company_description: String,
}

impl ProfileForm {
    /// Form pre-filled from a profile
    pub fn from_profile(profile: &UserProfile) -> Self {
        let value = |field: &Option<String>| field.clone().unwrap_or_default();
        Self {
            full_name: value(&profile.full_name),
            position: value(&profile.position),
            company_name: value(&profile.company_name),
            company_description: value(&profile.company_description),
        }
    }

    /// Only the fields that differ from `profile`
    pub fn diff(&self, profile: &UserProfile) -> ProfileUpdate {
        fn changed(new: &str, current: &Option<String>) -> Option<String> {
            let new = new.trim();
            (new != current.as_deref().unwrap_or_default().trim()).then(|| new.to_string())
        }

        ProfileUpdate {
            full_name: changed(&self.full_name, &profile.full_name),
            position: changed(&self.position, &profile.position),
            company_name: changed(&self.company_name, &profile.company_name),
            company_description: changed(&self.company_description, &profile.company_description),
        }
    }
}

/// Generation cache controls
pub struct SettingsPanel {
    backend: Arc<dyn Backend>,
    bearer: Bearer,
    cache: Option<CacheInfo>,
    banner: Banner,
}

impl SettingsPanel {
    pub fn new(backend: Arc<dyn Backend>, bearer: Bearer) -> Self {
        Self {
            backend,
            bearer,
            cache: None,
            banner: Banner::new(),
        }
    }

    pub fn cache(&self) -> Option<&CacheInfo> {
        self.cache.as_ref()
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    /// Fetch the cache state
    pub fn load_cache_info(&mut self) -> Result<&CacheInfo> {
        match self.backend.cache_info(&self.bearer) {
            Ok(info) => Ok(&*self.cache.insert(info)),
            Err(e) => {
                warn!("Failed to load cache info: {}", e);
                self.banner
                    .error(e.user_message("Failed to load cache information. Please try again."));
                Err(e)
            }
        }
    }

    /// Empty the cache, then reload its state
    pub fn clear_cache(&mut self) -> Result<()> {
        if let Err(e) = self.backend.clear_cache(&self.bearer) {
            warn!("Failed to clear cache: {}", e);
            self.banner
                .error(e.user_message("Failed to clear the cache. Please try again."));
            return Err(e);
        }
        info!("Generation cache cleared");
        self.banner.success("Cache cleared");
        self.load_cache_info()?;
        Ok(())
    }
}
