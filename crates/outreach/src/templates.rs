//! Email templates
//!
//! Templates are grouped by stage, with at most three per stage and one
//! default that generation picks unless told otherwise.

use log::{debug, info, warn};
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};

use crate::backend::{Backend, Bearer};
use crate::banner::Banner;
use crate::confirm::{Confirm, Outcome};
use crate::error::{Result, ValidationError};
use crate::models::{Stage, Template, TemplateDraft, TemplateId, TemplatesByCategory};

/// Templates the backend accepts per stage
pub const MAX_TEMPLATES_PER_CATEGORY: usize = 3;

const DELETE_PROMPT: &str = "Are you sure you want to delete this template?";

/// Placeholders and the sample values shown in previews
pub const PREVIEW_VALUES: [(&str, &str); 5] = [
    ("recipient name", "John Smith"),
    ("company name", "Acme Corporation"),
    ("your name", "Jane Doe"),
    ("your position", "Sales Manager"),
    ("your company", "Tech Solutions Inc."),
];

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(recipient name|company name|your name|your position|your company)\]")
        .expect("placeholder pattern is valid")
});

/// Fill placeholders (matched case-insensitively) with sample values
pub fn render_preview(content: &str) -> String {
    PLACEHOLDER
        .replace_all(content, |caps: &Captures| {
            let key = caps[1].to_ascii_lowercase();
            PREVIEW_VALUES
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Templates of one stage and the one selected for generation
#[derive(Debug, Clone, PartialEq)]
pub struct StageTemplates {
    pub templates: Vec<Template>,
    /// The stage default, or the first template when none is marked
    pub selected: Option<TemplateId>,
}

/// Local copy of the user's templates plus the editing operations
pub struct TemplateManager {
    backend: Arc<dyn Backend>,
    bearer: Bearer,
    templates: TemplatesByCategory,
    banner: Banner,
}

impl TemplateManager {
    pub fn new(backend: Arc<dyn Backend>, bearer: Bearer) -> Self {
        Self {
            backend,
            bearer,
            templates: TemplatesByCategory::default(),
            banner: Banner::new(),
        }
    }

    pub fn templates(&self) -> &TemplatesByCategory {
        &self.templates
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    /// Fetch all templates grouped by stage
    pub fn load(&mut self) -> Result<()> {
        match self.backend.templates_by_category(&self.bearer) {
            Ok(templates) => {
                self.templates = templates;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load templates: {}", e);
                self.banner.error(e.user_message("Failed to load templates."));
                Err(e)
            }
        }
    }

    /// Fetch one stage's templates and pick the generation default
    pub fn for_stage(&mut self, stage: Stage) -> Result<StageTemplates> {
        let templates = self.backend.templates(&self.bearer, stage).map_err(|e| {
            warn!("Failed to load {} templates: {}", stage, e);
            self.banner.error(e.user_message("Failed to load templates."));
            e
        })?;

        let selected = templates
            .iter()
            .find(|t| t.is_default)
            .or_else(|| templates.first())
            .map(|t| t.id);
        *self.templates.get_mut(stage) = templates.clone();
        Ok(StageTemplates {
            templates,
            selected,
        })
    }

    fn validate(&self, draft: &TemplateDraft, replacing: Option<TemplateId>) -> Result<()> {
        if draft.name.trim().is_empty() || draft.content.trim().is_empty() {
            return Err(ValidationError::TemplateIncomplete.into());
        }
        let others = self
            .templates
            .get(draft.category)
            .iter()
            .filter(|t| Some(t.id) != replacing)
            .count();
        if others >= MAX_TEMPLATES_PER_CATEGORY {
            return Err(ValidationError::TemplateLimitReached {
                category: draft.category,
                limit: MAX_TEMPLATES_PER_CATEGORY,
            }
            .into());
        }
        Ok(())
    }

    fn store(&mut self, template: Template) {
        for stage in Stage::ALL {
            self.templates.get_mut(stage).retain(|t| t.id != template.id);
        }
        if template.is_default {
            self.clear_defaults(template.category);
        }
        self.templates.get_mut(template.category).push(template);
    }

    fn clear_defaults(&mut self, stage: Stage) {
        for template in self.templates.get_mut(stage) {
            template.is_default = false;
        }
    }

    /// Create a template
    pub fn create(&mut self, draft: &TemplateDraft) -> Result<Template> {
        if let Err(e) = self.validate(draft, None) {
            self.banner.error(e.to_string());
            return Err(e);
        }

        let template = self.backend.create_template(&self.bearer, draft).map_err(|e| {
            warn!("Failed to create template: {}", e);
            self.banner.error(e.user_message("Failed to save template."));
            e
        })?;

        info!("Created template {} in {}", template.id, template.category);
        self.store(template.clone());
        self.banner.success("Template created");
        Ok(template)
    }

    /// Replace a template's name, content, stage and default flag
    pub fn update(&mut self, id: TemplateId, draft: &TemplateDraft) -> Result<Template> {
        if let Err(e) = self.validate(draft, Some(id)) {
            self.banner.error(e.to_string());
            return Err(e);
        }

        let template = self
            .backend
            .update_template(&self.bearer, id, draft)
            .map_err(|e| {
                warn!("Failed to update template {}: {}", id, e);
                self.banner.error(e.user_message("Failed to save template."));
                e
            })?;

        info!("Updated template {}", id);
        self.store(template.clone());
        self.banner.success("Template updated");
        Ok(template)
    }

    /// Delete a template after confirmation
    pub fn delete(&mut self, id: TemplateId, confirm: &dyn Confirm) -> Result<Outcome> {
        if !confirm.confirm(DELETE_PROMPT) {
            debug!("Delete of template {} cancelled", id);
            return Ok(Outcome::Cancelled);
        }

        self.backend.delete_template(&self.bearer, id).map_err(|e| {
            warn!("Failed to delete template {}: {}", id, e);
            self.banner.error(e.user_message("Failed to delete template."));
            e
        })?;

        for stage in Stage::ALL {
            self.templates.get_mut(stage).retain(|t| t.id != id);
        }
        info!("Deleted template {}", id);
        self.banner.success("Template deleted");
        Ok(Outcome::Done)
    }

    /// Make a template its stage's default; siblings lose the flag
    pub fn set_default(&mut self, id: TemplateId) -> Result<Template> {
        let template = self
            .backend
            .set_default_template(&self.bearer, id)
            .map_err(|e| {
                warn!("Failed to set default template {}: {}", id, e);
                self.banner.error(e.user_message("Failed to set default template."));
                e
            })?;

        for candidate in self.templates.get_mut(template.category) {
            candidate.is_default = candidate.id == id;
        }
        info!("Template {} is now the {} default", id, template.category);
        self.banner.success("Default template set");
        Ok(template)
    }
}
