//! Email template model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Stage, timestamp};

/// Backend identifier of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub i64);

impl TemplateId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored email template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub content: String,
    /// Stage this template generates emails for
    pub category: Stage,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields sent when creating or updating a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub name: String,
    pub content: String,
    pub category: Stage,
    pub is_default: bool,
}

impl TemplateDraft {
    pub fn new(name: impl Into<String>, content: impl Into<String>, category: Stage) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            category,
            is_default: false,
        }
    }
}

/// Templates grouped by stage, as returned by the by-category endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatesByCategory {
    #[serde(default)]
    pub outreach: Vec<Template>,
    #[serde(default)]
    pub followup: Vec<Template>,
    #[serde(default)]
    pub lastchance: Vec<Template>,
}

impl TemplatesByCategory {
    pub fn get(&self, stage: Stage) -> &[Template] {
        match stage {
            Stage::Outreach => &self.outreach,
            Stage::Followup => &self.followup,
            Stage::Lastchance => &self.lastchance,
        }
    }

    pub fn get_mut(&mut self, stage: Stage) -> &mut Vec<Template> {
        match stage {
            Stage::Outreach => &mut self.outreach,
            Stage::Followup => &mut self.followup,
            Stage::Lastchance => &mut self.lastchance,
        }
    }

    /// Find a template by id in any category
    pub fn find(&self, id: TemplateId) -> Option<&Template> {
        Stage::ALL
            .iter()
            .flat_map(|stage| self.get(*stage))
            .find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_templates_deserialize() {
        let json = r#"{
            "outreach": [{"id": 1, "name": "Intro", "content": "Hi [Recipient Name]",
                          "category": "outreach", "is_default": true,
                          "created_at": "2026-01-02T03:04:05"}],
            "followup": []
        }"#;
        let grouped: TemplatesByCategory = serde_json::from_str(json).unwrap();
        assert_eq!(grouped.get(Stage::Outreach).len(), 1);
        assert!(grouped.get(Stage::Lastchance).is_empty());
        assert_eq!(grouped.find(TemplateId(1)).unwrap().name, "Intro");
        assert!(grouped.find(TemplateId(2)).is_none());
    }
}
