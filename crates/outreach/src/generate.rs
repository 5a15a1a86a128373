//! Email generation from an uploaded contact list

use anyhow::Context;
use log::{info, warn};
use std::path::Path;

use crate::backend::{GenerateRequest, GenerateResponse, GenerationMethod, SenderDetails};
use crate::error::{Result, ValidationError};
use crate::models::{Stage, TemplateId, UserProfile};
use crate::stages::StageBoard;

/// A CSV contact list to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl ContactFile {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// Read a contact list from disk
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read contact file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "contacts.csv".to_string());
        Ok(Self::new(file_name, data))
    }

    fn is_blank(&self) -> bool {
        self.data.iter().all(u8::is_ascii_whitespace)
    }
}

/// What to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    pub stage: Stage,
    pub use_ai: bool,
    /// Required unless `use_ai` is set
    pub template: Option<TemplateId>,
    /// Skip contacts that already have an email in this stage
    pub avoid_duplicates: bool,
}

impl GenerateOptions {
    pub fn ai(stage: Stage) -> Self {
        Self {
            stage,
            use_ai: true,
            template: None,
            avoid_duplicates: false,
        }
    }

    pub fn template(stage: Stage, template: Option<TemplateId>) -> Self {
        Self {
            stage,
            use_ai: false,
            template,
            avoid_duplicates: false,
        }
    }

    pub fn avoid_duplicates(mut self, avoid: bool) -> Self {
        self.avoid_duplicates = avoid;
        self
    }
}

/// Validate the inputs and assemble the upload
pub fn build_request(
    file: Option<&ContactFile>,
    options: &GenerateOptions,
    profile: &UserProfile,
) -> Result<GenerateRequest> {
    let file = file
        .filter(|f| !f.is_blank())
        .ok_or(ValidationError::MissingContactFile)?;

    let method = if options.use_ai {
        GenerationMethod::Ai
    } else {
        GenerationMethod::Template(options.template.ok_or(ValidationError::MissingTemplate)?)
    };

    Ok(GenerateRequest {
        file_name: file.file_name.clone(),
        csv: file.data.clone(),
        stage: options.stage,
        method,
        avoid_duplicates: options.avoid_duplicates,
        sender: SenderDetails::from_profile(profile),
    })
}

impl StageBoard {
    /// Generate emails, then reload every stage
    pub fn generate(&mut self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let response = self
            .backend
            .generate_emails(&self.bearer, request)
            .map_err(|e| {
                warn!("Email generation failed: {}", e);
                self.banner.error(e.user_message(
                    "Failed to generate emails. Please check your file and try again.",
                ));
                e
            })?;

        info!(
            "Generated {} {} emails",
            response.emails.len(),
            request.stage
        );
        self.banner
            .success(format!("Generated {} emails", response.emails.len()));
        self.refresh_after_change();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, Bearer, Failure, InMemoryBackend};
    use crate::error::ClientError;
    use crate::models::{EmailRecord, TemplateDraft};
    use std::sync::Arc;

    const USER: &str = "a@x.com";
    const CSV: &[u8] = b"name,email\nAda,ada@acme.com\nBob,bob@acme.com\n";

    fn profile() -> UserProfile {
        let mut profile = UserProfile::pending(USER);
        profile.full_name = Some("Jane".to_string());
        profile
    }

    #[test]
    fn test_missing_file_is_local() {
        let options = GenerateOptions::ai(Stage::Outreach);
        let blank = ContactFile::new("empty.csv", b"  \n".to_vec());
        for file in [None, Some(&blank)] {
            assert!(matches!(
                build_request(file, &options, &profile()),
                Err(ClientError::Validation(ValidationError::MissingContactFile))
            ));
        }
    }

    #[test]
    fn test_template_method_needs_template() {
        let file = ContactFile::new("leads.csv", CSV.to_vec());
        let options = GenerateOptions::template(Stage::Followup, None);
        assert!(matches!(
            build_request(Some(&file), &options, &profile()),
            Err(ClientError::Validation(ValidationError::MissingTemplate))
        ));

        let options = GenerateOptions::template(Stage::Followup, Some(TemplateId(4)));
        let request = build_request(Some(&file), &options, &profile()).unwrap();
        assert_eq!(request.method, GenerationMethod::Template(TemplateId(4)));
        assert_eq!(request.sender.your_name.as_deref(), Some("Jane"));
    }

    #[test]
    fn test_read_contact_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        std::fs::write(&path, CSV).unwrap();

        let file = ContactFile::read(&path).unwrap();
        assert_eq!(file.file_name, "leads.csv");
        assert_eq!(file.data, CSV);
        assert!(ContactFile::read(&dir.path().join("missing.csv")).is_err());
    }

    #[test]
    fn test_generate_refreshes_board() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_user(profile());
        let bearer = Bearer::new(USER);
        let mut board = StageBoard::new(backend.clone(), bearer.clone());

        let file = ContactFile::new("leads.csv", CSV.to_vec());
        let request =
            build_request(Some(&file), &GenerateOptions::ai(Stage::Outreach), &profile()).unwrap();
        let response = board.generate(&request).unwrap();

        assert_eq!(response.emails.len(), 2);
        assert_eq!(board.view(Stage::Outreach).len(), 2);
        assert_eq!(backend.call_count("emails_by_stage"), 3);
    }

    #[test]
    fn test_generate_with_template_skips_duplicates() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_user(profile());
        backend.add_email(USER, EmailRecord::new(1, "ada@acme.com", Stage::Followup));
        let bearer = Bearer::new(USER);
        let template = backend
            .create_template(&bearer, &TemplateDraft::new("f", "Following up", Stage::Followup))
            .unwrap();
        let mut board = StageBoard::new(backend.clone(), bearer);

        let file = ContactFile::new("leads.csv", CSV.to_vec());
        let options =
            GenerateOptions::template(Stage::Followup, Some(template.id)).avoid_duplicates(true);
        let request = build_request(Some(&file), &options, &profile()).unwrap();
        let response = board.generate(&request).unwrap();

        assert_eq!(response.emails.len(), 1);
        assert_eq!(response.emails[0].to, "bob@acme.com");
        assert_eq!(response.emails[0].content, "Following up");
    }

    #[test]
    fn test_generate_failure_banner() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_user(profile());
        backend.fail_next(
            "generate_emails",
            Failure::Rejected(400, Some("CSV must contain an email column".to_string())),
        );
        let mut board = StageBoard::new(backend.clone(), Bearer::new(USER));

        let file = ContactFile::new("leads.csv", CSV.to_vec());
        let request =
            build_request(Some(&file), &GenerateOptions::ai(Stage::Outreach), &profile()).unwrap();
        assert!(board.generate(&request).is_err());
        assert_eq!(
            board.banner().current().map(|m| m.text.as_str()),
            Some("CSV must contain an email column")
        );
        assert_eq!(backend.call_count("emails_by_stage"), 0);
    }
}
