//! Plain-text export and `mailto:` links

use crate::error::{Result, ValidationError};
use crate::models::{EmailRecord, Stage};

/// Longest `mailto:` link handed to a mail client
pub const MAX_MAILTO_LENGTH: usize = 10_000;

const SEPARATOR: &str = "-----------------------------------";

/// Render a stage's emails as `TO:`/`SUBJECT:`/`BODY:` blocks
pub fn export_stage(stage: Stage, records: &[&EmailRecord]) -> Result<String> {
    if records.is_empty() {
        return Err(ValidationError::NothingToExport(stage).into());
    }

    let mut content = String::new();
    for record in records {
        content.push_str(&format!("TO: {}\n", record.to));
        content.push_str(&format!("SUBJECT: {}\n", record.subject));
        content.push_str(&format!("BODY:\n{}\n\n", record.body));
        content.push_str(SEPARATOR);
        content.push_str("\n\n");
    }
    Ok(content)
}

/// Suggested file name for an export
pub fn export_file_name(stage: Stage) -> String {
    format!("{}-emails.txt", stage.as_str())
}

/// `mailto:` link with the subject and body percent-encoded
pub fn mailto_link(record: &EmailRecord) -> Result<String> {
    let link = format!(
        "mailto:{}?subject={}&body={}",
        record.to.trim(),
        urlencoding::encode(&record.subject),
        urlencoding::encode(&record.body)
    );
    if link.len() > MAX_MAILTO_LENGTH {
        return Err(ValidationError::MailtoTooLong(link.len()).into());
    }
    Ok(link)
}
