//! HTTPS backend client
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic. Callers that
//! need to stay responsive run these calls on a background thread.

use log::{debug, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body, RequestBuilder};

use super::{
    Backend, Bearer, CacheInfo, GenerateRequest, GenerateResponse, UpdatedEmails,
};
use crate::config::{ApiBaseUrl, ClientConfig};
use crate::error::{ClientError, Result};
use crate::models::{
    EmailId, EmailRecord, EmailStatus, Friend, FriendId, FriendRequest, ProfilePatch,
    ProfileUpdate, RequestDecision, Stage, Template, TemplateDraft, TemplateId,
    TemplatesByCategory, UserProfile,
};

/// Response of the settings endpoint
#[derive(Deserialize)]
struct SettingsResponse {
    #[serde(default)]
    user: Option<ProfilePatch>,
}

/// Response of the Gmail auth start endpoint
#[derive(Deserialize)]
struct AuthUrlResponse {
    auth_url: String,
}

/// Backend reached over HTTPS
pub struct HttpBackend {
    base: ApiBaseUrl,
    agent: Agent,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a client for a validated configuration
    pub fn new(config: &ClientConfig) -> Self {
        let agent_config = Agent::config_builder()
            .timeout_global(Some(config.request_timeout))
            .http_status_as_error(false)
            .https_only(true)
            .build();

        Self {
            base: config.api_url.clone(),
            agent: Agent::new_with_config(agent_config),
            timeout: config.request_timeout,
        }
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &ApiBaseUrl {
        &self.base
    }

    fn get(&self, path: &str, bearer: Option<&Bearer>) -> Result<Response<Body>> {
        let url = self.base.join(path);
        debug!("GET {}", url);
        let result = authorize(self.agent.get(&url), bearer).call();
        self.check("GET", &url, result)
    }

    fn delete(&self, path: &str, bearer: &Bearer) -> Result<Response<Body>> {
        let url = self.base.join(path);
        debug!("DELETE {}", url);
        let result = authorize(self.agent.delete(&url), Some(bearer)).call();
        self.check("DELETE", &url, result)
    }

    fn post_json(
        &self,
        path: &str,
        bearer: Option<&Bearer>,
        body: &serde_json::Value,
    ) -> Result<Response<Body>> {
        let url = self.base.join(path);
        debug!("POST {}", url);
        let result = authorize(self.agent.post(&url), bearer).send_json(body);
        self.check("POST", &url, result)
    }

    fn post_empty(&self, path: &str, bearer: &Bearer) -> Result<Response<Body>> {
        let url = self.base.join(path);
        debug!("POST {}", url);
        let result = authorize(self.agent.post(&url), Some(bearer)).send_empty();
        self.check("POST", &url, result)
    }

    fn put_json(
        &self,
        path: &str,
        bearer: &Bearer,
        body: &serde_json::Value,
    ) -> Result<Response<Body>> {
        let url = self.base.join(path);
        debug!("PUT {}", url);
        let result = authorize(self.agent.put(&url), Some(bearer)).send_json(body);
        self.check("PUT", &url, result)
    }

    fn put_empty(&self, path: &str, bearer: &Bearer) -> Result<Response<Body>> {
        let url = self.base.join(path);
        debug!("PUT {}", url);
        let result = authorize(self.agent.put(&url), Some(bearer)).send_empty();
        self.check("PUT", &url, result)
    }

    /// Map transport errors and non-success statuses into [`ClientError`]
    fn check(
        &self,
        method: &str,
        url: &str,
        result: std::result::Result<Response<Body>, ureq::Error>,
    ) -> Result<Response<Body>> {
        let mut response = match result {
            Ok(response) => response,
            Err(ureq::Error::Timeout(_)) => {
                warn!("{} {} timed out after {:?}", method, url, self.timeout);
                return Err(ClientError::Timeout(self.timeout));
            }
            Err(e) => {
                warn!("{} {} failed: {}", method, url, e);
                return Err(ClientError::Transport(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(response);
        }

        let body = response.body_mut().read_to_string().unwrap_or_default();
        let detail = extract_detail(&body);
        warn!(
            "{} {} rejected with status {}: {}",
            method,
            url,
            status,
            detail.as_deref().unwrap_or("<no detail>")
        );
        Err(ClientError::Rejected { status, detail })
    }
}

fn authorize<B>(request: RequestBuilder<B>, bearer: Option<&Bearer>) -> RequestBuilder<B> {
    match bearer {
        Some(bearer) => request.header("Authorization", &bearer.header_value()),
        None => request,
    }
}

fn read_json<T: DeserializeOwned>(mut response: Response<Body>) -> Result<T> {
    response.body_mut().read_json::<T>().map_err(|e| {
        warn!("Failed to parse response: {}", e);
        ClientError::Decode(e.to_string())
    })
}

/// Pull a human-readable message out of an error body.
///
/// Handles `{"detail": "..."}`, validation lists of the form
/// `{"detail": [{"msg": "..."}]}`, and `{"message": "..."}`.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = match value.get("detail") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    };
    detail
        .or_else(|| value.get("message").and_then(|m| m.as_str()).map(String::from))
        .filter(|d| !d.trim().is_empty())
}

impl Backend for HttpBackend {
    fn request_code(&self, email: &str) -> Result<()> {
        self.post_json("/auth/request-code", None, &json!({ "email": email }))?;
        Ok(())
    }

    fn verify_code(&self, email: &str, code: &str) -> Result<UserProfile> {
        let response =
            self.post_json("/auth/verify-code", None, &json!({ "email": email, "code": code }))?;
        read_json(response)
    }

    fn fetch_profile(&self, bearer: &Bearer) -> Result<UserProfile> {
        read_json(self.get("/api/users/me", Some(bearer))?)
    }

    fn update_settings(&self, bearer: &Bearer, update: &ProfileUpdate) -> Result<ProfilePatch> {
        let body = serde_json::to_value(update).map_err(|e| ClientError::Decode(e.to_string()))?;
        let response: SettingsResponse =
            read_json(self.put_json("/api/users/settings", bearer, &body)?)?;
        Ok(response.user.unwrap_or_default())
    }

    fn update_intervals(
        &self,
        bearer: &Bearer,
        followup_days: u32,
        lastchance_days: u32,
    ) -> Result<()> {
        self.post_json(
            "/api/settings/update_intervals",
            Some(bearer),
            &json!({ "followup_days": followup_days, "lastchance_days": lastchance_days }),
        )?;
        Ok(())
    }

    fn emails_by_stage(&self, bearer: &Bearer, stage: Stage) -> Result<Vec<EmailRecord>> {
        let path = format!("/api/emails/by-stage/{}", stage.as_str());
        read_json(self.get(&path, Some(bearer))?)
    }

    fn update_email_status(
        &self,
        bearer: &Bearer,
        id: EmailId,
        status: &EmailStatus,
    ) -> Result<()> {
        let path = format!("/api/emails/{}/status", id);
        self.put_json(&path, bearer, &json!({ "status": status.as_str() }))?;
        Ok(())
    }

    fn delete_email(&self, bearer: &Bearer, id: EmailId) -> Result<()> {
        self.delete(&format!("/api/emails/{}", id), bearer)?;
        Ok(())
    }

    fn generate_emails(
        &self,
        bearer: &Bearer,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let url = self.base.join("/api/emails/generate");
        let form = request.to_form();
        let body = form.to_body();
        debug!("POST {} ({} bytes multipart)", url, body.len());

        let result = authorize(self.agent.post(&url), Some(bearer))
            .header("Content-Type", &form.content_type())
            .send(&body[..]);
        read_json(self.check("POST", &url, result)?)
    }

    fn send_via_gmail(&self, bearer: &Bearer, id: EmailId) -> Result<()> {
        let path = format!("/api/emails/send_via_gmail?email_id={}", id);
        self.post_empty(&path, bearer)?;
        Ok(())
    }

    fn gmail_auth_url(&self, bearer: &Bearer) -> Result<String> {
        let path = format!(
            "/api/gmail/auth/start?email={}",
            urlencoding::encode(bearer.email())
        );
        let response: AuthUrlResponse = read_json(self.get(&path, Some(bearer))?)?;
        Ok(response.auth_url)
    }

    fn cache_info(&self, bearer: &Bearer) -> Result<CacheInfo> {
        read_json(self.get("/api/emails/cache", Some(bearer))?)
    }

    fn clear_cache(&self, bearer: &Bearer) -> Result<()> {
        self.delete("/api/emails/cache", bearer)?;
        Ok(())
    }

    fn templates(&self, bearer: &Bearer, category: Stage) -> Result<Vec<Template>> {
        let path = format!("/api/templates/?category={}", category.as_str());
        read_json(self.get(&path, Some(bearer))?)
    }

    fn templates_by_category(&self, bearer: &Bearer) -> Result<TemplatesByCategory> {
        read_json(self.get("/api/templates/by-category/", Some(bearer))?)
    }

    fn default_template(&self, bearer: &Bearer, category: Stage) -> Result<Option<Template>> {
        let path = format!("/api/templates/default/{}/", category.as_str());
        read_json(self.get(&path, Some(bearer))?)
    }

    fn create_template(&self, bearer: &Bearer, draft: &TemplateDraft) -> Result<Template> {
        let body = serde_json::to_value(draft).map_err(|e| ClientError::Decode(e.to_string()))?;
        read_json(self.post_json("/api/templates/", Some(bearer), &body)?)
    }

    fn update_template(
        &self,
        bearer: &Bearer,
        id: TemplateId,
        draft: &TemplateDraft,
    ) -> Result<Template> {
        let body = serde_json::to_value(draft).map_err(|e| ClientError::Decode(e.to_string()))?;
        read_json(self.put_json(&format!("/api/templates/{}/", id), bearer, &body)?)
    }

    fn set_default_template(&self, bearer: &Bearer, id: TemplateId) -> Result<Template> {
        read_json(self.put_empty(&format!("/api/templates/{}/set-default/", id), bearer)?)
    }

    fn delete_template(&self, bearer: &Bearer, id: TemplateId) -> Result<()> {
        self.delete(&format!("/api/templates/{}/", id), bearer)?;
        Ok(())
    }

    fn friends(&self, bearer: &Bearer) -> Result<Vec<Friend>> {
        read_json(self.get("/api/friends/list", Some(bearer))?)
    }

    fn friend_requests(&self, bearer: &Bearer) -> Result<Vec<FriendRequest>> {
        read_json(self.get("/api/friends/requests", Some(bearer))?)
    }

    fn send_friend_request(&self, bearer: &Bearer, email: &str) -> Result<()> {
        self.post_json("/api/friends/request", Some(bearer), &json!({ "email": email }))?;
        Ok(())
    }

    fn respond_to_friend_request(
        &self,
        bearer: &Bearer,
        request_id: FriendId,
        decision: RequestDecision,
    ) -> Result<()> {
        self.post_json(
            &format!("/api/friends/respond/{}", request_id),
            Some(bearer),
            &json!({ "status": decision.as_str() }),
        )?;
        Ok(())
    }

    fn set_sharing(
        &self,
        bearer: &Bearer,
        friend_id: FriendId,
        enabled: bool,
    ) -> Result<Vec<EmailRecord>> {
        let response: UpdatedEmails = read_json(self.post_json(
            &format!("/api/friends/share/{}", friend_id),
            Some(bearer),
            &json!({ "share_enabled": enabled }),
        )?)?;
        Ok(response.updated_emails)
    }

    fn remove_friend(&self, bearer: &Bearer, friend_id: FriendId) -> Result<Vec<EmailRecord>> {
        let response: UpdatedEmails =
            read_json(self.delete(&format!("/api/friends/{}", friend_id), bearer)?)?;
        Ok(response.updated_emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail": "Email not found"}"#).as_deref(),
            Some("Email not found")
        );
    }

    #[test]
    fn test_extract_detail_validation_list() {
        let body = r#"{"detail": [{"loc": ["body", "email"], "msg": "value is not a valid email address"}]}"#;
        assert_eq!(
            extract_detail(body).as_deref(),
            Some("value is not a valid email address")
        );
    }

    #[test]
    fn test_extract_detail_message_and_garbage() {
        assert_eq!(
            extract_detail(r#"{"message": "nope"}"#).as_deref(),
            Some("nope")
        );
        assert!(extract_detail("<html>502 Bad Gateway</html>").is_none());
        assert!(extract_detail(r#"{"detail": ""}"#).is_none());
    }

    #[test]
    fn test_client_uses_validated_base() {
        let config = ClientConfig::new("https://api.example.com/").unwrap();
        let backend = HttpBackend::new(&config);
        assert_eq!(backend.base_url().join("/api/users/me"), "https://api.example.com/api/users/me");
    }
}
