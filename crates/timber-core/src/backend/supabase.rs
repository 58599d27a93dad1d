//! ============================================================================
//! Supabase Backend - PostgREST tables and GoTrue auth over HTTP
//! ============================================================================
//! Every request carries the anon key as `apikey` and a bearer token: the
//! session access token when one is established, the anon key otherwise.
//! ============================================================================

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::wire::{messages_from_rows, MessageRow, NewListingRow, NewMessageRow, RemoteUser};
use super::Backend;
use crate::config::Credentials;
use crate::types::{TimberError, UserRole};

const LISTING_SELECT: &str = "*,landowner:profiles!landowner_id(*)";
const MESSAGE_SELECT: &str = "*,sender:profiles!sender_id(full_name,avatar_url),receiver:profiles!receiver_id(full_name,avatar_url),listing:listings(title)";

/// Error bodies come in several shapes depending on the service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

/// HTTP client for a Supabase project
pub struct SupabaseBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl SupabaseBackend {
    pub fn new(
        credentials: &Credentials,
        access_token: Option<String>,
    ) -> Result<Self, TimberError> {
        let client = Client::builder()
            .user_agent("timber-marketplace/1.0")
            .build()
            .map_err(|e| TimberError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: credentials.url.trim_end_matches('/').to_string(),
            anon_key: credentials.anon_key.clone(),
            access_token: access_token.filter(|t| !t.is_empty()),
        })
    }

    /// Get the project base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, TimberError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| TimberError::Network(format!("Failed to {}: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or(body);
        Err(TimberError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, TimberError> {
        response.json::<T>().await.map_err(|e| TimberError::Backend {
            status: 200,
            message: format!("Failed to parse {} response: {}", what, e),
        })
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    async fn select_listings(&self) -> Result<Vec<Value>, TimberError> {
        let request = self.client.get(self.rest_url("listings")).query(&[
            ("select", LISTING_SELECT),
            ("order", "created_at.desc"),
        ]);
        let response = self.send(request, "fetch listings").await?;
        let rows: Vec<Value> = Self::parse(response, "listings").await?;
        debug!("Fetched {} listing rows", rows.len());
        Ok(rows)
    }

    async fn insert_listing(&self, row: &NewListingRow) -> Result<Vec<Value>, TimberError> {
        info!("Inserting listing '{}' for {}", row.title, row.landowner_id);
        let request = self
            .client
            .post(self.rest_url("listings"))
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = self.send(request, "insert listing").await?;
        Self::parse(response, "insert listing").await
    }

    async fn select_messages(&self, user_id: &str) -> Result<Vec<MessageRow>, TimberError> {
        let participant = format!("(sender_id.eq.{0},receiver_id.eq.{0})", user_id);
        let request = self.client.get(self.rest_url("messages")).query(&[
            ("select", MESSAGE_SELECT),
            ("or", participant.as_str()),
            ("order", "created_at.asc"),
        ]);
        let response = self.send(request, "fetch messages").await?;
        let rows: Vec<Value> = Self::parse(response, "messages").await?;
        let rows = messages_from_rows(rows);
        debug!("Fetched {} messages for {}", rows.len(), user_id);
        Ok(rows)
    }

    async fn insert_message(&self, row: &NewMessageRow) -> Result<(), TimberError> {
        let request = self
            .client
            .post(self.rest_url("messages"))
            .header("Prefer", "return=minimal")
            .json(&[row]);
        self.send(request, "send message").await?;
        debug!("Sent message on listing {}", row.listing_id);
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<RemoteUser>, TimberError> {
        if self.access_token.is_none() {
            return Ok(None);
        }
        let request = self.client.get(self.auth_url("user"));
        match self.send(request, "fetch session user").await {
            Ok(response) => Ok(Some(Self::parse(response, "session user").await?)),
            Err(TimberError::Backend { status: 401, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_role(&self, user_id: &str, role: UserRole) -> Result<(), TimberError> {
        let metadata = self
            .client
            .put(self.auth_url("user"))
            .json(&json!({ "data": { "role": role.as_str(), "is_onboarded": true } }));
        self.send(metadata, "update user metadata").await?;

        let id_filter = format!("eq.{}", user_id);
        let profile = self
            .client
            .patch(self.rest_url("profiles"))
            .query(&[("id", id_filter.as_str())])
            .json(&json!({ "role": role.as_str() }));
        self.send(profile, "update profile role").await?;

        info!("Stored role {} for {}", role, user_id);
        Ok(())
    }

    async fn send_magic_link(&self, email: &str) -> Result<(), TimberError> {
        let request = self
            .client
            .post(self.auth_url("otp"))
            .json(&json!({ "email": email, "create_user": true }));
        self.send(request, "send magic link").await?;
        info!("Magic link sent to {}", email);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), TimberError> {
        if self.access_token.is_none() {
            return Ok(());
        }
        let request = self.client.post(self.auth_url("logout"));
        self.send(request, "sign out").await?;
        Ok(())
    }

    fn oauth_authorize_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, TimberError> {
        let mut params = vec![("provider", provider)];
        if let Some(redirect_to) = redirect_to {
            params.push(("redirect_to", redirect_to));
        }
        let url = Url::parse_with_params(&self.auth_url("authorize"), &params)
            .map_err(|e| TimberError::InvalidInput(format!("Invalid authorize URL: {}", e)))?;
        Ok(url.to_string())
    }

    fn source_name(&self) -> &'static str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(token: Option<&str>) -> SupabaseBackend {
        let credentials = Credentials {
            url: "https://abc.supabase.co/".into(),
            anon_key: "anon".into(),
        };
        SupabaseBackend::new(&credentials, token.map(str::to_string)).unwrap()
    }

    #[test]
    fn test_urls() {
        let backend = backend(None);
        assert_eq!(backend.base_url(), "https://abc.supabase.co");
        assert_eq!(
            backend.rest_url("listings"),
            "https://abc.supabase.co/rest/v1/listings"
        );
        assert_eq!(backend.auth_url("otp"), "https://abc.supabase.co/auth/v1/otp");
    }

    #[test]
    fn test_oauth_authorize_url() {
        let backend = backend(None);
        assert_eq!(
            backend.oauth_authorize_url("google", None).unwrap(),
            "https://abc.supabase.co/auth/v1/authorize?provider=google"
        );
        assert_eq!(
            backend
                .oauth_authorize_url("google", Some("http://localhost:3000/"))
                .unwrap(),
            "https://abc.supabase.co/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A3000%2F"
        );
    }

    #[test]
    fn test_error_body_shapes() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"msg":"Email rate limit exceeded"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Email rate limit exceeded"));

        let body: ErrorBody = serde_json::from_str(r#"{"message":"relation missing"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("relation missing"));
    }

    #[tokio::test]
    async fn test_no_session_without_token() {
        let backend = backend(Some(""));
        assert!(backend.current_user().await.unwrap().is_none());
        assert!(backend.sign_out().await.is_ok());
    }
}
