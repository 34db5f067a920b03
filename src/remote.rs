// src/remote.rs
//! Client for the hosted backend: a PostgREST-style data API plus a GoTrue-style
//! auth API living under the same project URL.

use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::SessionHub;
use crate::model::{ActivityLog, LogId, NewActivityLog};
use crate::store::{
    AuthClient, OAuthProvider, RecordStore, Session, SessionCallback, SignIn, SignInProof,
    StoreError,
};

const TABLE: &str = "activity_logs";

pub struct RemoteStore {
    http_client: Client,
    base_url: String,
    anon_key: String,
    redirect_to: Option<String>,
    sessions: SessionHub,
}

#[derive(Serialize, Debug)]
struct InsertRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    log: &'a NewActivityLog,
}

#[derive(Serialize, Debug)]
struct OtpRequest<'a> {
    email: &'a str,
    create_user: bool,
}

#[derive(Serialize, Debug)]
struct VerifyRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    email: &'a str,
    token: &'a str,
}

#[derive(Deserialize, Debug)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    user: AuthUser,
}

#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

/// Tokens carried in the fragment of an OAuth / magic-link redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl RemoteStore {
    pub fn new(
        base_url: &str,
        anon_key: &str,
        redirect_to: Option<String>,
        sessions: SessionHub,
    ) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            redirect_to,
            sessions,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, TABLE)
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, endpoint)
    }

    /// Browser URL that starts the provider's consent flow.
    pub fn oauth_authorize_url(&self, provider: OAuthProvider) -> Result<String, StoreError> {
        let mut url = Url::parse(&self.auth_url("authorize"))
            .map_err(|e| StoreError::InvalidSignIn(format!("Bad backend URL: {e}")))?;
        url.query_pairs_mut().append_pair("provider", provider.as_str());
        if let Some(redirect_to) = &self.redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        Ok(url.to_string())
    }

    fn access_token(&self) -> Result<&str, StoreError> {
        self.sessions
            .current()
            .and_then(|session| session.access_token.as_deref())
            .ok_or(StoreError::NotAuthenticated)
    }

    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        Ok(request
            .header("apikey", &self.anon_key)
            .bearer_auth(self.access_token()?))
    }

    fn fetch_user(&self, access_token: &str) -> Result<AuthUser, StoreError> {
        let response = self
            .http_client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()?;
        check_response_json(response)
    }

    fn establish(&mut self, session: Session) -> Result<Session, StoreError> {
        self.sessions.set(Some(session.clone()))?;
        Ok(session)
    }
}

/// Turns a non-success status into `StoreError::Remote`, keeping the server's message.
fn check_response(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = error_message(&body);
    error!("Request failed with status {}: {}", status, message);
    Err(StoreError::Remote {
        status: status.as_u16(),
        message,
    })
}

fn check_response_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let response = check_response(response)?;
    Ok(response.json()?)
}

fn error_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Pulls `access_token` / `refresh_token` out of a redirect URL's fragment.
pub fn parse_redirect_tokens(redirect_url: &str) -> Result<RedirectTokens, StoreError> {
    let url = Url::parse(redirect_url.trim())
        .map_err(|e| StoreError::InvalidSignIn(format!("Not a URL: {e}")))?;
    let fragment = url
        .fragment()
        .ok_or_else(|| StoreError::InvalidSignIn("Redirect URL has no token fragment".to_string()))?;

    // The fragment uses query-string encoding; borrow Url's decoder for it.
    let decoder = Url::parse(&format!("http://localhost/?{fragment}"))
        .map_err(|e| StoreError::InvalidSignIn(e.to_string()))?;

    let mut access_token = None;
    let mut refresh_token = None;
    let mut error_description = None;
    for (key, value) in decoder.query_pairs() {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "refresh_token" => refresh_token = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(description) = error_description {
        return Err(StoreError::InvalidSignIn(description));
    }
    let access_token = access_token
        .ok_or_else(|| StoreError::InvalidSignIn("No access_token in redirect URL".to_string()))?;
    Ok(RedirectTokens {
        access_token,
        refresh_token,
    })
}

impl RecordStore for RemoteStore {
    fn list(&self) -> Result<Vec<ActivityLog>, StoreError> {
        debug!("GET {}", self.table_url());
        let request = self
            .http_client
            .get(self.table_url())
            .query(&[("select", "*"), ("order", "date.desc")]);
        let response = self.authed(request)?.send()?;
        check_response_json(response)
    }

    fn insert(&mut self, log: NewActivityLog) -> Result<LogId, StoreError> {
        let user_id = self
            .sessions
            .current()
            .map(|session| session.user_id.clone())
            .ok_or(StoreError::NotAuthenticated)?;
        let row = InsertRow {
            user_id: &user_id,
            log: &log,
        };
        let request = self
            .http_client
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = self.authed(request)?.send()?;
        let created: Vec<ActivityLog> = check_response_json(response)?;
        let id = created
            .into_iter()
            .next()
            .map(|log| log.id)
            .ok_or_else(|| StoreError::Malformed("Insert returned no rows".to_string()))?;
        info!(id = %id, "Inserted activity log");
        Ok(id)
    }

    fn update(&mut self, id: &LogId, log: NewActivityLog) -> Result<(), StoreError> {
        let request = self
            .http_client
            .patch(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&log);
        let response = self.authed(request)?.send()?;
        let updated: Vec<ActivityLog> = check_response_json(response)?;
        if updated.is_empty() {
            return Err(StoreError::NotFound(id.clone()));
        }
        info!(id = %id, "Updated activity log");
        Ok(())
    }

    fn delete(&mut self, id: &LogId) -> Result<(), StoreError> {
        let request = self
            .http_client
            .delete(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        let response = self.authed(request)?.send()?;
        let deleted: Vec<ActivityLog> = check_response_json(response)?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound(id.clone()));
        }
        info!(id = %id, "Deleted activity log");
        Ok(())
    }
}

impl AuthClient for RemoteStore {
    fn sign_in_with_oauth(&mut self, provider: OAuthProvider) -> Result<SignIn, StoreError> {
        Ok(SignIn::Redirect(self.oauth_authorize_url(provider)?))
    }

    fn sign_in_with_email_link(&mut self, email: &str) -> Result<SignIn, StoreError> {
        let mut request = self
            .http_client
            .post(self.auth_url("otp"))
            .header("apikey", &self.anon_key)
            .json(&OtpRequest {
                email: email.trim(),
                create_user: true,
            });
        if let Some(redirect_to) = &self.redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        check_response(request.send()?)?;
        info!("Sign-in link sent to {}", email.trim());
        Ok(SignIn::EmailSent)
    }

    fn complete_sign_in(&mut self, proof: SignInProof) -> Result<Session, StoreError> {
        let session = match proof {
            SignInProof::RedirectUrl(url) => {
                let tokens = parse_redirect_tokens(&url)?;
                let user = self.fetch_user(&tokens.access_token)?;
                Session {
                    user_id: user.id,
                    email: user.email,
                    access_token: Some(tokens.access_token),
                    refresh_token: tokens.refresh_token,
                    signed_in_at: Utc::now(),
                }
            }
            SignInProof::EmailCode { email, code } => {
                let response = self
                    .http_client
                    .post(self.auth_url("verify"))
                    .header("apikey", &self.anon_key)
                    .json(&VerifyRequest {
                        kind: "email",
                        email: email.trim(),
                        token: code.trim(),
                    })
                    .send()?;
                let tokens: TokenResponse = check_response_json(response)?;
                Session {
                    user_id: tokens.user.id,
                    email: tokens.user.email,
                    access_token: Some(tokens.access_token),
                    refresh_token: tokens.refresh_token,
                    signed_in_at: Utc::now(),
                }
            }
        };
        self.establish(session)
    }

    /// The local session is dropped even if the server can't be reached.
    fn sign_out(&mut self) -> Result<(), StoreError> {
        let revoked = match self.access_token() {
            Ok(token) => self
                .http_client
                .post(self.auth_url("logout"))
                .header("apikey", &self.anon_key)
                .bearer_auth(token)
                .send()
                .map_err(StoreError::from)
                .and_then(check_response)
                .map(|_| ()),
            Err(_) => Ok(()),
        };
        self.sessions.set(None)?;
        if let Err(e) = &revoked {
            warn!("Server-side logout failed, local session cleared anyway: {}", e);
        }
        revoked
    }

    fn session(&self) -> Option<&Session> {
        self.sessions.current()
    }

    fn on_session_change(&mut self, callback: SessionCallback) {
        self.sessions.subscribe(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(redirect_to: Option<&str>) -> RemoteStore {
        RemoteStore::new(
            "https://project.example.com/",
            "anon",
            redirect_to.map(str::to_string),
            SessionHub::in_memory(),
        )
    }

    #[test]
    fn authorize_url_carries_provider_and_redirect() {
        let url = store(Some("http://localhost:3000/"))
            .oauth_authorize_url(OAuthProvider::Google)
            .unwrap();
        assert_eq!(
            url,
            "https://project.example.com/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A3000%2F"
        );
    }

    #[test]
    fn table_url_strips_trailing_slash() {
        assert_eq!(
            store(None).table_url(),
            "https://project.example.com/rest/v1/activity_logs"
        );
    }

    #[test]
    fn parses_tokens_from_fragment() {
        let tokens = parse_redirect_tokens(
            "http://localhost:3000/#access_token=abc.def&expires_in=3600&refresh_token=r1&token_type=bearer",
        )
        .unwrap();
        assert_eq!(tokens.access_token, "abc.def");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));
    }

    #[test]
    fn redirect_error_is_surfaced() {
        let err = parse_redirect_tokens(
            "http://localhost:3000/#error=access_denied&error_description=User+cancelled+login",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid sign-in response: User cancelled login");
    }

    #[test]
    fn redirect_without_fragment_is_rejected() {
        assert!(parse_redirect_tokens("http://localhost:3000/?code=1").is_err());
    }

    #[test]
    fn sign_out_clears_session_when_server_is_unreachable() {
        let mut sessions = SessionHub::in_memory();
        sessions
            .set(Some(Session {
                user_id: "u1".to_string(),
                email: None,
                access_token: Some("token".to_string()),
                refresh_token: None,
                signed_in_at: Utc::now(),
            }))
            .unwrap();
        // Nothing listens on port 1.
        let mut remote = RemoteStore::new("http://127.0.0.1:1", "anon", None, sessions);

        let result = remote.sign_out();
        assert!(matches!(result, Err(StoreError::Network(_))));
        assert!(remote.session().is_none());
    }

    #[test]
    fn data_calls_require_a_session() {
        let remote = store(None);
        assert!(matches!(remote.list(), Err(StoreError::NotAuthenticated)));
    }

    #[test]
    fn server_message_is_kept_verbatim() {
        assert_eq!(error_message(r#"{"message":"JWT expired"}"#), "JWT expired");
        assert_eq!(error_message(r#"{"msg":"Email rate limit exceeded"}"#), "Email rate limit exceeded");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn insert_row_flattens_fields() {
        let log = NewActivityLog {
            date: chrono::NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
            activity_ids: vec!["chest".to_string()],
            is_cardio: true,
            cardio_time: Some(20.0),
            cardio_distance: None,
        };
        let json = serde_json::to_value(InsertRow { user_id: "u1", log: &log }).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["date"], "2023-10-01");
        assert_eq!(json["activity_ids"][0], "chest");
        assert_eq!(json["cardio_time"], 20.0);
        assert!(json["cardio_distance"].is_null());
    }
}
