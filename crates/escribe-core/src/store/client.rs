use super::model::{validate_project_name, validate_username, Profile, Project};
use crate::error::{EscribeError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROJECTS_TABLE: &str = "projects";
const PROFILES_TABLE: &str = "profiles";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in session returned by the auth API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct NewProject<'a> {
    user_id: &'a str,
    name: &'a str,
    sections: Vec<Value>,
}

/// Handle to the hosted table store and its auth API.
///
/// Constructed once at startup and passed to whoever needs it. Requests are
/// made with the anonymous key until [`with_session`](Self::with_session)
/// attaches a user token.
#[derive(Clone)]
pub struct StoreClient {
    http: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl StoreClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let anon_key = anon_key.into();
        if base_url.is_empty() {
            return Err(EscribeError::Config("Store URL is required".into()));
        }
        if anon_key.is_empty() {
            return Err(EscribeError::Config("Store anon key is required".into()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            anon_key,
            access_token: None,
        })
    }

    pub fn with_session(mut self, session: &Session) -> Self {
        self.access_token = Some(session.access_token.clone());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn require_session(&self) -> Result<()> {
        if self.access_token.is_none() {
            return Err(EscribeError::Validation("Sign in first".into()));
        }
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .authorize(self.http.post(self.auth_url("token")))
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password })
            .send()
            .await?;
        let session: Session = check(response).await?.json().await?;
        tracing::info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    /// Register a new account. `None` means the account needs confirming
    /// before a session is issued.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let response = self
            .authorize(self.http.post(self.auth_url("signup")))
            .json(&Credentials { email, password })
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;
        if body.get("access_token").is_some() {
            Ok(Some(serde_json::from_value(body)?))
        } else {
            Ok(None)
        }
    }

    /// Sign up with a username. The username is checked for clashes first and
    /// stored only when a session comes back straight away; otherwise it can
    /// be set after the first sign-in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Option<Session>> {
        let username = validate_username(username)?;
        if self.username_taken(&username).await? {
            return Err(EscribeError::Validation("This username is already taken".into()));
        }
        let Some(session) = self.sign_up(email, password).await? else {
            return Ok(None);
        };
        self.clone()
            .with_session(&session)
            .set_username(&session.user.id, &username)
            .await?;
        Ok(Some(session))
    }

    /// `PUT /auth/v1/user` with the signed-in user's token.
    pub async fn update_user(&self, attributes: &Value) -> Result<User> {
        self.require_session()?;
        let response = self
            .authorize(self.http.put(self.auth_url("user")))
            .json(attributes)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Confirm `current` by signing in again, then set `new_password`.
    pub async fn change_password(
        &self,
        email: &str,
        current: &str,
        new_password: &str,
    ) -> Result<()> {
        self.require_session()?;
        if new_password.is_empty() {
            return Err(EscribeError::Validation("New password cannot be empty".into()));
        }
        if let Err(e) = self.sign_in_with_password(email, current).await {
            return Err(match e {
                EscribeError::Store { status, .. } if (400..500).contains(&status) => {
                    EscribeError::Validation("Current password is incorrect".into())
                }
                other => other,
            });
        }
        self.update_user(&serde_json::json!({ "password": new_password }))
            .await?;
        tracing::info!("Password updated");
        Ok(())
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool> {
        let response = self
            .authorize(self.http.get(self.table_url(PROFILES_TABLE)))
            .query(&[
                ("select", "username".to_string()),
                ("username", format!("eq.{}", username)),
            ])
            .send()
            .await?;
        let rows: Vec<Value> = check(response).await?.json().await?;
        Ok(!rows.is_empty())
    }

    pub async fn get_username(&self, user_id: &str) -> Result<Option<String>> {
        let response = self
            .authorize(self.http.get(self.table_url(PROFILES_TABLE)))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", user_id))])
            .send()
            .await?;
        let rows: Vec<Profile> = check(response).await?.json().await?;
        Ok(rows.into_iter().next().and_then(|p| p.username))
    }

    /// Upsert the user's profile row with a new username.
    pub async fn set_username(&self, user_id: &str, username: &str) -> Result<()> {
        let username = validate_username(username)?;
        self.require_session()?;
        let profile = Profile {
            id: user_id.to_string(),
            username: Some(username),
            updated_at: Some(chrono::Utc::now()),
        };
        let response = self
            .authorize(self.http.post(self.table_url(PROFILES_TABLE)))
            .header("Prefer", "resolution=merge-duplicates")
            .json(&profile)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let response = self
            .authorize(self.http.get(self.table_url(PROJECTS_TABLE)))
            .query(&[("select", "*".to_string()), ("user_id", format!("eq.{}", user_id))])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn create_project(&self, user_id: &str, name: &str) -> Result<Project> {
        let name = validate_project_name(name)?;
        let response = self
            .authorize(self.http.post(self.table_url(PROJECTS_TABLE)))
            .header("Prefer", "return=representation")
            .json(&[NewProject {
                user_id,
                name: &name,
                sections: Vec::new(),
            }])
            .send()
            .await?;
        let mut rows: Vec<Project> = check(response).await?.json().await?;
        if rows.is_empty() {
            return Err(EscribeError::store(500, "Insert returned no rows"));
        }
        Ok(rows.remove(0))
    }

    pub async fn rename_project(&self, id: &str, name: &str) -> Result<()> {
        let name = validate_project_name(name)?;
        self.update_project(id, serde_json::json!({ "name": name })).await
    }

    pub async fn delete_project(&self, id: &str) -> Result<()> {
        let response = self
            .authorize(self.http.delete(self.table_url(PROJECTS_TABLE)))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Persist a project's sections column.
    pub async fn save_sections(&self, project: &Project) -> Result<()> {
        self.update_project(&project.id, serde_json::json!({ "sections": project.sections }))
            .await
    }

    async fn update_project(&self, id: &str, patch: Value) -> Result<()> {
        let response = self
            .authorize(self.http.patch(self.table_url(PROJECTS_TABLE)))
            .query(&[("id", format!("eq.{}", id))])
            .json(&patch)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

/// Turn a non-2xx response into a store error carrying the provider message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or(body);
    tracing::warn!("Store request failed ({}): {}", status, message);
    Err(EscribeError::store(status.as_u16(), message))
}

/// Auth and table endpoints use different error field names.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(String::from)
}
