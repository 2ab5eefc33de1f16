use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::constants;
use crate::error::{Error, Result};
use crate::library::{MediaEntry, MediaIndex};
use crate::session::SessionGuard;
use crate::tracker::{PlaybackPosition, PositionSink, PositionUpdate, parse_saved_positions};

/// Client for the media server's HTTP API.
///
/// Cheap to clone; clones share the cookie jar and anti-forgery token. Every request goes
/// through the [`SessionGuard`].
#[derive(Clone)]
pub struct ApiClient {
  http: Client,
  base_url: String,
  jar: Arc<Jar>,
  csrf_token: Arc<StdMutex<Option<String>>>,
  guard: SessionGuard,
}

impl std::fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiClient").field("base_url", &self.base_url).finish()
  }
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

#[derive(Deserialize)]
struct StatusBody {
  #[serde(default)]
  status: Option<String>,
}

impl ApiClient {
  pub fn new(base_url: &str, guard: SessionGuard) -> Result<Self> {
    let jar = Arc::new(Jar::default());
    let http = Client::builder()
      .cookie_provider(Arc::clone(&jar))
      .timeout(Duration::from_secs(constants().http_timeout_secs))
      .build()
      .map_err(Error::fetch("failed to build HTTP client"))?;
    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
      jar,
      csrf_token: Arc::new(StdMutex::new(None)),
      guard,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path.trim_start_matches('/'))
  }

  fn csrf_token(&self) -> Option<String> {
    self.csrf_token.lock().ok().and_then(|t| t.clone())
  }

  fn set_csrf_token(&self, token: Option<String>) {
    if let Ok(mut slot) = self.csrf_token.lock() {
      *slot = token;
    }
  }

  /// Session cookie for requests made outside this client, e.g. by the player fetching
  /// `/media/...`.
  pub fn cookie_header(&self) -> Option<String> {
    let url = Url::parse(&self.base_url).ok()?;
    let value = self.jar.cookies(&url)?;
    value.to_str().ok().map(str::to_string)
  }

  /// Start a request with the XHR marker and, once known, the anti-forgery token.
  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let builder = self.http.request(method, self.url(path)).header("X-Requested-With", "XMLHttpRequest");
    match self.csrf_token() {
      Some(token) => builder.header("X-CSRFToken", token),
      None => builder,
    }
  }

  /// Send and classify the response. 401 becomes [`Error::AuthExpired`]; the caller is
  /// expected to be running inside [`SessionGuard::call`].
  async fn send(&self, builder: RequestBuilder, context: &'static str) -> Result<Response> {
    let response = builder.send().await.map_err(Error::fetch(context))?;
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
      return Err(Error::AuthExpired);
    }
    if status.is_success() {
      return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
      .map(|b| b.error)
      .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(Error::Status { status, message })
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, context: &'static str) -> Result<T> {
    let response = self.send(self.request(Method::GET, path), context).await?;
    response.json::<T>().await.map_err(Error::fetch(context))
  }

  // --- Authentication ---

  /// Log in with the server's form login and pick up the anti-forgery token.
  pub async fn login(&self, username: &str, password: &str) -> Result<()> {
    self.guard.call(self.login_inner(username, password)).await
  }

  async fn login_inner(&self, username: &str, password: &str) -> Result<()> {
    let page = self.send(self.http.get(self.url("/login")), "failed to load login page").await?;
    let page = page.text().await.map_err(Error::fetch("failed to read login page"))?;
    let form_token = find_csrf_token(&page);

    let mut form = vec![("username", username.to_string()), ("password", password.to_string())];
    if let Some(token) = &form_token {
      form.push(("csrf_token", token.clone()));
    }
    let response = self.send(self.http.post(self.url("/login")).form(&form), "failed to submit login").await?;
    if response.url().path().trim_end_matches('/').ends_with("/login") {
      return Err(Error::Login("invalid username or password".to_string()));
    }
    let landing = response.text().await.map_err(Error::fetch("failed to read landing page"))?;
    // The login form token is bound to the session too, so it is a valid fallback.
    self.set_csrf_token(find_csrf_token(&landing).or(form_token));
    info!(user = %username, server = %self.base_url, "api: logged in");
    Ok(())
  }

  /// Invalidate the server session. The token is forgotten whatever the outcome.
  pub async fn logout(&self) -> Result<()> {
    let result = self.guard.call(self.send(self.request(Method::POST, "/logout"), "failed to log out")).await;
    self.set_csrf_token(None);
    result.map(|_| ())
  }

  /// Cheapest authenticated request the server offers; the body is ignored.
  pub async fn probe(&self) -> Result<()> {
    self
      .guard
      .call(self.send(self.request(Method::GET, "/api/playback-state"), "liveness probe failed"))
      .await
      .map(|_| ())
  }

  /// Change the logged-in user's password. A wrong current password comes back as a 400.
  pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
    let body = serde_json::json!({ "current_password": current_password, "new_password": new_password });
    let request = self.request(Method::POST, "/api/users/change-password").json(&body);
    let response = self.guard.call(self.send(request, "failed to change password")).await?;
    let ack: StatusBody = response.json().await.map_err(Error::fetch("failed to read password response"))?;
    info!(status = ?ack.status, "api: password changed");
    Ok(())
  }

  // --- Library ---

  pub async fn fetch_library(&self) -> Result<Vec<MediaEntry>> {
    let index: MediaIndex = self.guard.call(self.get_json("/api/media", "failed to load media library")).await?;
    debug!(files = index.files.len(), "api: library fetched");
    Ok(index.files)
  }

  /// Point the server at a different media folder. The library must be reloaded after.
  pub async fn update_settings(&self, media_folder: &str) -> Result<()> {
    let body = serde_json::json!({ "media_folder": media_folder });
    let response =
      self.guard.call(self.send(self.request(Method::POST, "/api/settings").json(&body), "failed to save settings")).await?;
    let ack: StatusBody = response.json().await.map_err(Error::fetch("failed to read settings response"))?;
    debug!(status = ?ack.status, "api: settings saved");
    Ok(())
  }

  // --- Playback state ---

  pub async fn fetch_positions(&self) -> Result<HashMap<String, PlaybackPosition>> {
    let body: serde_json::Value =
      self.guard.call(self.get_json("/api/playback-state", "failed to load playback state")).await?;
    Ok(parse_saved_positions(&body))
  }

  pub async fn save_position(&self, update: &PositionUpdate) -> Result<()> {
    self
      .guard
      .call(self.send(self.request(Method::POST, "/api/playback-state").json(update), "failed to save position"))
      .await
      .map(|_| ())
  }
}

impl PositionSink for ApiClient {
  fn save(&self, update: PositionUpdate) -> impl Future<Output = Result<()>> + Send + 'static {
    let client = self.clone();
    async move { client.save_position(&update).await }
  }
}

/// Value of `name="<attr_name>"`-style attribute `attr` inside one tag's text.
fn tag_attr<'a>(tag: &'a str, attr: &str) -> Option<&'a str> {
  let mut rest = tag;
  while let Some(pos) = rest.find(attr) {
    let before_ok = rest[..pos].ends_with(|c: char| c.is_whitespace());
    let after = rest[pos + attr.len()..].trim_start();
    rest = &rest[pos + attr.len()..];
    if !before_ok {
      continue;
    }
    let Some(after_eq) = after.strip_prefix('=') else { continue };
    let after_eq = after_eq.trim_start();
    let quote = after_eq.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &after_eq[1..];
    return value.find(quote).map(|end| &value[..end]);
  }
  None
}

/// Find the anti-forgery token in a server page.
///
/// Looks for `<meta name="csrf-token" content="...">` and the login form's hidden
/// `<input name="csrf_token" value="...">`.
pub fn find_csrf_token(html: &str) -> Option<String> {
  html.split('<').skip(1).filter_map(|chunk| chunk.split('>').next()).find_map(|tag| {
    let lower = tag.trim_start().to_ascii_lowercase();
    let value = if lower.starts_with("meta") && tag_attr(tag, "name") == Some("csrf-token") {
      tag_attr(tag, "content")
    } else if lower.starts_with("input") && tag_attr(tag, "name") == Some("csrf_token") {
      tag_attr(tag, "value")
    } else {
      None
    };
    value.filter(|v| !v.is_empty()).map(str::to_string)
  })
}
