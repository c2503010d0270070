use crate::guardsaas_api::models::employee::Employee;
use crate::guardsaas_api::models::event::AccessEvent;
use crate::guardsaas_api::models::object::AccessObject;
use crate::guardsaas_api::models::response::employee_list_response::EmployeeListResponse;
use crate::guardsaas_api::models::response::events_response::EventsResponse;
use crate::guardsaas_api::models::response::object_list_response::ObjectListResponse;
use anyhow::{Context, bail};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://app.guardsaas.ru";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

static CSRF_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*name="_csrf_token"[^>]*value="([^"]*)""#).unwrap()
});

/// One poll's worth of session against the GuardSaaS portal. The portal is a
/// session-cookie web app, so the client carries a cookie store; callers
/// construct a fresh client per round trip, `login`, fetch, then `logout`.
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: String,
}

impl PortalClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent("Mozilla/5.0")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Scrape the CSRF token off the login form, then POST credentials to
    /// `/login_check`. The portal answers 200 whether or not the login
    /// worked, so success is inferred from the page served after the POST:
    /// a logged-in page carries a logout link, the login form does not.
    //
    // TODO: replace the logout-link heuristic once the portal's actual
    // failure response (redirect target or error marker) is confirmed
    // against a live account.
    pub async fn login(&self, username: &str, password: &str) -> anyhow::Result<()> {
        let login_page = self
            .http
            .get(format!("{}/login", self.base_url))
            .send()
            .await?
            .text()
            .await?;

        let csrf_token = extract_csrf_token(&login_page)
            .context("csrf token not found on login page")?;

        let params = [
            ("_username", username),
            ("_password", password),
            ("_remember_me", "on"),
            ("_csrf_token", &csrf_token),
        ];
        let response = self
            .http
            .post(format!("{}/login_check", self.base_url))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("login_check returned {}", status);
        }
        let body = response.text().await?;
        if !body.contains("/logout") {
            bail!("portal did not accept the credentials");
        }
        Ok(())
    }

    async fn get_export<T>(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;

        // Export endpoints serve the login page as HTML when the session is
        // not authenticated instead of failing the request.
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if content_type.contains("text/html") {
            bail!("portal returned HTML for {}, session is not authenticated", path);
        }

        let contents = response.text().await?;
        serde_json::from_str(&contents).with_context(|| {
            format!(
                "Unable to deserialize response from {}. Body was: \"{}\"",
                path, contents
            )
        })
    }
}

fn extract_csrf_token(login_page: &str) -> Option<String> {
    CSRF_TOKEN_RE
        .captures(login_page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl PortalApi for PortalClient {
    async fn get_events(&self, limit: u32) -> anyhow::Result<Vec<AccessEvent>> {
        let response: EventsResponse = self
            .get_export("/reports/events/export", &[("limit", limit.to_string())])
            .await?;
        Ok(response.items)
    }

    async fn get_employees(&self) -> anyhow::Result<Vec<Employee>> {
        let response: EmployeeListResponse =
            self.get_export("/employee/list/export", &[]).await?;
        Ok(response.into_employees())
    }

    async fn get_objects(&self) -> anyhow::Result<Vec<AccessObject>> {
        let response: ObjectListResponse = self.get_export("/object/list/export", &[]).await?;
        Ok(response.items)
    }

    async fn logout(&self) {
        // Best effort; the session dies with the client either way.
        if let Err(e) = self
            .http
            .get(format!("{}/logout", self.base_url))
            .send()
            .await
        {
            debug!("logout request failed: {:?}", e);
        }
    }
}

/// Authenticated read surface of the portal, split out so the fetch/resolve
/// pipeline can be exercised against a canned implementation.
pub trait PortalApi {
    fn get_events(
        &self,
        limit: u32,
    ) -> impl std::future::Future<Output = anyhow::Result<Vec<AccessEvent>>> + Send;
    fn get_employees(
        &self,
    ) -> impl std::future::Future<Output = anyhow::Result<Vec<Employee>>> + Send;
    fn get_objects(
        &self,
    ) -> impl std::future::Future<Output = anyhow::Result<Vec<AccessObject>>> + Send;
    fn logout(&self) -> impl std::future::Future<Output = ()> + Send;
}
