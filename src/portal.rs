//! Student portal client.
//!
//! The portal is an ASP.NET WebForms site. Logging in is a three-step dance:
//!
//! 1. **GET** the login page and locate the login `<form>`
//! 2. **POST** the form back with every hidden state field (`__VIEWSTATE`,
//!    `__EVENTVALIDATION`, ...) echoed unchanged plus the student's
//!    credentials
//! 3. Inspect the response body for a marker that only appears once logged in
//!
//! The session cookie set during the dance lives in the client's cookie jar
//! and is reused by [`PortalClient::fetch_page`].
//!
//! There is no structured login status on this portal, so success is a plain
//! substring test. It lives in [`login_succeeded`] so it can be changed in one
//! place when the portal's markup changes.

use crate::config::{PortalCredentials, PortalSettings};
use crate::error::{AuthFailure, ConfigError, FetchFailure};
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

static FORM: Lazy<Selector> = Lazy::new(|| Selector::parse("form").expect("static selector"));
static INPUT: Lazy<Selector> = Lazy::new(|| Selector::parse("input").expect("static selector"));
static HIDDEN: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[type="hidden"]"#).expect("static selector"));

/// Did the post-login page come back logged in?
pub fn login_succeeded(body: &str, marker: &str) -> bool {
    body.contains(marker)
}

/// Proof of a successful login.
///
/// It can only be obtained from [`PortalClient::authenticate`] and is consumed
/// by [`PortalClient::fetch_page`], so each login backs exactly one fetch.
#[derive(Debug)]
pub struct AuthenticatedSession {
    _private: (),
}

/// The login form as found on the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Where the form posts to, resolved against the login page URL.
    pub action: Url,
    /// Hidden inputs to replay verbatim, in document order.
    pub hidden: Vec<(String, String)>,
}

impl LoginForm {
    /// Locate the login form in `html`.
    ///
    /// Prefers the form containing an input named `username_field`; falls back
    /// to the first form on the page. Returns `None` when there is no form.
    pub fn parse(html: &str, page_url: &Url, username_field: &str) -> Option<Self> {
        let document = Html::parse_document(html);
        let forms: Vec<ElementRef<'_>> = document.select(&FORM).collect();

        let form = forms
            .iter()
            .find(|f| {
                f.select(&INPUT)
                    .any(|i| i.value().attr("name") == Some(username_field))
            })
            .or_else(|| forms.first())?;

        let action = match form.value().attr("action").map(str::trim) {
            Some(a) if !a.is_empty() => page_url.join(a).unwrap_or_else(|e| {
                warn!(action = a, error = %e, "Unresolvable form action; posting back to login page");
                page_url.clone()
            }),
            _ => page_url.clone(),
        };

        let hidden = form
            .select(&HIDDEN)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or_default();
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Some(Self { action, hidden })
    }
}

/// HTTP client bound to one portal, holding the session cookie jar.
#[derive(Debug)]
pub struct PortalClient {
    http: Client,
    login_url: Url,
    news_url: Url,
    settings: PortalSettings,
}

impl PortalClient {
    /// Build a client for the portal described by `settings`.
    ///
    /// # Arguments
    ///
    /// * `settings` - Portal URLs, form field names, user agent and timeout
    ///
    /// # Returns
    ///
    /// The client with an empty cookie jar, or a [`ConfigError`] if the HTTP
    /// client cannot be built or the login/news URLs do not parse.
    pub fn new(settings: &PortalSettings) -> Result<Self, ConfigError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent(settings.user_agent.clone());
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            login_url: settings.login_url()?,
            news_url: settings.news_url()?,
            settings: settings.clone(),
        })
    }

    /// Log in with the student's credentials.
    #[instrument(level = "info", skip_all, fields(url = %self.login_url))]
    pub async fn authenticate(
        &self,
        credentials: &PortalCredentials,
    ) -> Result<AuthenticatedSession, AuthFailure> {
        let login_page = self.login_text(self.http.get(self.login_url.clone())).await?;
        debug!(bytes = login_page.len(), "Fetched login page");

        let form = LoginForm::parse(&login_page, &self.login_url, &self.settings.username_field)
            .ok_or_else(|| AuthFailure::MissingLoginForm {
                url: self.login_url.to_string(),
            })?;
        debug!(
            action = %form.action,
            hidden = ?form.hidden.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            "Found login form"
        );

        let mut fields = form.hidden;
        fields.push((
            self.settings.username_field.clone(),
            credentials.student_id.clone(),
        ));
        fields.push((
            self.settings.password_field.clone(),
            credentials.password.clone(),
        ));
        fields.push((
            self.settings.submit_field.clone(),
            self.settings.submit_value.clone(),
        ));

        let body = self
            .login_text(self.http.post(form.action).form(&fields))
            .await?;

        if !login_succeeded(&body, &self.settings.success_marker) {
            debug!(preview = %truncate_for_log(&body, 300), "Post-login page");
            return Err(AuthFailure::Rejected {
                marker: self.settings.success_marker.clone(),
            });
        }

        info!("Logged in to portal");
        Ok(AuthenticatedSession { _private: () })
    }

    /// Fetch the announcements page with the logged-in session.
    #[instrument(level = "info", skip_all, fields(url = %self.news_url))]
    pub async fn fetch_page(&self, _session: AuthenticatedSession) -> Result<String, FetchFailure> {
        let url = self.news_url.to_string();
        let response = self
            .http
            .get(self.news_url.clone())
            .send()
            .await
            .map_err(|source| FetchFailure::Request {
                url: url.clone(),
                source,
            })?;
        let response = success(response).map_err(|(url, status)| FetchFailure::Status { url, status })?;

        let html = response
            .text()
            .await
            .map_err(|source| FetchFailure::Request { url, source })?;
        info!(bytes = html.len(), "Fetched announcements page");
        Ok(html)
    }

    async fn login_text(&self, request: reqwest::RequestBuilder) -> Result<String, AuthFailure> {
        let response = request.send().await.map_err(|source| AuthFailure::Request {
            url: source
                .url()
                .map(Url::to_string)
                .unwrap_or_else(|| self.login_url.to_string()),
            source,
        })?;
        let response = success(response).map_err(|(url, status)| AuthFailure::Status { url, status })?;

        let url = response.url().to_string();
        response
            .text()
            .await
            .map_err(|source| AuthFailure::Request { url, source })
    }
}

/// Pass 2xx responses through; otherwise report where and what status.
fn success(response: Response) -> Result<Response, (String, reqwest::StatusCode)> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        warn!(%status, url = %response.url(), "Portal returned non-success status");
        Err((response.url().to_string(), status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN_PAGE: &str = r#"<html><body>
        <form method="post" action="./login.aspx" id="form1">
          <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="dDwtMTA4" />
          <input type="hidden" name="__EVENTVALIDATION" value="ev42" />
          <input name="txtBrojDosijea" type="text" />
          <input name="txtLozinka" type="password" />
          <input type="submit" name="btnPrijava" value="Prijava" />
        </form>
    </body></html>"#;

    const HOME_PAGE: &str = r#"<html><body><h2>Obavijesti</h2><ul class="newslist"></ul></body></html>"#;

    fn settings_for(server: &MockServer) -> PortalSettings {
        PortalSettings {
            base_url: format!("{}/student", server.uri()),
            login_path: "login.aspx".to_string(),
            news_path: "news.aspx".to_string(),
            ..PortalSettings::default()
        }
    }

    fn credentials() -> PortalCredentials {
        PortalCredentials {
            student_id: "IB123".to_string(),
            password: "tajna".to_string(),
        }
    }

    #[test]
    fn test_login_succeeded_is_substring_match() {
        assert!(login_succeeded("<h2>Obavijesti</h2>", "Obavijesti"));
        assert!(!login_succeeded("<h2>Prijava</h2>", "Obavijesti"));
    }

    #[test]
    fn test_parse_login_form_collects_hidden_fields() {
        let page = Url::parse("https://www.fit.ba/student/default.aspx").unwrap();
        let form = LoginForm::parse(LOGIN_PAGE, &page, "txtBrojDosijea").unwrap();

        assert_eq!(form.action.as_str(), "https://www.fit.ba/student/login.aspx");
        assert_eq!(
            form.hidden,
            vec![
                ("__VIEWSTATE".to_string(), "dDwtMTA4".to_string()),
                ("__EVENTVALIDATION".to_string(), "ev42".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_login_form_prefers_form_with_username_field() {
        let html = r#"
            <form action="/search"><input type="hidden" name="q" value="x" /></form>
            <form action="default.aspx"><input name="txtBrojDosijea" /></form>"#;
        let page = Url::parse("https://portal.test/student/default.aspx").unwrap();
        let form = LoginForm::parse(html, &page, "txtBrojDosijea").unwrap();
        assert_eq!(form.action.as_str(), "https://portal.test/student/default.aspx");
        assert!(form.hidden.is_empty());
    }

    #[test]
    fn test_parse_login_form_without_action_posts_back() {
        let html = r#"<form><input type="hidden" name="s" /></form>"#;
        let page = Url::parse("https://portal.test/student/default.aspx").unwrap();
        let form = LoginForm::parse(html, &page, "txtBrojDosijea").unwrap();
        assert_eq!(form.action, page);
        assert_eq!(form.hidden, vec![("s".to_string(), String::new())]);
    }

    #[test]
    fn test_parse_login_form_missing() {
        let page = Url::parse("https://portal.test/").unwrap();
        assert!(LoginForm::parse("<html><p>Down for maintenance</p></html>", &page, "u").is_none());
    }

    #[tokio::test]
    async fn test_login_replays_state_and_fetch_reuses_cookie() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/student/login.aspx"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/student/login.aspx"))
            .and(body_string_contains("__VIEWSTATE=dDwtMTA4"))
            .and(body_string_contains("__EVENTVALIDATION=ev42"))
            .and(body_string_contains("txtBrojDosijea=IB123"))
            .and(body_string_contains("txtLozinka=tajna"))
            .and(body_string_contains("btnPrijava=Prijava"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "ASP.NET_SessionId=s3ss; Path=/")
                    .set_body_string(HOME_PAGE),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/student/news.aspx"))
            .and(header("cookie", "ASP.NET_SessionId=s3ss"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ul class=\"newslist\"></ul>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = PortalClient::new(&settings_for(&server)).unwrap();
        let session = client.authenticate(&credentials()).await.unwrap();
        let html = client.fetch_page(session).await.unwrap();
        assert!(html.contains("newslist"));
    }

    #[tokio::test]
    async fn test_missing_marker_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/student/login.aspx"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/student/login.aspx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Pogrešan broj dosijea"))
            .mount(&server)
            .await;

        let client = PortalClient::new(&settings_for(&server)).unwrap();
        let err = client.authenticate(&credentials()).await.unwrap_err();
        assert!(matches!(err, AuthFailure::Rejected { ref marker } if marker == "Obavijesti"));
    }

    #[tokio::test]
    async fn test_page_without_form_is_missing_login_form() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/student/login.aspx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Održavanje</p>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = PortalClient::new(&settings_for(&server)).unwrap();
        let err = client.authenticate(&credentials()).await.unwrap_err();
        assert!(matches!(err, AuthFailure::MissingLoginForm { .. }));
    }

    #[tokio::test]
    async fn test_login_page_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = PortalClient::new(&settings_for(&server)).unwrap();
        let err = client.authenticate(&credentials()).await.unwrap_err();
        assert!(
            matches!(err, AuthFailure::Status { status, .. } if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[tokio::test]
    async fn test_unreachable_portal_is_request_failure() {
        let settings = PortalSettings {
            base_url: "http://127.0.0.1:1/student".to_string(),
            ..PortalSettings::default()
        };
        let client = PortalClient::new(&settings).unwrap();
        let err = client.authenticate(&credentials()).await.unwrap_err();
        assert!(matches!(err, AuthFailure::Request { .. }));
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/student/login.aspx"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/student/login.aspx"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HOME_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/student/news.aspx"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = PortalClient::new(&settings_for(&server)).unwrap();
        let session = client.authenticate(&credentials()).await.unwrap();
        let err = client.fetch_page(session).await.unwrap_err();
        assert!(matches!(err, FetchFailure::Status { .. }));
    }
}
