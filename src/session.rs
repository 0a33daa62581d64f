use crate::config::DownloadConfig;
use crate::cookies::CookieStore;
use crate::error::Result;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Network identity for one target's run: client, cookies and user agent.
///
/// Shared by reference across the run's concurrent downloads.
#[derive(Clone)]
pub struct Session {
    client: Client,
    user_agent: String,
    cookies: CookieStore,
    headers: HeaderMap,
}

pub struct SessionBuilder<'a> {
    config: &'a DownloadConfig,
    user_agent: Option<String>,
    cookies: CookieStore,
    cookie_domain: Option<String>,
    headers: HashMap<String, String>,
    accept_invalid_certs: bool,
}

impl<'a> SessionBuilder<'a> {
    pub fn user_agent(mut self, user_agent: Option<&str>) -> Self {
        if let Some(user_agent) = user_agent {
            self.user_agent = Some(user_agent.to_string());
        }
        self
    }

    /// Cookies sent to `domain` (leading dot allowed).
    pub fn cookies(mut self, cookies: CookieStore, domain: &str) -> Self {
        self.cookies = cookies;
        self.cookie_domain = Some(domain.trim_start_matches('.').to_string());
        self
    }

    pub fn headers(mut self, headers: Option<&HashMap<String, String>>) -> Self {
        if let Some(headers) = headers {
            self.headers.extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self
    }

    /// Skips TLS certificate validation. Only for sites configured to need it.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<Session> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| self.config.user_agent.clone());

        let jar = Jar::default();
        if let Some(domain) = &self.cookie_domain {
            if let Ok(origin) = format!("https://{}", domain).parse::<url::Url>() {
                for (name, value) in self.cookies.iter() {
                    jar.add_cookie_str(&format!("{}={}; Domain={}; Path=/", name, value, domain), &origin);
                }
            }
        }

        let mut headers = HeaderMap::new();
        for (key, value) in &self.headers {
            match (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %key, "Ignoring invalid header"),
            }
        }

        if self.accept_invalid_certs {
            warn!("TLS certificate validation is disabled for this session");
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .user_agent(user_agent.clone())
            .cookie_provider(Arc::new(jar))
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        Ok(Session {
            client,
            user_agent,
            cookies: self.cookies,
            headers,
        })
    }
}

impl Session {
    pub fn builder(config: &DownloadConfig) -> SessionBuilder<'_> {
        SessionBuilder {
            config,
            user_agent: None,
            cookies: CookieStore::empty(),
            cookie_domain: None,
            headers: HashMap::new(),
            accept_invalid_certs: false,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn cookies(&self) -> &CookieStore {
        &self.cookies
    }

    pub fn is_authenticated(&self) -> bool {
        !self.cookies.is_empty()
    }

    /// Site-level headers applied to every request of the session.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.headers
    }
}
