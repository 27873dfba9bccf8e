use std::sync::Arc;

use rand::seq::IndexedRandom;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Url,
};
use reqwest_cookie_store::CookieStoreMutex;

pub const TIKTOK_URL: &str = "https://www.tiktok.com/";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.6478.127 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
];

/// Shared HTTP session used by every extractor.
///
/// Cookies live in a store that outlives the inner client, so swapping the
/// proxy never drops the session cookies.
pub struct HttpClient {
    client: reqwest::Client,
    pub cookies: Arc<CookieStoreMutex>,
    user_agent: &'static str,
}

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error("request failed with status code: {0}")]
    RequestFailed(u16),
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    let pairs = [
        ("sec-ch-ua", "\"Not/A)Brand\";v=\"8\", \"Chromium\";v=\"126\""),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Linux\""),
        ("accept-language", "en-US"),
        ("upgrade-insecure-requests", "1"),
        ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-user", "?1"),
        ("sec-fetch-dest", "document"),
        ("priority", "u=0, i"),
    ];
    for (name, value) in pairs {
        headers.insert(name, HeaderValue::from_static(value));
    }
    headers.insert(header::REFERER, HeaderValue::from_static(TIKTOK_URL));
    headers
}

/// Proxies given as `host:port` are taken to be plain HTTP proxies.
pub fn normalize_proxy(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}

impl HttpClient {
    pub fn new() -> Result<HttpClient, RequestError> {
        let cookies = Arc::new(CookieStoreMutex::default());
        let user_agent = USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        let client = Self::build_client(&cookies, user_agent, None)?;

        Ok(HttpClient {
            client,
            cookies,
            user_agent,
        })
    }

    fn build_client(
        cookies: &Arc<CookieStoreMutex>,
        user_agent: &str,
        proxy: Option<&str>,
    ) -> Result<reqwest::Client, RequestError> {
        let mut builder = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .default_headers(default_headers())
            .user_agent(user_agent);

        if let Some(proxy) = proxy {
            let proxy = normalize_proxy(proxy);
            let proxy = reqwest::Proxy::all(&proxy)
                .map_err(|_| RequestError::InvalidProxy(proxy.clone()))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder.build()?)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent
    }

    /// Replaces the proxy configuration. The previous client is only dropped
    /// once the new one has been built successfully.
    pub fn update_proxy(&mut self, proxy: Option<&str>) -> Result<(), RequestError> {
        let client = Self::build_client(&self.cookies, self.user_agent, proxy)?;
        self.client = client;

        match proxy {
            Some(p) => info!("Using proxy {}", normalize_proxy(p)),
            None => debug!("Proxy cleared"),
        }

        Ok(())
    }

    /// Installs the TikTok session cookies. Missing values are skipped.
    pub fn set_cookies(&self, sessionid_ss: Option<&str>, tt_target_idc: Option<&str>) {
        let url = match Url::parse(TIKTOK_URL) {
            Ok(url) => url,
            Err(_) => return,
        };
        let mut store = match self.cookies.lock() {
            Ok(store) => store,
            Err(_) => {
                warn!("Cookie store is poisoned, cookies were not set");
                return;
            }
        };

        for (name, value) in [("sessionid_ss", sessionid_ss), ("tt-target-idc", tt_target_idc)] {
            if let Some(value) = value {
                let raw = format!("{}={}; Domain=.tiktok.com; Path=/", name, value);
                if store.parse(&raw, &url).is_err() {
                    warn!("Could not store cookie {}", name);
                }
            }
        }
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse, RequestError> {
        debug!("GET {}", url);
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();

        if status != 200 {
            return Err(RequestError::RequestFailed(status));
        }

        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }
}
