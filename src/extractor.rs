use std::{collections::HashMap, fmt, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_aux::prelude::*;
use serde_json::Value;

use crate::{
    http::{HttpClient, RequestError},
    quality::{Quality, StreamLinkSet},
    username::{InvalidUsername, Username},
};

pub const DEFAULT_BASE_URL: &str = "https://www.tiktok.com";

const CHALLENGE_MARKER: &str = "Please wait...";

/// Payload fetched by one extractor strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDocument {
    Api(ApiRoom),
    Webpage(SigiState),
}

impl SourceDocument {
    fn user(&self) -> Option<&RoomUser> {
        match self {
            Self::Api(room) => room.data.as_ref()?.user.as_ref(),
            Self::Webpage(state) => state
                .live_room
                .as_ref()?
                .live_room_user_info
                .as_ref()?
                .user
                .as_ref(),
        }
    }

    fn live_room(&self) -> Option<&LiveRoom> {
        match self {
            Self::Api(room) => room.data.as_ref()?.live_room.as_ref(),
            Self::Webpage(state) => state
                .live_room
                .as_ref()?
                .live_room_user_info
                .as_ref()?
                .live_room
                .as_ref(),
        }
    }
}

/// Body of `api-live/user/room`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiRoom {
    #[serde(default)]
    pub data: Option<ApiRoomData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoomData {
    #[serde(default)]
    pub user: Option<RoomUser>,
    #[serde(default)]
    pub live_room: Option<LiveRoom>,
}

/// `SIGI_STATE` script embedded in the live page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SigiState {
    #[serde(rename = "LiveRoom", default)]
    pub live_room: Option<PageLiveRoom>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLiveRoom {
    #[serde(default)]
    pub live_room_user_info: Option<LiveRoomUserInfo>,
    #[serde(flatten)]
    pub rest: HashMap<String, Value>,
}

impl PageLiveRoom {
    pub fn is_empty(&self) -> bool {
        self.live_room_user_info.is_none() && self.rest.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveRoomUserInfo {
    #[serde(default)]
    pub user: Option<RoomUser>,
    #[serde(default)]
    pub live_room: Option<LiveRoom>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RoomUser {
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub status: Option<i64>,
    #[serde(flatten)]
    pub rest: HashMap<String, Value>,
}

impl RoomUser {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.rest.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveRoom {
    #[serde(default)]
    pub stream_data: Option<RoomStreamData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RoomStreamData {
    #[serde(default)]
    pub pull_data: Option<PullData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullData {
    #[serde(default, deserialize_with = "deserialize_stream_data")]
    pub stream_data: Option<StreamData>,
}

/// Decoded `stream_data` blob, keyed by TikTok's quality token.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamData {
    #[serde(default)]
    pub data: HashMap<String, QualityData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QualityData {
    pub main: Option<MainStream>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MainStream {
    pub hls: Option<String>,
}

// `stream_data` arrives as a JSON document inside a string
fn deserialize_stream_data<'de, D>(deserializer: D) -> Result<Option<StreamData>, D::Error>
where
    D: Deserializer<'de>,
{
    let json_str = match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(None),
    };

    match serde_json::from_str(&json_str) {
        Ok(data) => Ok(Some(data)),
        Err(e) => {
            debug!("Unreadable stream_data: {}", e);
            Ok(None)
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    InvalidUsername(#[from] InvalidUsername),
    #[error("The user account @{0} is likely a private account, or it doesn't exist at all")]
    UserNotFound(String),
    #[error("Received an anti-bot challenge page instead of the live page")]
    ChallengeDetected,
    #[error("Could not find the embedded room data")]
    SourceBlockMissing,
    #[error("Could not find the live status of @{0}")]
    StatusFieldMissing(String),
    #[error("Stream data can't be retrieved from user @{0}")]
    StreamDataMissing(String),
    #[error("HLS link for quality {0} is empty")]
    EmptyHlsLink(Quality),
    #[error(transparent)]
    Request(#[from] RequestError),
}

impl ExtractError {
    /// Failures that another extractor strategy may not run into.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ChallengeDetected
                | Self::SourceBlockMissing
                | Self::StreamDataMissing(_)
                | Self::EmptyHlsLink(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUsername(_) => "InvalidUsername",
            Self::UserNotFound(_) => "UserNotFound",
            Self::ChallengeDetected => "ChallengeDetected",
            Self::SourceBlockMissing => "SourceBlockMissing",
            Self::StatusFieldMissing(_) => "StatusFieldMissing",
            Self::StreamDataMissing(_) => "StreamDataMissing",
            Self::EmptyHlsLink(_) => "EmptyHlsLink",
            Self::Request(_) => "RequestFailed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `api-live/user/room` JSON endpoint.
    Api,
    /// `@user/live` page with an embedded `SIGI_STATE` script.
    Webpage,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Webpage => write!(f, "webpage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
    pub strategy: Strategy,
    base_url: String,
}

fn sigi_state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)<script[^>]*\bid\s*=\s*["']SIGI_STATE["'][^>]*>(.*?)</script>"#)
            .expect("valid SIGI_STATE regex")
    })
}

fn get_sigi_state_str(html: &str) -> Option<&str> {
    let block = sigi_state_pattern().captures(html)?.get(1)?.as_str().trim();
    if block.is_empty() {
        return None;
    }
    Some(block)
}

impl Extractor {
    pub fn new(strategy: Strategy) -> Self {
        Self::with_base_url(strategy, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(strategy: Strategy, base_url: &str) -> Self {
        Self {
            strategy,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn source_url(&self, username: &Username) -> String {
        match self.strategy {
            Strategy::Api => format!(
                "{}/api-live/user/room?aid=1988&sourceType=54&uniqueId={}",
                self.base_url, username
            ),
            Strategy::Webpage => format!("{}/@{}/live", self.base_url, username),
        }
    }

    pub async fn fetch_source(
        &self,
        client: &HttpClient,
        username: &str,
    ) -> Result<SourceDocument, ExtractError> {
        let username = Username::parse(username)?;
        let resp = client.get(&self.source_url(&username)).await?;

        match self.strategy {
            Strategy::Api => serde_json::from_str(&resp.body)
                .map(SourceDocument::Api)
                .map_err(|_| ExtractError::SourceBlockMissing),
            Strategy::Webpage => {
                if resp.body.contains(CHALLENGE_MARKER) {
                    return Err(ExtractError::ChallengeDetected);
                }
                let block =
                    get_sigi_state_str(&resp.body).ok_or(ExtractError::SourceBlockMissing)?;
                serde_json::from_str(block)
                    .map(SourceDocument::Webpage)
                    .map_err(|_| ExtractError::SourceBlockMissing)
            }
        }
    }

    pub fn user_exists(&self, doc: &SourceDocument) -> bool {
        match doc {
            SourceDocument::Api(_) => doc.user().is_some_and(|u| !u.is_empty()),
            SourceDocument::Webpage(state) => {
                state.live_room.as_ref().is_some_and(|r| !r.is_empty())
            }
        }
    }

    pub fn live_status_code(&self, doc: &SourceDocument, username: &str) -> Result<i64, ExtractError> {
        doc.user()
            .and_then(|u| u.status)
            .ok_or_else(|| ExtractError::StatusFieldMissing(username.to_string()))
    }

    pub fn stream_data(&self, doc: &SourceDocument, username: &str) -> Result<StreamData, ExtractError> {
        doc.live_room()
            .and_then(|r| r.stream_data.as_ref())
            .and_then(|s| s.pull_data.as_ref())
            .and_then(|p| p.stream_data.clone())
            .ok_or_else(|| ExtractError::StreamDataMissing(username.to_string()))
    }
}

/// Builds the link set for every known quality. An empty `hls` string is an
/// error, a missing one becomes `None`. The source's `origin` entry is stored
/// as [`Quality::Original`].
pub fn build_stream_links(stream_data: &StreamData) -> Result<StreamLinkSet, ExtractError> {
    let mut links = StreamLinkSet::new();

    for quality in Quality::ALL {
        let link = stream_data
            .data
            .get(quality.source_token())
            .and_then(|q| q.main.as_ref())
            .and_then(|m| m.hls.clone());

        // Seen mostly for viewers in the US region
        if link.as_deref() == Some("") {
            return Err(ExtractError::EmptyHlsLink(quality));
        }

        links.insert(quality, link);
    }

    Ok(links)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn stream_data(value: Value) -> StreamData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn sigi_state_str() {
        let html = r#"<html><script id="SIGI_STATE" type="application/json">{"LiveRoom": {}}</script></html>"#;
        assert_eq!(get_sigi_state_str(html), Some(r#"{"LiveRoom": {}}"#));

        let html = r#"<script type="application/json" id='SIGI_STATE'>
            {"a": 1}
        </script>"#;
        assert_eq!(get_sigi_state_str(html), Some(r#"{"a": 1}"#));

        assert!(get_sigi_state_str(r#"<script id="OTHER">{}</script>"#).is_none());
        assert!(get_sigi_state_str(r#"<script id="SIGI_STATE"></script>"#).is_none());
    }

    #[test]
    fn origin_is_renamed() {
        let data = stream_data(json!({"data": {"origin": {"main": {"hls": "http://x"}}}}));
        let links = build_stream_links(&data).unwrap();

        assert_eq!(links.get(Quality::Original), Some(&Some("http://x".to_string())));
        assert!(links.tokens().any(|t| t == "original"));
        assert!(!links.tokens().any(|t| t == "origin"));
        assert_eq!(links.get(Quality::Hd), Some(&None));
    }

    #[test]
    fn empty_hls_is_an_error() {
        let data = stream_data(json!({"data": {
            "origin": {"main": {"hls": "http://x"}},
            "hd": {"main": {"hls": ""}}
        }}));
        assert!(matches!(
            build_stream_links(&data),
            Err(ExtractError::EmptyHlsLink(Quality::Hd))
        ));
    }

    #[test]
    fn missing_main_is_none() {
        let data = stream_data(json!({"data": {"sd": {}}}));
        let links = build_stream_links(&data).unwrap();
        assert_eq!(links.get(Quality::Sd), Some(&None));
        assert_eq!(links.len(), Quality::ALL.len());
    }

    fn api_doc(value: Value) -> SourceDocument {
        SourceDocument::Api(serde_json::from_value(value).unwrap())
    }

    fn page_doc(value: Value) -> SourceDocument {
        SourceDocument::Webpage(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn api_document_paths() {
        let ex = Extractor::new(Strategy::Api);
        let inner = json!({"data": {"origin": {"main": {"hls": "http://a"}}}}).to_string();
        let doc = api_doc(json!({
            "data": {
                "user": {"status": 2, "nickname": "u1"},
                "liveRoom": {"streamData": {"pull_data": {"stream_data": inner}}}
            }
        }));

        assert!(ex.user_exists(&doc));
        assert_eq!(ex.live_status_code(&doc, "u1").unwrap(), 2);
        let data = ex.stream_data(&doc, "u1").unwrap();
        assert!(data.data.contains_key("origin"));

        assert!(!ex.user_exists(&api_doc(json!({"data": {}, "statusCode": 19881007}))));
        assert!(!ex.user_exists(&api_doc(json!({"data": {"user": {}}}))));
    }

    #[test]
    fn webpage_document_paths() {
        let ex = Extractor::new(Strategy::Webpage);
        let doc = page_doc(json!({
            "LiveRoom": {"liveRoomUserInfo": {"user": {"status": "4"}, "liveRoom": {}}}
        }));

        assert!(ex.user_exists(&doc));
        assert_eq!(ex.live_status_code(&doc, "u1").unwrap(), 4);
        assert!(matches!(
            ex.stream_data(&doc, "u1"),
            Err(ExtractError::StreamDataMissing(_))
        ));
        assert!(!ex.user_exists(&page_doc(json!({"LiveRoom": {}}))));
        assert!(ex.user_exists(&page_doc(json!({"LiveRoom": {"loadingState": {}}}))));
        assert!(matches!(
            ex.live_status_code(&page_doc(json!({})), "u1"),
            Err(ExtractError::StatusFieldMissing(_))
        ));
    }

    #[test]
    fn unreadable_stream_data_is_missing() {
        let ex = Extractor::new(Strategy::Api);
        for raw in ["not json", "", "   "] {
            let doc = api_doc(json!({
                "data": {"liveRoom": {"streamData": {"pull_data": {"stream_data": raw}}}}
            }));
            assert!(matches!(
                ex.stream_data(&doc, "u1"),
                Err(ExtractError::StreamDataMissing(_))
            ));
        }
    }

    #[test]
    fn stream_data_decoded_with_document() {
        let inner = json!({"data": {"hd": {"main": {"hls": "http://hd"}}}}).to_string();
        let room: ApiRoom = serde_json::from_value(json!({
            "data": {"liveRoom": {"streamData": {"pull_data": {"stream_data": inner}}}}
        }))
        .unwrap();

        let pull = room.data.unwrap().live_room.unwrap().stream_data.unwrap().pull_data.unwrap();
        let hd = &pull.stream_data.unwrap().data["hd"];
        assert_eq!(
            hd.main.as_ref().unwrap().hls.as_deref(),
            Some("http://hd")
        );
    }

    #[test]
    fn recoverable_kinds() {
        assert!(ExtractError::ChallengeDetected.is_recoverable());
        assert!(ExtractError::SourceBlockMissing.is_recoverable());
        assert!(ExtractError::StreamDataMissing("a".into()).is_recoverable());
        assert!(ExtractError::EmptyHlsLink(Quality::Sd).is_recoverable());
        assert!(!ExtractError::UserNotFound("a".into()).is_recoverable());
        assert!(!ExtractError::StatusFieldMissing("a".into()).is_recoverable());
        assert!(!ExtractError::Request(RequestError::RequestFailed(500)).is_recoverable());
    }

    #[tokio::test]
    async fn fetch_rejects_invalid_username() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let ex = Extractor::with_base_url(Strategy::Api, &server.uri());
        assert!(matches!(
            ex.fetch_source(&client, "Bad User").await,
            Err(ExtractError::InvalidUsername(_))
        ));
    }

    #[tokio::test]
    async fn fetch_api_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api-live/user/room"))
            .and(query_param("uniqueId", "testuser"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"data": {"user": {"status": 4}}}"#),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let ex = Extractor::with_base_url(Strategy::Api, &server.uri());
        let doc = ex.fetch_source(&client, "testuser").await.unwrap();
        assert_eq!(ex.live_status_code(&doc, "testuser").unwrap(), 4);
    }

    #[tokio::test]
    async fn fetch_webpage_challenge_and_missing_block() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/@challenged/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Please wait...</p>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/@noblock/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let ex = Extractor::with_base_url(Strategy::Webpage, &server.uri());
        assert!(matches!(
            ex.fetch_source(&client, "challenged").await,
            Err(ExtractError::ChallengeDetected)
        ));
        assert!(matches!(
            ex.fetch_source(&client, "noblock").await,
            Err(ExtractError::SourceBlockMissing)
        ));
    }
}
