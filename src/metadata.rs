//! Resolves live metadata for one user by walking the extractor strategies in
//! priority order.
//!
//! Errors come in two tiers. Recoverable extraction failures (see
//! [`ExtractError::is_recoverable`]) move on to the next strategy, and running
//! out of strategies yields [`ResolveError::ExtractorsExhausted`]. Everything
//! else stops the resolution immediately.

use crate::{
    extractor::{build_stream_links, ExtractError, Extractor, SourceDocument, Strategy, StreamData},
    http::HttpClient,
    quality::{self, Quality, QualityError, StreamLink, StreamLinkSet},
    status::{LiveStatus, StatusError},
    username::{InvalidUsername, Username},
};

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("No username was entered. Please provide a valid username")]
    NoUsername,
    #[error(transparent)]
    InvalidUsername(#[from] InvalidUsername),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error("Extractor {extractor} failed due to {}. No more extractors to be used", .source.kind())]
    ExtractorsExhausted {
        extractor: Strategy,
        source: ExtractError,
    },
    #[error("No extractor strategies configured")]
    NoExtractors,
}

/// State kept for one user across poll cycles. Everything except the
/// username is replaced as a whole on each cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionSession {
    username: Username,
    pub quality: Quality,
    pub source: Option<SourceDocument>,
    pub live_status: Option<LiveStatus>,
    pub stream_data: Option<StreamData>,
    pub stream_links: Option<StreamLinkSet>,
}

impl ResolutionSession {
    fn new(username: Username, quality: Quality) -> Self {
        Self {
            username,
            quality,
            source: None,
            live_status: None,
            stream_data: None,
            stream_links: None,
        }
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    fn clear(&mut self) {
        self.source = None;
        self.live_status = None;
        self.stream_data = None;
        self.stream_links = None;
    }

    fn apply(&mut self, cycle: Cycle) {
        self.source = Some(cycle.source);
        self.live_status = Some(cycle.live_status);
        self.stream_data = cycle.stream_data;
        self.stream_links = cycle.stream_links;
    }
}

struct Cycle {
    source: SourceDocument,
    live_status: LiveStatus,
    stream_data: Option<StreamData>,
    stream_links: Option<StreamLinkSet>,
}

pub struct MetadataResolver {
    extractors: Vec<Extractor>,
    session: Option<ResolutionSession>,
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataResolver {
    pub fn new() -> Self {
        Self::with_extractors(vec![
            Extractor::new(Strategy::Api),
            Extractor::new(Strategy::Webpage),
        ])
    }

    pub fn with_extractors(extractors: Vec<Extractor>) -> Self {
        Self {
            extractors,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&ResolutionSession> {
        self.session.as_ref()
    }

    pub fn live_status(&self) -> Option<LiveStatus> {
        self.session.as_ref()?.live_status
    }

    /// Starts (or continues) a session and runs one extraction cycle.
    ///
    /// The username is only read when no session exists yet; afterwards the
    /// session's username wins.
    pub async fn initialize(
        &mut self,
        client: &HttpClient,
        username: Option<&str>,
        quality: Quality,
    ) -> Result<LiveStatus, ResolveError> {
        match self.session.as_mut() {
            Some(session) => session.quality = quality,
            None => {
                let username = username
                    .filter(|u| !u.is_empty())
                    .ok_or(ResolveError::NoUsername)?;
                let username = Username::parse(username)?;
                self.session = Some(ResolutionSession::new(username, quality));
            }
        }

        self.update(client).await
    }

    /// Re-runs extraction for the current session. A failed cycle leaves the
    /// session without status or links.
    pub async fn update(&mut self, client: &HttpClient) -> Result<LiveStatus, ResolveError> {
        let session = self.session.as_mut().ok_or(ResolveError::NoUsername)?;
        session.clear();
        let username = session.username.clone();

        let cycle = self.extract(client, &username).await?;
        let live_status = cycle.live_status;

        if let Some(session) = self.session.as_mut() {
            session.apply(cycle);
        }

        Ok(live_status)
    }

    /// Link for the session's requested quality. Only meaningful once the
    /// last cycle saw the user live.
    pub fn stream_link(&self) -> Result<StreamLink, ResolveError> {
        let session = self.session.as_ref().ok_or(ResolveError::NoUsername)?;
        let links = match session.live_status {
            Some(LiveStatus::Live) => session.stream_links.as_ref(),
            _ => None,
        };

        Ok(quality::resolve(session.quality, links)?)
    }

    async fn extract(
        &self,
        client: &HttpClient,
        username: &Username,
    ) -> Result<Cycle, ResolveError> {
        let count = self.extractors.len();

        for (idx, extractor) in self.extractors.iter().enumerate() {
            match Self::run_extractor(client, extractor, username).await {
                Ok(cycle) => {
                    debug!(
                        "Extractor #{} ({}) resolved @{} as {}",
                        idx + 1,
                        extractor.strategy,
                        username,
                        cycle.live_status
                    );
                    return Ok(cycle);
                }
                Err(ResolveError::Extract(e)) if e.is_recoverable() => {
                    if idx + 1 < count {
                        warn!(
                            "Extractor #{} ({}) failed for @{} due to {}. Trying next extractor method (Extractor #{})",
                            idx + 1,
                            extractor.strategy,
                            username,
                            e.kind(),
                            idx + 2
                        );
                        continue;
                    }

                    error!(
                        "Extractor #{} ({}) failed for @{} due to {}. No more extractors to be used",
                        idx + 1,
                        extractor.strategy,
                        username,
                        e.kind()
                    );
                    return Err(ResolveError::ExtractorsExhausted {
                        extractor: extractor.strategy,
                        source: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(ResolveError::NoExtractors)
    }

    async fn run_extractor(
        client: &HttpClient,
        extractor: &Extractor,
        username: &Username,
    ) -> Result<Cycle, ResolveError> {
        let source = extractor.fetch_source(client, username.as_str()).await?;

        if !extractor.user_exists(&source) {
            return Err(ExtractError::UserNotFound(username.to_string()).into());
        }

        let code = extractor.live_status_code(&source, username.as_str())?;
        let live_status = LiveStatus::from_code(code)?;

        if !live_status.is_live() {
            return Ok(Cycle {
                source,
                live_status,
                stream_data: None,
                stream_links: None,
            });
        }

        let stream_data = extractor.stream_data(&source, username.as_str())?;
        let stream_links = build_stream_links(&stream_data)?;

        Ok(Cycle {
            source,
            live_status,
            stream_data: Some(stream_data),
            stream_links: Some(stream_links),
        })
    }
}
