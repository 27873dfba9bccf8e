use std::{collections::BTreeMap, fmt, str::FromStr};

/// Stream variants TikTok publishes, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quality {
    Original,
    Uhd60,
    Uhd,
    Hd60,
    Hd,
    Ld,
    Sd,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QualityError {
    #[error("Invalid video quality {0:?}. Supported qualities: original, uhd_60, uhd, hd_60, hd, ld, sd")]
    InvalidQuality(String),
    #[error("The requested video quality is not available for download")]
    QualityNotAvailable,
}

impl Quality {
    pub const ALL: [Quality; 7] = [
        Quality::Original,
        Quality::Uhd60,
        Quality::Uhd,
        Quality::Hd60,
        Quality::Hd,
        Quality::Ld,
        Quality::Sd,
    ];

    pub const TOKENS: [&'static str; 7] = ["original", "uhd_60", "uhd", "hd_60", "hd", "ld", "sd"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Uhd60 => "uhd_60",
            Self::Uhd => "uhd",
            Self::Hd60 => "hd_60",
            Self::Hd => "hd",
            Self::Ld => "ld",
            Self::Sd => "sd",
        }
    }

    /// Key used inside TikTok's `stream_data` payload.
    pub fn source_token(self) -> &'static str {
        match self {
            Self::Original => "origin",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expects an already lower-cased token.
impl FromStr for Quality {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| QualityError::InvalidQuality(s.to_string()))
    }
}

/// Playlist link per quality. `None` means the quality exists but TikTok did
/// not publish a link for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamLinkSet(BTreeMap<Quality, Option<String>>);

impl StreamLinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quality: Quality, link: Option<String>) {
        self.0.insert(quality, link);
    }

    pub fn get(&self, quality: Quality) -> Option<&Option<String>> {
        self.0.get(&quality)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().map(|q| q.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Quality, Option<String>)> for StreamLinkSet {
    fn from_iter<T: IntoIterator<Item = (Quality, Option<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLink {
    pub quality: Quality,
    pub link: Option<String>,
}

impl StreamLink {
    pub fn new(quality: Quality, link: Option<String>) -> Self {
        Self { quality, link }
    }
}

/// Picks the link for `requested`. `links` is `None` when no live data was
/// resolved yet.
pub fn resolve(requested: Quality, links: Option<&StreamLinkSet>) -> Result<StreamLink, QualityError> {
    let links = links.ok_or(QualityError::QualityNotAvailable)?;

    match links.get(requested) {
        Some(link) => Ok(StreamLink::new(requested, link.clone())),
        None => Err(QualityError::InvalidQuality(requested.to_string())),
    }
}
