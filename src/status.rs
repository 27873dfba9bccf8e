use std::fmt;

/// Room state reported by TikTok for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    PreparingToGoLive,
    Live,
    Offline,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("Unknown live status code: {0}")]
    UnknownStatusCode(i64),
}

impl LiveStatus {
    pub fn from_code(code: i64) -> Result<Self, StatusError> {
        match code {
            1 => Ok(Self::PreparingToGoLive),
            2 => Ok(Self::Live),
            4 => Ok(Self::Offline),
            other => Err(StatusError::UnknownStatusCode(other)),
        }
    }

    pub fn is_live(self) -> bool {
        self == Self::Live
    }
}

impl TryFrom<i64> for LiveStatus {
    type Error = StatusError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreparingToGoLive => write!(f, "preparing to go live"),
            Self::Live => write!(f, "live"),
            Self::Offline => write!(f, "offline"),
        }
    }
}
