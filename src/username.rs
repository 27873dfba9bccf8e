use std::{fmt, sync::OnceLock};

use regex::Regex;

/// A TikTok handle that passed format validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "The username @{0} is invalid. Usernames contain only lowercase letters, numbers, \
     underscores and periods, and are 2 to 24 characters long."
)]
pub struct InvalidUsername(pub String);

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_.]{2,24}$").expect("valid username regex"))
}

pub fn is_valid(username: &str) -> bool {
    pattern().is_match(username)
}

impl Username {
    pub fn parse(username: &str) -> Result<Self, InvalidUsername> {
        if is_valid(username) {
            Ok(Self(username.to_string()))
        } else {
            Err(InvalidUsername(username.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
