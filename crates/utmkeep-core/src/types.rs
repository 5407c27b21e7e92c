//! Tracked query parameters and the record fields replayed into forms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RecordError;

// ─── Tracked parameters ───────────────────────────────────────────

/// Query parameters captured from the landing URL. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedParam {
    UtmSource,
    UtmMedium,
    UtmCampaign,
    UtmTerm,
    UtmContent,
    Gclid,
    Yclid,
    Fbclid,
}

impl TrackedParam {
    pub const ALL: [Self; 8] = [
        Self::UtmSource,
        Self::UtmMedium,
        Self::UtmCampaign,
        Self::UtmTerm,
        Self::UtmContent,
        Self::Gclid,
        Self::Yclid,
        Self::Fbclid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UtmSource => "utm_source",
            Self::UtmMedium => "utm_medium",
            Self::UtmCampaign => "utm_campaign",
            Self::UtmTerm => "utm_term",
            Self::UtmContent => "utm_content",
            Self::Gclid => "gclid",
            Self::Yclid => "yclid",
            Self::Fbclid => "fbclid",
        }
    }

    /// Lookup by exact wire name. Query parameter names are case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for TrackedParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackedParam {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| RecordError::UnknownKey(s.to_string()))
    }
}

// ─── Attribution keys ─────────────────────────────────────────────

/// A record field that replay can write into a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AttributionKey {
    Param(TrackedParam),
    LandingUrl,
    ReferrerUrl,
    SessionId,
}

impl AttributionKey {
    /// Every key in replay order: tracked params, then derived fields.
    pub const ALL: [Self; 11] = [
        Self::Param(TrackedParam::UtmSource),
        Self::Param(TrackedParam::UtmMedium),
        Self::Param(TrackedParam::UtmCampaign),
        Self::Param(TrackedParam::UtmTerm),
        Self::Param(TrackedParam::UtmContent),
        Self::Param(TrackedParam::Gclid),
        Self::Param(TrackedParam::Yclid),
        Self::Param(TrackedParam::Fbclid),
        Self::LandingUrl,
        Self::ReferrerUrl,
        Self::SessionId,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Param(p) => p.as_str(),
            Self::LandingUrl => "landing_url",
            Self::ReferrerUrl => "referrer_url",
            Self::SessionId => "session_id",
        }
    }
}

impl fmt::Display for AttributionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributionKey {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "landing_url" => Ok(Self::LandingUrl),
            "referrer_url" => Ok(Self::ReferrerUrl),
            "session_id" => Ok(Self::SessionId),
            other => other.parse().map(Self::Param),
        }
    }
}

impl From<TrackedParam> for AttributionKey {
    fn from(p: TrackedParam) -> Self {
        Self::Param(p)
    }
}

impl From<AttributionKey> for String {
    fn from(k: AttributionKey) -> Self {
        k.as_str().to_string()
    }
}

impl TryFrom<String> for AttributionKey {
    type Error = RecordError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
