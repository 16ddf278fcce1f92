//! Core domain model for the Lift conversion dashboard.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "lift-core";

/// Opaque identifier of the signed-in creator account, assigned by the
/// external identity provider. Set once per session and threaded explicitly
/// through every gateway/cache call; never inferred from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of an attributable traffic source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Video,
    Email,
    Community,
    Channel,
    Twitter,
    Instagram,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 6] = [
        ResourceCategory::Video,
        ResourceCategory::Email,
        ResourceCategory::Community,
        ResourceCategory::Channel,
        ResourceCategory::Twitter,
        ResourceCategory::Instagram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceCategory::Video => "video",
            ResourceCategory::Email => "email",
            ResourceCategory::Community => "community",
            ResourceCategory::Channel => "channel",
            ResourceCategory::Twitter => "twitter",
            ResourceCategory::Instagram => "instagram",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(ResourceCategory::Video),
            "email" => Ok(ResourceCategory::Email),
            "community" => Ok(ResourceCategory::Community),
            "channel" => Ok(ResourceCategory::Channel),
            "twitter" => Ok(ResourceCategory::Twitter),
            "instagram" => Ok(ResourceCategory::Instagram),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

/// Per-offer counters nested inside a [`Resource`].
///
/// `offer_name` is matched by name against [`Offer::name`]; it is not a
/// foreign-key-enforced reference. Counts are already coerced to integers by
/// the gateway; `sale_count > click_count` is valid data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferStat {
    pub offer_name: String,
    pub click_count: u64,
    pub sale_count: u64,
    pub call_booking_count: u64,
}

/// An attributable traffic source: a video, email, community post, channel or
/// social post. Produced wholesale by the gateway per fetch and fully replaced
/// on refresh, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub category: ResourceCategory,
    pub name: String,
    /// Platform title, preferred over `name` for display when the category is
    /// `video`.
    pub youtube_title: Option<String>,
    /// View count; only meaningful for videos.
    pub views: Option<u64>,
    pub offers: Vec<OfferStat>,
}

impl Resource {
    /// Display title: the platform title for videos when present, the plain
    /// name otherwise.
    pub fn display_title(&self) -> &str {
        match (&self.category, self.youtube_title.as_deref()) {
            (ResourceCategory::Video, Some(title)) => title,
            _ => &self.name,
        }
    }
}

/// A named promotional campaign owned by the account. Names are unique per
/// account (the server rejects duplicates); the identifier is server-assigned
/// and immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub name: String,
    pub conversion_value: f64,
    pub call_booking_required: bool,
}

/// A recorded sale event attributed to an offer and a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub offer_name: String,
    pub resource_type: String,
    pub resource_name: String,
    pub youtube_title: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Conversion {
    pub fn display_resource(&self) -> &str {
        self.youtube_title.as_deref().unwrap_or(&self.resource_name)
    }
}

/// Raw click/sale event instants for the activity summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvents {
    pub clicks: Vec<DateTime<Utc>>,
    pub sales: Vec<DateTime<Utc>>,
}

/// Connection state of the account's video-platform session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YoutubeSession {
    pub logged_in: bool,
    pub youtube_name: Option<String>,
}
