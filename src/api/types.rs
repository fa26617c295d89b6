use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::UserId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct RfpId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

/// RFP lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RfpStatus {
    Draft,
    Published,
    ResponseSubmitted,
    UnderReview,
    Approved,
    Rejected,
    /// A status this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl RfpStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
            Self::ResponseSubmitted => "RESPONSE_SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the backend accepts a change from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Published)
                | (Self::Published, Self::ResponseSubmitted | Self::UnderReview)
                | (Self::ResponseSubmitted, Self::UnderReview)
                | (Self::UnderReview, Self::Approved | Self::Rejected)
        )
    }

    /// Approved and rejected RFPs accept no further changes.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for RfpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rfp {
    pub id: RfpId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    pub status: RfpStatus,
    pub owner_id: UserId,
    /// Absent in search results.
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub created_at: Option<OffsetDateTime>,
}

/// One page of results. List endpoints report totals; search does not.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewRfp {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
}

impl NewRfp {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.requirements = Some(requirements.into());
        self
    }
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RfpUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RfpStatus>,
}

/// A proposal submitted by the current supplier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SupplierResponse {
    pub id: i64,
    pub rfp_id: RfpId,
    pub rfp_title: String,
    pub rfp_status: RfpStatus,
    pub owner_email: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub submitted_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub rfp_created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct SupplierResponses {
    pub responses: Vec<SupplierResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RfpOwner {
    pub id: UserId,
    pub email: String,
}

/// A published RFP as listed to suppliers, with its owner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublishedRfp {
    pub id: RfpId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    pub status: RfpStatus,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub deadline: Option<OffsetDateTime>,
    pub owner: RfpOwner,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublishedPage {
    pub total: u64,
    pub items: Vec<PublishedRfp>,
    pub limit: u32,
    pub offset: u32,
}

/// Where to send the file bytes of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PresignedUpload {
    /// `"s3"` for a presigned PUT, `"local"` for the backend's local store.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, alias = "presigned_url")]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompletedUpload {
    pub document_id: DocumentId,
    #[serde(default)]
    pub version_id: Option<i64>,
    #[serde(default)]
    pub version_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentVersion {
    pub id: i64,
    pub version_number: u32,
    #[serde(default)]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct VersionList {
    pub items: Vec<DocumentVersion>,
}

/// Identifier pair returned when a version is created or reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VersionRef {
    pub id: i64,
    pub version_number: u32,
}

/// A previewable document version.
///
/// With S3 storage the backend answers with a signed link; with its local
/// store it streams the file itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPreview {
    Link {
        url: String,
        key: Option<String>,
    },
    Inline {
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct PreviewLink {
    pub url: String,
    #[serde(default)]
    pub key: Option<String>,
}

impl From<PreviewLink> for VersionPreview {
    fn from(link: PreviewLink) -> Self {
        Self::Link {
            url: link.url,
            key: link.key,
        }
    }
}

/// Lenient timestamp parsing: RFC 3339, or an ISO 8601 local time taken as UTC.
pub(crate) mod timestamp {
    use serde::{Deserialize, Deserializer};
    use time::format_description::well_known::{Iso8601, Rfc3339};
    use time::{OffsetDateTime, PrimitiveDateTime};

    pub(crate) fn parse(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
        OffsetDateTime::parse(s, &Rfc3339).or_else(|_| {
            PrimitiveDateTime::parse(s, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc)
        })
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
