use crate::model::{
    Id,
    post::PostMarker,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;
use time::OffsetDateTime;

pub const PERCENT_MIN: f64 = 0.0;
pub const PERCENT_MAX: f64 = 100.0;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Pin coordinate {0} is not a percentage between 0 and 100")]
pub struct InvalidPinPositionError(pub Axis);

/// A point on the media, in percent of its bounding box.
///
/// Both coordinates are always finite and within `0..=100`.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawPinPosition")]
pub struct PinPosition {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
struct RawPinPosition {
    x: f64,
    y: f64,
}

impl PinPosition {
    pub fn new(x: f64, y: f64) -> Result<Self, InvalidPinPositionError> {
        let in_range = |value: f64| (PERCENT_MIN..=PERCENT_MAX).contains(&value);

        if !in_range(x) {
            return Err(InvalidPinPositionError(Axis::X));
        }
        if !in_range(y) {
            return Err(InvalidPinPositionError(Axis::Y));
        }
        Ok(Self { x, y })
    }

    /// Clamps both coordinates into range, infinities included. NaN has no position.
    #[must_use]
    pub fn clamped(x: f64, y: f64) -> Option<Self> {
        (!x.is_nan() && !y.is_nan()).then(|| Self {
            x: x.clamp(PERCENT_MIN, PERCENT_MAX),
            y: y.clamp(PERCENT_MIN, PERCENT_MAX),
        })
    }

    #[must_use]
    pub fn x(self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn y(self) -> f64 {
        self.y
    }
}

impl TryFrom<RawPinPosition> for PinPosition {
    type Error = InvalidPinPositionError;

    fn try_from(value: RawPinPosition) -> Result<Self, Self::Error> {
        Self::new(value.x, value.y)
    }
}

/// What a comment is anchored to.
///
/// Regular reviews pin comments to a published post. The single-media demo
/// pins them to the media url instead.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub enum PostRef {
    #[serde(rename = "post_id")]
    Post(Id<PostMarker>),
    #[serde(rename = "media_url")]
    Media(String),
}

impl From<Id<PostMarker>> for PostRef {
    fn from(value: Id<PostMarker>) -> Self {
        Self::Post(value)
    }
}

impl Display for PostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostRef::Post(id) => write!(f, "post {id}"),
            PostRef::Media(url) => write!(f, "media {url}"),
        }
    }
}

/// Where a comment record currently lives.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Stored by the backend with a server-assigned id.
    #[default]
    Backend,
    /// Only held in memory for the running session.
    Local,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    #[serde(flatten)]
    pub target: PostRef,
    #[serde(flatten)]
    pub position: PinPosition,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub origin: Origin,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct CreateComment {
    #[serde(flatten)]
    pub target: PostRef,
    #[serde(flatten)]
    pub position: PinPosition,
    pub text: String,
}
