use crate::model::Id;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::OffsetDateTime;

/// Media shown by a fresh agency session before anything was uploaded.
pub const DEMO_MEDIA_URL: &str = "https://assets.mixkit.co/videos/preview/mixkit-girl-taking-a-selfie-in-a-field-of-flowers-3444-large.mp4";
pub const DEMO_CAPTION: &str = "Look at this amazing result! 🚀 #new #marketing";
pub const DEMO_HANDLE: &str = "@your_brand";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown {kind}: {value:?}")]
pub struct UnknownVariantError {
    kind: &'static str,
    value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])* $name:ident($kind:literal) {
            $($(#[$variant_meta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
        pub enum $name {
            $($(#[$variant_meta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &[Self] = &[$(Self::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariantError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariantError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

text_enum!(
    MediaType("media type") {
        Video => "video",
        Image => "image",
    }
);

text_enum!(
    /// Chrome preset the preview imitates. Layout only, the data is the same.
    #[derive(Default)]
    Platform("platform") {
        Story => "story",
        Reels => "reels",
        #[default]
        TikTok => "tiktok",
        Feed => "feed",
    }
);

text_enum!(
    #[derive(Default)]
    ReviewStatus("review status") {
        #[default]
        Pending => "pending",
        ChangesRequested => "changes",
        Approved => "approved",
    }
);

impl MediaType {
    /// Classifies an upload by its MIME type, falling back to the file extension.
    #[must_use]
    pub fn detect(content_type: Option<&str>, file_name: &str) -> Self {
        if let Some(content_type) = content_type {
            if content_type.starts_with("video") {
                return Self::Video;
            }
            if content_type.starts_with("image") {
                return Self::Image;
            }
        }

        let extension = file_name
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_ascii_lowercase());
        match extension.as_deref() {
            Some("mp4" | "mov" | "webm" | "m4v" | "avi" | "mkv") => Self::Video,
            _ => Self::Image,
        }
    }
}

/// Profile chrome rendered next to the media: handle plus like and comment counters.
///
/// The counters are display labels such as `"84.2K"`, not numbers.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct PostProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl PostProfile {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.likes.is_none() && self.comments.is_none()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    #[serde(flatten)]
    pub content: PostContent,
    pub status: ReviewStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Everything the agency edits before publishing.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub media_url: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub caption: String,
    #[serde(default, skip_serializing_if = "PostProfile::is_empty")]
    pub profile: PostProfile,
}

impl PostContent {
    /// The content a brand-new agency session starts from.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            media_url: DEMO_MEDIA_URL.to_owned(),
            media_type: MediaType::Video,
            platform: Platform::default(),
            caption: DEMO_CAPTION.to_owned(),
            profile: PostProfile {
                name: Some(DEMO_HANDLE.to_owned()),
                likes: Some("84.2K".to_owned()),
                comments: Some("1.8K".to_owned()),
            },
        }
    }
}

impl Default for PostContent {
    fn default() -> Self {
        Self::demo()
    }
}
