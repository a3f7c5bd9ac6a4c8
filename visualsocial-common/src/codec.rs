//! Reading and writing profile metadata packed into a caption.
//!
//! Older records have no profile column and carry the profile inside the
//! caption text as `caption + SEPARATOR + json`. New records use the
//! structured column, this codec only keeps those rows readable.

use crate::model::post::PostProfile;
use thiserror::Error;

/// Framed by ASCII unit separators, which never occur in typed captions.
pub const SEPARATOR: &str = "\u{1F}meta\u{1F}";

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum PackError {
    #[error("Caption contains the metadata separator")]
    SeparatorInCaption,
    #[error("Profile could not be serialized: {0}")]
    Serialize(String),
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Unpacked {
    pub caption: String,
    pub profile: PostProfile,
}

pub fn pack(caption: &str, profile: &PostProfile) -> Result<String, PackError> {
    if caption.contains(SEPARATOR) {
        return Err(PackError::SeparatorInCaption);
    }

    let json = serde_json::to_string(profile).map_err(|err| PackError::Serialize(err.to_string()))?;
    Ok(format!("{caption}{SEPARATOR}{json}"))
}

/// Splits `stored` on the first separator. Never fails: anything that does
/// not decode is returned unchanged as the caption with an empty profile.
#[must_use]
pub fn unpack(stored: &str) -> Unpacked {
    let Some((caption, json)) = stored.split_once(SEPARATOR) else {
        return Unpacked {
            caption: stored.to_owned(),
            profile: PostProfile::default(),
        };
    };

    match serde_json::from_str::<PostProfile>(json) {
        Ok(profile) => Unpacked {
            caption: caption.to_owned(),
            profile,
        },
        Err(_) => Unpacked {
            caption: stored.to_owned(),
            profile: PostProfile::default(),
        },
    }
}
