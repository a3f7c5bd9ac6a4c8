//! Turning clicks on the preview into pin positions.
//!
//! The preview is a media element with platform chrome (action rails, reply
//! bars) layered on top of it. A click becomes a pin when it lands on the
//! media and not on any chrome. Coordinates are stored in percent of the media
//! box so pins survive resizing.

use crate::model::{comment::PinPosition, post::Platform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, PartialEq, Debug, Error)]
pub enum PinError {
    #[error("Media box has no area ({width}x{height})")]
    EmptyRect { width: f64, height: f64 },
    #[error("Click or media box contains a non-finite coordinate")]
    NonFinite,
}

/// A box in viewport pixels, as reported by the browser for an element.
#[derive(Copy, Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct BoundingRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A pointer position in viewport pixels.
#[derive(Copy, Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct ClickPoint {
    pub client_x: f64,
    pub client_y: f64,
}

impl BoundingRect {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[must_use]
    pub fn contains(&self, point: ClickPoint) -> bool {
        point.client_x >= self.left
            && point.client_x <= self.left + self.width
            && point.client_y >= self.top
            && point.client_y <= self.top + self.height
    }

    fn is_finite(&self) -> bool {
        [self.left, self.top, self.width, self.height]
            .iter()
            .all(|value| value.is_finite())
    }
}

/// Maps a click to percent of `rect`, clamped to `0..=100` on both axes.
pub fn map_click(rect: BoundingRect, point: ClickPoint) -> Result<PinPosition, PinError> {
    if !rect.is_finite() {
        return Err(PinError::NonFinite);
    }
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return Err(PinError::EmptyRect {
            width: rect.width,
            height: rect.height,
        });
    }

    let x = (point.client_x - rect.left) / rect.width * 100.0;
    let y = (point.client_y - rect.top) / rect.height * 100.0;

    PinPosition::clamped(x, y).ok_or(PinError::NonFinite)
}

/// A region given in fractions (`0..=1`) of the media box.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct RelativeRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeRect {
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[must_use]
    pub fn resolve(&self, media: BoundingRect) -> BoundingRect {
        BoundingRect::new(
            media.left + self.left * media.width,
            media.top + self.top * media.height,
            self.width * media.width,
            self.height * media.height,
        )
    }
}

/// An interactive piece of platform chrome drawn over the media.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ChromeZone {
    pub name: &'static str,
    pub region: RelativeRect,
}

const REELS_CHROME: &[ChromeZone] = &[ChromeZone {
    name: "action_rail",
    region: RelativeRect::new(0.85, 0.55, 0.15, 0.45),
}];

const TIKTOK_CHROME: &[ChromeZone] = &[ChromeZone {
    name: "action_rail",
    region: RelativeRect::new(0.84, 0.50, 0.16, 0.50),
}];

const STORY_CHROME: &[ChromeZone] = &[
    ChromeZone {
        name: "story_header",
        region: RelativeRect::new(0.0, 0.0, 1.0, 0.10),
    },
    ChromeZone {
        name: "reply_bar",
        region: RelativeRect::new(0.0, 0.90, 1.0, 0.10),
    },
];

/// Chrome that captures clicks on top of the media for `platform`.
///
/// Overlays the real apps render with `pointer-events: none` (status bar,
/// caption, tabs) are not listed since clicks pass through them. The feed
/// layout draws its actions below the media, so nothing overlaps it.
#[must_use]
pub fn chrome_zones(platform: Platform) -> &'static [ChromeZone] {
    match platform {
        Platform::Story => STORY_CHROME,
        Platform::Reels => REELS_CHROME,
        Platform::TikTok => TIKTOK_CHROME,
        Platform::Feed => &[],
    }
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PinOutcome {
    Pinned { position: PinPosition },
    Ignored { reason: IgnoreReason },
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(tag = "kind", content = "zone", rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The click hit platform chrome.
    Chrome(&'static str),
    /// The click hit a caller-supplied control.
    Control,
}

/// The clickable preview: media box, platform chrome and any extra controls.
#[derive(Clone, PartialEq, Debug)]
pub struct PreviewSurface {
    media: BoundingRect,
    platform: Platform,
    controls: Vec<BoundingRect>,
}

impl PreviewSurface {
    #[must_use]
    pub fn new(media: BoundingRect, platform: Platform) -> Self {
        Self {
            media,
            platform,
            controls: Vec::new(),
        }
    }

    /// Adds controls, in viewport pixels, that swallow clicks.
    #[must_use]
    pub fn with_controls(mut self, controls: impl IntoIterator<Item = BoundingRect>) -> Self {
        self.controls.extend(controls);
        self
    }

    /// Returns the chrome or control hit by `point`, if any.
    #[must_use]
    pub fn hit_test(&self, point: ClickPoint) -> Option<IgnoreReason> {
        chrome_zones(self.platform)
            .iter()
            .find(|zone| zone.region.resolve(self.media).contains(point))
            .map(|zone| IgnoreReason::Chrome(zone.name))
            .or_else(|| {
                self.controls
                    .iter()
                    .any(|control| control.contains(point))
                    .then_some(IgnoreReason::Control)
            })
    }

    pub fn locate(&self, point: ClickPoint) -> Result<PinOutcome, PinError> {
        if !point.client_x.is_finite() || !point.client_y.is_finite() {
            return Err(PinError::NonFinite);
        }
        if let Some(reason) = self.hit_test(point) {
            return Ok(PinOutcome::Ignored { reason });
        }

        map_click(self.media, point).map(|position| PinOutcome::Pinned { position })
    }
}
