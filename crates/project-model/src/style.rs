//! Per-job presentation configuration.
//!
//! A [`StyleConfig`] is built once per job and passed by reference to the
//! caption animator, audio mixer, and compositor. Nothing mutates it
//! during a render.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Immutable style configuration for one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StyleConfig {
    /// Output aspect ratio; fixes the output resolution.
    pub aspect_ratio: AspectRatio,

    /// Single-track caption settings.
    pub captions: CaptionConfig,

    /// Two-speaker dialogue caption settings.
    pub dialogue: DialogueConfig,

    /// Looped background music mixed under the narration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<BackgroundMusic>,

    /// Text watermark burned over the final video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkConfig>,

    /// Run the fingerprint-disruption chain on the mixed audio.
    pub disrupt_audio: bool,
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    /// 16:9 widescreen.
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 vertical (shorts/reels).
    #[serde(rename = "9:16")]
    Portrait,
    /// 1:1 square.
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    /// Output resolution in pixels `(width, height)`.
    pub fn resolution(self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape => (1920, 1080),
            AspectRatio::Portrait => (1080, 1920),
            AspectRatio::Square => (1080, 1080),
        }
    }

    pub fn is_vertical(self) -> bool {
        self == AspectRatio::Portrait
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
        }
    }
}

/// Single-track caption settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Whether captions are rendered at all.
    pub enabled: bool,

    /// Word-highlight animation; `false` burns plain SRT subtitles.
    pub animated: bool,

    /// Palette/animation preset.
    pub style: CaptionStyle,

    /// Font size in output pixels (before the vertical-format reduction).
    pub font_size: u32,

    /// Vertical placement.
    pub position: CaptionPosition,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            animated: true,
            style: CaptionStyle::Karaoke,
            font_size: 72,
            position: CaptionPosition::Bottom,
        }
    }
}

/// Caption animation preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStyle {
    #[default]
    Karaoke,
    Neon,
    Fire,
    Minimal,
    Bold,
    Typewriter,
    Glitch,
    Bounce,
    Wave,
    Shadow,
    Gradient,
    Retro,
}

/// Vertical caption placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    #[default]
    Bottom,
    Middle,
    Top,
}

/// Dialogue caption settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Pin each speaker's captions to their own corner.
    pub enabled: bool,

    /// Corner for the first-seen speaker (and every even-indexed speaker).
    pub speaker1_position: ScreenCorner,

    /// Corner for the second-seen speaker (and every odd-indexed speaker).
    pub speaker2_position: ScreenCorner,

    /// Background box preset behind each speaker's text.
    pub background: DialogueBackground,

    /// Explicit box opacity in `[0.0, 1.0]`, overriding the preset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_opacity: Option<f64>,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            speaker1_position: ScreenCorner::TopLeft,
            speaker2_position: ScreenCorner::TopRight,
            background: DialogueBackground::Transparent,
            background_opacity: None,
        }
    }
}

impl DialogueConfig {
    /// Effective background box opacity.
    pub fn box_opacity(&self) -> f64 {
        self.background_opacity
            .unwrap_or_else(|| self.background.default_opacity())
            .clamp(0.0, 1.0)
    }
}

/// Screen corner used to pin dialogue captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenCorner {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ScreenCorner {
    pub const ALL: [ScreenCorner; 4] = [
        ScreenCorner::TopLeft,
        ScreenCorner::TopRight,
        ScreenCorner::BottomLeft,
        ScreenCorner::BottomRight,
    ];

    /// The corner on the same edge, opposite side.
    pub fn mirrored(self) -> ScreenCorner {
        match self {
            ScreenCorner::TopLeft => ScreenCorner::TopRight,
            ScreenCorner::TopRight => ScreenCorner::TopLeft,
            ScreenCorner::BottomLeft => ScreenCorner::BottomRight,
            ScreenCorner::BottomRight => ScreenCorner::BottomLeft,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScreenCorner::TopLeft => "top-left",
            ScreenCorner::TopRight => "top-right",
            ScreenCorner::BottomLeft => "bottom-left",
            ScreenCorner::BottomRight => "bottom-right",
        }
    }
}

/// Dialogue background box preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogueBackground {
    None,
    #[default]
    Transparent,
    Solid,
    Blur,
    Gradient,
}

impl DialogueBackground {
    pub fn default_opacity(self) -> f64 {
        match self {
            DialogueBackground::None => 0.0,
            DialogueBackground::Transparent => 0.25,
            DialogueBackground::Solid => 0.45,
            DialogueBackground::Blur => 0.37,
            DialogueBackground::Gradient => 0.31,
        }
    }
}

/// Looped background track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundMusic {
    /// Audio file on disk.
    pub path: PathBuf,

    /// Gain applied to the track in `[0.0, 1.0]`.
    #[serde(default = "default_music_volume")]
    pub volume: f64,
}

fn default_music_volume() -> f64 {
    0.3
}

impl BackgroundMusic {
    pub fn gain(&self) -> f64 {
        if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            default_music_volume()
        }
    }
}

/// Text watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub text: String,
    pub position: WatermarkPosition,
    pub font_size: u32,
    /// Opacity; clamped to `[0.3, 1.0]` when rendered so it never vanishes.
    pub opacity: f64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            position: WatermarkPosition::BottomRight,
            font_size: 28,
            opacity: 0.7,
        }
    }
}

impl WatermarkConfig {
    pub fn effective_opacity(&self) -> f64 {
        if self.opacity.is_finite() {
            self.opacity.clamp(0.3, 1.0)
        } else {
            0.7
        }
    }
}

/// Watermark anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

impl StyleConfig {
    /// Resolve relative asset paths (background music) against `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        if let Some(music) = self.music.as_mut() {
            if music.path.is_relative() {
                music.path = base.join(&music.path);
            }
        }
        self
    }

    /// Watermark, if configured with visible text.
    pub fn active_watermark(&self) -> Option<&WatermarkConfig> {
        self.watermark
            .as_ref()
            .filter(|wm| !wm.text.trim().is_empty())
    }
}
