//! Visual effect kinds applied to a scheduled media group.

use serde::{Deserialize, Serialize};

/// Closed set of effects the renderer knows how to animate.
///
/// Adding an effect means adding a variant here and its curve in
/// `reelsmith-processing-core::effects`; the compiler enforces the pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Very slow zoom drift so a still never looks frozen.
    #[default]
    None,
    Fade,
    Pop,
    Slide,
    Zoom,
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    Static,
}

impl EffectKind {
    pub const ALL: [EffectKind; 10] = [
        EffectKind::None,
        EffectKind::Fade,
        EffectKind::Pop,
        EffectKind::Slide,
        EffectKind::Zoom,
        EffectKind::ZoomIn,
        EffectKind::ZoomOut,
        EffectKind::PanLeft,
        EffectKind::PanRight,
        EffectKind::Static,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::None => "none",
            EffectKind::Fade => "fade",
            EffectKind::Pop => "pop",
            EffectKind::Slide => "slide",
            EffectKind::Zoom => "zoom",
            EffectKind::ZoomIn => "zoom_in",
            EffectKind::ZoomOut => "zoom_out",
            EffectKind::PanLeft => "pan_left",
            EffectKind::PanRight => "pan_right",
            EffectKind::Static => "static",
        }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names_match_as_str() {
        for kind in EffectKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_effect_is_rejected() {
        let parsed: Result<EffectKind, _> = serde_json::from_str("\"spin\"");
        assert!(parsed.is_err());
    }
}
