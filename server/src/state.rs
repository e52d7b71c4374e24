use std::sync::Arc;

use ab_glyph::FontArc;
use vision_core::{DetectionRouter, DirectRoomDetector, WallDetector};

/// Everything a handler needs, built once at startup and shared behind
/// an `Arc`. Model handles are immutable after construction: `ort`
/// sessions are `Send + Sync` and `run` takes `&self`, so no mutex is
/// needed around them.
pub struct AppState {
    pub router: DetectionRouter,
    pub label_font: Option<FontArc>,
}

pub struct StartupConfig {
    pub wall_model_path: Option<String>,
    pub direct_model_path: Option<String>,
    pub font_path: Option<String>,
}

impl StartupConfig {
    pub fn from_env() -> Self {
        Self {
            wall_model_path: std::env::var("WALL_MODEL_PATH").ok(),
            direct_model_path: std::env::var("ROOM_MODEL_PATH").ok(),
            font_path: std::env::var("LABEL_FONT_PATH").ok(),
        }
    }
}

impl AppState {
    /// Eagerly loads every configured model. A model path that is
    /// configured but fails to load is fatal (§5: "a failed load makes
    /// the corresponding pipeline version permanently unavailable for
    /// the process's lifetime" — we go further and refuse to start,
    /// since a model that was asked for but silently absent is worse
    /// than a process that won't come up). A model that was never
    /// configured is not an error: that pipeline version is simply
    /// unavailable and callers get `ModelUnavailable` at request time.
    pub fn init(config: StartupConfig) -> anyhow::Result<Arc<Self>> {
        let wall_detector = config
            .wall_model_path
            .as_deref()
            .map(WallDetector::load)
            .transpose()?;
        let direct_detector = config
            .direct_model_path
            .as_deref()
            .map(DirectRoomDetector::load)
            .transpose()?;

        if wall_detector.is_none() && direct_detector.is_none() {
            tracing::warn!("no detector models configured; both v1 and v2 will return ModelUnavailable");
        }

        let label_font = config.font_path.as_deref().and_then(|path| {
            match std::fs::read(path) {
                Ok(bytes) => match FontArc::try_from_vec(bytes) {
                    Ok(font) => Some(font),
                    Err(e) => {
                        tracing::warn!(path, error = %e, "label font failed to parse, labels disabled");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(path, error = %e, "label font failed to load, labels disabled");
                    None
                }
            }
        });

        Ok(Arc::new(Self {
            router: DetectionRouter::new(wall_detector, direct_detector),
            label_font,
        }))
    }
}
