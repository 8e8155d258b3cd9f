//! Renderer configuration.
//!
//! Settings are plain serde structs so they can be loaded from JSON and sent
//! to a worker. Missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::renderer::canvas::Font;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub core: CoreSettings,
    pub display: DisplaySettings,
    /// Playback-only configuration; never sent to a worker
    pub player: PlayerSettings,
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Structured form sent across the worker boundary, without the
    /// playback section.
    pub fn to_worker_json(&self) -> Result<serde_json::Value, RenderError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("player");
        }
        Ok(value)
    }

    pub fn from_worker_json(value: serde_json::Value) -> Result<Self, RenderError> {
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreSettings {
    /// Render engine name; see `RenderEngine::from_name`
    pub engine: String,
    /// Run layout and painting on a background worker
    pub use_workers: bool,
    /// Paint partials only when `render_result` asks for them
    pub enable_lazy_loading: bool,
    pub log_level: LogLevel,
    /// Thread name of the render worker
    pub worker_name: String,
    /// Stack size of the render worker, platform default when unset
    pub worker_stack_size: Option<usize>,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            engine: "svg".to_string(),
            use_workers: false,
            enable_lazy_loading: false,
            log_level: LogLevel::Info,
            worker_name: "scoreflow-render".to_string(),
            worker_stack_size: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    Off,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutMode {
    /// Bars wrap into systems stacked top to bottom
    Page,
    /// All bars in one continuous, horizontally scrolling system
    #[default]
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplaySettings {
    pub scale: f64,
    pub layout_mode: LayoutMode,
    /// First bar to render, 1-based
    pub start_bar: i32,
    /// Number of bars to render, 0 renders all
    pub bar_count: i32,
    /// Bars per incremental partial in the horizontal layout
    pub bar_count_per_partial: usize,
    /// Fixed number of bars per system in the page layout, <= 0 fits by width
    pub bars_per_row: i32,
    /// 1, 2 or 4 values (all sides / vertical-horizontal / left-top-right-bottom)
    pub padding: Vec<f64>,
    /// Extra bars a partial may absorb beyond `bar_count_per_partial`
    /// because they are linked to their predecessor; `None` allows as many
    /// as `bar_count_per_partial`
    pub max_linked_bars_per_partial: Option<usize>,
    pub staff_padding_top: f64,
    pub staff_padding_bottom: f64,
    pub resources: RenderingResources,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            layout_mode: LayoutMode::Horizontal,
            start_bar: 1,
            bar_count: 0,
            bar_count_per_partial: 10,
            bars_per_row: -1,
            padding: vec![20.0, 20.0, 20.0, 20.0],
            max_linked_bars_per_partial: None,
            staff_padding_top: 10.0,
            staff_padding_bottom: 10.0,
            resources: RenderingResources::default(),
        }
    }
}

impl DisplaySettings {
    /// Bars per horizontal partial, at least one.
    pub fn bar_count_per_partial(&self) -> usize {
        self.bar_count_per_partial.max(1)
    }

    pub fn max_linked_bars_per_partial(&self) -> usize {
        self.max_linked_bars_per_partial
            .unwrap_or_else(|| self.bar_count_per_partial())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderingResources {
    pub main_glyph_color: String,
    pub staff_line_color: String,
    pub bar_separator_color: String,
    /// Font for accolade labels
    pub effect_font: Font,
}

impl Default for RenderingResources {
    fn default() -> Self {
        Self {
            main_glyph_color: "#1a1a1a".to_string(),
            staff_line_color: "#555555".to_string(),
            bar_separator_color: "#333333".to_string(),
            effect_font: Font::new("Georgia", 12.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerSettings {
    pub enable_player: bool,
    pub sound_font: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings =
            Settings::from_json(r#"{ "display": { "barCountPerPartial": 2, "padding": [5] } }"#)
                .unwrap();
        assert_eq!(settings.display.bar_count_per_partial, 2);
        assert_eq!(settings.display.padding, vec![5.0]);
        assert_eq!(settings.display.start_bar, 1);
        assert_eq!(settings.core.engine, "svg");
    }

    #[test]
    fn worker_form_omits_player_settings() {
        let mut settings = Settings::default();
        settings.player.enable_player = true;
        let value = settings.to_worker_json().unwrap();
        assert!(value.get("player").is_none());
        assert!(value.get("display").is_some());

        let back = Settings::from_worker_json(value).unwrap();
        assert_eq!(back.display, settings.display);
        assert!(!back.player.enable_player);
    }
}
