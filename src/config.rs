use crate::error::ScrollError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What gets scrolled: the window itself or an overflow-scroll element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScrollContainer {
    Window,
    Selector(String),
}

impl From<String> for ScrollContainer {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("window") {
            ScrollContainer::Window
        } else {
            ScrollContainer::Selector(s)
        }
    }
}

impl From<ScrollContainer> for String {
    fn from(c: ScrollContainer) -> Self {
        match c {
            ScrollContainer::Window => "window".to_string(),
            ScrollContainer::Selector(s) => s,
        }
    }
}

impl Default for ScrollContainer {
    fn default() -> Self {
        ScrollContainer::Window
    }
}

/// Strategy used to decide whether a scroll iteration produced progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DetectionMethod {
    ItemCount,
    ScrollHeight,
    Sentinel,
}

impl TryFrom<String> for DetectionMethod {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "itemcount" => Ok(DetectionMethod::ItemCount),
            "scrollheight" => Ok(DetectionMethod::ScrollHeight),
            "sentinel" => Ok(DetectionMethod::Sentinel),
            _ => Err(format!("unknown detection method: {}", s)),
        }
    }
}

impl From<DetectionMethod> for String {
    fn from(m: DetectionMethod) -> Self {
        match m {
            DetectionMethod::ItemCount => "itemCount".to_string(),
            DetectionMethod::ScrollHeight => "scrollHeight".to_string(),
            DetectionMethod::Sentinel => "sentinel".to_string(),
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from(*self))
    }
}

/// Which scroll variant the engine uses. The two are never composed; the mode
/// is fixed for the life of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollMode {
    /// Scroll into the trigger zone just above the container bottom, or all
    /// the way down when already close.
    TriggerZone,
    /// Scroll by a random amount each iteration.
    Simple,
}

impl Default for ScrollMode {
    fn default() -> Self {
        ScrollMode::TriggerZone
    }
}

/// Inclusive pixel range sampled for scroll distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRange {
    pub min: u32,
    pub max: u32,
}

/// Inclusive millisecond range sampled for waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Immutable configuration for one page-load run.
///
/// Validated once at orchestrator entry; internal components receive only the
/// fields they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// CSS selector counted for item-count detection.
    pub item_selector: Option<String>,

    /// What to scroll; affects height and position queries.
    pub scroll_container: ScrollContainer,

    /// Hard cap on scroll iterations. Zero means snapshot-only.
    pub max_scroll_attempts: u32,

    /// Wall-clock cap for the whole run.
    pub max_duration_seconds: u64,

    /// Consecutive no-progress iterations before stopping.
    pub progress_timeout: u32,

    pub detection_method: DetectionMethod,

    /// "End of content" marker, consulted under sentinel detection.
    pub sentinel_selector: Option<String>,

    /// Random scroll distance range, used by the simple scroll mode.
    pub scroll_amount: PixelRange,

    /// Random post-scroll sleep.
    pub wait_after_scroll: MsRange,

    /// Fixed wait for rendering after a scroll or click, in milliseconds.
    pub wait_for_content: u64,

    /// Preference-ordered load-more button selectors.
    pub load_more_selectors: Vec<String>,

    /// Pre-click hesitation range.
    pub load_more_click_delay: MsRange,

    /// Click budget for load-more buttons.
    pub max_load_more_clicks: u32,

    pub scroll_mode: ScrollMode,

    pub viewport: Viewport,

    pub headless: bool,

    pub user_agent: Option<String>,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            item_selector: None,
            scroll_container: ScrollContainer::Window,
            max_scroll_attempts: 50,
            max_duration_seconds: 300,
            progress_timeout: 3,
            detection_method: DetectionMethod::ItemCount,
            sentinel_selector: None,
            scroll_amount: PixelRange { min: 300, max: 800 },
            wait_after_scroll: MsRange { min: 500, max: 1500 },
            wait_for_content: 2000,
            load_more_selectors: Vec::new(),
            load_more_click_delay: MsRange { min: 500, max: 1500 },
            max_load_more_clicks: 10,
            scroll_mode: ScrollMode::TriggerZone,
            viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            headless: true,
            user_agent: None,
        }
    }
}

impl ScrollConfig {
    /// Check every structural rule. The missing-sentinel case under sentinel
    /// detection is handled at runtime as a logged fallback, not here.
    pub fn validate(&self) -> Result<(), ScrollError> {
        if self.max_duration_seconds == 0 {
            return Err(invalid("max_duration_seconds must be positive"));
        }
        if self.progress_timeout == 0 {
            return Err(invalid("progress_timeout must be positive"));
        }
        if self.wait_for_content == 0 {
            return Err(invalid("wait_for_content must be positive"));
        }
        if self.scroll_amount.max < self.scroll_amount.min {
            return Err(invalid("scroll_amount: max must be >= min"));
        }
        if self.wait_after_scroll.max < self.wait_after_scroll.min {
            return Err(invalid("wait_after_scroll: max must be >= min"));
        }
        if self.load_more_click_delay.max < self.load_more_click_delay.min {
            return Err(invalid("load_more_click_delay: max must be >= min"));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(invalid("viewport dimensions must be positive"));
        }
        if let Some(sel) = &self.item_selector {
            if sel.trim().is_empty() {
                return Err(invalid("item_selector must not be blank"));
            }
        }
        if let ScrollContainer::Selector(sel) = &self.scroll_container {
            if sel.trim().is_empty() {
                return Err(invalid("scroll_container selector must not be blank"));
            }
        }
        Ok(())
    }

    /// Load a config file (JSON or YAML by extension, YAML otherwise) and
    /// merge it over the defaults. Unknown keys are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScrollError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| invalid(&format!("cannot read {}: {}", path.display(), e)))?;
        let options = parse_options(path, &raw)?;
        Ok(options.into_config())
    }
}

fn invalid(msg: &str) -> ScrollError {
    ScrollError::InvalidConfig(msg.to_string())
}

fn parse_options(path: &Path, raw: &str) -> Result<ScrollOptions, ScrollError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let parsed = if ext == "json" {
        serde_json::from_str(raw).map_err(|e| invalid(&format!("bad JSON config: {}", e)))?
    } else {
        serde_yaml::from_str(raw).map_err(|e| invalid(&format!("bad YAML config: {}", e)))?
    };
    Ok(parsed)
}

/// Partial patch for [`PixelRange`]; absent bounds keep the default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelRangePatch {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MsRangePatch {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportPatch {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// All-optional mirror of [`ScrollConfig`] used by config files and the
/// `load_with_options` entry point. Scalars replace the default; the nested
/// range and viewport objects shallow-merge over it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollOptions {
    pub item_selector: Option<String>,
    pub scroll_container: Option<ScrollContainer>,
    pub max_scroll_attempts: Option<u32>,
    pub max_duration_seconds: Option<u64>,
    pub progress_timeout: Option<u32>,
    pub detection_method: Option<DetectionMethod>,
    pub sentinel_selector: Option<String>,
    pub scroll_amount: Option<PixelRangePatch>,
    pub wait_after_scroll: Option<MsRangePatch>,
    pub wait_for_content: Option<u64>,
    pub load_more_selectors: Option<Vec<String>>,
    pub load_more_click_delay: Option<MsRangePatch>,
    pub max_load_more_clicks: Option<u32>,
    pub scroll_mode: Option<ScrollMode>,
    pub viewport: Option<ViewportPatch>,
    pub headless: Option<bool>,
    pub user_agent: Option<String>,
}

impl ScrollOptions {
    /// Fill library defaults for everything left unset.
    pub fn into_config(self) -> ScrollConfig {
        let mut cfg = ScrollConfig::default();
        self.apply_to(&mut cfg);
        cfg
    }

    /// Merge this patch over an existing configuration.
    pub fn apply_to(self, cfg: &mut ScrollConfig) {
        if self.item_selector.is_some() {
            cfg.item_selector = self.item_selector;
        }
        if let Some(c) = self.scroll_container {
            cfg.scroll_container = c;
        }
        if let Some(v) = self.max_scroll_attempts {
            cfg.max_scroll_attempts = v;
        }
        if let Some(v) = self.max_duration_seconds {
            cfg.max_duration_seconds = v;
        }
        if let Some(v) = self.progress_timeout {
            cfg.progress_timeout = v;
        }
        if let Some(v) = self.detection_method {
            cfg.detection_method = v;
        }
        if self.sentinel_selector.is_some() {
            cfg.sentinel_selector = self.sentinel_selector;
        }
        if let Some(p) = self.scroll_amount {
            cfg.scroll_amount.min = p.min.unwrap_or(cfg.scroll_amount.min);
            cfg.scroll_amount.max = p.max.unwrap_or(cfg.scroll_amount.max);
        }
        if let Some(p) = self.wait_after_scroll {
            cfg.wait_after_scroll.min = p.min.unwrap_or(cfg.wait_after_scroll.min);
            cfg.wait_after_scroll.max = p.max.unwrap_or(cfg.wait_after_scroll.max);
        }
        if let Some(v) = self.wait_for_content {
            cfg.wait_for_content = v;
        }
        if let Some(v) = self.load_more_selectors {
            cfg.load_more_selectors = v;
        }
        if let Some(p) = self.load_more_click_delay {
            cfg.load_more_click_delay.min = p.min.unwrap_or(cfg.load_more_click_delay.min);
            cfg.load_more_click_delay.max = p.max.unwrap_or(cfg.load_more_click_delay.max);
        }
        if let Some(v) = self.max_load_more_clicks {
            cfg.max_load_more_clicks = v;
        }
        if let Some(v) = self.scroll_mode {
            cfg.scroll_mode = v;
        }
        if let Some(p) = self.viewport {
            cfg.viewport.width = p.width.unwrap_or(cfg.viewport.width);
            cfg.viewport.height = p.height.unwrap_or(cfg.viewport.height);
        }
        if let Some(v) = self.headless {
            cfg.headless = v;
        }
        if self.user_agent.is_some() {
            cfg.user_agent = self.user_agent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ScrollConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_ranges() {
        let mut cfg = ScrollConfig::default();
        cfg.scroll_amount = PixelRange { min: 500, max: 100 };
        assert!(matches!(
            cfg.validate(),
            Err(ScrollError::InvalidConfig(msg)) if msg.contains("scroll_amount")
        ));
    }

    #[test]
    fn rejects_zero_viewport() {
        let mut cfg = ScrollConfig::default();
        cfg.viewport.height = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn detection_method_accepts_common_spellings() {
        for s in ["itemCount", "item_count", "ITEM_COUNT", "item-count"] {
            assert_eq!(
                DetectionMethod::try_from(s.to_string()).unwrap(),
                DetectionMethod::ItemCount
            );
        }
        assert_eq!(
            DetectionMethod::try_from("scrollHeight".to_string()).unwrap(),
            DetectionMethod::ScrollHeight
        );
        assert!(DetectionMethod::try_from("magic".to_string()).is_err());
    }

    #[test]
    fn container_round_trips_through_strings() {
        assert_eq!(
            ScrollContainer::from("window".to_string()),
            ScrollContainer::Window
        );
        assert_eq!(
            ScrollContainer::from(".feed".to_string()),
            ScrollContainer::Selector(".feed".to_string())
        );
    }

    #[test]
    fn nested_patch_merges_shallowly() {
        let opts = ScrollOptions {
            scroll_amount: Some(PixelRangePatch {
                min: Some(100),
                max: None,
            }),
            viewport: Some(ViewportPatch {
                width: Some(1280),
                height: None,
            }),
            ..Default::default()
        };
        let cfg = opts.into_config();
        assert_eq!(cfg.scroll_amount.min, 100);
        assert_eq!(cfg.scroll_amount.max, ScrollConfig::default().scroll_amount.max);
        assert_eq!(cfg.viewport.width, 1280);
        assert_eq!(cfg.viewport.height, ScrollConfig::default().viewport.height);
    }

    #[test]
    fn scalar_options_replace_defaults() {
        let opts = ScrollOptions {
            max_scroll_attempts: Some(7),
            headless: Some(false),
            ..Default::default()
        };
        let cfg = opts.into_config();
        assert_eq!(cfg.max_scroll_attempts, 7);
        assert!(!cfg.headless);
    }
}
