// Domain models - Composition layers, timing and render profiles

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

fn default_fps() -> u32 {
    30
}

fn default_volume() -> f64 {
    1.0
}

fn default_similarity() -> f64 {
    0.1
}

fn default_text_color() -> String {
    "white".to_string()
}

/// Declarative description of a video to render.
///
/// Layers are composited in declaration order: the first layer is visually
/// bottom-most. A composition is immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Composition {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Total duration in seconds
    pub duration: f64,
    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
    pub background: Background,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioTrack>,
    #[serde(default)]
    pub profile: RenderProfile,
}

impl Composition {
    /// Create a composition with a background and no layers
    pub fn new(width: u32, height: u32, duration: f64, background: Background) -> Self {
        Self {
            width,
            height,
            duration,
            fps: default_fps(),
            background,
            layers: Vec::new(),
            audio: None,
            profile: RenderProfile::default(),
        }
    }

    /// Append a layer on top of the existing ones
    pub fn with_layer(mut self, layer: impl Into<Layer>) -> Self {
        self.layers.push(layer.into());
        self
    }

    /// Attach a background music track
    pub fn with_audio(mut self, audio: AudioTrack) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Parse a composition from JSON text
    pub fn from_json(content: &str) -> Result<Self, DomainError> {
        serde_json::from_str(content)
            .map_err(|e| DomainError::CompositionInvalid(format!("malformed JSON: {}", e)))
    }

    /// Parse a composition from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, DomainError> {
        serde_yaml::from_str(content)
            .map_err(|e| DomainError::CompositionInvalid(format!("malformed YAML: {}", e)))
    }

    /// Parse a composition, choosing the format from the file extension
    pub fn from_file_content(path: &Path, content: &str) -> Result<Self, DomainError> {
        match path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Self::from_yaml(content),
            _ => Self::from_json(content),
        }
    }

    pub fn text_layer_count(&self) -> usize {
        self.layers.iter().filter(|l| l.is_text()).count()
    }

    pub fn overlay_layer_count(&self) -> usize {
        self.layers.len() - self.text_layer_count()
    }
}

/// Kind of a media source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Infer the media kind from a source's file extension
    pub fn infer(source: &str) -> Self {
        let path = source.split(['?', '#']).next().unwrap_or(source);
        match Path::new(path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("png") | Some("jpg") | Some("jpeg") | Some("webp") | Some("bmp") => {
                MediaKind::Image
            }
            _ => MediaKind::Video,
        }
    }
}

/// Bottom-most visual source of a composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Background {
    /// Asset identifier resolved through the asset port
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaKind>,
    /// Loop a video background to fill the duration
    #[serde(default, rename = "loop")]
    pub looping: bool,
}

impl Background {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            media: None,
            looping: false,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media.unwrap_or_else(|| MediaKind::infer(&self.source))
    }
}

/// One visual element above the background
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Text(TextLayer),
    Overlay(OverlayLayer),
}

impl Layer {
    pub fn id(&self) -> Option<&str> {
        match self {
            Layer::Text(t) => t.id.as_deref(),
            Layer::Overlay(o) => o.id.as_deref(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Layer::Text(_))
    }

    pub fn timing(&self) -> Option<&Timing> {
        match self {
            Layer::Text(t) => Some(&t.timing),
            Layer::Overlay(o) => o.timing.as_ref(),
        }
    }

    pub fn animation(&self) -> &Animation {
        match self {
            Layer::Text(t) => &t.animation,
            Layer::Overlay(o) => &o.animation,
        }
    }

    /// Mask reference of an overlay layer
    pub fn mask(&self) -> Option<&str> {
        match self {
            Layer::Text(_) => None,
            Layer::Overlay(o) => o.mask.as_deref(),
        }
    }
}

impl From<TextLayer> for Layer {
    fn from(layer: TextLayer) -> Self {
        Layer::Text(layer)
    }
}

impl From<OverlayLayer> for Layer {
    fn from(layer: OverlayLayer) -> Self {
        Layer::Overlay(layer)
    }
}

/// Coordinate: absolute pixels or a formula over the canvas and text box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coord {
    Pixels(i64),
    Formula(String),
}

impl Coord {
    pub fn centered_text_x() -> Self {
        Coord::Formula("(w-text_w)/2".to_string())
    }

    pub fn centered_text_y() -> Self {
        Coord::Formula("(h-text_h)/2".to_string())
    }

    pub fn origin() -> Self {
        Coord::Pixels(0)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coord::Pixels(px) => write!(f, "{}", px),
            Coord::Formula(expr) => write!(f, "{}", expr),
        }
    }
}

/// Text rendered as a glyph mask and filled with a color or an overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    /// Font identifier resolved through the asset port
    pub font: String,
    pub size: u32,
    #[serde(default = "default_text_color")]
    pub color: String,
    #[serde(default = "Coord::centered_text_x")]
    pub x: Coord,
    #[serde(default = "Coord::centered_text_y")]
    pub y: Coord,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub animation: Animation,
}

impl TextLayer {
    /// Centered white text visible for the whole composition
    pub fn new(text: impl Into<String>, font: impl Into<String>, size: u32) -> Self {
        Self {
            id: None,
            text: text.into(),
            font: font.into(),
            size,
            color: default_text_color(),
            x: Coord::centered_text_x(),
            y: Coord::centered_text_y(),
            timing: Timing::default(),
            animation: Animation::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animation = animation;
        self
    }
}

/// Visibility window of a layer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timing {
    #[serde(default)]
    pub start: f64,
    /// Window length; `None` means visible from `start` onwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Timing {
    pub fn window(start: f64, duration: f64) -> Self {
        Self {
            start,
            duration: Some(duration),
        }
    }

    pub fn starting_at(start: f64) -> Self {
        Self {
            start,
            duration: None,
        }
    }

    /// Exclusive end of the window, if bounded
    pub fn end(&self) -> Option<f64> {
        self.duration.map(|d| self.start + d)
    }

    /// Whether the window never intersects `[0, total)`
    pub fn is_outside(&self, total: f64) -> bool {
        self.start >= total || self.end().map(|end| end <= 0.0).unwrap_or(false)
    }

    /// Whether the gate is always open
    pub fn is_always(&self) -> bool {
        self.start <= 0.0 && self.duration.is_none()
    }
}

/// Closed set of animation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    #[default]
    None,
    FadeIn,
    ScaleFadeIn,
    #[serde(alias = "slide_up")]
    Slide,
    /// Unrecognized kinds render as a pass-through
    #[serde(other)]
    Unknown,
}

/// Entry animation of a layer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Animation {
    #[serde(rename = "type", default)]
    pub kind: AnimationKind,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
    /// Slide distance in pixels (defaults to a tenth of the canvas height)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl Animation {
    pub fn new(kind: AnimationKind, start: f64, duration: f64) -> Self {
        Self {
            kind,
            start,
            duration,
            distance: None,
        }
    }

    pub fn fade_in(start: f64, duration: f64) -> Self {
        Self::new(AnimationKind::FadeIn, start, duration)
    }

    /// Whether the kind drives a time ramp
    pub fn is_ramped(&self) -> bool {
        matches!(
            self.kind,
            AnimationKind::FadeIn | AnimationKind::ScaleFadeIn | AnimationKind::Slide
        )
    }
}

/// How an overlay is combined with the canvas below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Overlay,
    Alphamerge,
    Screen,
}

/// Chroma-key parameters for overlays shot on a solid color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChromaKey {
    pub color: String,
    #[serde(default = "default_similarity")]
    pub similarity: f64,
    #[serde(default)]
    pub blend: f64,
}

/// Scale target; `-1` keeps the aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scale {
    pub width: i32,
    pub height: i32,
}

/// Source trim window in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
}

impl TrimWindow {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Particle or texture overlay, optionally keyed or masked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaKind>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroma_key: Option<ChromaKey>,
    /// Id of an earlier layer whose glyphs or alpha restrict this overlay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Scale>,
    #[serde(default)]
    pub blend: BlendMode,
    #[serde(default = "Coord::origin")]
    pub x: Coord,
    #[serde(default = "Coord::origin")]
    pub y: Coord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default)]
    pub animation: Animation,
}

impl OverlayLayer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            media: None,
            looping: false,
            trim: None,
            chroma_key: None,
            mask: None,
            scale: None,
            blend: BlendMode::default(),
            x: Coord::origin(),
            y: Coord::origin(),
            timing: None,
            animation: Animation::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn masked_by(mut self, layer_id: impl Into<String>) -> Self {
        self.mask = Some(layer_id.into());
        self
    }

    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media.unwrap_or_else(|| MediaKind::infer(&self.source))
    }
}

/// Background music
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioTrack {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimWindow>,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub fade_out: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default, rename = "loop")]
    pub looping: bool,
}

impl AudioTrack {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            trim: None,
            fade_in: 0.0,
            fade_out: 0.0,
            volume: default_volume(),
            looping: false,
        }
    }
}

/// Encoding quality profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderProfile {
    /// Fast, low quality encode for previews
    Preview,
    /// Slow, high quality encode for delivery
    #[default]
    Final,
}

impl RenderProfile {
    /// Parse render profile from string
    pub fn parse(profile_str: &str) -> Result<Self, DomainError> {
        match profile_str.to_lowercase().as_str() {
            "preview" => Ok(RenderProfile::Preview),
            "final" => Ok(RenderProfile::Final),
            _ => Err(DomainError::CompositionInvalid(format!(
                "Invalid render profile: {}. Valid profiles: preview, final",
                profile_str
            ))),
        }
    }
}

impl fmt::Display for RenderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderProfile::Preview => write!(f, "preview"),
            RenderProfile::Final => write!(f, "final"),
        }
    }
}

/// Normalize a color to the encoding engine's syntax.
///
/// Accepts `#RRGGBB`, `0xRRGGBB` (both with optional alpha byte) and plain
/// color names.
pub fn engine_color(color: &str) -> Option<String> {
    let color = color.trim();
    let hex = color
        .strip_prefix('#')
        .or_else(|| color.strip_prefix("0x"))
        .or_else(|| color.strip_prefix("0X"));
    match hex {
        Some(digits) => {
            let valid = (digits.len() == 6 || digits.len() == 8)
                && digits.chars().all(|c| c.is_ascii_hexdigit());
            valid.then(|| format!("0x{}", digits.to_uppercase()))
        }
        None => {
            let valid = !color.is_empty() && color.chars().all(|c| c.is_ascii_alphabetic());
            valid.then(|| color.to_lowercase())
        }
    }
}
