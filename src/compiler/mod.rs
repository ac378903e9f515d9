//! Filter-graph compiler
//!
//! Translates a [`Composition`](crate::domain::model::Composition) into a
//! [`PipelineSpec`]: a typed, engine-agnostic description of the inputs,
//! processing stages and output parameters needed to realize it. The
//! serializer turns a spec into the encoding engine's filter-graph syntax and
//! argument list.

pub mod expr;
pub mod graph;
pub mod serialize;

use serde::{Deserialize, Serialize};

use crate::domain::model::{RenderProfile, TrimWindow};

pub use graph::compile;
pub use serialize::{engine_args, filter_graph};

/// Label of the final video port
pub const VIDEO_OUT: &str = "outv";
/// Label of the final audio port
pub const AUDIO_OUT: &str = "outa";

/// Compiled pipeline with the warnings raised while compiling it
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub spec: PipelineSpec,
    pub warnings: Vec<String>,
}

/// Everything the encoding engine needs to realize a composition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSpec {
    pub inputs: Vec<InputSource>,
    pub stages: Vec<Stage>,
    pub video_out: String,
    pub audio_out: Option<String>,
    pub output: OutputParams,
}

impl PipelineSpec {
    /// Stages of the given kind, in pipeline order
    pub fn stages_of(&self, kind: StageKind) -> impl Iterator<Item = &Stage> {
        self.stages.iter().filter(move |stage| stage.kind == kind)
    }

    /// Number of stage inputs reading the given label
    pub fn consumers_of(&self, label: &str) -> usize {
        self.stages
            .iter()
            .flat_map(|stage| stage.inputs.iter())
            .filter(|port| matches!(port, Port::Label(l) if l == label))
            .count()
    }
}

/// How an input is read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InputMode {
    /// Read once from the start
    Once,
    /// Hold a still image for the given duration
    LoopStill { duration: f64 },
    /// Loop the stream indefinitely; the output duration cap ends it
    StreamLoop,
}

/// Named input source of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSource {
    pub name: String,
    pub location: String,
    pub mode: InputMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
}

/// Stage input port: a stream of a declared input or a labelled stage output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Port {
    Input { index: usize, stream: StreamKind },
    Label(String),
}

impl Port {
    pub fn video(index: usize) -> Self {
        Port::Input {
            index,
            stream: StreamKind::Video,
        }
    }

    pub fn audio(index: usize) -> Self {
        Port::Input {
            index,
            stream: StreamKind::Audio,
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Port::Label(label.into())
    }
}

/// Single filter argument, already escaped for the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterArg {
    Value(String),
    Named { key: String, value: String },
}

/// One filter of a stage chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub name: String,
    pub args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(FilterArg::Value(value.into()));
        self
    }

    /// Append a `key=value` argument
    pub fn named(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(FilterArg::Named {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Append a `key=value` argument when a value is present
    pub fn named_opt(self, key: impl Into<String>, value: Option<String>) -> Self {
        match value {
            Some(value) => self.named(key, value),
            None => self,
        }
    }

    /// Value of a named argument
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            FilterArg::Named { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Role of a stage in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Scale and format-normalize the background
    Normalize,
    /// Render glyphs into a luminance mask
    GlyphMask,
    /// Solid color source filling a text layer
    Fill,
    /// Scale, format and key an overlay source
    Prepare,
    /// Extract an overlay's alpha channel as a mask
    AlphaMask,
    /// Replace a layer's alpha with a mask's luminance
    MaskApply,
    /// Time-ramped alpha, scale or position
    Animate,
    /// Identity stage for unrecognized animations
    Passthrough,
    /// Composite a layer onto the accumulated canvas
    Compose,
    /// Trim, fade and level the audio track
    Audio,
}

/// One filter chain with named input and output ports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub kind: StageKind,
    /// Index of the layer the stage belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<usize>,
    pub inputs: Vec<Port>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<String>,
}

impl Stage {
    pub fn new(kind: StageKind, layer: Option<usize>) -> Self {
        Self {
            kind,
            layer,
            inputs: Vec::new(),
            filters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, port: Port) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }

    /// Whether any filter of the chain has the given name
    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.name == name)
    }
}

/// Container and codec parameters of the output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputParams {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub fps: u32,
    /// Duration cap in seconds, rounded to milliseconds
    pub duration: f64,
    pub faststart: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
}

/// Encoder speed/quality trade-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderQuality {
    pub preset: String,
    pub crf: u8,
}

/// Encoder settings per render profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderPresets {
    pub preview: EncoderQuality,
    #[serde(rename = "final")]
    pub final_cut: EncoderQuality,
}

impl Default for EncoderPresets {
    fn default() -> Self {
        Self {
            preview: EncoderQuality {
                preset: "ultrafast".to_string(),
                crf: 28,
            },
            final_cut: EncoderQuality {
                preset: "slow".to_string(),
                crf: 18,
            },
        }
    }
}

impl EncoderPresets {
    pub fn for_profile(&self, profile: RenderProfile) -> &EncoderQuality {
        match profile {
            RenderProfile::Preview => &self.preview,
            RenderProfile::Final => &self.final_cut,
        }
    }
}
