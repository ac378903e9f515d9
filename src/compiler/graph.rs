// Graph construction - Composition layers to pipeline stages

use crate::compiler::expr::{self, quoted};
use crate::compiler::*;
use crate::domain::errors::DomainError;
use crate::domain::model::*;
use crate::domain::rules::{MaskWiring, ResolvedAssets};

/// Compile a validated composition into a pipeline spec.
///
/// Pure and deterministic: the same inputs always yield the same spec, and
/// stage labels depend only on layer indices.
pub fn compile(
    composition: &Composition,
    assets: &ResolvedAssets,
    presets: &EncoderPresets,
) -> Result<Compilation, DomainError> {
    GraphBuilder::new(composition, assets)?.build(presets)
}

/// Layer output after its animation stage
struct Animated {
    label: String,
    /// Effective ramp expression driving scale or position
    ramp: Option<String>,
    /// Pixels travelled by a slide
    distance: f64,
}

struct GraphBuilder<'a> {
    composition: &'a Composition,
    assets: &'a ResolvedAssets,
    wiring: MaskWiring,
    size: String,
    duration: String,
    inputs: Vec<InputSource>,
    stages: Vec<Stage>,
    warnings: Vec<String>,
    /// Label of the canvas accumulated so far
    canvas: String,
}

impl<'a> GraphBuilder<'a> {
    fn new(composition: &'a Composition, assets: &'a ResolvedAssets) -> Result<Self, DomainError> {
        Ok(Self {
            composition,
            assets,
            wiring: MaskWiring::resolve(&composition.layers)?,
            size: format!("{}x{}", composition.width, composition.height),
            duration: expr::seconds(composition.duration),
            inputs: Vec::new(),
            stages: Vec::new(),
            warnings: Vec::new(),
            canvas: "bg".to_string(),
        })
    }

    fn build(mut self, presets: &EncoderPresets) -> Result<Compilation, DomainError> {
        let composition = self.composition;
        let layers = &composition.layers;
        let last = layers.len().checked_sub(1);

        self.background(last.is_none())?;

        for (index, layer) in layers.iter().enumerate() {
            self.check_window(index, layer);
            let is_last = Some(index) == last;
            match layer {
                Layer::Text(text) => self.text_layer(index, text, is_last)?,
                Layer::Overlay(overlay) => self.overlay_layer(index, overlay, is_last)?,
            }
        }

        let audio_out = match &composition.audio {
            Some(audio) => Some(self.audio(audio)?),
            None => None,
        };

        let quality = presets.for_profile(self.composition.profile);
        let output = OutputParams {
            video_codec: "libx264".to_string(),
            preset: quality.preset.clone(),
            crf: quality.crf,
            pixel_format: "yuv420p".to_string(),
            fps: self.composition.fps,
            duration: expr::round_ms(self.composition.duration),
            faststart: true,
            audio_codec: audio_out.as_ref().map(|_| "aac".to_string()),
            audio_bitrate: audio_out.as_ref().map(|_| "192k".to_string()),
        };

        Ok(Compilation {
            spec: PipelineSpec {
                inputs: self.inputs,
                stages: self.stages,
                video_out: VIDEO_OUT.to_string(),
                audio_out,
                output,
            },
            warnings: self.warnings,
        })
    }

    fn assets(&self) -> &'a ResolvedAssets {
        self.assets
    }

    fn add_input(
        &mut self,
        name: String,
        location: &str,
        mode: InputMode,
        trim: Option<TrimWindow>,
    ) -> usize {
        self.inputs.push(InputSource {
            name,
            location: location.to_string(),
            mode,
            trim,
        });
        self.inputs.len() - 1
    }

    fn visual_mode(&self, kind: MediaKind, looping: bool) -> InputMode {
        match kind {
            MediaKind::Image => InputMode::LoopStill {
                duration: expr::round_ms(self.composition.duration),
            },
            MediaKind::Video if looping => InputMode::StreamLoop,
            MediaKind::Video => InputMode::Once,
        }
    }

    /// Solid color source covering the whole canvas and duration
    fn solid(&self, color: &str) -> Filter {
        Filter::new("color")
            .named("c", color)
            .named("s", self.size.as_str())
            .named("d", self.duration.as_str())
            .named("r", self.composition.fps.to_string())
    }

    fn background(&mut self, is_final: bool) -> Result<(), DomainError> {
        let background = &self.composition.background;
        let looping = background.looping;
        let location = self.assets().media(&background.source)?;
        let mode = self.visual_mode(background.media_kind(), looping);
        let input = self.add_input("background".to_string(), location, mode, None);

        let (w, h) = (
            self.composition.width.to_string(),
            self.composition.height.to_string(),
        );
        let output = if is_final { VIDEO_OUT } else { "bg" };
        let stage = Stage::new(StageKind::Normalize, None)
            .input(Port::video(input))
            .filter(
                Filter::new("scale")
                    .arg(w.as_str())
                    .arg(h.as_str())
                    .named("force_original_aspect_ratio", "increase"),
            )
            .filter(Filter::new("crop").arg(w).arg(h))
            .filter(Filter::new("setsar").arg("1"))
            .filter(Filter::new("fps").arg(self.composition.fps.to_string()))
            .filter(Filter::new("format").arg("rgba"))
            .output(output);
        self.stages.push(stage);
        Ok(())
    }

    fn text_layer(&mut self, index: usize, text: &TextLayer, is_last: bool) -> Result<(), DomainError> {
        let font = self.assets().font(&text.font)?;
        let mask = format!("mask_{}", index);

        let drawtext = Filter::new("drawtext")
            .named("fontfile", expr::literal(font))
            .named("text", expr::literal(&text.text))
            .named("expansion", "none")
            .named("fontsize", text.size.to_string())
            .named("fontcolor", "white")
            .named("x", coord(&text.x))
            .named("y", coord(&text.y))
            .named_opt("enable", expr::gate(&text.timing).map(|g| quoted(&g)));
        let glyphs = Stage::new(StageKind::GlyphMask, Some(index))
            .filter(self.solid("black"))
            .filter(Filter::new("format").arg("gray"))
            .filter(drawtext)
            .output(mask.as_str());
        self.stages.push(glyphs);

        if self.wiring.is_mask_producer(index) {
            self.ignore_mask_animation(index, &text.animation);
            return Ok(());
        }

        let color = engine_color(&text.color).ok_or_else(|| {
            DomainError::CompositionInvalid(format!(
                "text layer {} has unparsable color '{}'",
                index, text.color
            ))
        })?;
        let fill = format!("fill_{}", index);
        let filled = format!("text_{}", index);
        let fill_stage = Stage::new(StageKind::Fill, Some(index))
            .filter(self.solid(&color))
            .filter(Filter::new("format").arg("rgba"))
            .output(fill.as_str());
        let apply = Stage::new(StageKind::MaskApply, Some(index))
            .input(Port::label(fill))
            .input(Port::label(mask))
            .filter(Filter::new("alphamerge"))
            .output(filled.as_str());
        self.stages.push(fill_stage);
        self.stages.push(apply);

        let animated = self.animate(index, &text.animation, filled, true);
        self.compose(
            index,
            animated,
            &Coord::origin(),
            &Coord::origin(),
            BlendMode::Overlay,
            Some(&text.timing),
            text.animation.kind,
            is_last,
        );
        Ok(())
    }

    fn overlay_layer(
        &mut self,
        index: usize,
        overlay: &OverlayLayer,
        is_last: bool,
    ) -> Result<(), DomainError> {
        let location = self.assets().media(&overlay.source)?;
        let kind = overlay.media_kind();
        let mut looping = overlay.looping;
        if looping && overlay.trim.is_some() && kind == MediaKind::Video {
            self.warnings.push(format!(
                "layer {}: loop is ignored because a trim window is set",
                index
            ));
            looping = false;
        }
        let mode = self.visual_mode(kind, looping);
        let trim = match kind {
            MediaKind::Video => overlay.trim,
            MediaKind::Image => None,
        };
        let input = self.add_input(format!("layer_{}", index), location, mode, trim);

        let (w, h) = match overlay.scale {
            Some(scale) => (scale.width.to_string(), scale.height.to_string()),
            None => (
                self.composition.width.to_string(),
                self.composition.height.to_string(),
            ),
        };
        let prepared = format!("ovl_{}", index);
        let mut prepare = Stage::new(StageKind::Prepare, Some(index))
            .input(Port::video(input))
            .filter(Filter::new("scale").arg(w).arg(h))
            .filter(Filter::new("setsar").arg("1"))
            .filter(Filter::new("format").arg("rgba"));
        if let Some(key) = &overlay.chroma_key {
            let color = engine_color(&key.color).ok_or_else(|| {
                DomainError::CompositionInvalid(format!(
                    "overlay layer {} has unparsable chroma key color '{}'",
                    index, key.color
                ))
            })?;
            prepare = prepare.filter(
                Filter::new("colorkey")
                    .arg(color)
                    .arg(expr::number(key.similarity))
                    .arg(expr::number(key.blend)),
            );
        }
        self.stages.push(prepare.output(prepared.as_str()));

        if self.wiring.is_mask_producer(index) {
            self.alpha_mask(index, prepared);
            self.ignore_mask_animation(index, &overlay.animation);
            return Ok(());
        }

        let mut label = prepared;
        if let Some(producer) = self.wiring.producer_of(index) {
            let masked = format!("text_{}", index);
            let apply = Stage::new(StageKind::MaskApply, Some(index))
                .input(Port::label(label))
                .input(Port::label(format!("mask_{}", producer)))
                .filter(Filter::new("alphamerge"))
                .output(masked.as_str());
            self.stages.push(apply);
            label = masked;
        }

        let movable = overlay.blend != BlendMode::Screen;
        let animated = self.animate(index, &overlay.animation, label, movable);
        self.compose(
            index,
            animated,
            &overlay.x,
            &overlay.y,
            overlay.blend,
            overlay.timing.as_ref(),
            overlay.animation.kind,
            is_last,
        );
        Ok(())
    }

    /// Turn an overlay's alpha into `mask_<index>`.
    ///
    /// When the overlay is itself masked, its alpha is intersected with the
    /// upstream mask so every mask in a chain is consumed exactly once.
    fn alpha_mask(&mut self, index: usize, prepared: String) {
        let mask = format!("mask_{}", index);
        let Some(producer) = self.wiring.producer_of(index) else {
            let extract = Stage::new(StageKind::AlphaMask, Some(index))
                .input(Port::label(prepared))
                .filter(Filter::new("alphaextract"))
                .output(mask);
            self.stages.push(extract);
            return;
        };

        let alpha = format!("alpha_{}", index);
        let extract = Stage::new(StageKind::AlphaMask, Some(index))
            .input(Port::label(prepared))
            .filter(Filter::new("alphaextract"))
            .output(alpha.as_str());
        let intersect = Stage::new(StageKind::MaskApply, Some(index))
            .input(Port::label(alpha))
            .input(Port::label(format!("mask_{}", producer)))
            .filter(Filter::new("blend").named("all_mode", "multiply"))
            .output(mask);
        self.stages.push(extract);
        self.stages.push(intersect);
    }

    /// Emit the animation stage of a layer, if any.
    ///
    /// `movable` is false for layers that must keep the canvas size and
    /// position; only the fade component applies to them.
    fn animate(&mut self, index: usize, animation: &Animation, label: String, movable: bool) -> Animated {
        let output = format!("anim_{}", index);
        let distance = animation
            .distance
            .unwrap_or_else(|| f64::from(self.composition.height) / 10.0);
        match animation.kind {
            AnimationKind::None => Animated {
                label,
                ramp: None,
                distance,
            },
            AnimationKind::Unknown => {
                let stage = Stage::new(StageKind::Passthrough, Some(index))
                    .input(Port::label(label))
                    .filter(Filter::new("null"))
                    .output(output.as_str());
                self.stages.push(stage);
                Animated {
                    label: output,
                    ramp: None,
                    distance,
                }
            }
            AnimationKind::FadeIn | AnimationKind::ScaleFadeIn | AnimationKind::Slide => {
                let total = self.composition.duration;
                let (start, duration, clipped) =
                    expr::clip_window(animation.start, animation.duration, total);
                if animation.start >= total {
                    self.warnings.push(format!(
                        "animation of layer {} starts after the composition ends",
                        index
                    ));
                } else if clipped {
                    self.warnings.push(format!(
                        "animation of layer {} is clipped to the {}s composition",
                        index, self.duration
                    ));
                }

                let mut stage = Stage::new(StageKind::Animate, Some(index))
                    .input(Port::label(label))
                    .filter(
                        Filter::new("fade")
                            .named("t", "in")
                            .named("st", expr::seconds(start))
                            .named("d", expr::seconds(duration))
                            .named("alpha", "1"),
                    );

                let motion = animation.kind != AnimationKind::FadeIn;
                if motion && !movable {
                    self.warnings.push(format!(
                        "layer {}: only the fade of {:?} applies to screen-blended layers",
                        index, animation.kind
                    ));
                }
                let ramp = (motion && movable).then(|| expr::ramp(start, duration));
                if animation.kind == AnimationKind::ScaleFadeIn {
                    if let Some(ramp) = &ramp {
                        let factor = format!("(0.8+0.2*{})", ramp);
                        stage = stage.filter(
                            Filter::new("scale")
                                .named("w", quoted(&format!("iw*{}", factor)))
                                .named("h", quoted(&format!("ih*{}", factor)))
                                .named("eval", "frame"),
                        );
                    }
                }

                self.stages.push(stage.output(output.as_str()));
                Animated {
                    label: output,
                    ramp,
                    distance,
                }
            }
        }
    }

    fn ignore_mask_animation(&mut self, index: usize, animation: &Animation) {
        if animation.kind != AnimationKind::None {
            self.warnings.push(format!(
                "animation of layer {} is ignored because the layer is used as a mask",
                index
            ));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compose(
        &mut self,
        index: usize,
        layer: Animated,
        x: &Coord,
        y: &Coord,
        blend: BlendMode,
        timing: Option<&Timing>,
        kind: AnimationKind,
        is_last: bool,
    ) {
        let output = if is_last {
            VIDEO_OUT.to_string()
        } else {
            format!("tmp_{}", index)
        };
        let gate = timing.and_then(expr::gate).map(|g| quoted(&g));

        let filter = match blend {
            BlendMode::Screen => {
                self.premultiply(&layer.label);
                Filter::new("blend")
                    .named("all_mode", "screen")
                    .named_opt("enable", gate)
            }
            BlendMode::Overlay | BlendMode::Alphamerge => {
                let (x, y) = match (&layer.ramp, kind) {
                    (Some(_), AnimationKind::ScaleFadeIn) => (
                        quoted(&format!("(W-w)/2+{}", coord_term(x))),
                        quoted(&format!("(H-h)/2+{}", coord_term(y))),
                    ),
                    (Some(ramp), AnimationKind::Slide) => (
                        coord(x),
                        quoted(&format!(
                            "{}+{}*(1-{})",
                            coord_term(y),
                            expr::number(layer.distance),
                            ramp
                        )),
                    ),
                    _ => (coord(x), coord(y)),
                };
                Filter::new("overlay")
                    .named("x", x)
                    .named("y", y)
                    .named("format", "auto")
                    .named("eof_action", "pass")
                    .named_opt("enable", gate)
            }
        };

        let stage = Stage::new(StageKind::Compose, Some(index))
            .input(Port::label(self.canvas.as_str()))
            .input(Port::label(layer.label))
            .filter(filter)
            .output(output.as_str());
        self.stages.push(stage);
        self.canvas = output;
    }

    /// Scale the color planes of `label` by its alpha.
    ///
    /// `blend` ignores alpha, so masks, chroma keys and fades only reach a
    /// screen-blended layer through its color: black leaves the canvas as is.
    fn premultiply(&mut self, label: &str) {
        let producer = self
            .stages
            .iter_mut()
            .rev()
            .find(|stage| stage.outputs.iter().any(|output| output == label));
        if let Some(stage) = producer {
            stage.filters.push(Filter::new("premultiply").named("inplace", "1"));
            stage.filters.push(Filter::new("format").arg("rgba"));
        }
    }

    fn audio(&mut self, audio: &AudioTrack) -> Result<String, DomainError> {
        let location = self.assets().media(&audio.source)?;
        let mut looping = audio.looping;
        if looping && audio.trim.is_some() {
            self.warnings
                .push("audio loop is ignored because a trim window is set".to_string());
            looping = false;
        }
        let mode = if looping {
            InputMode::StreamLoop
        } else {
            InputMode::Once
        };
        let input = self.add_input("audio".to_string(), location, mode, None);

        let total = self.composition.duration;
        let mut filters = Vec::new();
        let mut audible = total;
        if let Some(trim) = &audio.trim {
            filters.push(
                Filter::new("atrim")
                    .named("start", expr::seconds(trim.start))
                    .named("end", expr::seconds(trim.end)),
            );
            filters.push(Filter::new("asetpts").arg("PTS-STARTPTS"));
            audible = audible.min(trim.length());
        }
        if audio.fade_in > 0.0 {
            filters.push(
                Filter::new("afade")
                    .named("t", "in")
                    .named("st", "0.000")
                    .named("d", expr::seconds(audio.fade_in.min(audible))),
            );
        }
        if audio.fade_out > 0.0 {
            let fade = audio.fade_out.min(audible);
            filters.push(
                Filter::new("afade")
                    .named("t", "out")
                    .named("st", expr::seconds(audible - fade))
                    .named("d", expr::seconds(fade)),
            );
        }
        if (audio.volume - 1.0).abs() > f64::EPSILON {
            filters.push(Filter::new("volume").arg(expr::number(audio.volume)));
        }
        if filters.is_empty() {
            filters.push(Filter::new("anull"));
        }

        let mut stage = Stage::new(StageKind::Audio, None).input(Port::audio(input));
        for filter in filters {
            stage = stage.filter(filter);
        }
        self.stages.push(stage.output(AUDIO_OUT));
        Ok(AUDIO_OUT.to_string())
    }

    fn check_window(&mut self, index: usize, layer: &Layer) {
        if let Some(timing) = layer.timing() {
            let total = self.composition.duration;
            if timing.is_outside(total) {
                self.warnings.push(format!(
                    "layer {} is never visible within the {}s composition",
                    index, self.duration
                ));
            } else if let Some(end) = timing.end().filter(|end| *end > total) {
                self.warnings.push(format!(
                    "layer {} window ends at {}s, after the {}s composition",
                    index,
                    expr::seconds(end),
                    self.duration
                ));
            }
        }
    }
}

/// Coordinate as a filter option value
fn coord(value: &Coord) -> String {
    match value {
        Coord::Pixels(px) => px.to_string(),
        Coord::Formula(formula) => quoted(formula),
    }
}

/// Coordinate as a term inside a larger expression
fn coord_term(value: &Coord) -> String {
    match value {
        Coord::Pixels(px) => format!("({})", px),
        Coord::Formula(formula) => format!("({})", formula),
    }
}
