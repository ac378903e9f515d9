// Domain rules - Composition validation and mask wiring policy

use std::collections::{BTreeMap, HashMap};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::AssetPort;

/// Characters that would break out of a quoted filter expression or start a
/// new filter option once the quotes are stripped
const FORMULA_FORBIDDEN: &[char] = &['\'', '\\', ';', '[', ']', ':'];

/// Asset locations resolved during validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAssets {
    pub fonts: BTreeMap<String, String>,
    pub media: BTreeMap<String, String>,
}

impl ResolvedAssets {
    pub fn font(&self, font_id: &str) -> Result<&str, DomainError> {
        self.fonts.get(font_id).map(String::as_str).ok_or_else(|| {
            DomainError::CompositionInvalid(format!("font '{}' was not resolved", font_id))
        })
    }

    pub fn media(&self, source: &str) -> Result<&str, DomainError> {
        self.media.get(source).map(String::as_str).ok_or_else(|| {
            DomainError::CompositionInvalid(format!("media '{}' was not resolved", source))
        })
    }
}

/// Outcome of a successful validation
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub assets: ResolvedAssets,
    pub warnings: Vec<String>,
}

/// Which layer feeds which layer's mask.
///
/// A layer referenced as a mask is a mask producer: its output is consumed by
/// exactly one overlay and it is not composited on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskWiring {
    producer_of: Vec<Option<usize>>,
    consumer_of: Vec<Option<usize>>,
}

impl MaskWiring {
    /// Resolve mask references by layer id, failing fast on any miswiring
    pub fn resolve(layers: &[Layer]) -> Result<Self, DomainError> {
        let mut ids: HashMap<&str, usize> = HashMap::new();
        let mut producer_of = vec![None; layers.len()];
        let mut consumer_of = vec![None; layers.len()];

        for (index, layer) in layers.iter().enumerate() {
            if let Layer::Overlay(overlay) = layer {
                match overlay.mask.as_deref() {
                    Some(mask_id) => {
                        let producer = *ids.get(mask_id).ok_or_else(|| {
                            DomainError::CompositionInvalid(format!(
                                "layer {} masks with '{}', which is not a layer declared before it",
                                index, mask_id
                            ))
                        })?;
                        if let Some(other) = consumer_of[producer] {
                            return Err(DomainError::CompositionInvalid(format!(
                                "mask '{}' is already consumed by layer {}; layer {} needs its own producer",
                                mask_id, other, index
                            )));
                        }
                        producer_of[index] = Some(producer);
                        consumer_of[producer] = Some(index);
                    }
                    None if overlay.blend == BlendMode::Alphamerge => {
                        return Err(DomainError::CompositionInvalid(format!(
                            "layer {} uses alphamerge but no upstream mask producer is wired",
                            index
                        )));
                    }
                    None => {}
                }
            }

            if let Some(id) = layer.id() {
                if ids.insert(id, index).is_some() {
                    return Err(DomainError::CompositionInvalid(format!(
                        "layer id '{}' is declared more than once",
                        id
                    )));
                }
            }
        }

        Ok(Self {
            producer_of,
            consumer_of,
        })
    }

    /// Mask producer feeding the given layer
    pub fn producer_of(&self, index: usize) -> Option<usize> {
        self.producer_of.get(index).copied().flatten()
    }

    /// Layer consuming the given layer as a mask
    pub fn consumer_of(&self, index: usize) -> Option<usize> {
        self.consumer_of.get(index).copied().flatten()
    }

    pub fn is_mask_producer(&self, index: usize) -> bool {
        self.consumer_of(index).is_some()
    }
}

/// Validates compositions before they are compiled or submitted
pub struct CompositionValidator<'a> {
    assets: &'a dyn AssetPort,
}

impl<'a> CompositionValidator<'a> {
    pub fn new(assets: &'a dyn AssetPort) -> Self {
        Self { assets }
    }

    /// Validate a composition and resolve every asset it references.
    ///
    /// Timing windows that fall outside the composition are not errors; the
    /// compiler reports them as warnings.
    pub fn validate(&self, composition: &Composition) -> Result<Validated, DomainError> {
        let mut warnings = Vec::new();
        let mut resolved = ResolvedAssets::default();

        Self::check_canvas(composition)?;
        let wiring = MaskWiring::resolve(&composition.layers)?;

        self.resolve_media(&composition.background.source, &mut resolved)?;

        for (index, layer) in composition.layers.iter().enumerate() {
            match layer {
                Layer::Text(text) => {
                    Self::check_text(index, text)?;
                    if !resolved.fonts.contains_key(&text.font) {
                        let location = self.assets.resolve_font(&text.font)?;
                        resolved.fonts.insert(text.font.clone(), location);
                    }
                }
                Layer::Overlay(overlay) => {
                    Self::check_overlay(index, overlay)?;
                    Self::check_canvas_sized(index, overlay, &wiring)?;
                    self.resolve_media(&overlay.source, &mut resolved)?;
                }
            }

            if let Some(timing) = layer.timing() {
                Self::check_timing(index, timing)?;
            }
            Self::check_animation(index, layer.animation())?;
        }

        if let Some(audio) = &composition.audio {
            Self::check_audio(composition, audio, &mut warnings)?;
            self.resolve_media(&audio.source, &mut resolved)?;
        }

        Ok(Validated {
            assets: resolved,
            warnings,
        })
    }

    fn resolve_media(&self, source: &str, resolved: &mut ResolvedAssets) -> Result<(), DomainError> {
        if !resolved.media.contains_key(source) {
            let location = self.assets.resolve_media(source)?;
            resolved.media.insert(source.to_string(), location);
        }
        Ok(())
    }

    fn check_canvas(composition: &Composition) -> Result<(), DomainError> {
        if composition.width == 0 || composition.height == 0 {
            return Err(invalid("canvas dimensions must be positive"));
        }
        if composition.width % 2 != 0 || composition.height % 2 != 0 {
            return Err(invalid(format!(
                "canvas {}x{} must have even dimensions for yuv420p output",
                composition.width, composition.height
            )));
        }
        if !composition.duration.is_finite() || composition.duration <= 0.0 {
            return Err(invalid("duration must be a positive number of seconds"));
        }
        if composition.fps == 0 {
            return Err(invalid("fps must be positive"));
        }
        Ok(())
    }

    fn check_text(index: usize, text: &TextLayer) -> Result<(), DomainError> {
        if text.text.trim().is_empty() {
            return Err(invalid(format!("text layer {} has no content", index)));
        }
        if text.size == 0 {
            return Err(invalid(format!("text layer {} has zero font size", index)));
        }
        if engine_color(&text.color).is_none() {
            return Err(invalid(format!(
                "text layer {} has unparsable color '{}'",
                index, text.color
            )));
        }
        check_coord(index, &text.x)?;
        check_coord(index, &text.y)
    }

    fn check_overlay(index: usize, overlay: &OverlayLayer) -> Result<(), DomainError> {
        if overlay.source.trim().is_empty() {
            return Err(invalid(format!("overlay layer {} has no source", index)));
        }
        if let Some(trim) = &overlay.trim {
            check_trim(&format!("layer {}", index), trim)?;
        }
        if let Some(key) = &overlay.chroma_key {
            if engine_color(&key.color).is_none() {
                return Err(invalid(format!(
                    "overlay layer {} has unparsable chroma key color '{}'",
                    index, key.color
                )));
            }
            if !(key.similarity > 0.0 && key.similarity <= 1.0) {
                return Err(invalid(format!(
                    "overlay layer {} chroma key similarity must lie in (0, 1]",
                    index
                )));
            }
            if !(0.0..=1.0).contains(&key.blend) {
                return Err(invalid(format!(
                    "overlay layer {} chroma key blend must lie in [0, 1]",
                    index
                )));
            }
        }
        if let Some(scale) = &overlay.scale {
            let bad = |v: i32| v == 0 || v < -1;
            if bad(scale.width) || bad(scale.height) || (scale.width == -1 && scale.height == -1) {
                return Err(invalid(format!(
                    "overlay layer {} has invalid scale {}x{}",
                    index, scale.width, scale.height
                )));
            }
        }
        check_coord(index, &overlay.x)?;
        check_coord(index, &overlay.y)
    }

    /// Masks and screen blends combine frames pixel for pixel, so the overlay
    /// must keep the canvas size.
    fn check_canvas_sized(
        index: usize,
        overlay: &OverlayLayer,
        wiring: &MaskWiring,
    ) -> Result<(), DomainError> {
        if overlay.scale.is_none() {
            return Ok(());
        }
        let reason = if wiring.producer_of(index).is_some() {
            "is masked"
        } else if wiring.is_mask_producer(index) {
            "is used as a mask"
        } else if overlay.blend == BlendMode::Screen {
            "uses screen blending"
        } else {
            return Ok(());
        };
        Err(invalid(format!(
            "overlay layer {} {} and must not set a scale",
            index, reason
        )))
    }

    fn check_timing(index: usize, timing: &Timing) -> Result<(), DomainError> {
        if !timing.start.is_finite() || timing.start < 0.0 {
            return Err(invalid(format!("layer {} starts before zero", index)));
        }
        if let Some(duration) = timing.duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(invalid(format!(
                    "layer {} visibility window must have a positive duration",
                    index
                )));
            }
        }
        Ok(())
    }

    fn check_animation(index: usize, animation: &Animation) -> Result<(), DomainError> {
        if !animation.is_ramped() {
            return Ok(());
        }
        if !animation.start.is_finite() || animation.start < 0.0 {
            return Err(invalid(format!("animation of layer {} starts before zero", index)));
        }
        if !animation.duration.is_finite() || animation.duration <= 0.0 {
            return Err(invalid(format!(
                "animation of layer {} needs a positive duration",
                index
            )));
        }
        if let Some(distance) = animation.distance {
            if !distance.is_finite() {
                return Err(invalid(format!("slide distance of layer {} is not finite", index)));
            }
        }
        Ok(())
    }

    fn check_audio(
        composition: &Composition,
        audio: &AudioTrack,
        warnings: &mut Vec<String>,
    ) -> Result<(), DomainError> {
        if audio.source.trim().is_empty() {
            return Err(invalid("audio track has no source"));
        }
        let mut available = composition.duration;
        if let Some(trim) = &audio.trim {
            check_trim("audio track", trim)?;
            if trim.length() < composition.duration && !audio.looping {
                warnings.push(format!(
                    "audio trim covers {:.3}s of a {:.3}s composition",
                    trim.length(),
                    composition.duration
                ));
            }
            available = available.min(trim.length());
        }
        for (name, value) in [("fade_in", audio.fade_in), ("fade_out", audio.fade_out)] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("audio {} must be non-negative", name)));
            }
        }
        if !audio.volume.is_finite() || audio.volume < 0.0 {
            return Err(invalid("audio volume must be non-negative"));
        }
        if audio.fade_in + audio.fade_out > available {
            warnings.push("audio fades overlap; fade windows will be clipped".to_string());
        }
        Ok(())
    }
}

/// Validate with the given asset resolver
pub fn validate(composition: &Composition, assets: &dyn AssetPort) -> Result<Validated, DomainError> {
    CompositionValidator::new(assets).validate(composition)
}

fn invalid(message: impl Into<String>) -> DomainError {
    DomainError::CompositionInvalid(message.into())
}

fn check_coord(index: usize, coord: &Coord) -> Result<(), DomainError> {
    if let Coord::Formula(expr) = coord {
        if expr.trim().is_empty() || expr.contains(FORMULA_FORBIDDEN) {
            return Err(invalid(format!(
                "layer {} has an unsafe position formula '{}'",
                index, expr
            )));
        }
    }
    Ok(())
}

fn check_trim(owner: &str, trim: &TrimWindow) -> Result<(), DomainError> {
    if !trim.start.is_finite() || !trim.end.is_finite() || trim.start < 0.0 || trim.start >= trim.end {
        return Err(invalid(format!(
            "{} trim window must satisfy 0 <= start < end",
            owner
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
