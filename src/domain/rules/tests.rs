// Unit tests for validation rules

#[cfg(test)]
mod tests {
    use crate::domain::errors::*;
    use crate::domain::model::*;
    use crate::domain::rules::*;
    use crate::ports::AssetPort;

    /// Resolves every asset except the ones listed as missing
    struct StubAssets {
        missing: Vec<&'static str>,
    }

    impl StubAssets {
        fn all() -> Self {
            Self { missing: vec![] }
        }
    }

    impl AssetPort for StubAssets {
        fn resolve_font(&self, font_id: &str) -> Result<String, DomainError> {
            if self.missing.contains(&font_id) {
                return Err(DomainError::CompositionInvalid(format!("unknown font {}", font_id)));
            }
            Ok(format!("/fonts/{}.ttf", font_id))
        }

        fn resolve_media(&self, source: &str) -> Result<String, DomainError> {
            if self.missing.contains(&source) {
                return Err(DomainError::CompositionInvalid(format!("missing {}", source)));
            }
            Ok(format!("/assets/{}", source))
        }
    }

    fn base() -> Composition {
        Composition::new(1080, 1920, 4.0, Background::new("bg.png"))
    }

    fn assert_invalid(result: Result<Validated, DomainError>, needle: &str) {
        match result {
            Err(DomainError::CompositionInvalid(msg)) => {
                assert!(msg.contains(needle), "'{}' does not mention '{}'", msg, needle)
            }
            other => panic!("expected CompositionInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_composition_resolves_assets() {
        let composition = base()
            .with_layer(TextLayer::new("HAPPY BIRTHDAY", "Tourney-Bold", 120).with_id("title"))
            .with_layer(OverlayLayer::new("sparkle.mp4").masked_by("title"))
            .with_audio(AudioTrack::new("song.mp3"));

        let validated = validate(&composition, &StubAssets::all()).unwrap();
        assert_eq!(validated.assets.font("Tourney-Bold").unwrap(), "/fonts/Tourney-Bold.ttf");
        assert_eq!(validated.assets.media("sparkle.mp4").unwrap(), "/assets/sparkle.mp4");
        assert_eq!(validated.assets.media.len(), 3);
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn test_unresolvable_font_is_invalid() {
        let composition = base().with_layer(TextLayer::new("hi", "NoSuchFont", 40));
        let assets = StubAssets {
            missing: vec!["NoSuchFont"],
        };
        assert_invalid(validate(&composition, &assets), "NoSuchFont");
    }

    #[test]
    fn test_canvas_rules() {
        let mut composition = base();
        composition.width = 0;
        assert_invalid(validate(&composition, &StubAssets::all()), "positive");

        let mut composition = base();
        composition.height = 1081;
        assert_invalid(validate(&composition, &StubAssets::all()), "even");

        let mut composition = base();
        composition.duration = f64::NAN;
        assert_invalid(validate(&composition, &StubAssets::all()), "duration");
    }

    #[test]
    fn test_mask_must_reference_earlier_layer() {
        let composition = base()
            .with_layer(OverlayLayer::new("sparkle.mp4").masked_by("title"))
            .with_layer(TextLayer::new("HI", "f", 40).with_id("title"));
        assert_invalid(validate(&composition, &StubAssets::all()), "declared before");
    }

    #[test]
    fn test_mask_cannot_reference_itself() {
        let composition =
            base().with_layer(OverlayLayer::new("sparkle.mp4").with_id("self").masked_by("self"));
        assert_invalid(validate(&composition, &StubAssets::all()), "declared before");
    }

    #[test]
    fn test_alphamerge_without_mask_fails_fast() {
        let composition =
            base().with_layer(OverlayLayer::new("sparkle.mp4").with_blend(BlendMode::Alphamerge));
        assert_invalid(validate(&composition, &StubAssets::all()), "no upstream mask");
    }

    #[test]
    fn test_mask_consumed_twice_is_invalid() {
        let composition = base()
            .with_layer(TextLayer::new("HI", "f", 40).with_id("title"))
            .with_layer(OverlayLayer::new("a.mp4").masked_by("title"))
            .with_layer(OverlayLayer::new("b.mp4").masked_by("title"));
        assert_invalid(validate(&composition, &StubAssets::all()), "already consumed");
    }

    #[test]
    fn test_duplicate_ids_are_invalid() {
        let composition = base()
            .with_layer(TextLayer::new("A", "f", 40).with_id("dup"))
            .with_layer(TextLayer::new("B", "f", 40).with_id("dup"));
        assert_invalid(validate(&composition, &StubAssets::all()), "more than once");
    }

    #[test]
    fn test_unsafe_formula_is_rejected() {
        let mut text = TextLayer::new("A", "f", 40);
        text.x = Coord::Formula("0'[evil]".to_string());
        let composition = base().with_layer(text);
        assert_invalid(validate(&composition, &StubAssets::all()), "unsafe position");
    }

    #[test]
    fn test_formula_cannot_smuggle_filter_options() {
        let mut text = TextLayer::new("A", "f", 40);
        text.x = Coord::Formula("10:fontcolor=red".to_string());
        let composition = base().with_layer(text);
        assert_invalid(validate(&composition, &StubAssets::all()), "unsafe position");

        let mut overlay = OverlayLayer::new("sparkle.mp4");
        overlay.y = Coord::Formula("(H-h)/2:eof_action=repeat".to_string());
        let composition = base().with_layer(overlay);
        assert_invalid(validate(&composition, &StubAssets::all()), "unsafe position");

        let mut text = TextLayer::new("A", "f", 40);
        text.x = Coord::Formula("min(w,(W-tw)/2)".to_string());
        assert!(validate(&base().with_layer(text), &StubAssets::all()).is_ok());
    }

    #[test]
    fn test_animation_needs_positive_duration() {
        let text = TextLayer::new("A", "f", 40).with_animation(Animation::fade_in(0.0, 0.0));
        let composition = base().with_layer(text);
        assert_invalid(validate(&composition, &StubAssets::all()), "positive duration");

        let unknown = TextLayer::new("A", "f", 40)
            .with_animation(Animation::new(AnimationKind::Unknown, 0.0, 0.0));
        assert!(validate(&base().with_layer(unknown), &StubAssets::all()).is_ok());
    }

    #[test]
    fn test_window_outside_composition_is_not_an_error() {
        let text = TextLayer::new("late", "f", 40).with_timing(Timing::window(10.0, 2.0));
        assert!(validate(&base().with_layer(text), &StubAssets::all()).is_ok());
    }

    #[test]
    fn test_negative_start_is_invalid() {
        let text = TextLayer::new("early", "f", 40).with_timing(Timing::starting_at(-1.0));
        assert_invalid(validate(&base().with_layer(text), &StubAssets::all()), "before zero");
    }

    #[test]
    fn test_chroma_key_bounds() {
        let mut overlay = OverlayLayer::new("confetti.mp4");
        overlay.chroma_key = Some(ChromaKey {
            color: "green".to_string(),
            similarity: 0.0,
            blend: 0.1,
        });
        assert_invalid(validate(&base().with_layer(overlay), &StubAssets::all()), "similarity");
    }

    #[test]
    fn test_audio_trim_soft_validation() {
        let mut audio = AudioTrack::new("song.mp3");
        audio.trim = Some(TrimWindow {
            start: 5.0,
            end: 7.0,
        });
        let validated = validate(&base().with_audio(audio.clone()), &StubAssets::all()).unwrap();
        assert_eq!(validated.warnings.len(), 1);
        assert!(validated.warnings[0].contains("audio trim"));

        audio.trim = Some(TrimWindow {
            start: 7.0,
            end: 5.0,
        });
        assert_invalid(validate(&base().with_audio(audio), &StubAssets::all()), "trim window");
    }

    #[test]
    fn test_missing_media_is_invalid() {
        let assets = StubAssets {
            missing: vec!["bg.png"],
        };
        assert_invalid(validate(&base(), &assets), "bg.png");
    }

    #[test]
    fn test_masked_overlay_keeps_canvas_size() {
        let mut overlay = OverlayLayer::new("sparkle.mp4").masked_by("title");
        overlay.scale = Some(Scale {
            width: 320,
            height: -1,
        });
        let composition = base()
            .with_layer(TextLayer::new("HI", "f", 40).with_id("title"))
            .with_layer(overlay);
        assert_invalid(validate(&composition, &StubAssets::all()), "is masked");

        let mut screen = OverlayLayer::new("glow.mp4").with_blend(BlendMode::Screen);
        screen.scale = Some(Scale {
            width: 320,
            height: 240,
        });
        assert_invalid(
            validate(&base().with_layer(screen), &StubAssets::all()),
            "screen blending",
        );
    }

    #[test]
    fn test_mask_wiring_lookup() {
        let layers: Vec<Layer> = vec![
            TextLayer::new("A", "f", 40).with_id("a").into(),
            TextLayer::new("B", "f", 40).into(),
            OverlayLayer::new("fx.mp4").masked_by("a").into(),
        ];
        let wiring = MaskWiring::resolve(&layers).unwrap();
        assert_eq!(wiring.producer_of(2), Some(0));
        assert_eq!(wiring.consumer_of(0), Some(2));
        assert!(wiring.is_mask_producer(0));
        assert!(!wiring.is_mask_producer(1));
    }
}
