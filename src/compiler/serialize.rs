// Serializer - PipelineSpec to engine filter-graph text and arguments

use std::path::Path;

use crate::compiler::expr;
use crate::compiler::*;

/// Render the stage list as a filter-graph description
pub fn filter_graph(spec: &PipelineSpec) -> String {
    spec.stages
        .iter()
        .map(stage_text)
        .collect::<Vec<_>>()
        .join(";")
}

/// Build the full engine argument list writing to `output`.
///
/// Arguments are passed to the engine directly, never through a shell.
pub fn engine_args(spec: &PipelineSpec, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for input in &spec.inputs {
        match &input.mode {
            InputMode::Once => {}
            InputMode::LoopStill { duration } => {
                args.extend(["-loop".to_string(), "1".to_string()]);
                args.extend(["-t".to_string(), expr::seconds(*duration)]);
            }
            InputMode::StreamLoop => {
                args.extend(["-stream_loop".to_string(), "-1".to_string()]);
            }
        }
        if let Some(trim) = &input.trim {
            args.extend(["-ss".to_string(), expr::seconds(trim.start)]);
            args.extend(["-t".to_string(), expr::seconds(trim.length())]);
        }
        args.extend(["-i".to_string(), input.location.clone()]);
    }

    args.extend(["-filter_complex".to_string(), filter_graph(spec)]);
    args.extend(["-map".to_string(), format!("[{}]", spec.video_out)]);
    if let Some(audio) = &spec.audio_out {
        args.extend(["-map".to_string(), format!("[{}]", audio)]);
    }

    let params = &spec.output;
    args.extend(["-c:v".to_string(), params.video_codec.clone()]);
    args.extend(["-preset".to_string(), params.preset.clone()]);
    args.extend(["-crf".to_string(), params.crf.to_string()]);
    args.extend(["-pix_fmt".to_string(), params.pixel_format.clone()]);
    args.extend(["-r".to_string(), params.fps.to_string()]);
    if let Some(codec) = &params.audio_codec {
        args.extend(["-c:a".to_string(), codec.clone()]);
    }
    if let Some(bitrate) = &params.audio_bitrate {
        args.extend(["-b:a".to_string(), bitrate.clone()]);
    }
    args.extend(["-t".to_string(), expr::seconds(params.duration)]);
    if params.faststart {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    args.push(output.to_string_lossy().to_string());
    args
}

/// Shell-style rendering of a command line, for display only
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

fn stage_text(stage: &Stage) -> String {
    let mut text = String::new();
    for port in &stage.inputs {
        text.push('[');
        match port {
            Port::Input { index, stream } => {
                let stream = match stream {
                    StreamKind::Video => "v",
                    StreamKind::Audio => "a",
                };
                text.push_str(&format!("{}:{}", index, stream));
            }
            Port::Label(label) => text.push_str(label),
        }
        text.push(']');
    }
    text.push_str(
        &stage
            .filters
            .iter()
            .map(filter_text)
            .collect::<Vec<_>>()
            .join(","),
    );
    for output in &stage.outputs {
        text.push_str(&format!("[{}]", output));
    }
    text
}

fn filter_text(filter: &Filter) -> String {
    if filter.args.is_empty() {
        return filter.name.clone();
    }
    let args = filter
        .args
        .iter()
        .map(|arg| match arg {
            FilterArg::Value(value) => value.clone(),
            FilterArg::Named { key, value } => format!("{}={}", key, value),
        })
        .collect::<Vec<_>>()
        .join(":");
    format!("{}={}", filter.name, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::*;
    use crate::domain::rules::ResolvedAssets;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn assets() -> ResolvedAssets {
        let mut fonts = BTreeMap::new();
        fonts.insert("Tourney".to_string(), "/fonts/Tourney.ttf".to_string());
        let mut media = BTreeMap::new();
        media.insert("bg.png".to_string(), "/assets/bg.png".to_string());
        media.insert("song.mp3".to_string(), "/assets/song.mp3".to_string());
        ResolvedAssets { fonts, media }
    }

    fn spec(composition: &Composition) -> PipelineSpec {
        compile(composition, &assets(), &EncoderPresets::default())
            .unwrap()
            .spec
    }

    #[test]
    fn test_background_only_graph() {
        let composition = Composition::new(1080, 1920, 4.0, Background::new("bg.png"));
        assert_eq!(
            filter_graph(&spec(&composition)),
            "[0:v]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,setsar=1,fps=30,format=rgba[outv]"
        );
    }

    #[test]
    fn test_glyph_mask_text() {
        let composition = Composition::new(1080, 1920, 4.0, Background::new("bg.png"))
            .with_layer(TextLayer::new("it's on", "Tourney", 120).with_timing(Timing::window(0.0, 2.0)));
        let graph = filter_graph(&spec(&composition));
        assert!(graph.contains(
            "color=c=black:s=1080x1920:d=4.000:r=30,format=gray,drawtext=fontfile=/fonts/Tourney.ttf:text=it\\\\\\'s on:expansion=none"
        ));
        assert!(graph.contains("enable='gte(t,0.000)*lt(t,2.000)'[mask_0]"));
        assert!(graph.contains("[fill_0][mask_0]alphamerge[text_0]"));
        assert!(graph.contains("[bg][text_0]overlay=x=0:y=0:format=auto:eof_action=pass"));
    }

    #[test]
    fn test_engine_args_layout() {
        let mut audio = AudioTrack::new("song.mp3");
        audio.looping = true;
        let composition =
            Composition::new(1080, 1920, 4.0, Background::new("bg.png")).with_audio(audio);
        let args = engine_args(&spec(&composition), &PathBuf::from("/out/job.mp4"));

        assert_eq!(&args[..3], ["-hide_banner", "-nostdin", "-y"]);
        assert_eq!(&args[3..9], ["-loop", "1", "-t", "4.000", "-i", "/assets/bg.png"]);
        assert_eq!(&args[9..13], ["-stream_loop", "-1", "-i", "/assets/song.mp3"]);
        let maps: Vec<&String> = args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| &w[1])
            .collect();
        assert_eq!(maps, vec!["[outv]", "[outa]"]);
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));
        assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "192k"));
        assert!(args.windows(2).any(|w| w[0] == "-movflags" && w[1] == "+faststart"));
        assert_eq!(args.last().map(String::as_str), Some("/out/job.mp4"));
    }

    #[test]
    fn test_args_are_deterministic() {
        let composition = Composition::new(1080, 1920, 4.0, Background::new("bg.png"))
            .with_layer(TextLayer::new("HAPPY BIRTHDAY", "Tourney", 120));
        let output = PathBuf::from("out.mp4");
        assert_eq!(
            engine_args(&spec(&composition), &output),
            engine_args(&spec(&composition), &output)
        );
    }

    #[test]
    fn test_command_line_quoting() {
        let args = vec!["-i".to_string(), "my file.mp4".to_string(), "[outv]".to_string()];
        assert_eq!(
            command_line("ffmpeg", &args),
            "ffmpeg -i 'my file.mp4' '[outv]'"
        );
    }
}
