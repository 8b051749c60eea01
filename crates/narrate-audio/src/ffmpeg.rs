//! Media engine that shells out to the `ffmpeg` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use narrate_core::{EncodeSpec, FadeCurve, Filter, MediaEngine, MediaError, OutputFormat, StitchSpec};
use tokio::process::Command;
use tracing::debug;

/// Default loudness range passed to `loudnorm`.
const LOUDNORM_LRA: f32 = 11.0;

/// `ffmpeg`-backed media engine.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: Option<PathBuf>,
}

impl FfmpegEngine {
    /// Locate `ffmpeg` on `PATH`. A missing binary makes every operation
    /// return [`MediaError::Unavailable`].
    pub fn discover() -> Self {
        Self {
            binary: which::which("ffmpeg").ok(),
        }
    }

    /// Use an explicit binary path.
    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(path.into()),
        }
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    fn require_binary(&self) -> Result<&Path, MediaError> {
        self.binary
            .as_deref()
            .ok_or_else(|| MediaError::Unavailable("ffmpeg not found on PATH".to_string()))
    }

    async fn run(&self, args: &[String]) -> Result<(), MediaError> {
        let binary = self.require_binary()?;
        debug!(target: "narrate.audio", binary = %binary.display(), ?args, "Running ffmpeg");

        let output = Command::new(binary)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::Unavailable(format!("{}: {e}", binary.display()))
                } else {
                    MediaError::Failed(format!("Failed to spawn ffmpeg: {e}"))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
            return Err(MediaError::Failed(format!(
                "ffmpeg exited with {}: {tail}",
                output.status
            )));
        }
        Ok(())
    }
}

fn scratch_dir() -> Result<tempfile::TempDir, MediaError> {
    tempfile::Builder::new()
        .prefix("narrate-ffmpeg-")
        .tempdir()
        .map_err(|e| MediaError::Failed(format!("Failed to create scratch dir: {e}")))
}

async fn write_input(path: &Path, bytes: &[u8]) -> Result<(), MediaError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| MediaError::Failed(format!("Failed to write {}: {e}", path.display())))
}

async fn read_output(path: &Path) -> Result<Vec<u8>, MediaError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| MediaError::Failed(format!("Failed to read {}: {e}", path.display())))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

const fn channel_layout(channels: u16) -> &'static str {
    if channels <= 1 { "mono" } else { "stereo" }
}

const fn fade_curve_name(curve: FadeCurve) -> &'static str {
    match curve {
        FadeCurve::EqualPower => "qsin",
        FadeCurve::Triangular => "tri",
    }
}

/// Render one filter as an ffmpeg audio filter expression.
#[must_use]
pub fn filter_expression(filter: &Filter) -> String {
    match *filter {
        Filter::HighPass { cutoff_hz } => format!("highpass=f={cutoff_hz}"),
        Filter::DeEss {
            frequency_hz,
            cut_db,
            q,
        } => format!("equalizer=f={frequency_hz}:t=q:w={q}:g=-{}", cut_db.abs()),
        Filter::Compressor {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            makeup_db,
        } => format!(
            "acompressor=threshold={:.6}:ratio={ratio}:attack={attack_ms}:release={release_ms}:makeup={:.4}",
            db_to_linear(threshold_db).clamp(0.000_976_563, 1.0),
            db_to_linear(makeup_db).clamp(1.0, 64.0),
        ),
        Filter::LoudNorm {
            target_lufs,
            true_peak_db,
        } => format!("loudnorm=I={target_lufs}:TP={true_peak_db}:LRA={LOUDNORM_LRA}"),
    }
}

/// Build the `-filter_complex` graph for a crossfade stitch.
///
/// Every input is first conformed to the target rate and layout, then the
/// inputs are chained pairwise through `acrossfade`.
#[must_use]
pub fn crossfade_graph(inputs: usize, spec: &StitchSpec) -> String {
    let format = format!(
        "aformat=sample_fmts=fltp:sample_rates={}:channel_layouts={}",
        spec.sample_rate,
        channel_layout(spec.channels)
    );
    let mut parts: Vec<String> = (0..inputs)
        .map(|i| format!("[{i}:a]{format}[c{i}]"))
        .collect();

    if inputs == 1 {
        parts.push("[c0]anull[out]".to_string());
        return parts.join(";");
    }

    let seconds = spec.crossfade.as_secs_f64();
    let curve = fade_curve_name(spec.curve);
    let mut previous = "c0".to_string();
    for i in 1..inputs {
        let label = if i + 1 == inputs {
            "out".to_string()
        } else {
            format!("x{i}")
        };
        parts.push(format!(
            "[{previous}][c{i}]acrossfade=d={seconds:.3}:c1={curve}:c2={curve}[{label}]"
        ));
        previous = label;
    }
    parts.join(";")
}

fn codec_args(spec: &EncodeSpec) -> Vec<String> {
    let mut args = vec![
        "-ar".to_string(),
        spec.sample_rate.to_string(),
        "-ac".to_string(),
        spec.channels.to_string(),
    ];
    match spec.format {
        OutputFormat::Wav => args.extend(["-c:a".to_string(), "pcm_s16le".to_string()]),
        OutputFormat::Mp3 => args.extend([
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", spec.bitrate_kbps),
        ]),
        OutputFormat::Flac => args.extend(["-c:a".to_string(), "flac".to_string()]),
    }
    args
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn is_available(&self) -> bool {
        self.binary.as_deref().is_some_and(Path::exists)
    }

    async fn crossfade(&self, inputs: &[Vec<u8>], spec: &StitchSpec) -> Result<Vec<u8>, MediaError> {
        if inputs.is_empty() {
            return Err(MediaError::InvalidInput("no inputs to crossfade".to_string()));
        }
        self.require_binary()?;
        let dir = scratch_dir()?;

        let mut args = Vec::with_capacity(inputs.len() * 2 + 8);
        for (i, bytes) in inputs.iter().enumerate() {
            let path = dir.path().join(format!("in{i:04}.wav"));
            write_input(&path, bytes).await?;
            args.push("-i".to_string());
            args.push(path_arg(&path));
        }
        let out = dir.path().join("stitched.wav");
        args.extend([
            "-filter_complex".to_string(),
            crossfade_graph(inputs.len(), spec),
            "-map".to_string(),
            "[out]".to_string(),
            "-c:a".to_string(),
            "pcm_f32le".to_string(),
            path_arg(&out),
        ]);

        self.run(&args).await?;
        read_output(&out).await
    }

    async fn apply_filters(&self, input: &[u8], filters: &[Filter]) -> Result<Vec<u8>, MediaError> {
        self.require_binary()?;
        let dir = scratch_dir()?;
        let src = dir.path().join("in.wav");
        let out = dir.path().join("filtered.wav");
        write_input(&src, input).await?;

        let mut args = vec!["-i".to_string(), path_arg(&src)];
        if !filters.is_empty() {
            let chain: Vec<String> = filters.iter().map(filter_expression).collect();
            args.push("-af".to_string());
            args.push(chain.join(","));
        }
        args.extend(["-c:a".to_string(), "pcm_f32le".to_string(), path_arg(&out)]);

        self.run(&args).await?;
        read_output(&out).await
    }

    async fn encode(&self, input: &[u8], spec: &EncodeSpec) -> Result<Vec<u8>, MediaError> {
        self.require_binary()?;
        let dir = scratch_dir()?;
        let src = dir.path().join("in.wav");
        let out = dir.path().join(format!("encoded.{}", spec.format.extension()));
        write_input(&src, input).await?;

        let mut args = vec!["-i".to_string(), path_arg(&src)];
        args.extend(codec_args(spec));
        args.push(path_arg(&out));

        self.run(&args).await?;
        read_output(&out).await
    }
}
