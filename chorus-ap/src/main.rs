//! chorus-play - Command-line player for the Chorus mixing engine
//!
//! Loads audio files, plays them all at once through the default (or named)
//! output device, and exits when every stream has stopped. With `--render`
//! the mix is written to a WAV file instead of a device. `--list-devices`
//! prints the output device names.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use anyhow::{bail, Context, Result};
use chorus_ap::audio::{AudioOutput, ChannelLayout, SampleType, ToneSource};
use chorus_ap::playback::OfflineMixer;
use chorus_ap::{
    AudioCallbacks, AudioDecoder, AudioFormat, AudioFrame, AudioPlayer, Blob, DecoderHandle,
    ErrorKind, PlayerOptions,
};
use chorus_common::{logging, ConfigOverrides, TomlConfig};
use clap::Parser;
use tracing::{error, info, warn};

/// Frames rendered per mixer call in `--render` mode
const RENDER_BLOCK_FRAMES: usize = 1024;

/// Tone amplitude, low enough to leave headroom for other streams
const TONE_AMPLITUDE: f32 = 0.25;

/// Command-line arguments for chorus-play
#[derive(Parser, Debug)]
#[command(name = "chorus-play")]
#[command(about = "Play audio files concurrently through the Chorus mixer")]
#[command(version)]
struct Args {
    /// Audio files to play (WAV, Ogg/Vorbis)
    files: Vec<PathBuf>,

    /// Also play a sine tone at this frequency (Hz)
    #[arg(long)]
    tone: Option<f32>,

    /// Tone duration in seconds
    #[arg(long, default_value = "2.0")]
    seconds: f32,

    /// Preferred output sampling rate (Hz)
    #[arg(short, long, env = "CHORUS_RATE")]
    rate: Option<u32>,

    /// Output device name
    #[arg(short, long, env = "CHORUS_DEVICE")]
    device: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render the mix to this WAV file instead of playing it
    #[arg(long, value_name = "OUT.wav")]
    render: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CHORUS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print the output device names and exit
    #[arg(long)]
    list_devices: bool,
}

/// Counts lifecycle callbacks and wakes the main thread on each stop
#[derive(Default)]
struct StopCounter {
    stopped: Mutex<usize>,
    changed: Condvar,
}

impl StopCounter {
    /// Block until at least `count` streams have stopped.
    fn wait_for(&self, count: usize) {
        let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let _stopped = self
            .changed
            .wait_while(stopped, |stopped| *stopped < count)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl AudioCallbacks for StopCounter {
    fn on_playback_error(&self, kind: ErrorKind) {
        error!("Playback error: {:?}", kind);
    }

    fn on_playback_error_message(&self, message: &str) {
        error!("Stream failed: {}", message);
    }

    fn on_playback_started(&self) {
        info!("Stream started");
    }

    fn on_playback_stopped(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped += 1;
        info!("Stream stopped ({} so far)", *stopped);
        self.changed.notify_all();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    config
        .apply_overrides(ConfigOverrides {
            preferred_sampling_rate: args.rate,
            device: args.device.clone(),
            log_level: args.log_level.clone(),
        })
        .context("Invalid configuration")?;

    logging::init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting chorus-play v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if args.list_devices {
        for name in AudioOutput::list_devices().context("Failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let rate = config.preferred_sampling_rate;
    let preferred = AudioFormat::new(SampleType::Float32, ChannelLayout::Stereo, rate)?;
    let decoders = load_decoders(&args, &preferred)?;
    if decoders.is_empty() {
        bail!("Nothing to play: no readable files and no --tone");
    }

    let counter = Arc::new(StopCounter::default());
    let options = PlayerOptions::from(&config);

    match &args.render {
        Some(out_path) => render(counter, rate, options, &decoders, out_path),
        None => play(counter, rate, options, &decoders),
    }
}

/// Create one decoder per readable file, plus the optional tone.
fn load_decoders(args: &Args, preferred: &AudioFormat) -> Result<Vec<DecoderHandle>> {
    let mut decoders = Vec::new();

    for path in &args.files {
        let blob = match Blob::from_file(path) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        match AudioDecoder::try_create(blob, Some(preferred)) {
            Ok(decoder) => {
                info!("{}: {:?}", path.display(), decoder);
                decoders.push(DecoderHandle::new(decoder));
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    if let Some(frequency) = args.tone {
        let frames = (args.seconds.max(0.0) * preferred.sampling_rate() as f32) as u64;
        let tone = ToneSource::new(frequency, TONE_AMPLITUDE, preferred.sampling_rate(), Some(frames))
            .context("Invalid --tone")?;
        decoders.push(DecoderHandle::new(AudioDecoder::custom(Box::new(tone))));
    }

    Ok(decoders)
}

/// Play through the output device and wait for every stream to stop.
fn play(counter: Arc<StopCounter>, rate: u32, options: PlayerOptions, decoders: &[DecoderHandle]) -> Result<()> {
    let player = AudioPlayer::new(counter.clone(), rate, options).context("Failed to create audio player")?;
    if !player.has_device() {
        player.shutdown();
        bail!("No audio output device available (try --render)");
    }

    for decoder in decoders {
        player.play(decoder);
    }
    info!("Playing {} stream(s)", decoders.len());

    counter.wait_for(decoders.len());
    player.shutdown();
    info!("Playback complete");
    Ok(())
}

/// Drive the mixer offline and write the mix as 32-bit float stereo.
fn render(
    counter: Arc<StopCounter>,
    rate: u32,
    options: PlayerOptions,
    decoders: &[DecoderHandle],
    out_path: &Path,
) -> Result<()> {
    let (player, mut mixer) =
        AudioPlayer::offline(counter.clone(), rate, options).context("Failed to create offline player")?;
    for decoder in decoders {
        player.play(decoder);
    }

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(out_path, spec)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;

    let frames = render_all(&mut mixer, |frame| {
        writer.write_sample(frame.left)?;
        writer.write_sample(frame.right)
    })
    .context("Failed to write rendered audio")?;
    writer.finalize().context("Failed to finalize WAV file")?;

    drop(mixer);
    player.shutdown();
    counter.wait_for(decoders.len());

    info!(
        "Rendered {} frames ({:.2} s) to {}",
        frames,
        frames as f64 / rate as f64,
        out_path.display()
    );
    Ok(())
}

/// Mix until the active set drains, passing every frame to `sink`.
fn render_all<F>(mixer: &mut OfflineMixer, mut sink: F) -> std::result::Result<u64, hound::Error>
where
    F: FnMut(&AudioFrame) -> std::result::Result<(), hound::Error>,
{
    let mut block = vec![AudioFrame::zero(); RENDER_BLOCK_FRAMES];
    loop {
        mixer.mix(&mut block);
        for frame in &block {
            sink(frame)?;
        }
        if mixer.active_streams() == 0 {
            return Ok(mixer.frames_mixed());
        }
    }
}
