//! Mixer Throughput Benchmark
//!
//! Renders one second of audio through the offline mixer and reports how far
//! ahead of realtime it runs.
//!
//! **Target:** >100x realtime for 8 concurrent streams

use chorus_ap::audio::ToneSource;
use chorus_ap::playback::{AudioPlayer, NoopCallbacks, PlayerOptions};
use chorus_ap::{AudioDecoder, AudioFrame, Blob, DecoderHandle};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Instant;

const RATE: u32 = 44_100;
const DEVICE_BUFFER_FRAMES: usize = 512;

/// One second of 16-bit stereo WAV
fn wav_blob() -> Blob {
    let frames = RATE as usize;
    let mut bytes = Vec::with_capacity(44 + frames * 4);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + frames as u32 * 4).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&RATE.to_le_bytes());
    bytes.extend_from_slice(&(RATE * 4).to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(frames as u32 * 4).to_le_bytes());
    for i in 0..frames {
        let sample = ((i % 200) as i16 - 100) * 100;
        bytes.extend_from_slice(&sample.to_le_bytes());
        bytes.extend_from_slice(&(-sample).to_le_bytes());
    }
    Blob::from_vec(bytes)
}

fn make_streams(count: usize, wav: &Blob) -> Vec<DecoderHandle> {
    (0..count)
        .map(|i| {
            let decoder = if i % 2 == 0 {
                AudioDecoder::create(wav.clone(), None).expect("benchmark WAV is valid")
            } else {
                let tone = ToneSource::new(220.0 * (i as f32 + 1.0), 0.1, RATE, Some(RATE as u64))
                    .expect("tone below Nyquist");
                AudioDecoder::custom(Box::new(tone))
            };
            DecoderHandle::new(decoder)
        })
        .collect()
}

fn bench_mixer_streams(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixer_throughput");
    let wav = wav_blob();

    for count in [1usize, 8] {
        group.bench_with_input(BenchmarkId::new("one_second", count), &count, |b, &count| {
            b.iter(|| {
                let (player, mut mixer) =
                    AudioPlayer::offline(Arc::new(NoopCallbacks), RATE, PlayerOptions::default())
                        .expect("valid offline player");
                for decoder in make_streams(count, &wav) {
                    player.play(&decoder);
                }

                let start = Instant::now();
                let mut block = vec![AudioFrame::zero(); DEVICE_BUFFER_FRAMES];
                for _ in 0..(RATE as usize / DEVICE_BUFFER_FRAMES) {
                    mixer.mix(&mut block);
                    black_box(&block);
                }

                let realtime_factor = 1.0 / start.elapsed().as_secs_f64();
                if count == 8 && realtime_factor < 100.0 {
                    eprintln!(
                        "WARNING: {} streams mixed at {:.2}x, below 100x realtime target",
                        count, realtime_factor
                    );
                }

                drop(mixer);
                player.shutdown();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mixer_streams);
criterion_main!(benches);
