//! WAV container decoding against hand-built and hound-written files

mod helpers;

use chorus_ap::audio::{ChannelLayout, SampleType};
use chorus_ap::{AudioDecoder, AudioFrame, Blob, Error};
use helpers::{f32_payload, i16_payload, WavBuilder};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

fn decode(bytes: Vec<u8>) -> AudioDecoder {
    AudioDecoder::create(Blob::from_vec(bytes), None).expect("valid WAV")
}

/// Read until exhaustion in chunks of `max_frames`, returning every chunk size.
fn drain(decoder: &mut AudioDecoder, max_frames: usize) -> Vec<usize> {
    let mut buffer = vec![0u8; max_frames * decoder.format().bytes_per_frame()];
    let mut reads = Vec::new();
    loop {
        let frames = decoder.read(&mut buffer, max_frames).unwrap();
        if frames == 0 {
            return reads;
        }
        reads.push(frames);
    }
}

#[test]
fn test_frame_total_is_data_size_over_frame_size() {
    // 1001 bytes of stereo int16 data: 250 frames plus one stray byte
    let payload = vec![0u8; 1001];
    let bytes = WavBuilder::new().fmt(1, 2, 22050, 16).data(&payload).build();
    let mut decoder = decode(bytes);

    assert_eq!(decoder.total_frames(), Some(250));
    for max_frames in [1, 7, 64, 1000] {
        assert!(decoder.seek(0));
        let reads = drain(&mut decoder, max_frames);
        assert!(reads.iter().all(|&n| n <= max_frames));
        assert_eq!(reads.iter().sum::<usize>(), 250);
    }
}

#[test]
fn test_seek_to_end_and_past_end() {
    let bytes = WavBuilder::new()
        .fmt(1, 1, 8000, 16)
        .data(&i16_payload(&[1, 2, 3, 4, 5]))
        .build();
    let mut decoder = decode(bytes);

    assert!(decoder.seek(2));
    assert!(!decoder.seek(6));
    assert_eq!(decoder.position(), 2);

    assert!(decoder.seek(5));
    assert_eq!(drain(&mut decoder, 16), Vec::<usize>::new());

    assert!(decoder.seek(0));
    assert_eq!(drain(&mut decoder, 16), vec![5]);
}

#[test]
fn test_mono_float_44100_format() {
    let bytes = WavBuilder::new()
        .fmt(3, 1, 44100, 32)
        .data(&f32_payload(&[0.25, -0.5]))
        .build();
    let mut decoder = decode(bytes);

    let format = decoder.format();
    assert_eq!(format.channel_layout(), ChannelLayout::Mono);
    assert_eq!(format.sample_type(), SampleType::Float32);
    assert_eq!(format.sampling_rate(), 44100);

    let mut buffer = [0u8; 8];
    assert_eq!(decoder.read(&mut buffer, 2).unwrap(), 2);
    assert_eq!(AudioFrame::decode(&format, &buffer[4..]), AudioFrame::from_mono(-0.5));
}

#[test]
fn test_reads_hound_int16_stereo() {
    let spec = WavSpec {
        channels: 2,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..100i16 {
            writer.write_sample(i * 100).unwrap();
            writer.write_sample(-i * 100).unwrap();
        }
        writer.finalize().unwrap();
    }

    let mut decoder = decode(cursor.into_inner());
    let format = decoder.format();
    assert_eq!(format.sample_type(), SampleType::Int16);
    assert_eq!(format.channel_layout(), ChannelLayout::Stereo);
    assert_eq!(format.sampling_rate(), 48000);
    assert_eq!(decoder.total_frames(), Some(100));

    let mut buffer = vec![0u8; 100 * 4];
    assert_eq!(decoder.read(&mut buffer, 100).unwrap(), 100);
    let frame = AudioFrame::decode(&format, &buffer[40..44]);
    assert_eq!(frame, AudioFrame::from_stereo(1000.0 / 32768.0, -1000.0 / 32768.0));
}

#[test]
fn test_skips_unknown_and_odd_sized_chunks() {
    let bytes = WavBuilder::new()
        .chunk(b"LIST", b"abc")
        .fmt(1, 2, 8000, 16)
        .chunk(b"junk", &[9u8; 5])
        .data(&i16_payload(&[10, 20, 30, 40]))
        .build();
    let mut decoder = decode(bytes);
    assert_eq!(decoder.total_frames(), Some(2));

    let mut buffer = [0u8; 8];
    assert_eq!(decoder.read(&mut buffer, 2).unwrap(), 2);
    assert_eq!(buffer, [10, 0, 20, 0, 30, 0, 40, 0]);
}

#[test]
fn test_truncated_chunk_is_rejected() {
    let bytes = WavBuilder::new()
        .fmt(1, 2, 8000, 16)
        .truncated_chunk(b"data", 4096, &[0u8; 16])
        .build();
    assert!(matches!(
        AudioDecoder::try_create(Blob::from_vec(bytes), None),
        Err(Error::InvalidContainer(_))
    ));
}

#[test]
fn test_missing_chunks_are_rejected() {
    let no_data = WavBuilder::new().fmt(1, 2, 8000, 16).build();
    let no_fmt = WavBuilder::new().data(&[0u8; 8]).build();
    assert!(AudioDecoder::create(Blob::from_vec(no_data), None).is_none());
    assert!(AudioDecoder::create(Blob::from_vec(no_fmt), None).is_none());
}

#[test]
fn test_blobs_shorter_than_header_are_rejected() {
    let full = WavBuilder::new().fmt(1, 2, 8000, 16).data(&[0u8; 8]).build();
    for len in 0..12 {
        let blob = Blob::from_vec(full[..len].to_vec());
        assert!(AudioDecoder::create(blob, None).is_none(), "prefix of {} bytes", len);
    }
}

#[test]
fn test_unsupported_channel_count() {
    let bytes = WavBuilder::new().fmt(1, 6, 8000, 16).data(&[0u8; 24]).build();
    assert!(matches!(
        AudioDecoder::try_create(Blob::from_vec(bytes), None),
        Err(Error::UnsupportedFormat(_))
    ));
}
