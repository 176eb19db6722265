//! Audio pipeline integration tests
//!
//! Exercises transcoding and the playback timeline together, the way the
//! routing loop uses them: decode a network chunk, schedule it against the
//! device clock, render from the shared schedule.

use cortex_live::voice::{decode_pcm16, encode_pcm16, samples_to_wav, PlaybackScheduler};

const OUTPUT_RATE: u32 = 24_000;

fn chunk(secs: f64) -> Vec<f32> {
    vec![0.25; (secs * f64::from(OUTPUT_RATE)) as usize]
}

#[test]
fn chunks_play_back_to_back_regardless_of_arrival_time() {
    let scheduler = PlaybackScheduler::new(OUTPUT_RATE);

    // Three chunks of 0.5s, 0.3s, 0.2s arriving while the clock sits at 0
    let starts = [
        scheduler.enqueue(chunk(0.5), 0),
        scheduler.enqueue(chunk(0.3), 0),
        scheduler.enqueue(chunk(0.2), 0),
    ];

    assert!((starts[0] - 0.0).abs() < 1e-9);
    assert!((starts[1] - 0.5).abs() < 1e-9);
    assert!((starts[2] - 0.8).abs() < 1e-9);
    assert_eq!(scheduler.scheduled_count(), 3);
}

#[test]
fn first_chunk_after_silence_starts_at_the_device_clock() {
    let scheduler = PlaybackScheduler::new(OUTPUT_RATE);

    // The device has already rendered 1.0s of silence
    let start = scheduler.enqueue(chunk(0.5), u64::from(OUTPUT_RATE));
    assert!((start - 1.0).abs() < 1e-9);

    // The next chunk continues contiguously even though the clock moved on
    let start = scheduler.enqueue(chunk(0.5), u64::from(OUTPUT_RATE) + 100);
    assert!((start - 1.5).abs() < 1e-9);
}

#[test]
fn interrupt_discards_the_queue_and_restarts_cleanly() {
    let scheduler = PlaybackScheduler::new(OUTPUT_RATE);
    scheduler.enqueue(chunk(0.5), 0);
    scheduler.enqueue(chunk(0.5), 0);

    scheduler.interrupt();
    assert_eq!(scheduler.scheduled_count(), 0);

    // After interrupt, scheduling resumes from the device clock
    let start = scheduler.enqueue(chunk(0.2), 4800);
    assert!((start - 0.2).abs() < 1e-9);
}

#[test]
fn network_chunk_round_trips_into_the_schedule() {
    // The routing loop path: wire bytes, decode, enqueue, render
    let original = vec![0.5_f32, -0.5, 0.0, 0.99];
    let wire = encode_pcm16(&original);
    let samples = decode_pcm16(&wire).unwrap();

    let scheduler = PlaybackScheduler::new(OUTPUT_RATE);
    scheduler.enqueue(samples.clone(), 0);

    let shared = scheduler.shared();
    let mut out = vec![0.0_f32; 8];
    shared.lock().unwrap().render(0, &mut out);

    for (rendered, expected) in out.iter().zip(&samples) {
        assert!((rendered - expected).abs() < 1e-4);
    }
    // Past the queued chunk the output is silence
    assert!(out[4..].iter().all(|s| *s == 0.0));
}

#[test]
fn decode_rejects_odd_length_payloads() {
    assert!(decode_pcm16(&[0, 1, 2]).is_err());
    assert!(decode_pcm16(&[]).is_err());
}

#[test]
fn wav_export_carries_the_sample_rate() {
    let wav = samples_to_wav(&chunk(0.1), OUTPUT_RATE).unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    // fmt chunk sample rate field at offset 24, little-endian
    let rate = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
    assert_eq!(rate, OUTPUT_RATE);
}
