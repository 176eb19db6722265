//! PCM transcoding between capture format and the wire format
//!
//! The wire carries 16-bit little-endian linear PCM; capture and playback
//! use f32 samples in [-1.0, 1.0]. Both directions are pure and stateless.

use crate::{Error, Result};

/// Encode f32 samples into 16-bit little-endian PCM bytes.
///
/// Deterministic and lossless for samples already on the i16 grid; out-of-range
/// samples are clamped.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample * 32768.0).clamp(-32768.0, 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode 16-bit little-endian PCM bytes into f32 samples.
///
/// # Errors
///
/// Returns [`Error::MalformedPayload`] on empty or odd-length input. Callers
/// drop the chunk and keep the session running.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.is_empty() {
        return Err(Error::MalformedPayload("empty audio payload".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(Error::MalformedPayload(format!(
            "truncated PCM payload: {} bytes",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect())
}

/// Encode f32 samples as a mono 16-bit WAV file in memory.
///
/// Used by the hardware smoke-test commands, not by the session engine.
///
/// # Errors
///
/// Returns [`Error::Audio`] if WAV encoding fails.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;
        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(value)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }
        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_little_endian() {
        // 0.5 * 32768 = 16384 = 0x4000
        let bytes = encode_pcm16(&[0.5]);
        assert_eq!(bytes, vec![0x00, 0x40]);
    }

    #[test]
    fn encode_clamps_out_of_range() {
        let bytes = encode_pcm16(&[2.0, -2.0]);
        let values: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect();
        assert_eq!(values, vec![32767, -32768]);
    }

    #[test]
    fn decode_inverts_encode_within_grid() {
        let samples = vec![0.0, 0.25, -0.25, 0.99];
        let decoded = decode_pcm16(&encode_pcm16(&samples)).unwrap();
        for (a, b) in samples.iter().zip(&decoded) {
            assert!((a - b).abs() < 1.0 / 32768.0);
        }
    }

    #[test]
    fn decode_rejects_empty() {
        assert!(matches!(
            decode_pcm16(&[]),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn decode_rejects_odd_length() {
        assert!(matches!(
            decode_pcm16(&[0x00, 0x40, 0x7f]),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn wav_header_present() {
        let wav = samples_to_wav(&[0.0; 160], 16_000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }
}
