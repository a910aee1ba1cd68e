//! Hex decoding and PCM16 resampling helpers.
//!
//! MiniMax returns audio as a hex string inside JSON. Decoding is done in
//! bounded windows so that one corrupt region does not discard the whole
//! payload.

use rubato::{FftFixedIn, Resampler as _};

use crate::core::tts::{TTSError, TTSResult};

/// Hex characters decoded per window (1024 bytes of PCM).
pub const HEX_WINDOW: usize = 2048;

/// Decodes a full hex string.
pub fn decode_hex(hex_str: &str) -> TTSResult<Vec<u8>> {
    hex::decode(hex_str).map_err(|e| TTSError::DecodeError(format!("invalid hex audio: {e}")))
}

/// Decodes `hex_str` in windows of `window` characters.
///
/// Each window is decoded independently; a malformed window yields an
/// `Err` entry and decoding continues with the next one. Empty input
/// produces no entries.
pub fn decode_hex_windows(hex_str: &str, window: usize) -> Vec<TTSResult<Vec<u8>>> {
    let window = window.max(2) & !1;
    hex_str
        .as_bytes()
        .chunks(window)
        .map(|part| {
            hex::decode(part).map_err(|e| {
                TTSError::DecodeError(format!("invalid hex window ({} chars): {e}", part.len()))
            })
        })
        .collect()
}

/// Resamples mono PCM16 little-endian audio from `from_rate` to `to_rate`.
///
/// Uses an FFT resampler with its output delay removed, so frame 0 of the
/// output lines up with frame 0 of the input. Samples are clipped to the i16
/// range. A trailing odd byte is ignored.
pub fn resample_pcm16(pcm: &[u8], from_rate: u32, to_rate: u32) -> TTSResult<Vec<u8>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(TTSError::InvalidConfiguration(format!(
            "cannot resample {from_rate} Hz -> {to_rate} Hz"
        )));
    }
    if from_rate == to_rate || pcm.len() < 2 {
        return Ok(pcm.to_vec());
    }

    let samples: Vec<f32> = pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();

    let resampled = resample(&samples, from_rate, to_rate)?;

    let mut out = Vec::with_capacity(resampled.len() * 2);
    for sample in resampled {
        let value = (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    Ok(out)
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> TTSResult<Vec<f32>> {
    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        1024,
        2, // sub-chunks for quality
        1, // mono
    )
    .map_err(|e| TTSError::InvalidConfiguration(format!("resampler: {e}")))?;

    let chunk_size = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let mut output = Vec::with_capacity(delay + expected_len + chunk_size);

    let mut pos = 0;
    while pos + chunk_size <= samples.len() {
        let chunk = &samples[pos..pos + chunk_size];
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| TTSError::DecodeError(format!("resample: {e}")))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
        pos += chunk_size;
    }

    // Zero-pad the tail and keep flushing until the delayed signal is complete
    let mut tail = &samples[pos..];
    while output.len() < delay + expected_len {
        let mut padded = vec![0.0f32; chunk_size];
        padded[..tail.len()].copy_from_slice(tail);
        tail = &[];

        let result = resampler
            .process(&[&padded], None)
            .map_err(|e| TTSError::DecodeError(format!("resample: {e}")))?;
        match result.first() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
            _ => break,
        }
    }

    // Output frame `delay` lines up with input frame 0
    let mut output = output.split_off(delay.min(output.len()));
    output.truncate(expected_len);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_pcm(rate: u32, samples: usize) -> Vec<u8> {
        (0..samples)
            .flat_map(|i| {
                let t = i as f32 / rate as f32;
                let v = (t * 440.0 * std::f32::consts::TAU).sin() * 16000.0;
                (v as i16).to_le_bytes()
            })
            .collect()
    }

    #[test]
    fn test_decode_hex_valid() {
        assert_eq!(decode_hex("00ff10").unwrap(), vec![0x00, 0xff, 0x10]);
        assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_hex_reencode_identity() {
        for input in ["", "00", "deadbeef", "0123456789abcdef"] {
            let bytes = decode_hex(input).unwrap();
            assert_eq!(hex::encode(bytes), input);
        }
    }

    #[test]
    fn test_decode_hex_invalid() {
        assert!(matches!(decode_hex("abc"), Err(TTSError::DecodeError(_))));
        assert!(matches!(decode_hex("zz"), Err(TTSError::DecodeError(_))));
    }

    #[test]
    fn test_windows_skip_only_malformed_window() {
        let input = format!("{}{}{}", "00".repeat(4), "zz".repeat(4), "11".repeat(4));
        let results = decode_hex_windows(&input, 8);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &vec![0u8; 4]);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), &vec![0x11u8; 4]);
    }

    #[test]
    fn test_windows_odd_tail_is_error() {
        let results = decode_hex_windows("0011223", 4);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_windows_empty_input() {
        assert!(decode_hex_windows("", HEX_WINDOW).is_empty());
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let pcm = sine_pcm(24000, 100);
        assert_eq!(resample_pcm16(&pcm, 24000, 24000).unwrap(), pcm);
    }

    #[test]
    fn test_resample_upsample_length() {
        let pcm = sine_pcm(24000, 4800);
        let out = resample_pcm16(&pcm, 24000, 48000).unwrap();
        assert_eq!(out.len(), 9600 * 2);
    }

    #[test]
    fn test_resample_downsample_length() {
        let pcm = sine_pcm(48000, 9600);
        let out = resample_pcm16(&pcm, 48000, 16000).unwrap();
        assert_eq!(out.len(), 3200 * 2);
    }

    #[test]
    fn test_resample_clips_to_i16() {
        // Full-scale square wave overshoots after filtering
        let pcm: Vec<u8> = (0..4096)
            .flat_map(|i| (if (i / 8) % 2 == 0 { i16::MAX } else { i16::MIN }).to_le_bytes())
            .collect();
        let out = resample_pcm16(&pcm, 24000, 32000).unwrap();
        assert!(!out.is_empty());
        assert_eq!(out.len() % 2, 0);
    }

    fn dc_pcm(level: i16, samples: usize) -> Vec<u8> {
        (0..samples).flat_map(|_| level.to_le_bytes()).collect()
    }

    fn to_samples(pcm: &[u8]) -> Vec<i16> {
        pcm.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_resample_keeps_signal_aligned() {
        // One decode window of constant level at the rates the clients use
        for (from, to) in [(32000, 16000), (24000, 48000), (16000, 8000), (32000, 24000)] {
            let out = to_samples(&resample_pcm16(&dc_pcm(10000, 512), from, to).unwrap());
            let expected = (512 * to / from) as usize;
            assert_eq!(out.len(), expected, "{from} -> {to}");

            // Edges ramp through the filter; the signal starts at frame 0
            assert!(out[0] > 2000, "{from} -> {to}: head {:?}", &out[..4]);
            assert!(out[out.len() - 1] > 2000, "{from} -> {to}: tail {:?}", &out[out.len() - 4..]);

            let margin = 16;
            for (i, sample) in out[margin..out.len() - margin].iter().enumerate() {
                assert!(
                    (*sample as i32 - 10000).abs() < 500,
                    "{from} -> {to}: sample {} = {}",
                    i + margin,
                    sample
                );
            }
        }
    }

    #[test]
    fn test_resample_preserves_sine_energy() {
        let pcm = sine_pcm(24000, 4800);
        let rms = |s: &[i16]| {
            (s.iter().map(|&v| (v as f64).powi(2)).sum::<f64>() / s.len() as f64).sqrt()
        };
        let input = rms(&to_samples(&pcm));
        let output = rms(&to_samples(&resample_pcm16(&pcm, 24000, 16000).unwrap()));
        assert!((output - input).abs() / input < 0.05, "rms {input} -> {output}");
    }

    #[test]
    fn test_resample_zero_rate_rejected() {
        assert!(resample_pcm16(&[0, 0], 0, 16000).is_err());
    }
}
