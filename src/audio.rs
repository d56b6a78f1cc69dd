//! # Audio Decoding
//!
//! Turns an uploaded recording into the 16 kHz mono `f32` samples Whisper expects.
//!
//! ## Formats:
//! - **WAV**: parsed in-process, downmixed and resampled
//! - **Everything else** (webm/opus from browsers, ogg, mp3, m4a ...): converted by an
//!   `ffmpeg` subprocess that writes raw little-endian `f32` samples to stdout

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Cursor;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Sample rate Whisper was trained on.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decodes audio files to 16 kHz mono samples.
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    ffmpeg_path: String,
}

impl AudioDecoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Decode the file at `path`.
    pub async fn decode_file(&self, path: &Path) -> Result<Vec<f32>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read audio file {}", path.display()))?;

        if bytes.is_empty() {
            return Err(anyhow!("Audio file is empty"));
        }

        let samples = if is_wav(&bytes) {
            decode_wav(&bytes)?
        } else {
            self.decode_with_ffmpeg(path).await?
        };

        tracing::debug!(
            "Decoded {} ({:.2}s of audio)",
            path.display(),
            samples.len() as f64 / TARGET_SAMPLE_RATE as f64
        );
        Ok(samples)
    }

    async fn decode_with_ffmpeg(&self, path: &Path) -> Result<Vec<f32>> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "f32le", "-ac", "1", "-ar"])
            .arg(TARGET_SAMPLE_RATE.to_string())
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffmpeg_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("ffmpeg could not decode audio: {}", stderr.trim()));
        }

        Ok(f32le_to_samples(&output.stdout))
    }
}

/// RIFF/WAVE magic bytes.
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>> {
    let (header, data) =
        wav::read(&mut Cursor::new(bytes)).context("Failed to parse WAV audio")?;

    let interleaved: Vec<f32> = match data {
        wav::BitDepth::Eight(samples) => samples
            .into_iter()
            .map(|s| (s as f32 - 128.0) / 128.0)
            .collect(),
        wav::BitDepth::Sixteen(samples) => {
            samples.into_iter().map(|s| s as f32 / 32768.0).collect()
        }
        wav::BitDepth::TwentyFour(samples) => samples
            .into_iter()
            .map(|s| s as f32 / 8_388_608.0)
            .collect(),
        wav::BitDepth::ThirtyTwoFloat(samples) => samples,
        wav::BitDepth::Empty => Vec::new(),
    };

    let mono = downmix(&interleaved, header.channel_count as usize);
    Ok(resample(&mono, header.sampling_rate, TARGET_SAMPLE_RATE))
}

/// Reassemble raw little-endian `f32` bytes; a trailing partial sample is dropped.
pub fn f32le_to_samples(bytes: &[u8]) -> Vec<f32> {
    let usable = bytes.len() - bytes.len() % 4;
    let mut samples = vec![0.0f32; usable / 4];
    LittleEndian::read_f32_into(&bytes[..usable], &mut samples);
    samples
}

/// Average interleaved channels into one.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let fraction = (position - index as f64) as f32;
            samples[index] * (1.0 - fraction) + samples[next] * fraction
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, rate: u32, samples: Vec<i16>) -> Vec<u8> {
        let header = wav::Header::new(wav::WAV_FORMAT_PCM, channels, rate, 16);
        let mut out = Cursor::new(Vec::new());
        wav::write(header, &wav::BitDepth::Sixteen(samples), &mut out).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_wav_detection() {
        let bytes = wav_bytes(1, 16000, vec![0; 16]);
        assert!(is_wav(&bytes));
        assert!(!is_wav(b"\x1aE\xdf\xa3webm-ish"));
        assert!(!is_wav(b"RIFF"));
    }

    #[test]
    fn test_decode_stereo_wav_at_32khz() {
        // 0.5s of stereo audio, left loud and right silent
        let frames = 16000;
        let samples: Vec<i16> = (0..frames).flat_map(|_| [16384i16, 0]).collect();
        let decoded = decode_wav(&wav_bytes(2, 32000, samples)).unwrap();

        assert_eq!(decoded.len(), 8000);
        assert!(decoded.iter().all(|s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let resampled = resample(&samples, 32000, 16000);
        assert_eq!(resampled.len(), 50);
        assert_eq!(resampled[10], 20.0);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_f32le_parsing() {
        let mut bytes = Vec::new();
        for value in [0.5f32, -1.0, 0.25] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.push(0xff);
        assert_eq!(f32le_to_samples(&bytes), vec![0.5, -1.0, 0.25]);
    }

    #[tokio::test]
    async fn test_decode_missing_file_fails() {
        let decoder = AudioDecoder::new("ffmpeg");
        let result = decoder.decode_file(Path::new("/nonexistent/audio.webm")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_decode_wav_file() {
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        std::fs::write(file.path(), wav_bytes(1, 16000, vec![8192; 1600])).unwrap();

        let decoder = AudioDecoder::new("ffmpeg");
        let samples = decoder.decode_file(file.path()).await.unwrap();
        assert_eq!(samples.len(), 1600);
        assert!((samples[0] - 0.25).abs() < 1e-6);
    }
}
