//! Speaker output for synthesized replies

use std::io::Cursor;
use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::{Error, Result};

/// Rate the output stream runs at (`OpenAI` TTS produces 24kHz)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Frames handed to the resampler per call
const RESAMPLE_CHUNK: usize = 1024;

/// Time left for the device to flush its last buffer
const TAIL: Duration = Duration::from_millis(100);

fn audio_err(e: impl std::fmt::Display) -> Error {
    Error::Audio(e.to_string())
}

/// Mono audio decoded from a TTS response
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays mono audio on the default output device
///
/// Only the negotiated stream configuration is kept; the device itself is
/// looked up per playback, so the handle can move between threads.
#[derive(Debug, Clone)]
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Negotiate a float output config at [`PLAYBACK_SAMPLE_RATE`]
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if there is no output device or it cannot run
    /// at that rate
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let rate = SampleRate(PLAYBACK_SAMPLE_RATE);
        let config = device
            .supported_output_configs()
            .map_err(audio_err)?
            .filter(|c| {
                c.sample_format() == SampleFormat::F32
                    && c.min_sample_rate() <= rate
                    && c.max_sample_rate() >= rate
            })
            .min_by_key(cpal::SupportedStreamConfigRange::channels)
            .map(|c| c.with_sample_rate(rate).config())
            .ok_or_else(|| {
                Error::Audio(format!("output device cannot play {PLAYBACK_SAMPLE_RATE} Hz"))
            })?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "output device selected"
        );

        Ok(Self { config })
    }

    /// Decode and play an MP3, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3_blocking(&self, mp3: &[u8]) -> Result<()> {
        let decoded = decode_mp3(mp3)?;
        let samples = resample(decoded.samples, decoded.sample_rate, PLAYBACK_SAMPLE_RATE)?;
        self.play_blocking(samples)
    }

    /// Play mono samples at [`PLAYBACK_SAMPLE_RATE`], blocking until done
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the stream cannot be built or started
    pub fn play_blocking(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("output device disappeared".to_string()))?;

        let channels = usize::from(self.config.channels);
        #[allow(clippy::cast_precision_loss)]
        let length = Duration::from_secs_f64(
            samples.len() as f64 / f64::from(PLAYBACK_SAMPLE_RATE),
        );
        let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);

        let mut remaining = samples.into_iter();
        let mut done = Some(done_tx);
        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = remaining.next().unwrap_or_else(|| {
                            if let Some(tx) = done.take() {
                                // The receiver may already have timed out
                                let _ = tx.try_send(());
                            }
                            0.0
                        });
                        frame.fill(sample);
                    }
                },
                |err| tracing::error!(error = %err, "output stream error"),
                None,
            )
            .map_err(audio_err)?;

        stream.play().map_err(audio_err)?;

        if done_rx.recv_timeout(length + Duration::from_millis(500)).is_err() {
            tracing::warn!(?length, "playback did not finish in time");
        }
        std::thread::sleep(TAIL);
        drop(stream);

        tracing::debug!(?length, "playback complete");
        Ok(())
    }
}

/// Decode MP3 bytes to mono samples at the stream's own rate
///
/// # Errors
///
/// Returns `Error::Audio` if the data is not valid MP3
pub fn decode_mp3(mp3: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3));
    let mut audio = DecodedAudio::default();

    loop {
        let frame = match decoder.next_frame() {
            Ok(frame) => frame,
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        };

        if let Ok(rate) = u32::try_from(frame.sample_rate) {
            audio.sample_rate = rate;
        }
        let channels = frame.channels.max(1);
        #[allow(clippy::cast_precision_loss)]
        let scale = 32768.0 * channels as f32;
        audio.samples.extend(
            frame
                .data
                .chunks(channels)
                .map(|pcm| pcm.iter().copied().map(f32::from).sum::<f32>() / scale),
        );
    }

    Ok(audio)
}

/// Resample a decoded reply to the output rate; a no-op when the rates
/// match or the source rate is unknown
///
/// # Errors
///
/// Returns `Error::Audio` if the resampler rejects the ratio
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: Vec<f32>, from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || from == 0 || samples.is_empty() {
        return Ok(samples);
    }

    let mut resampler = FastFixedIn::<f32>::new(
        f64::from(to) / f64::from(from),
        1.0,
        PolynomialDegree::Cubic,
        RESAMPLE_CHUNK,
        1,
    )
    .map_err(audio_err)?;

    let expected = (samples.len() as u64 * u64::from(to) / u64::from(from)) as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay);

    let mut chunks = samples.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let mut resampled = resampler.process(&[chunk], None).map_err(audio_err)?;
        out.append(&mut resampled[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut resampled = resampler
            .process_partial(Some(&[rest]), None)
            .map_err(audio_err)?;
        out.append(&mut resampled[0]);
    }

    // Push the filter's delay line out
    while out.len() < expected + delay {
        let mut flushed = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(audio_err)?;
        if flushed[0].is_empty() {
            break;
        }
        out.append(&mut flushed[0]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::calculate_energy;

    #[test]
    fn test_decode_empty_mp3() {
        let audio = decode_mp3(&[]).unwrap();
        assert!(audio.samples.is_empty());
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1_f32, -0.2, 0.3];
        assert_eq!(resample(samples.clone(), 24000, 24000).unwrap(), samples);
        assert_eq!(resample(samples.clone(), 0, 24000).unwrap(), samples);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_resample_elevenlabs_rate() {
        // One second of a 441 Hz tone at 44.1 kHz
        let tone: Vec<f32> = (0..44_100)
            .map(|i| (std::f32::consts::TAU * 441.0 * i as f32 / 44_100.0).sin() * 0.5)
            .collect();

        let out = resample(tone, 44_100, PLAYBACK_SAMPLE_RATE).unwrap();

        assert_eq!(out.len(), PLAYBACK_SAMPLE_RATE as usize);
        // Level survives the conversion
        let energy = calculate_energy(&out[1000..23_000]);
        assert!((energy - 0.5 / 2.0_f32.sqrt()).abs() < 0.05, "{energy}");
    }
}
