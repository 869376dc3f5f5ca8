//! Microphone capture
//!
//! Whatever format the input device offers is folded down to 16 kHz mono
//! inside the stream callback, so everything downstream (segmentation,
//! WAV encoding for STT) sees a single format.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::{Error, Result};

/// Sample rate delivered to the rest of the pipeline (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Audio kept while nobody drains the buffer (30 s)
const MAX_BUFFERED: usize = SAMPLE_RATE as usize * 30;

fn audio_err(e: impl std::fmt::Display) -> Error {
    Error::Audio(e.to_string())
}

/// An open input device and its capture buffer
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<VecDeque<f32>>>,
    failed: Arc<AtomicBool>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if there is no input device or it offers no
    /// float format
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;
        let config = choose_config(&device)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            device_rate = config.sample_rate.0,
            channels = config.channels,
            "input device selected"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            failed: Arc::new(AtomicBool::new(false)),
            stream: None,
        })
    }

    /// Start the input stream; a no-op when already running
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.failed.store(false, Ordering::SeqCst);

        let buffer = Arc::clone(&self.buffer);
        let failed = Arc::clone(&self.failed);
        let mut downmixer = Downmixer::new(self.config.channels, self.config.sample_rate.0)?;
        let mut scratch = Vec::new();
        let callback_failed = Arc::clone(&self.failed);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    if let Err(e) = downmixer.process(data, &mut scratch) {
                        tracing::error!(error = %e, "input conversion failed");
                        callback_failed.store(true, Ordering::SeqCst);
                        return;
                    }
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(scratch.iter().copied());
                        let excess = buf.len().saturating_sub(MAX_BUFFERED);
                        buf.drain(..excess);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "input stream error");
                    failed.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(audio_err)?;

        stream.play().map_err(audio_err)?;
        self.stream = Some(stream);
        tracing::debug!("capture started");
        Ok(())
    }

    /// Stop the stream and drop buffered audio
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("capture stopped");
        }
        self.discard();
    }

    /// Take everything captured since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    /// Drop buffered audio
    pub fn discard(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Fail once the stream callback has reported a device error
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` after a stream error
    pub fn check_health(&self) -> Result<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(Error::Audio("input stream failed".to_string()));
        }
        Ok(())
    }
}

/// Prefer a float config that runs at 16 kHz natively; otherwise take the
/// narrowest float config at its highest rate and convert in the callback
fn choose_config(device: &Device) -> Result<StreamConfig> {
    let target = SampleRate(SAMPLE_RATE);
    let float_configs: Vec<_> = device
        .supported_input_configs()
        .map_err(audio_err)?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let native = float_configs
        .iter()
        .filter(|c| c.min_sample_rate() <= target && c.max_sample_rate() >= target)
        .min_by_key(|c| c.channels())
        .map(|c| c.clone().with_sample_rate(target).config());

    native
        .or_else(|| {
            float_configs
                .into_iter()
                .min_by_key(cpal::SupportedStreamConfigRange::channels)
                .map(|c| c.with_max_sample_rate().config())
        })
        .ok_or_else(|| Error::Audio("input device offers no float format".to_string()))
}

/// Frames handed to the resampler per call
const RESAMPLE_CHUNK: usize = 1024;

/// Folds interleaved device frames to mono and resamples to [`SAMPLE_RATE`]
struct Downmixer {
    channels: usize,
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
}

impl Downmixer {
    fn new(channels: u16, device_rate: u32) -> Result<Self> {
        let resampler = (device_rate != SAMPLE_RATE)
            .then(|| {
                FastFixedIn::new(
                    f64::from(SAMPLE_RATE) / f64::from(device_rate),
                    1.0,
                    PolynomialDegree::Cubic,
                    RESAMPLE_CHUNK,
                    1,
                )
            })
            .transpose()
            .map_err(audio_err)?;

        Ok(Self {
            channels: usize::from(channels.max(1)),
            resampler,
            pending: Vec::new(),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn process(&mut self, data: &[f32], out: &mut Vec<f32>) -> Result<()> {
        let width = self.channels as f32;
        let mono = data
            .chunks(self.channels)
            .map(|frame| frame.iter().sum::<f32>() / width);

        let Some(resampler) = self.resampler.as_mut() else {
            out.extend(mono);
            return Ok(());
        };

        self.pending.extend(mono);
        while self.pending.len() >= resampler.input_frames_next() {
            let chunk: Vec<f32> = self.pending.drain(..resampler.input_frames_next()).collect();
            let mut resampled = resampler.process(&[chunk], None).map_err(audio_err)?;
            out.append(&mut resampled[0]);
        }
        Ok(())
    }
}

/// Encode samples as a 16-bit mono WAV file for the STT upload
///
/// # Errors
///
/// Returns `Error::Audio` if encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut wav = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut wav, spec).map_err(audio_err)?;
    samples
        .iter()
        .try_for_each(|&s| writer.write_sample(to_pcm16(s)))
        .map_err(audio_err)?;
    writer.finalize().map_err(audio_err)?;

    Ok(wav.into_inner())
}

#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample * f32::from(i16::MAX)).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}
