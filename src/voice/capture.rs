//! Audio capture from microphone
//!
//! [`AudioCapture`] owns the cpal input stream. [`Microphone`] layers phrase
//! detection on top of it: ambient calibration plus a bounded, energy-gated
//! listen that returns one [`Utterance`] per phrase.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::config::CaptureConfig;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Analysis frame (30ms at 16kHz)
const FRAME_SAMPLES: usize = 480;

/// How often a blocking listen drains the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Calibrated threshold sits this far above ambient energy
const DYNAMIC_RATIO: f32 = 1.5;

/// Raw audio captured in one listen cycle
#[derive(Debug, Clone)]
pub struct Utterance {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Utterance {
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the captured audio
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Encode as 16-bit mono WAV
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }
}

/// A source of phrases, driven from the capture thread
pub trait AudioSource {
    /// Measure ambient noise and adjust the speech threshold
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be read
    fn calibrate(&mut self, window: Duration) -> Result<()>;

    /// Block until one phrase is captured
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureTimeout`] if no phrase starts within `timeout`,
    /// or another error if the device fails
    fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Utterance>;
}

/// Failure flag shared with the cpal error callback
///
/// cpal reports a lost device only through that callback; the stream itself
/// keeps existing and simply stops delivering samples.
#[derive(Debug, Clone, Default)]
struct StreamHealth(Arc<AtomicBool>);

impl StreamHealth {
    fn mark_failed(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn has_failed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Captures audio from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
    health: StreamHealth,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            health: StreamHealth::default(),
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let health = self.health.clone();
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio capture error");
                    health.mark_failed();
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Get captured audio buffer and clear it
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Whether the stream has reported an error since it was opened
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.health.has_failed()
    }
}

/// Outcome of feeding audio to a [`PhraseSegmenter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// No speech yet
    Waiting,
    /// Inside a phrase
    Speaking,
    /// Phrase ended by trailing silence or the length cap
    Complete,
}

/// Splits a sample stream into a single phrase by frame energy
#[derive(Debug)]
pub struct PhraseSegmenter {
    threshold: f32,
    pause_samples: usize,
    limit_samples: usize,
    phrase: Vec<f32>,
    silence: usize,
    pending: Vec<f32>,
    complete: bool,
}

impl PhraseSegmenter {
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(threshold: f32, pause: Duration, phrase_limit: Duration, sample_rate: u32) -> Self {
        let to_samples = |d: Duration| (d.as_secs_f64() * f64::from(sample_rate)) as usize;
        Self {
            threshold,
            pause_samples: to_samples(pause).max(1),
            limit_samples: to_samples(phrase_limit).max(FRAME_SAMPLES),
            phrase: Vec::new(),
            silence: 0,
            pending: Vec::new(),
            complete: false,
        }
    }

    /// Feed more samples, returning where the phrase stands
    pub fn feed(&mut self, samples: &[f32]) -> Segment {
        if self.complete {
            return Segment::Complete;
        }

        self.pending.extend_from_slice(samples);
        let frames = self.pending.len() / FRAME_SAMPLES;
        let drained: Vec<f32> = self.pending.drain(..frames * FRAME_SAMPLES).collect();

        for frame in drained.chunks(FRAME_SAMPLES) {
            let loud = calculate_energy(frame) > self.threshold;

            if self.phrase.is_empty() {
                if loud {
                    self.phrase.extend_from_slice(frame);
                }
                continue;
            }

            self.phrase.extend_from_slice(frame);
            if loud {
                self.silence = 0;
            } else {
                self.silence += frame.len();
            }

            if self.silence >= self.pause_samples || self.phrase.len() >= self.limit_samples {
                self.complete = true;
                return Segment::Complete;
            }
        }

        if self.phrase.is_empty() {
            Segment::Waiting
        } else {
            Segment::Speaking
        }
    }

    /// Take the captured phrase (without its trailing silence)
    #[must_use]
    pub fn into_phrase(mut self) -> Vec<f32> {
        let keep = self.phrase.len().saturating_sub(self.silence);
        self.phrase.truncate(keep);
        self.phrase
    }
}

/// Microphone phrase source with dynamic energy threshold
pub struct Microphone {
    capture: AudioCapture,
    floor: f32,
    threshold: f32,
    pause: Duration,
}

impl Microphone {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns error if no usable input device exists
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        Ok(Self {
            capture: AudioCapture::new()?,
            floor: config.energy_threshold,
            threshold: config.energy_threshold,
            pause: config.pause,
        })
    }

    /// Replace a failed stream with a freshly opened device
    ///
    /// On failure the old capture is kept, still flagged, so the next
    /// session tries again.
    fn reopen(&mut self) -> Result<()> {
        self.capture.stop();
        self.capture = AudioCapture::new()?;
        tracing::info!("input device reopened");
        Ok(())
    }

    fn session(&mut self) -> Result<ListenSession<'_>> {
        if self.capture.has_failed() {
            self.reopen()?;
            return Err(Error::Audio("input stream failed, device reopened".to_string()));
        }
        self.capture.start()?;
        self.capture.clear_buffer();
        Ok(ListenSession {
            capture: &self.capture,
        })
    }
}

/// Scope of one listen; leftover audio is discarded on every exit path
struct ListenSession<'a> {
    capture: &'a AudioCapture,
}

impl ListenSession<'_> {
    fn take(&self) -> Result<Vec<f32>> {
        if self.capture.has_failed() {
            return Err(Error::Audio("input stream failed".to_string()));
        }
        Ok(self.capture.take_buffer())
    }
}

impl Drop for ListenSession<'_> {
    fn drop(&mut self) {
        self.capture.clear_buffer();
    }
}

impl AudioSource for Microphone {
    fn calibrate(&mut self, window: Duration) -> Result<()> {
        let floor = self.floor;
        let session = self.session()?;
        std::thread::sleep(window);
        let ambient = calculate_energy(&session.take()?);
        drop(session);

        self.threshold = (ambient * DYNAMIC_RATIO).max(floor);
        tracing::debug!(ambient, threshold = self.threshold, "ambient noise calibrated");
        Ok(())
    }

    fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Utterance> {
        let mut segmenter =
            PhraseSegmenter::new(self.threshold, self.pause, phrase_limit, SAMPLE_RATE);
        let session = self.session()?;
        let started = Instant::now();

        loop {
            std::thread::sleep(POLL_INTERVAL);
            match segmenter.feed(&session.take()?) {
                Segment::Complete => break,
                Segment::Waiting if started.elapsed() >= timeout => {
                    return Err(Error::CaptureTimeout);
                }
                Segment::Waiting | Segment::Speaking => {}
            }
        }

        let phrase = segmenter.into_phrase();
        tracing::trace!(samples = phrase.len(), "phrase captured");
        Ok(Utterance::new(phrase, SAMPLE_RATE))
    }
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
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
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
