//! Voice pipeline integration tests
//!
//! Tests recognition, wake detection and speech output without audio hardware

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jarvis::voice::{
    PhraseSegmenter, SAMPLE_RATE, Segment, Synthesizer, Utterance, samples_to_wav,
};
use jarvis::{Heard, Recognizer, Result, Speaker, SpeechOutput, WakeWordDetector, WorkerPool};
use tokio_util::sync::CancellationToken;

mod common;

use common::{FakeStt, Harness, wait_until};

/// Generate sine wave audio samples
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    vec![0.0; (SAMPLE_RATE as f32 * duration_secs) as usize]
}

fn utterance() -> Utterance {
    Utterance::new(generate_sine_samples(220.0, 0.5, 0.3), SAMPLE_RATE)
}

fn detector() -> WakeWordDetector {
    WakeWordDetector::new(vec![
        "jarvis".to_string(),
        "jarvish".to_string(),
        "jarves".to_string(),
    ])
    .unwrap()
}

struct Pipeline {
    harness: Harness,
    recognizer: Recognizer,
    pool: WorkerPool,
}

fn pipeline(stt: FakeStt) -> Pipeline {
    let harness = Harness::new();
    let pool = WorkerPool::new(2, 8);
    let recognizer = Recognizer::new(
        Arc::new(stt),
        detector(),
        harness.speaker.clone(),
        harness.dispatcher.clone(),
        pool.handle(),
    );
    Pipeline {
        harness,
        recognizer,
        pool,
    }
}

#[tokio::test]
async fn test_phrase_without_wake_word_is_ignored() {
    let p = pipeline(FakeStt::hearing(&["what time is it", "open terminal please"]));

    assert_eq!(p.recognizer.handle_utterance(utterance()).await, Heard::NoWakeWord);
    assert_eq!(p.recognizer.handle_utterance(utterance()).await, Heard::NoWakeWord);
    p.pool.shutdown().await;

    assert!(p.harness.speaker.lines().is_empty());
    assert!(p.harness.launcher.apps.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wake_word_with_command_acknowledges_once_and_dispatches_once() {
    let p = pipeline(FakeStt::hearing(&["Jarvis open terminal"]));

    let heard = p.recognizer.handle_utterance(utterance()).await;
    assert_eq!(heard, Heard::Command("open terminal".to_string()));

    wait_until(|| p.harness.speaker.lines().len() == 2).await;
    assert_eq!(p.harness.speaker.lines(), ["Sure", "Opening Terminal"]);
    assert_eq!(*p.harness.launcher.apps.lock().unwrap(), ["Terminal"]);
}

#[tokio::test]
async fn test_transcriber_punctuation_does_not_reach_dispatch() {
    let p = pipeline(FakeStt::hearing(&[
        "Jarvis, open VSCode.",
        "Jarvis, search rust traits.",
    ]));

    let heard = p.recognizer.handle_utterance(utterance()).await;
    assert_eq!(heard, Heard::Command("open vscode".to_string()));
    wait_until(|| p.harness.launcher.apps.lock().unwrap().len() == 1).await;
    assert_eq!(*p.harness.launcher.apps.lock().unwrap(), ["Visual Studio Code"]);

    p.recognizer.handle_utterance(utterance()).await;
    wait_until(|| p.harness.launcher.urls.lock().unwrap().len() == 1).await;
    assert_eq!(
        *p.harness.launcher.urls.lock().unwrap(),
        ["https://www.google.com/search?q=rust%20traits"]
    );
}

#[tokio::test]
async fn test_interior_wake_word() {
    let p = pipeline(FakeStt::hearing(&["ok jarves say hello"]));

    let heard = p.recognizer.handle_utterance(utterance()).await;
    assert_eq!(heard, Heard::Command("say hello".to_string()));

    wait_until(|| p.harness.speaker.lines().len() == 2).await;
    assert_eq!(p.harness.speaker.count("Sure"), 1);
    assert_eq!(p.harness.speaker.count("Hello"), 1);
}

#[tokio::test]
async fn test_bare_wake_word_says_yes() {
    let p = pipeline(FakeStt::hearing(&["Jarvis"]));

    assert_eq!(p.recognizer.handle_utterance(utterance()).await, Heard::WakeOnly);
    p.pool.shutdown().await;

    assert_eq!(p.harness.speaker.lines(), ["Yes"]);
}

#[tokio::test]
async fn test_noise_and_failures_are_silent() {
    let stt = FakeStt::default();
    stt.transcripts.lock().unwrap().extend([
        Ok("a".to_string()),
        Ok("   ".to_string()),
        Err(jarvis::Error::Stt("service unavailable".to_string())),
        Err(jarvis::Error::NoSpeech),
    ]);
    let p = pipeline(stt);

    for _ in 0..4 {
        assert_eq!(p.recognizer.handle_utterance(utterance()).await, Heard::Nothing);
    }
    assert!(p.harness.speaker.lines().is_empty());
}

#[tokio::test]
async fn test_full_pool_drops_command() {
    let harness = Harness::new();
    let pool = WorkerPool::new(1, 1);
    let handle = pool.handle();

    let gate = CancellationToken::new();
    let (g1, g2) = (gate.clone(), gate.clone());
    handle.try_submit(async move { g1.cancelled().await }).unwrap();
    wait_until(|| handle.queued() == 0).await;
    handle.try_submit(async move { g2.cancelled().await }).unwrap();

    let recognizer = Recognizer::new(
        Arc::new(FakeStt::default()),
        detector(),
        harness.speaker.clone(),
        harness.dispatcher.clone(),
        handle,
    );

    assert_eq!(
        recognizer.handle_transcript("jarvis what time is it"),
        Heard::Dropped("what time is it".to_string())
    );
    assert_eq!(harness.speaker.count("Sure"), 0);
    assert_eq!(harness.speaker.lines(), ["Busy, try again shortly"]);
    gate.cancel();
}

/// Synthesizer that plays each line for one second and tracks overlap
#[derive(Default)]
struct TimedSynth {
    playing: AtomicUsize,
    max_playing: AtomicUsize,
    completed: Mutex<Vec<String>>,
}

#[async_trait]
impl Synthesizer for TimedSynth {
    async fn say(&self, text: &str, cancel: CancellationToken) -> Result<()> {
        let now = self.playing.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_playing.fetch_max(now, Ordering::SeqCst);

        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(1)) => {
                self.completed.lock().unwrap().push(text.to_string());
            }
            () = cancel.cancelled() => {}
        }

        self.playing.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_speak_twice_only_second_is_heard() {
    let synth = Arc::new(TimedSynth::default());
    let speech = SpeechOutput::new(synth.clone()).unwrap();

    speech.speak("Sure");
    speech.speak("It is 9 o'clock");
    speech.finish().await;

    assert_eq!(*synth.completed.lock().unwrap(), ["It is 9 o'clock"]);
    assert_eq!(synth.max_playing.load(Ordering::SeqCst), 1);
    assert!(!speech.is_speaking());
}

#[test]
fn test_segmenter_finds_phrase_between_silences() {
    let mut segmenter = PhraseSegmenter::new(
        0.05,
        Duration::from_millis(800),
        Duration::from_secs(8),
        SAMPLE_RATE,
    );

    assert_eq!(segmenter.feed(&generate_silence(0.5)), Segment::Waiting);
    assert_eq!(
        segmenter.feed(&generate_sine_samples(440.0, 1.0, 0.5)),
        Segment::Speaking
    );
    assert_eq!(segmenter.feed(&generate_silence(1.0)), Segment::Complete);

    let phrase = segmenter.into_phrase();
    let expected = generate_sine_samples(440.0, 1.0, 0.5).len();
    assert!(phrase.len() >= expected - 480 && phrase.len() <= expected + 480);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");
    assert!(wav_data.len() > 44);
}

#[test]
fn test_wav_readback() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
}
