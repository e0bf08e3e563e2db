//! Voice processing module
//!
//! Handles audio capture, speech recognition, wake word detection, and
//! speech output.

mod capture;
mod speech;
mod stt;
mod tts;
mod wake_word;

pub use capture::{
    AudioCapture, AudioSource, Microphone, PhraseSegmenter, SAMPLE_RATE, Segment, Utterance,
    calculate_energy, samples_to_wav,
};
pub use speech::{Speaker, SpeechOutput};
pub use stt::{SpeechToText, WhisperStt};
pub use tts::{CommandSynthesizer, Synthesizer};
pub use wake_word::WakeWordDetector;
