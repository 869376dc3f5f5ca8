//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;
use std::time::Duration;

use nova_assistant::voice::{
    PhraseSet, SAMPLE_RATE, SegmentState, UtteranceSegmenter, WakeWordDetector, calculate_energy,
    clean_for_speech, extract_command, samples_to_wav,
};

/// 0.1s of audio at 16kHz
const CHUNK: usize = 1600;

/// Generate sine wave audio samples
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
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed audio in 0.1s chunks, collecting finished utterances
fn feed(segmenter: &mut UtteranceSegmenter, audio: &[f32]) -> Vec<Vec<f32>> {
    audio
        .chunks(CHUNK)
        .filter_map(|chunk| segmenter.push(chunk))
        .collect()
}

fn segmenter() -> UtteranceSegmenter {
    UtteranceSegmenter::new(Duration::from_millis(800), Duration::from_secs(8))
}

#[test]
fn test_wake_word_normalization() {
    let detector =
        WakeWordDetector::new(vec!["  Hey NOVA  ".to_string(), "NOVA".to_string()]).unwrap();

    assert_eq!(detector.wake_words(), &["hey nova", "nova"]);
    assert_eq!(detector.primary(), "hey nova");
}

#[test]
fn test_wake_word_requires_a_phrase() {
    assert!(WakeWordDetector::new(vec![]).is_err());
    assert!(WakeWordDetector::new(vec!["   ".to_string()]).is_err());
}

#[test]
fn test_wake_word_check() {
    let detector = WakeWordDetector::new(vec!["nova".to_string()]).unwrap();

    assert_eq!(detector.check_wake_word("hey nova"), Some("nova"));
    assert_eq!(detector.check_wake_word("NOVA, are you there"), Some("nova"));
    assert_eq!(detector.check_wake_word("hello there"), None);
    assert_eq!(detector.check_wake_word(""), None);
}

#[test]
fn test_extract_command() {
    assert_eq!(
        extract_command("hey nova, what time is it", "nova"),
        "what time is it"
    );
    assert_eq!(extract_command("Nova. Play music", "nova"), "play music");
    assert_eq!(extract_command("nova", "nova"), "");
    assert_eq!(extract_command("no trigger here", "nova"), "no trigger here");
}

#[test]
fn test_exit_phrases_match_anywhere() {
    let exits = PhraseSet::new(["Goodbye", "bye", ""]);

    assert_eq!(exits.phrases(), ["goodbye", "bye"]);
    assert!(exits.matches("ok goodbye nova"));
    assert!(exits.matches("BYE"));
    assert!(!exits.matches("what is the capital of france"));
    assert!(PhraseSet::new(Vec::<String>::new()).is_empty());
}

#[test]
fn test_energy() {
    assert!(calculate_energy(&[]).abs() < f32::EPSILON);
    assert!(calculate_energy(&generate_silence(0.1)).abs() < f32::EPSILON);

    // RMS of a sine is amplitude / sqrt(2)
    let energy = calculate_energy(&generate_sine_samples(440.0, 1.0, 0.5));
    assert!((energy - 0.5 / 2.0_f32.sqrt()).abs() < 0.01);
}

#[test]
fn test_utterance_ends_after_pause() {
    let mut seg = segmenter();

    assert!(feed(&mut seg, &generate_silence(0.5)).is_empty());
    assert_eq!(seg.state(), SegmentState::Waiting);

    assert!(feed(&mut seg, &generate_sine_samples(440.0, 1.0, 0.5)).is_empty());
    assert_eq!(seg.state(), SegmentState::Speaking);

    let utterances = feed(&mut seg, &generate_silence(1.5));
    assert_eq!(utterances.len(), 1);
    assert!(utterances[0].len() >= SAMPLE_RATE as usize);
    assert_eq!(seg.state(), SegmentState::Waiting);
}

#[test]
fn test_phrase_limit_cuts_long_speech() {
    let mut seg = UtteranceSegmenter::new(Duration::from_millis(800), Duration::from_secs(2));

    let utterances = feed(&mut seg, &generate_sine_samples(440.0, 5.0, 0.5));

    assert_eq!(utterances.len(), 2);
    assert!(
        utterances
            .iter()
            .all(|u| u.len() == 2 * SAMPLE_RATE as usize)
    );
}

#[test]
fn test_shorter_phrase_limit_applies_to_next_utterance() {
    let mut seg = segmenter();
    seg.set_phrase_limit(Duration::from_secs(1));

    let utterances = feed(&mut seg, &generate_sine_samples(440.0, 1.5, 0.5));
    assert_eq!(utterances.len(), 1);
    assert_eq!(utterances[0].len(), SAMPLE_RATE as usize);
}

#[test]
fn test_short_noise_is_discarded() {
    let mut seg = segmenter();

    let mut audio = generate_sine_samples(440.0, 0.1, 0.5);
    audio.extend(generate_silence(1.5));

    assert!(feed(&mut seg, &audio).is_empty());
    assert_eq!(seg.state(), SegmentState::Waiting);
}

#[test]
fn test_calibration_raises_threshold() {
    let mut seg = segmenter();
    let quiet_speech = generate_sine_samples(440.0, 1.0, 0.05);

    // Audible against the default threshold
    assert!(feed(&mut seg, &quiet_speech).is_empty());
    assert_eq!(seg.state(), SegmentState::Speaking);
    seg.reset();

    let threshold = seg.calibrate(&generate_sine_samples(100.0, 1.0, 0.1));
    assert!(threshold > 0.1);

    // Now below the noise floor
    assert!(feed(&mut seg, &quiet_speech).is_empty());
    assert_eq!(seg.state(), SegmentState::Waiting);
}

#[test]
fn test_calibration_has_a_floor() {
    let mut seg = segmenter();
    let threshold = seg.calibrate(&generate_silence(1.0));
    assert!((threshold - 0.01).abs() < f32::EPSILON);
}

#[test]
fn test_wav_roundtrip() {
    let samples = generate_sine_samples(440.0, 0.5, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn test_wav_clamps_out_of_range_samples() {
    let wav = samples_to_wav(&[2.0, -2.0], SAMPLE_RATE).unwrap();
    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();

    assert_eq!(decoded, [i16::MAX, i16::MIN]);
}

#[test]
fn test_clean_for_speech() {
    assert_eq!(
        clean_for_speech("Paris is the capital.\nSource: https://example.com/paris"),
        "Paris is the capital."
    );
    assert_eq!(
        clean_for_speech("see www.example.org for   more"),
        "see for more"
    );
    assert_eq!(clean_for_speech("https://only.a/link"), "");
}
