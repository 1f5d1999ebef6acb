//! End-to-end tests over WAV fixtures written with hound.

use genre_classifier::backends::dense::ARCHITECTURE;
use genre_classifier::features::{feature_dim, FeatureFamily, Statistic};
use genre_classifier::{
    compute_features, ClassificationWorker, ConfidencePhrase, Genre, GenreClassifier, GenreError,
    ResourceConfig, Resources,
};
use serde_json::json;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

const SAMPLE_RATE: u32 = 22050;

/// A few harmonics with a decaying envelope every quarter second.
fn write_song(path: &Path, seconds: f64, channels: u16, bits_per_sample: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: SAMPLE_RATE,
        bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };
    let full_scale = ((1i64 << (bits_per_sample - 1)) - 1) as f64;
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let n = (seconds * SAMPLE_RATE as f64) as usize;
    for i in 0..n {
        let t = i as f64 / SAMPLE_RATE as f64;
        let envelope = (-8.0 * (t % 0.25)).exp();
        let s = envelope
            * (0.4 * (2.0 * PI * 110.0 * t).sin()
                + 0.2 * (2.0 * PI * 330.0 * t).sin()
                + 0.1 * (2.0 * PI * 1760.0 * t).sin());
        for channel in 0..channels {
            let gain = 1.0 - 0.2 * channel as f64;
            writer.write_sample((s * gain * full_scale) as i32).unwrap();
        }
    }
    writer.finalize().unwrap();
}

/// PCA without a persisted scaler, so the reference recording is required.
fn write_pca(dir: &Path) {
    let dim = feature_dim();
    let components: Vec<Vec<f32>> = (0..207)
        .map(|i| {
            let mut row = vec![0.0; dim];
            row[(i * 5) % dim] = 1.0;
            row
        })
        .collect();
    let pca = json!({ "mean": vec![0.0; dim], "components": components });
    fs::write(dir.join("pca.json"), pca.to_string()).unwrap();
}

fn write_model(dir: &Path, class: usize) {
    let layers: Vec<_> = ARCHITECTURE
        .iter()
        .map(|spec| {
            let bias: Vec<f32> = (0..spec.units)
                .map(|i| if spec.name == "dense_2" && i == class { 3.0 } else { 0.0 })
                .collect();
            json!({
                "name": spec.name,
                "weights": vec![vec![0.001f32; spec.units]; spec.inputs],
                "bias": bias,
            })
        })
        .collect();
    fs::create_dir_all(dir.join("models")).unwrap();
    fs::write(
        dir.join("models").join("model.json"),
        json!({ "layers": layers }).to_string(),
    )
    .unwrap();
}

fn write_resources(dir: &Path, class: usize) {
    write_pca(dir);
    write_model(dir, class);
    fs::create_dir_all(dir.join("songs")).unwrap();
    write_song(&dir.join("songs").join("rock.wav"), 1.0, 2, 16);
}

#[test]
fn test_extraction_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.wav");
    write_song(&path, 0.75, 1, 16);

    let first = compute_features(&path).unwrap();
    let second = compute_features(&path).unwrap();
    assert_eq!(first.as_slice(), second.as_slice());
}

#[test]
fn test_dimensionality_does_not_depend_on_length() {
    let dir = tempfile::tempdir().unwrap();
    for (name, seconds, channels, bits) in [
        ("short.wav", 0.5, 1, 16),
        ("long.wav", 1.5, 2, 24),
    ] {
        let path = dir.path().join(name);
        write_song(&path, seconds, channels, bits);
        let features = compute_features(&path).unwrap();
        assert_eq!(features.len(), 518);
        assert!(features.as_slice().iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_feature_values_are_plausible() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.wav");
    write_song(&path, 1.0, 1, 16);
    let features = compute_features(&path).unwrap();

    let rms_max = features.get(FeatureFamily::Rmse, Statistic::Max, 1).unwrap();
    let rms_min = features.get(FeatureFamily::Rmse, Statistic::Min, 1).unwrap();
    assert!(rms_max > rms_min && rms_min >= 0.0);

    // Mostly 110 Hz energy: the centroid sits well below Nyquist
    let centroid = features
        .get(FeatureFamily::SpectralCentroid, Statistic::Median, 1)
        .unwrap();
    assert!(centroid > 0.0 && centroid < SAMPLE_RATE as f32 / 4.0, "{centroid}");

    // Max-normalized chroma peaks at 1
    let chroma_max = (1..=12)
        .map(|n| features.get(FeatureFamily::ChromaCqt, Statistic::Max, n).unwrap())
        .fold(f32::MIN, f32::max);
    assert!((chroma_max - 1.0).abs() < 1e-4);
}

#[test]
fn test_reference_recording_is_classified_as_rock() {
    let dir = tempfile::tempdir().unwrap();
    write_resources(dir.path(), Genre::Rock.index());

    let classifier = GenreClassifier::from_dir(dir.path()).unwrap();
    let prediction = classifier
        .classify_file(dir.path().join("songs").join("rock.wav"))
        .unwrap();

    assert_eq!(prediction.genre, Genre::Rock);
    assert_eq!(prediction.reduced_width, 207);
    assert_eq!(prediction.probabilities.len(), 8);
    assert!((prediction.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    assert_eq!(
        prediction.phrase(),
        ConfidencePhrase::from_confidence(prediction.confidence)
    );
    assert!(prediction.to_string().ends_with(" Rock"));
}

#[test]
fn test_worker_runs_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    write_resources(dir.path(), Genre::Electronic.index());
    let song = dir.path().join("query.wav");
    write_song(&song, 0.5, 1, 16);

    let classifier = GenreClassifier::from_dir(dir.path()).unwrap();
    let worker = ClassificationWorker::spawn(classifier).unwrap();
    let prediction = worker.classify(&song).unwrap();
    assert_eq!(prediction.genre, Genre::Electronic);
    worker.shutdown();
}

#[test]
fn test_malformed_file_is_an_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.wav");
    fs::write(&path, b"RIFF\x10\x00\x00\x00WAVEjunkjunkjunk").unwrap();

    match compute_features(&path) {
        Err(GenreError::Extraction { path: failed, .. }) => assert_eq!(failed, path),
        other => panic!("Expected Extraction error, got {other:?}"),
    }
}

#[test]
fn test_empty_file_is_an_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("silence.wav");
    write_song(&path, 0.0, 1, 16);
    assert!(matches!(
        compute_features(&path),
        Err(GenreError::Extraction { .. })
    ));
}

#[test]
fn test_non_finite_samples_are_an_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("float.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..SAMPLE_RATE / 2 {
        let s = if i == 1000 {
            f32::NAN
        } else {
            (i as f32 * 0.05).sin() * 0.5
        };
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();

    match compute_features(&path) {
        Err(GenreError::Extraction { reason, .. }) => {
            assert!(reason.contains("non-finite"), "{reason}")
        }
        other => panic!("Expected Extraction error, got {other:?}"),
    }
}

#[test]
fn test_missing_weights_fail_before_inference() {
    let dir = tempfile::tempdir().unwrap();
    write_resources(dir.path(), 0);
    fs::remove_file(dir.path().join("models").join("model.json")).unwrap();

    match Resources::load(&ResourceConfig::from_dir(dir.path())) {
        Err(GenreError::Resource { path, .. }) => assert!(path.ends_with("model.json")),
        other => panic!("Expected Resource error, got {other:?}"),
    }
}

#[test]
fn test_missing_reference_recording_is_fatal_without_scaler() {
    let dir = tempfile::tempdir().unwrap();
    write_resources(dir.path(), 0);
    fs::remove_file(dir.path().join("songs").join("rock.wav")).unwrap();

    match GenreClassifier::from_dir(dir.path()) {
        Err(GenreError::Resource { path, .. }) => assert!(path.ends_with("rock.wav")),
        other => panic!("Expected Resource error, got {other:?}"),
    }
}
