//! Background classification worker.
//!
//! Feature extraction takes seconds for a full track, so interactive callers
//! hand requests to a dedicated thread and wait on a reply channel instead of
//! running the pipeline themselves.
//!
//! ```text
//! ┌──────────────┐   WorkerCommand    ┌──────────────────────┐
//! │ CLI / UI     │ ─────────────────► │ classification worker│
//! │              │ ◄───────────────── │  (GenreClassifier)   │
//! └──────────────┘ ClassificationResult└──────────────────────┘
//! ```

use super::messages::{ClassificationResult, WorkerCommand};
use super::model::GenreClassifier;
use crate::error::GenreError;
use crossbeam::channel::{self, Receiver, Sender};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Handle to a running classification worker.
///
/// Dropping the handle shuts the worker down and waits for it to exit.
pub struct WorkerHandle {
    command_tx: Sender<WorkerCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Queue a file for classification. The returned receiver yields exactly
    /// one result.
    pub fn submit<P: Into<PathBuf>>(
        &self,
        path: P,
    ) -> Result<Receiver<ClassificationResult>, GenreError> {
        let (reply, result_rx) = channel::bounded(1);
        self.command_tx
            .send(WorkerCommand::ClassifyFile {
                path: path.into(),
                reply,
            })
            .map_err(|_| GenreError::WorkerError("worker has stopped".to_string()))?;
        Ok(result_rx)
    }

    /// Queue a file and wait for its result.
    pub fn classify<P: Into<PathBuf>>(&self, path: P) -> ClassificationResult {
        self.submit(path)?
            .recv()
            .map_err(|_| GenreError::WorkerError("worker exited before replying".to_string()))?
    }

    /// Stop the worker after the requests already queued.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Classification worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background service running the classification pipeline.
pub struct ClassificationWorker;

impl ClassificationWorker {
    /// Spawn the worker thread.
    pub fn spawn(classifier: GenreClassifier) -> Result<WorkerHandle, GenreError> {
        let (command_tx, command_rx) = channel::unbounded();

        let thread_handle = thread::Builder::new()
            .name("genre-classifier".to_string())
            .spawn(move || Self::run(classifier, command_rx))
            .map_err(|e| GenreError::WorkerError(format!("Failed to spawn worker: {e}")))?;

        Ok(WorkerHandle {
            command_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Main worker loop
    fn run(classifier: GenreClassifier, command_rx: Receiver<WorkerCommand>) {
        info!("Classification worker started");

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                WorkerCommand::ClassifyFile { path, reply } => {
                    let start = Instant::now();
                    let result = classifier.classify_file(&path);
                    match &result {
                        Ok(prediction) => debug!(
                            "Classified {} as {} in {:?}",
                            path.display(),
                            prediction.genre,
                            start.elapsed()
                        ),
                        Err(e) => warn!("Classification of {} failed: {}", path.display(), e),
                    }
                    // The requester may have given up waiting.
                    let _ = reply.send(result);
                }

                WorkerCommand::Shutdown => {
                    info!("Classification worker shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InferenceBackend;
    use crate::features::{feature_dim, FeatureVector};
    use crate::reduction::{PcaTransform, Reducer, Standardization};
    use crate::resources::Resources;
    use crate::types::Genre;
    use std::path::Path;

    /// Returns the same distribution for every input.
    struct FixedBackend {
        probabilities: Vec<f32>,
    }

    impl InferenceBackend for FixedBackend {
        fn predict(&self, _input: &[f32]) -> Result<Vec<f32>, GenreError> {
            Ok(self.probabilities.clone())
        }

        fn input_size(&self) -> usize {
            2
        }

        fn output_size(&self) -> usize {
            self.probabilities.len()
        }
    }

    fn classifier() -> GenreClassifier {
        let dim = feature_dim();
        let components = (0..2)
            .map(|i| {
                let mut row = vec![0.0; dim];
                row[i] = 1.0;
                row
            })
            .collect();
        let pca = PcaTransform::new(vec![0.0; dim], components, None, false).unwrap();
        let filler = FeatureVector::from_values(vec![0.0; dim]).unwrap();
        let reducer = Reducer::new(pca, Standardization::FillerStacked(filler)).unwrap();
        let backend = FixedBackend {
            probabilities: vec![0.02, 0.02, 0.02, 0.8, 0.04, 0.04, 0.03, 0.03],
        };
        GenreClassifier::from_resources(Resources::new(reducer, Box::new(backend)).unwrap())
    }

    fn write_tone(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for n in 0..11025 {
            let t = n as f64 / 22050.0;
            let s = 0.4 * (2.0 * std::f64::consts::PI * 220.0 * t).sin();
            writer.write_sample((s * i16::MAX as f64) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_worker_classifies_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path);

        let worker = ClassificationWorker::spawn(classifier()).unwrap();
        let prediction = worker.classify(&path).unwrap();
        assert_eq!(prediction.genre, Genre::Rock);
        assert_eq!(prediction.reduced_width, 2);
        assert_eq!(prediction.to_string(), "Yup, that's some Rock");
        worker.shutdown();
    }

    #[test]
    fn test_worker_reports_failures_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("tone.wav");
        write_tone(&good);
        let missing = dir.path().join("missing.wav");

        let worker = ClassificationWorker::spawn(classifier()).unwrap();
        let failed = worker.submit(&missing).unwrap();
        let succeeded = worker.submit(&good).unwrap();

        assert!(matches!(
            failed.recv().unwrap(),
            Err(GenreError::Extraction { .. })
        ));
        assert!(succeeded.recv().unwrap().is_ok());
    }

    #[test]
    fn test_dropping_handle_stops_worker() {
        let worker = ClassificationWorker::spawn(classifier()).unwrap();
        let command_tx = worker.command_tx.clone();
        drop(worker);
        // The loop has exited, so its receiver is gone.
        assert!(command_tx.send(WorkerCommand::Shutdown).is_err());
    }
}
