//! Dense network backend implementation
//!
//! Evaluates the fixed genre network:
//!
//! ```text
//! input 207 -> dense 128 relu -> dropout 0.6
//!           -> dense 256 relu -> dropout 0.4
//!           -> dense 8 softmax
//! ```
//!
//! Dropout is the identity at inference time. Only the parameters come from
//! the weights file; the topology is fixed here and the file must match it.

use super::InferenceBackend;
use crate::error::GenreError;
use crate::types::GENRE_COUNT;
use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Width of the reduced feature vector the network accepts.
pub const INPUT_WIDTH: usize = 207;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Softmax,
}

/// One dense layer of the fixed architecture.
#[derive(Debug, Clone, Copy)]
pub struct LayerSpec {
    pub name: &'static str,
    pub inputs: usize,
    pub units: usize,
    pub activation: Activation,
    /// Dropout rate applied after this layer during training
    pub dropout: Option<f32>,
}

pub const ARCHITECTURE: [LayerSpec; 3] = [
    LayerSpec {
        name: "dense",
        inputs: INPUT_WIDTH,
        units: 128,
        activation: Activation::Relu,
        dropout: Some(0.6),
    },
    LayerSpec {
        name: "dense_1",
        inputs: 128,
        units: 256,
        activation: Activation::Relu,
        dropout: Some(0.4),
    },
    LayerSpec {
        name: "dense_2",
        inputs: 256,
        units: GENRE_COUNT,
        activation: Activation::Softmax,
        dropout: None,
    },
];

/// On-disk layout of the weights file.
#[derive(Debug, Deserialize)]
pub struct WeightsFile {
    pub layers: Vec<LayerWeights>,
}

/// Parameters of one dense layer.
#[derive(Debug, Deserialize)]
pub struct LayerWeights {
    #[serde(default)]
    pub name: Option<String>,
    /// Kernel with shape `(inputs, units)`
    pub weights: Vec<Vec<f32>>,
    /// Bias with `units` entries
    pub bias: Vec<f32>,
}

struct DenseLayer {
    spec: LayerSpec,
    /// `(inputs, units)`
    kernel: Array2<f32>,
    bias: Array1<f32>,
}

impl DenseLayer {
    fn forward(&self, x: ArrayView1<'_, f32>) -> Array1<f32> {
        let z = x.dot(&self.kernel) + &self.bias;
        match self.spec.activation {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Softmax => softmax(z),
        }
    }
}

fn softmax(z: Array1<f32>) -> Array1<f32> {
    let max = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = z.mapv(|v| (v - max).exp());
    let total = exp.sum();
    exp / total
}

/// The genre network with its loaded parameters.
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Read weights from a JSON file and check them against the architecture.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GenreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GenreError::resource(path, e))?;
        let file: WeightsFile =
            serde_json::from_str(&text).map_err(|e| GenreError::resource(path, e))?;
        let network = Self::from_weights(file).map_err(|e| GenreError::resource(path, e))?;
        info!("Loaded network weights from {}", path.display());
        for line in network.summary() {
            debug!("{}", line);
        }
        Ok(network)
    }

    /// Build the network from already parsed weights.
    pub fn from_weights(file: WeightsFile) -> Result<Self, GenreError> {
        if file.layers.len() != ARCHITECTURE.len() {
            return Err(GenreError::shape(
                "network layers",
                ARCHITECTURE.len(),
                file.layers.len(),
            ));
        }

        let layers = ARCHITECTURE
            .iter()
            .zip(file.layers)
            .map(|(spec, weights)| Self::build_layer(*spec, weights))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { layers })
    }

    fn build_layer(spec: LayerSpec, weights: LayerWeights) -> Result<DenseLayer, GenreError> {
        let label = weights.name.as_deref().unwrap_or(spec.name);
        if weights.weights.len() != spec.inputs {
            return Err(GenreError::shape(
                format!("{label} kernel rows"),
                spec.inputs,
                weights.weights.len(),
            ));
        }
        if weights.bias.len() != spec.units {
            return Err(GenreError::shape(format!("{label} bias"), spec.units, weights.bias.len()));
        }

        let mut flat = Vec::with_capacity(spec.inputs * spec.units);
        for row in &weights.weights {
            if row.len() != spec.units {
                return Err(GenreError::shape(
                    format!("{label} kernel columns"),
                    spec.units,
                    row.len(),
                ));
            }
            flat.extend_from_slice(row);
        }
        if flat.iter().chain(&weights.bias).any(|v| !v.is_finite()) {
            return Err(GenreError::InvalidInput(format!("{label} has non-finite parameters")));
        }

        let kernel = Array2::from_shape_vec((spec.inputs, spec.units), flat)
            .map_err(|e| GenreError::InvalidInput(e.to_string()))?;

        Ok(DenseLayer {
            spec,
            kernel,
            bias: Array1::from(weights.bias),
        })
    }
}

impl InferenceBackend for DenseNetwork {
    fn predict(&self, input: &[f32]) -> Result<Vec<f32>, GenreError> {
        if input.len() != self.input_size() {
            return Err(GenreError::shape("network input", self.input_size(), input.len()));
        }

        let mut activations = Array1::from(input.to_vec());
        for layer in &self.layers {
            activations = layer.forward(activations.view());
        }
        Ok(activations.to_vec())
    }

    fn input_size(&self) -> usize {
        self.layers[0].spec.inputs
    }

    fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].spec.units
    }

    fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut total = 0;
        for layer in &self.layers {
            let params = layer.kernel.len() + layer.bias.len();
            total += params;
            lines.push(format!(
                "{:<10} ({:?}) output {:>4}  params {:>6}",
                layer.spec.name, layer.spec.activation, layer.spec.units, params
            ));
            if let Some(rate) = layer.spec.dropout {
                lines.push(format!(
                    "{:<10} (Dropout {rate}) output {:>4}  params {:>6}",
                    "dropout", layer.spec.units, 0
                ));
            }
        }
        lines.push(format!("Total params: {total}"));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Weights that ignore the input and favor one class through the output bias.
    fn biased_weights(class: usize) -> WeightsFile {
        let layers = ARCHITECTURE
            .iter()
            .map(|spec| {
                let bias = if spec.activation == Activation::Softmax {
                    (0..spec.units).map(|i| if i == class { 4.0 } else { 0.0 }).collect()
                } else {
                    vec![0.0; spec.units]
                };
                LayerWeights {
                    name: None,
                    weights: vec![vec![0.01; spec.units]; spec.inputs],
                    bias,
                }
            })
            .collect();
        WeightsFile { layers }
    }

    #[test]
    fn test_output_is_a_distribution() {
        let network = DenseNetwork::from_weights(biased_weights(3)).unwrap();
        let input: Vec<f32> = (0..INPUT_WIDTH).map(|i| (i as f32 * 0.37).sin()).collect();
        let probs = network.predict(&input).unwrap();
        assert_eq!(probs.len(), GENRE_COUNT);
        assert!(probs.iter().all(|&p| p >= 0.0));
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        let argmax = (0..GENRE_COUNT).max_by(|&a, &b| probs[a].total_cmp(&probs[b])).unwrap();
        assert_eq!(argmax, 3);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let network = DenseNetwork::from_weights(biased_weights(5)).unwrap();
        let input = vec![0.5; INPUT_WIDTH];
        assert_eq!(network.predict(&input).unwrap(), network.predict(&input).unwrap());
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let probs = softmax(Array1::from(vec![1000.0, 1000.0, -1000.0]));
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs[2] >= 0.0 && probs[2] < 1e-6);
    }

    #[test]
    fn test_wrong_input_width() {
        let network = DenseNetwork::from_weights(biased_weights(0)).unwrap();
        let result = network.predict(&[0.0; 518]);
        assert!(matches!(
            result,
            Err(GenreError::ShapeMismatch { expected: 207, actual: 518, .. })
        ));
    }

    #[test]
    fn test_layer_shape_is_validated() {
        let mut weights = biased_weights(0);
        weights.layers[1].bias.pop();
        let result = DenseNetwork::from_weights(weights);
        assert!(matches!(
            result,
            Err(GenreError::ShapeMismatch { expected: 256, actual: 255, .. })
        ));

        let mut weights = biased_weights(0);
        weights.layers.pop();
        assert!(DenseNetwork::from_weights(weights).is_err());
    }

    #[test]
    fn test_summary_lists_every_layer() {
        let network = DenseNetwork::from_weights(biased_weights(0)).unwrap();
        let summary = network.summary();
        assert_eq!(summary.len(), 6);
        // 207*128+128 + 128*256+256 + 256*8+8
        assert_eq!(summary.last().unwrap(), "Total params: 61704");
    }

    #[test]
    fn test_load_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let file = biased_weights(2);
        let json = serde_json::json!({
            "layers": file.layers.iter().map(|l| serde_json::json!({
                "weights": l.weights,
                "bias": l.bias,
            })).collect::<Vec<_>>()
        });
        std::fs::write(&path, json.to_string()).unwrap();

        let network = DenseNetwork::load(&path).unwrap();
        assert_eq!(network.input_size(), INPUT_WIDTH);
        assert_eq!(network.output_size(), GENRE_COUNT);
    }

    #[test]
    fn test_malformed_json_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(DenseNetwork::load(&path), Err(GenreError::Resource { .. })));
    }
}
