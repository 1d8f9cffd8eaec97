//! ONNX Runtime session wrapper
//!
//! Hides the inference backend behind a named-tensor, blocking `run` call.
//! Execution providers are registered best-effort: when an accelerator is
//! unavailable ONNX Runtime falls back to the CPU provider.

use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::info;

use crate::error::ScanError;

/// Raw model output: shape plus flattened f32 data.
pub struct RawOutput {
    pub shape: Vec<i64>,
    pub data: Vec<f32>,
}

/// One loaded inference session.
///
/// Not reentrant: `run` takes `&mut self`, so sharing an engine across
/// threads requires external serialization.
pub struct InferenceEngine {
    session: Session,
}

impl InferenceEngine {
    /// Load a model from fully reassembled bytes.
    pub fn from_bytes(model_bytes: &[u8]) -> Result<Self, ScanError> {
        let mut providers = Vec::new();
        #[cfg(feature = "cuda")]
        providers.push(CUDAExecutionProvider::default().build());
        providers.push(CPUExecutionProvider::default().build());

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_execution_providers(providers))
            .and_then(|b| b.commit_from_memory(model_bytes))
            .map_err(ScanError::ModelLoad)?;

        info!("inference session created ({} model bytes)", model_bytes.len());
        Ok(Self { session })
    }

    /// Run one blocking inference: bind `input_name`, fetch `output_name`.
    pub fn run(
        &mut self,
        tensor: Array4<f32>,
        input_name: &str,
        output_name: &str,
    ) -> Result<RawOutput, ScanError> {
        let value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_name => value])?;
        let output = outputs
            .get(output_name)
            .ok_or_else(|| ScanError::MissingOutput(output_name.to_string()))?;
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        Ok(RawOutput {
            shape: shape.to_vec(),
            data: data.to_vec(),
        })
    }
}
