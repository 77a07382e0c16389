use crate::error::PredictError;
use crate::weights;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{
    batch_norm, conv2d_no_bias, linear, BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, Linear,
    Module, ModuleT, VarBuilder,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

// ResNet-50: bottleneck blocks per stage, 4x channel expansion.
const BLOCKS: [usize; 4] = [3, 4, 6, 3];
const EXPANSION: usize = 4;

#[derive(Debug)]
struct Bottleneck {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
    conv3: Conv2d,
    bn3: BatchNorm,
    downsample: Option<(Conv2d, BatchNorm)>,
}

impl Bottleneck {
    fn new(
        vb: VarBuilder,
        in_channels: usize,
        planes: usize,
        stride: usize,
    ) -> candle_core::Result<Self> {
        let out_channels = planes * EXPANSION;
        let conv1 = conv2d_no_bias(
            in_channels,
            planes,
            1,
            Conv2dConfig::default(),
            vb.pp("conv1"),
        )?;
        let bn1 = batch_norm(planes, BatchNormConfig::default(), vb.pp("bn1"))?;
        let conv2 = conv2d_no_bias(
            planes,
            planes,
            3,
            Conv2dConfig {
                stride,
                padding: 1,
                ..Default::default()
            },
            vb.pp("conv2"),
        )?;
        let bn2 = batch_norm(planes, BatchNormConfig::default(), vb.pp("bn2"))?;
        let conv3 = conv2d_no_bias(
            planes,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("conv3"),
        )?;
        let bn3 = batch_norm(out_channels, BatchNormConfig::default(), vb.pp("bn3"))?;

        let downsample = if stride != 1 || in_channels != out_channels {
            let vb = vb.pp("downsample");
            let conv = conv2d_no_bias(
                in_channels,
                out_channels,
                1,
                Conv2dConfig {
                    stride,
                    ..Default::default()
                },
                vb.pp("0"),
            )?;
            let bn = batch_norm(out_channels, BatchNormConfig::default(), vb.pp("1"))?;
            Some((conv, bn))
        } else {
            None
        };

        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            downsample,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let residual = match &self.downsample {
            Some((conv, bn)) => bn.forward_t(&conv.forward(xs)?, false)?,
            None => xs.clone(),
        };
        let ys = self.bn1.forward_t(&self.conv1.forward(xs)?, false)?.relu()?;
        let ys = self.bn2.forward_t(&self.conv2.forward(&ys)?, false)?.relu()?;
        let ys = self.bn3.forward_t(&self.conv3.forward(&ys)?, false)?;
        (ys + residual)?.relu()
    }
}

/// ResNet-50 classifier with the final fully-connected layer sized to the
/// deployed class count. The forward pass is evaluation-only: batch norms
/// run on their stored statistics and candle tracks no gradients on plain
/// tensors, so inference has no side effects on the parameters.
#[derive(Debug)]
pub struct ResNet50 {
    conv1: Conv2d,
    bn1: BatchNorm,
    blocks: Vec<Bottleneck>,
    fc: Linear,
}

impl ResNet50 {
    pub fn new(vb: VarBuilder, num_classes: usize) -> candle_core::Result<Self> {
        let conv1 = conv2d_no_bias(
            3,
            64,
            7,
            Conv2dConfig {
                stride: 2,
                padding: 3,
                ..Default::default()
            },
            vb.pp("conv1"),
        )?;
        let bn1 = batch_norm(64, BatchNormConfig::default(), vb.pp("bn1"))?;

        let mut blocks = Vec::new();
        let mut in_channels = 64;
        for (stage, &count) in BLOCKS.iter().enumerate() {
            let planes = 64 << stage;
            let stage_vb = vb.pp(format!("layer{}", stage + 1));
            for block in 0..count {
                let stride = if stage > 0 && block == 0 { 2 } else { 1 };
                blocks.push(Bottleneck::new(
                    stage_vb.pp(block.to_string()),
                    in_channels,
                    planes,
                    stride,
                )?);
                in_channels = planes * EXPANSION;
            }
        }

        let fc = linear(in_channels, num_classes, vb.pp("fc"))?;

        Ok(Self {
            conv1,
            bn1,
            blocks,
            fc,
        })
    }

    pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = self.bn1.forward_t(&self.conv1.forward(xs)?, false)?.relu()?;
        // Zero padding before the pool matches torch's padded max-pool here:
        // post-ReLU activations are non-negative.
        let mut ys = ys
            .pad_with_zeros(2, 1, 1)?
            .pad_with_zeros(3, 1, 1)?
            .max_pool2d_with_stride(3, 2)?;
        for block in &self.blocks {
            ys = block.forward(&ys)?;
        }
        // Global average pool over the spatial dimensions.
        let ys = ys.mean(D::Minus1)?.mean(D::Minus1)?;
        self.fc.forward(&ys)
    }
}

/// Loads the checkpoint, normalizes parameter names and materializes the
/// network. Missing or unexpected parameter names are fatal; per-tensor
/// shape disagreement surfaces as a shape-mismatch error.
pub fn load_model(weights_path: &Path, num_classes: usize) -> Result<ResNet50, PredictError> {
    let tensors = weights::read_weights(weights_path)?;
    let tensors = weights::normalize_keys(tensors);
    validate_keys(&tensors)?;

    let vb = VarBuilder::from_tensors(tensors, DType::F32, &Device::Cpu);
    ResNet50::new(vb, num_classes).map_err(classify_load_error)
}

/// Shape disagreements during parameter assignment surface as
/// `ShapeMismatch`; every other construction failure is a `WeightLoad`.
fn classify_load_error(err: candle_core::Error) -> PredictError {
    fn is_shape_error(err: &candle_core::Error) -> bool {
        match err {
            candle_core::Error::WithBacktrace { inner, .. } => is_shape_error(inner),
            candle_core::Error::UnexpectedShape { .. }
            | candle_core::Error::ShapeMismatchBinaryOp { .. } => true,
            _ => false,
        }
    }

    if is_shape_error(&err) {
        PredictError::ShapeMismatch(err.to_string())
    } else {
        PredictError::WeightLoad(err.to_string())
    }
}

fn push_batch_norm_names(names: &mut BTreeSet<String>, prefix: &str) {
    for suffix in ["weight", "bias", "running_mean", "running_var"] {
        names.insert(format!("{prefix}.{suffix}"));
    }
}

/// Every parameter and buffer name the architecture consumes, in checkpoint
/// naming (stem, `layer<stage>.<block>.*`, downsample projections, `fc`).
fn parameter_names() -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    names.insert("conv1.weight".to_string());
    push_batch_norm_names(&mut names, "bn1");

    let mut in_channels = 64;
    for (stage, &count) in BLOCKS.iter().enumerate() {
        let planes = 64 << stage;
        for block in 0..count {
            let prefix = format!("layer{}.{block}", stage + 1);
            for i in 1..=3 {
                names.insert(format!("{prefix}.conv{i}.weight"));
                push_batch_norm_names(&mut names, &format!("{prefix}.bn{i}"));
            }
            let stride = if stage > 0 && block == 0 { 2 } else { 1 };
            if stride != 1 || in_channels != planes * EXPANSION {
                names.insert(format!("{prefix}.downsample.0.weight"));
                push_batch_norm_names(&mut names, &format!("{prefix}.downsample.1"));
            }
            in_channels = planes * EXPANSION;
        }
    }

    names.insert("fc.weight".to_string());
    names.insert("fc.bias".to_string());
    names
}

fn validate_keys(tensors: &HashMap<String, Tensor>) -> Result<(), PredictError> {
    let expected = parameter_names();
    // Torch batch-norm bookkeeping buffers; present in every real checkpoint
    // but never consumed by the forward pass.
    let present: BTreeSet<String> = tensors
        .keys()
        .filter(|name| !name.ends_with(".num_batches_tracked"))
        .cloned()
        .collect();

    let missing: Vec<&String> = expected.difference(&present).collect();
    if !missing.is_empty() {
        return Err(PredictError::WeightLoad(format!(
            "{} missing parameters, first: {}",
            missing.len(),
            missing
                .iter()
                .take(4)
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let unexpected: Vec<&String> = present.difference(&expected).collect();
    if !unexpected.is_empty() {
        return Err(PredictError::WeightLoad(format!(
            "{} unexpected parameters, first: {}",
            unexpected.len(),
            unexpected
                .iter()
                .take(4)
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    Ok(())
}
