use image::imageops::FilterType;
use image::RgbImage;
use ndarray::{Array1, Array4, ArrayD, ArrayView4};

use crate::core::loader::Image;
use crate::error::{AppError, Result};

/// Fixed-length feature vector, unit L2 norm unless degenerate
pub type Embedding = Array1<f32>;

/// Input geometry of the reference model
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (224, 224);

const CAFFE_BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Per-channel input normalization a model was trained with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preprocessing {
    /// BGR order, ImageNet BGR mean subtracted from 0..255 values (VGG family)
    Caffe,
    /// RGB order scaled to 0..1, then ImageNet mean/std (torchvision models)
    Torch,
}

impl Preprocessing {
    /// Normalizes `rgb` into a `[1, 3, H, W]` tensor
    pub fn apply(self, rgb: &RgbImage) -> Array4<f32> {
        let (width, height) = rgb.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            match self {
                Self::Caffe => {
                    for c in 0..3 {
                        let source = pixel[2 - c] as f32;
                        tensor[[0, c, y, x]] = source - CAFFE_BGR_MEAN[c];
                    }
                }
                Self::Torch => {
                    for c in 0..3 {
                        let source = pixel[c] as f32 / 255.0;
                        tensor[[0, c, y, x]] = (source - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                    }
                }
            }
        }

        tensor
    }
}

/// A frozen feature-extraction network.
///
/// Implementations run inference only; they are loaded by the caller and
/// handed to the search, never trained here.
pub trait FeatureModel {
    /// `(width, height)` the network expects
    fn input_size(&self) -> (u32, u32) {
        DEFAULT_INPUT_SIZE
    }

    /// Channel order and normalization the network expects
    fn preprocessing(&self) -> Preprocessing {
        Preprocessing::Caffe
    }

    /// One forward pass over a `[1, 3, H, W]` batch
    fn infer(&self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>>;
}

impl<M: FeatureModel + ?Sized> FeatureModel for Box<M> {
    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }

    fn preprocessing(&self) -> Preprocessing {
        (**self).preprocessing()
    }

    fn infer(&self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>> {
        (**self).infer(input)
    }
}

/// Turns images into unit-normalized embeddings with a [`FeatureModel`]
#[derive(Debug)]
pub struct FeatureExtractor<'m, M: ?Sized> {
    model: &'m M,
}

impl<'m, M: FeatureModel + ?Sized> FeatureExtractor<'m, M> {
    /// Extractor borrowing an already-loaded model
    pub fn new(model: &'m M) -> Self {
        Self { model }
    }

    /// Resize to the model geometry and normalize
    pub fn preprocess(&self, image: &Image) -> Array4<f32> {
        let (width, height) = self.model.input_size();
        let resized = image::imageops::resize(image.pixels(), width, height, FilterType::Triangle);
        self.model.preprocessing().apply(&resized)
    }

    /// Flattened model output divided by its L2 norm.
    ///
    /// A zero-norm output is returned as-is (all zeros) rather than divided.
    pub fn extract(&self, image: &Image) -> Result<Embedding> {
        // Forward pass
        let input = self.preprocess(image);
        let output = self.model.infer(input.view())?;

        if output.is_empty() {
            return Err(AppError::Model(format!(
                "model produced no features for {}",
                image.path().display()
            )));
        }

        // Flatten and L2 normalize
        let features: Embedding = output.iter().copied().collect();
        let norm = features.dot(&features).sqrt();

        if !norm.is_finite() {
            return Err(AppError::Model(format!(
                "non-finite features for {}",
                image.path().display()
            )));
        }
        if norm == 0.0 {
            log::warn!(
                "Zero-norm embedding for {}; its cosine distance to everything is 1",
                image.path().display()
            );
            return Ok(features);
        }

        Ok(features / norm)
    }
}

#[cfg(feature = "embeddings")]
pub use self::torch::TorchModel;

#[cfg(feature = "embeddings")]
mod torch {
    use std::fmt;
    use std::path::Path;

    use ndarray::{ArrayD, ArrayView4, IxDyn};
    use tch::{CModule, Device, Kind, Tensor};

    use super::{FeatureModel, Preprocessing, DEFAULT_INPUT_SIZE};
    use crate::error::Result;

    /// A TorchScript feature extractor, e.g. a VGG16 trunk with global pooling
    pub struct TorchModel {
        module: CModule,
        device: Device,
        input_size: (u32, u32),
        preprocessing: Preprocessing,
    }

    impl fmt::Debug for TorchModel {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("TorchModel")
                .field("device", &self.device)
                .field("input_size", &self.input_size)
                .field("preprocessing", &self.preprocessing)
                .finish()
        }
    }

    impl TorchModel {
        /// Load a scripted module and switch it to evaluation mode
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
            let device = Device::cuda_if_available();
            log::info!("Loading feature model {} on {:?}", path.as_ref().display(), device);

            let mut module = CModule::load_on_device(path, device)?;
            module.set_eval();

            Ok(Self {
                module,
                device,
                input_size: DEFAULT_INPUT_SIZE,
                preprocessing: Preprocessing::Torch,
            })
        }

        /// Override the expected `(width, height)`
        pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
            self.input_size = (width, height);
            self
        }

        /// Override the input normalization
        pub fn with_preprocessing(mut self, preprocessing: Preprocessing) -> Self {
            self.preprocessing = preprocessing;
            self
        }
    }

    impl FeatureModel for TorchModel {
        fn input_size(&self) -> (u32, u32) {
            self.input_size
        }

        fn preprocessing(&self) -> Preprocessing {
            self.preprocessing
        }

        fn infer(&self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>> {
            let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
            let data: Vec<f32> = input.iter().copied().collect();
            let tensor = Tensor::of_slice(&data)
                .reshape(shape.as_slice())
                .to_device(self.device);

            let output = tch::no_grad(|| self.module.forward_ts(&[tensor]))?;
            let output = output.to_device(Device::Cpu).to_kind(Kind::Float);

            let dims: Vec<usize> = output.size().iter().map(|&d| d as usize).collect();
            let values = Vec::<f32>::try_from(&output.flatten(0, -1))?;

            Ok(ArrayD::from_shape_vec(IxDyn(&dims), values)?)
        }
    }
}
