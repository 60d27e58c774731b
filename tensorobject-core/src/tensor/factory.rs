use std::sync::Arc;

use rand::Rng;
use rand_distr::{Normal, StandardUniform};

use crate::{
    stride::element_count,
    tensor::{StridedTensor, Tensor, TensorObject},
    bail, Context, DType, Device, Element, Error, Result,
};

/// Host-side constructors. Data is produced on the host and then uploaded to
/// `device` in one transfer.
impl TensorObject {
    fn from_tensor(tensor: StridedTensor) -> Self {
        let tensor: Arc<dyn Tensor> = Arc::new(tensor);
        Self::from(tensor)
    }

    /// A zero-filled compact tensor.
    pub fn zeros(shape: &[usize], dtype: DType, device: &Device) -> Result<Self> {
        Ok(Self::from_tensor(StridedTensor::zeros(
            shape.to_vec(),
            dtype,
            device,
        )?))
    }

    /// A compact tensor holding `data` in row-major order.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize], device: &Device) -> Result<Self> {
        if data.len() != element_count(shape) {
            return Err(Error::ShapeMismatch {
                lhs: vec![data.len()],
                rhs: shape.to_vec(),
            }
            .bt());
        }
        Self::from_vec_strided(data, shape, &[], 0, device)
    }

    /// A tensor viewing `data` through an explicit layout.
    ///
    /// Negative `stride` entries, or an empty `stride`, are completed as for a
    /// contiguous tensor. `offset` is counted in elements.
    pub fn from_vec_strided<T: Element>(
        data: Vec<T>,
        shape: &[usize],
        stride: &[isize],
        offset: usize,
        device: &Device,
    ) -> Result<Self> {
        let storage = device.storage_from_bytes(bytemuck::cast_slice(&data))?;
        Ok(Self::from_tensor(StridedTensor::create(
            Arc::new(storage),
            T::DTYPE,
            shape.to_vec(),
            stride,
            offset,
        )?))
    }

    pub fn full<T: Element>(value: T, shape: &[usize], device: &Device) -> Result<Self> {
        Self::from_vec(vec![value; element_count(shape)], shape, device)
    }

    pub fn ones<T: Element>(shape: &[usize], device: &Device) -> Result<Self> {
        Self::full(T::ONE, shape, device)
    }

    /// A rank 1 tensor of `start, start + step, ...` up to but excluding `stop`.
    pub fn arange<T: Element>(start: T, stop: T, step: T, device: &Device) -> Result<Self> {
        let (start, stop, step) = (start.to_f64(), stop.to_f64(), step.to_f64());
        if step <= 0.0 || !step.is_finite() {
            bail!(@Configuration, "arange step {step} must be positive");
        }
        if !start.is_finite() || !stop.is_finite() {
            bail!(@Configuration, "arange bounds {start} and {stop} must be finite");
        }
        // Elements are `start + i * step`; accumulating would stall once `step`
        // is below the spacing of f64 around `start`.
        let mut len = ((stop - start) / step).ceil().max(0.0) as usize;
        // The division may round up past the last value below `stop`.
        while len > 0 && start + (len - 1) as f64 * step >= stop {
            len -= 1;
        }
        let data = (0..len)
            .map(|i| T::from_f64(start + i as f64 * step))
            .collect();
        Self::from_vec(data, &[len], device)
    }

    /// Uniform samples from `[0, 1)`.
    pub fn rand<T: Element>(shape: &[usize], device: &Device) -> Result<Self> {
        let mut rng = rand::rng();
        let data = (0..element_count(shape))
            .map(|_| T::from_f64(rng.sample(StandardUniform)))
            .collect();
        Self::from_vec(data, shape, device)
    }

    /// Normal samples with the given mean and standard deviation.
    pub fn randn<T: Element>(shape: &[usize], mean: f64, std: f64, device: &Device) -> Result<Self> {
        let normal = Normal::new(mean, std).context("invalid normal distribution parameters")?;
        let mut rng = rand::rng();
        let data = (0..element_count(shape))
            .map(|_| T::from_f64(rng.sample(normal)))
            .collect();
        Self::from_vec(data, shape, device)
    }
}
