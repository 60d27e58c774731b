use std::{fmt, sync::Arc};

use crate::{
    dtype::cast_host_bytes,
    precondition,
    storage::Storage,
    stride::offset_of,
    tensor::{strided::layout_runs, Tensor},
    DType, Device, Element, Error, Result,
};

/// Handle for interacting with tensors of any backend.
///
/// Cloning a handle shares the underlying tensor and storage: a write through
/// [`TensorObject::copy_from`] is visible through every clone. Use
/// [`TensorObject::deep_copy`] for an independent copy. Functions which
/// allocate, copy data or validate caller input return `Result`s; contract
/// violations (empty handle, wrong index rank, out of range index) panic.
#[derive(Clone, Default)]
pub struct TensorObject {
    md: Option<Device>,
    tensor: Option<Arc<dyn Tensor>>,
}

impl TensorObject {
    pub fn new(md: Device, tensor: Arc<dyn Tensor>) -> Self {
        Self {
            md: Some(md),
            tensor: Some(tensor),
        }
    }

    fn inner(&self) -> &Arc<dyn Tensor> {
        match &self.tensor {
            Some(tensor) => tensor,
            None => panic!("precondition violated: tensor handle is empty"),
        }
    }

    /// True for a default constructed or moved-from handle.
    pub fn is_empty(&self) -> bool {
        self.tensor.is_none()
    }

    pub fn data_ptr(&self) -> *const u8 {
        self.inner().data_ptr()
    }

    pub fn dtype(&self) -> DType {
        self.inner().dtype()
    }

    pub fn count(&self) -> usize {
        self.inner().count()
    }

    pub fn bytes(&self) -> usize {
        self.inner().bytes()
    }

    pub fn rank(&self) -> usize {
        self.inner().rank()
    }

    pub fn dtype_size(&self) -> usize {
        self.dtype().item_size()
    }

    pub fn get_shape(&self) -> Vec<usize> {
        self.inner().get_shape()
    }

    pub fn get_stride(&self) -> Vec<usize> {
        self.inner().get_stride()
    }

    pub fn shape(&self, dim: usize) -> usize {
        let tensor = self.inner();
        precondition!(dim < tensor.rank(), "dimension {dim} of a rank {} tensor", tensor.rank());
        tensor.shape(dim)
    }

    pub fn stride(&self, dim: usize) -> usize {
        let tensor = self.inner();
        precondition!(dim < tensor.rank(), "dimension {dim} of a rank {} tensor", tensor.rank());
        tensor.stride(dim)
    }

    pub fn is_compact(&self) -> bool {
        self.inner().is_compact()
    }

    /// Numpy typestr of the element type, e.g. `<f4`.
    pub fn type_str(&self) -> String {
        self.dtype().type_str()
    }

    pub fn get_tensor(&self) -> Arc<dyn Tensor> {
        self.inner().clone()
    }

    /// The memory domain this handle was created for.
    pub fn get_memory(&self) -> Device {
        match &self.md {
            Some(md) => md.clone(),
            None => panic!("precondition violated: tensor handle is empty"),
        }
    }

    /// True when both handles read from the same storage block.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.inner().storage(), other.inner().storage())
    }

    /// A view restricted to `[min_dims[i], max_dims[i])` along each dimension.
    ///
    /// Negative lower bounds are clamped to 0 and negative upper bounds mean
    /// "to the end". The view keeps the original stride.
    pub fn slice(&self, min_dims: &[isize], max_dims: &[isize]) -> Result<Self> {
        let shape = self.get_shape();
        precondition!(
            min_dims.len() == shape.len() && max_dims.len() == shape.len(),
            "slice bounds of rank {} and {} for a tensor of rank {}",
            min_dims.len(),
            max_dims.len(),
            shape.len()
        );
        let min_dims: Vec<usize> = min_dims.iter().map(|&d| d.max(0) as usize).collect();
        let max_dims: Vec<usize> = max_dims
            .iter()
            .zip(&shape)
            .map(|(&d, &s)| usize::try_from(d).unwrap_or(s))
            .collect();
        Ok(Self {
            md: self.md.clone(),
            tensor: Some(self.inner().slice(&min_dims, &max_dims)?),
        })
    }

    /// The same elements under a new shape, with a contiguous stride.
    pub fn reshape(&self, dims: &[usize]) -> Result<Self> {
        Ok(Self {
            md: self.md.clone(),
            tensor: Some(self.inner().reshape(dims)?),
        })
    }

    /// A compact, independently owned copy in the same memory domain.
    pub fn deep_copy(&self) -> Result<Self> {
        Ok(Self::from(self.inner().deep_copy()?))
    }

    /// Convert the elements to `dtype`. Shares the tensor when it already has
    /// that element type.
    pub fn as_type(&self, dtype: DType) -> Result<Self> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        Ok(Self::from(self.inner().as_type(dtype)?))
    }

    /// Deep copy of the rows in the half-open ranges `[start, stop)` of the
    /// leading dimension, in the given order. `num_rows` must equal the total
    /// number of selected rows.
    pub fn copy_rows(&self, selected_rows: &[(usize, usize)], num_rows: usize) -> Result<Self> {
        Ok(Self::from(self.inner().copy_rows(selected_rows, num_rows)?))
    }

    /// Read a single element into host memory.
    ///
    /// This is a debugging accessor: it issues one blocking transfer per call.
    pub fn read_element<T: Element>(&self, index: &[usize]) -> Result<T> {
        let tensor = self.inner();
        let shape = tensor.get_shape();
        precondition!(
            index.len() == shape.len(),
            "length of index {} must match rank {}",
            index.len(),
            shape.len()
        );
        precondition!(
            index.iter().zip(&shape).all(|(i, s)| i < s),
            "index is outside of the bounds of the tensor. Index={index:?}, Size={shape:?}"
        );
        precondition!(
            T::DTYPE == tensor.dtype(),
            "read_element type must match array type. read_element type: '{}', array type: '{}'",
            T::DTYPE,
            tensor.dtype()
        );

        let item_size = tensor.dtype().item_size();
        let offset = tensor.byte_offset() + offset_of(index, &tensor.get_stride()) * item_size;
        let bytes = tensor.storage().read_bytes(offset, item_size)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    /// Every byte the tensor spans, copied to the host and reinterpreted as `T`.
    ///
    /// For non-compact tensors this includes the elements between the
    /// viewed ones.
    pub fn to_host_vec<T: Element>(&self) -> Result<Vec<T>> {
        let tensor = self.inner();
        let bytes = tensor.bytes();
        precondition!(
            bytes % std::mem::size_of::<T>() == 0,
            "{bytes} bytes is not divisible by the size of {}",
            T::DTYPE
        );
        let host = tensor.storage().read_bytes(tensor.byte_offset(), bytes)?;
        Ok(cast_host_bytes(&host))
    }

    /// The elements in logical row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let tensor = self.inner();
        precondition!(
            T::DTYPE == tensor.dtype(),
            "to_vec type '{}' does not match array type '{}'",
            T::DTYPE,
            tensor.dtype()
        );
        let runs = layout_runs(
            &tensor.get_shape(),
            &tensor.get_stride(),
            tensor.dtype().item_size(),
        );
        let host = tensor.storage().read_runs(tensor.byte_offset(), &runs)?;
        Ok(cast_host_bytes(&host))
    }

    /// Move assignment: take over `other`'s device and tensor without moving
    /// any data, leaving `other` empty.
    pub fn move_from(&mut self, other: &mut Self) {
        *self = other.take();
    }

    /// Move the contents out, leaving this handle empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Copy assignment: overwrite this tensor's elements with `other`'s.
    ///
    /// Shapes, strides and dtypes must match, checked in that order. Nothing
    /// is written when a check fails. The write lands in the shared storage,
    /// so every handle sharing it observes the new values.
    pub fn copy_from(&self, other: &Self) -> Result<()> {
        let (dst, src) = (self.inner(), other.inner());
        if Arc::ptr_eq(dst, src) {
            return Ok(());
        }

        let (dst_shape, src_shape) = (dst.get_shape(), src.get_shape());
        if dst_shape != src_shape {
            return Err(Error::ShapeMismatch {
                lhs: dst_shape,
                rhs: src_shape,
            }
            .bt());
        }
        let (dst_stride, src_stride) = (dst.get_stride(), src.get_stride());
        if dst_stride != src_stride {
            return Err(Error::StrideMismatch {
                lhs: dst_stride,
                rhs: src_stride,
            }
            .bt());
        }
        if dst.dtype() != src.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: dst.dtype(),
                rhs: src.dtype(),
            }
            .bt());
        }
        precondition!(
            dst.bytes() == src.bytes(),
            "left and right bytes should be the same if all other checks passed"
        );

        if dst.is_compact() {
            return Storage::copy_bytes(
                dst.storage(),
                dst.byte_offset(),
                src.storage(),
                src.byte_offset(),
                dst.bytes(),
            );
        }
        // Equal layouts: copy element runs pairwise so the gaps of the
        // destination view are left alone.
        let runs = layout_runs(&dst_shape, &dst_stride, dst.dtype().item_size());
        if Arc::ptr_eq(dst.storage(), src.storage()) {
            // Overlapping views of one block: every source run must be read
            // before any destination run is written.
            let staged = src.storage().read_runs(src.byte_offset(), &runs)?;
            let mut at = 0;
            for (offset, len) in runs {
                dst.storage()
                    .write_bytes(dst.byte_offset() + offset, &staged[at..at + len])?;
                at += len;
            }
            return Ok(());
        }
        for (offset, len) in runs {
            Storage::copy_bytes(
                dst.storage(),
                dst.byte_offset() + offset,
                src.storage(),
                src.byte_offset() + offset,
                len,
            )?;
        }
        Ok(())
    }
}

impl From<Arc<dyn Tensor>> for TensorObject {
    fn from(tensor: Arc<dyn Tensor>) -> Self {
        Self::new(tensor.device(), tensor)
    }
}

impl fmt::Debug for TensorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tensor {
            None => f.write_str("TensorObject(empty)"),
            Some(tensor) => f
                .debug_struct("TensorObject")
                .field("device", &self.md)
                .field("dtype", &tensor.dtype())
                .field("shape", &tensor.get_shape())
                .field("stride", &tensor.get_stride())
                .finish(),
        }
    }
}
