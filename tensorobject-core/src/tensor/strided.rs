use std::sync::Arc;

use crate::{
    bail,
    dtype::convert_bytes,
    precondition,
    storage::{ByteRun, Storage},
    stride::{
        checked_span, complete_stride, contiguous_stride, element_count, is_contiguous, offset_of,
        span,
    },
    tensor::{Tensor, TensorStorage},
    DType, Device, Error, Result,
};

/// A strided window over a storage block of either memory domain.
#[derive(Clone)]
pub struct StridedTensor {
    storage: Arc<Storage>,
    dtype: DType,
    shape: Vec<usize>,
    stride: Vec<usize>,
    /// Offset of the first element, in elements.
    offset: usize,
}

impl StridedTensor {
    /// Describe `storage` as a tensor.
    ///
    /// `stride` may be empty (contiguous) or hold negative entries to be
    /// filled in. Fails when the described elements do not fit in `storage`.
    pub fn create(
        storage: Arc<Storage>,
        dtype: DType,
        shape: Vec<usize>,
        stride: &[isize],
        offset: usize,
    ) -> Result<Self> {
        let stride = complete_stride(&shape, stride)?;
        let Some(end) = checked_span(&shape, &stride)
            .and_then(|n| n.checked_add(offset))
            .and_then(|n| n.checked_mul(dtype.item_size()))
        else {
            bail!(
                @Bounds,
                "tensor of shape {shape:?}, stride {stride:?} and offset {offset} overflows the \
                 address space"
            );
        };
        if end > storage.len() {
            bail!(
                @Bounds,
                "tensor of shape {shape:?}, stride {stride:?} and offset {offset} needs {end} \
                 bytes but storage holds {}",
                storage.len()
            );
        }
        Ok(Self {
            storage,
            dtype,
            shape,
            stride,
            offset,
        })
    }

    /// Allocate a zeroed, compact tensor on `device`.
    pub fn zeros(shape: Vec<usize>, dtype: DType, device: &Device) -> Result<Self> {
        let bytes = shape
            .iter()
            .try_fold(dtype.item_size(), |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                Error::Bounds(format!("tensor of shape {shape:?} overflows the address space")).bt()
            })?;
        let storage = device.alloc_zeroed(bytes)?;
        Ok(Self::compact(Arc::new(storage), dtype, shape))
    }

    fn compact(storage: Arc<Storage>, dtype: DType, shape: Vec<usize>) -> Self {
        let stride = contiguous_stride(&shape);
        Self {
            storage,
            dtype,
            shape,
            stride,
            offset: 0,
        }
    }

    /// Byte runs covering every element in logical (row-major) order,
    /// relative to [`TensorStorage::byte_offset`].
    ///
    /// Trailing dimensions that are laid out contiguously merge into a single
    /// run, so a compact tensor is one run.
    pub(crate) fn runs(&self) -> Vec<ByteRun> {
        layout_runs(&self.shape, &self.stride, self.dtype.item_size())
    }

    /// Copy every element, in logical order, into a fresh compact block.
    fn materialize(&self, shape: Vec<usize>) -> Result<Self> {
        let device = self.storage.device();
        let dst = device.alloc_zeroed(self.count() * self.dtype.item_size())?;
        Storage::copy_runs(
            &dst,
            0,
            &self.storage,
            self.byte_offset(),
            &self.runs(),
        )?;
        Ok(Self::compact(Arc::new(dst), self.dtype, shape))
    }

    fn slice_view(&self, min_dims: &[usize], max_dims: &[usize]) -> Result<Self> {
        precondition!(
            min_dims.len() == self.rank() && max_dims.len() == self.rank(),
            "slice bounds of rank {} and {} for a tensor of rank {}",
            min_dims.len(),
            max_dims.len(),
            self.rank()
        );
        for (dim, ((lo, hi), extent)) in min_dims.iter().zip(max_dims).zip(&self.shape).enumerate()
        {
            if hi < lo || hi > extent {
                bail!(@Bounds, "slice [{lo}, {hi}) of dimension {dim} with extent {extent}");
            }
        }
        Ok(Self {
            storage: self.storage.clone(),
            dtype: self.dtype,
            shape: min_dims.iter().zip(max_dims).map(|(lo, hi)| hi - lo).collect(),
            stride: self.stride.clone(),
            offset: self.offset + offset_of(min_dims, &self.stride),
        })
    }
}

pub(crate) fn layout_runs(shape: &[usize], stride: &[usize], item_size: usize) -> Vec<ByteRun> {
    if element_count(shape) == 0 {
        return Vec::new();
    }

    let mut outer = shape.len();
    let mut block = 1;
    while outer > 0 && (shape[outer - 1] == 1 || stride[outer - 1] == block) {
        block *= shape[outer - 1];
        outer -= 1;
    }
    let (outer_shape, outer_stride) = (&shape[..outer], &stride[..outer]);

    let mut runs = Vec::with_capacity(element_count(outer_shape));
    let mut index = vec![0; outer];
    loop {
        runs.push((offset_of(&index, outer_stride) * item_size, block * item_size));
        // Odometer increment, last outer dimension fastest.
        let mut dim = outer;
        loop {
            if dim == 0 {
                return runs;
            }
            dim -= 1;
            index[dim] += 1;
            if index[dim] < outer_shape[dim] {
                break;
            }
            index[dim] = 0;
        }
    }
}

impl TensorStorage for StridedTensor {
    fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    fn byte_offset(&self) -> usize {
        self.offset * self.dtype.item_size()
    }

    fn bytes(&self) -> usize {
        span(&self.shape, &self.stride) * self.dtype.item_size()
    }
}

impl Tensor for StridedTensor {
    fn rank(&self) -> usize {
        self.shape.len()
    }

    fn count(&self) -> usize {
        element_count(&self.shape)
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn shape(&self, dim: usize) -> usize {
        self.shape[dim]
    }

    fn stride(&self, dim: usize) -> usize {
        self.stride[dim]
    }

    fn is_compact(&self) -> bool {
        is_contiguous(&self.shape, &self.stride)
    }

    fn get_shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn get_stride(&self) -> Vec<usize> {
        self.stride.clone()
    }

    fn slice(&self, min_dims: &[usize], max_dims: &[usize]) -> Result<Arc<dyn Tensor>> {
        Ok(Arc::new(self.slice_view(min_dims, max_dims)?))
    }

    fn reshape(&self, dims: &[usize]) -> Result<Arc<dyn Tensor>> {
        if element_count(dims) != self.count() {
            return Err(Error::ShapeMismatch {
                lhs: self.shape.clone(),
                rhs: dims.to_vec(),
            }
            .bt());
        }
        if self.is_compact() {
            return Ok(Arc::new(Self {
                storage: self.storage.clone(),
                dtype: self.dtype,
                shape: dims.to_vec(),
                stride: contiguous_stride(dims),
                offset: self.offset,
            }));
        }
        tracing::debug!(
            from = ?self.shape,
            to = ?dims,
            stride = ?self.stride,
            "materializing non-compact tensor for reshape"
        );
        Ok(Arc::new(self.materialize(dims.to_vec())?))
    }

    fn deep_copy(&self) -> Result<Arc<dyn Tensor>> {
        Ok(Arc::new(self.materialize(self.shape.clone())?))
    }

    fn copy_rows(
        &self,
        selected_rows: &[(usize, usize)],
        num_rows: usize,
    ) -> Result<Arc<dyn Tensor>> {
        let Some(&rows) = self.shape.first() else {
            bail!(@Bounds, "copy_rows needs a tensor of rank 1 or more");
        };
        let mut selected = 0;
        for &(start, stop) in selected_rows {
            if start > stop || stop > rows {
                bail!(@Bounds, "row range [{start}, {stop}) is not within [0, {rows})");
            }
            selected += stop - start;
        }
        if selected != num_rows {
            bail!(
                @Bounds,
                "row ranges select {selected} rows but {num_rows} were requested"
            );
        }

        let mut shape = self.shape.clone();
        shape[0] = num_rows;
        let item_size = self.dtype.item_size();
        let row_bytes = element_count(&self.shape[1..]) * item_size;
        let dst = self
            .storage
            .device()
            .alloc_zeroed(num_rows * row_bytes)?;

        let mut at = 0;
        for &(start, stop) in selected_rows {
            let n = stop - start;
            if n == 0 || row_bytes == 0 {
                continue;
            }
            tracing::trace!(start, stop, "copying rows");
            if self.is_compact() {
                Storage::copy_bytes(
                    &dst,
                    at,
                    &self.storage,
                    self.byte_offset() + start * row_bytes,
                    n * row_bytes,
                )?;
            } else {
                let mut lo = vec![0; self.rank()];
                lo[0] = start;
                let mut hi = self.shape.clone();
                hi[0] = stop;
                let sub = self.slice_view(&lo, &hi)?;
                Storage::copy_runs(&dst, at, &self.storage, sub.byte_offset(), &sub.runs())?;
            }
            at += n * row_bytes;
        }

        Ok(Arc::new(Self::compact(Arc::new(dst), self.dtype, shape)))
    }

    fn as_type(&self, dtype: DType) -> Result<Arc<dyn Tensor>> {
        if dtype == self.dtype {
            return Ok(Arc::new(self.clone()));
        }
        tracing::debug!(from = %self.dtype, to = %dtype, count = self.count(), "converting dtype");
        let host = self.storage.read_runs(self.byte_offset(), &self.runs())?;
        let converted = convert_bytes(&host, self.dtype, dtype)?;
        let storage = self.storage.device().storage_from_bytes(&converted)?;
        Ok(Arc::new(Self::compact(
            Arc::new(storage),
            dtype,
            self.shape.clone(),
        )))
    }
}
