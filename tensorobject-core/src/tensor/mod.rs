use std::sync::Arc;

use crate::{storage::Storage, DType, Device, Result};

mod factory;
pub mod object;
pub mod strided;

pub use object::TensorObject;
pub use strided::StridedTensor;

/// A block of memory as seen by one tensor.
pub trait TensorStorage: Send + Sync {
    /// The block this tensor reads from.
    fn storage(&self) -> &Arc<Storage>;

    /// Byte offset of the tensor's first element inside [`TensorStorage::storage`].
    fn byte_offset(&self) -> usize;

    /// Number of bytes the tensor can reach, starting at [`TensorStorage::data_ptr`].
    fn bytes(&self) -> usize;

    /// Address of the first element, inside the owning memory domain.
    fn data_ptr(&self) -> *const u8 {
        self.storage().data_ptr().wrapping_add(self.byte_offset())
    }

    fn device(&self) -> Device {
        self.storage().device()
    }
}

/// Shape-aware view of a storage block, and the operations that derive new
/// tensors from it.
///
/// `slice` shares storage. `deep_copy`, `copy_rows` and a dtype changing
/// `as_type` always allocate; `reshape` allocates only for non-compact input.
pub trait Tensor: TensorStorage {
    fn rank(&self) -> usize;

    fn count(&self) -> usize;

    fn dtype(&self) -> DType;

    fn shape(&self, dim: usize) -> usize;

    fn stride(&self, dim: usize) -> usize;

    fn is_compact(&self) -> bool;

    /// View restricted to `[min_dims[i], max_dims[i])` along every dimension.
    fn slice(&self, min_dims: &[usize], max_dims: &[usize]) -> Result<Arc<dyn Tensor>>;

    fn reshape(&self, dims: &[usize]) -> Result<Arc<dyn Tensor>>;

    fn deep_copy(&self) -> Result<Arc<dyn Tensor>>;

    /// Gather the half-open row ranges of the leading dimension into a new
    /// compact tensor with `num_rows` rows.
    fn copy_rows(
        &self,
        selected_rows: &[(usize, usize)],
        num_rows: usize,
    ) -> Result<Arc<dyn Tensor>>;

    fn as_type(&self, dtype: DType) -> Result<Arc<dyn Tensor>>;

    fn get_shape(&self) -> Vec<usize> {
        (0..self.rank()).map(|i| self.shape(i)).collect()
    }

    fn get_stride(&self) -> Vec<usize> {
        (0..self.rank()).map(|i| self.stride(i)).collect()
    }
}
