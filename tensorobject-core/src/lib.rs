//! Tensorobject provides strided, shape-aware handles over a block of host or
//! accelerator memory.
//!
//! A [`TensorObject`] pairs a memory domain ([`Device`]) with a [`Tensor`]
//! implementation. Handles are cheap to clone and share their storage. Views
//! ([`TensorObject::slice`], [`TensorObject::reshape`] of a compact tensor, and
//! [`TensorObject::as_type`] to the same dtype) never move data, while
//! [`TensorObject::deep_copy`], [`TensorObject::copy_rows`] and converting
//! [`TensorObject::as_type`] calls always produce a new, independently owned
//! block in the same domain.
//!
//! Errors come in two tiers. Invalid caller input that can be corrected at
//! runtime (mismatched shapes, out of range slices or row ranges) is returned
//! as an [`Error`]. Contract violations (an empty handle, an index of the wrong
//! rank, an out of range element index) panic.
//!
//! Only CPU is supported by default; enable the `cuda` feature for device
//! memory through [`cudarc`](https://docs.rs/cudarc).
//!
//! ## What can you do with it?
//! ```
//! use tensorobject_core::{DType, Device, TensorObject};
//!
//! let data: Vec<f32> = (0..12).map(|x| x as f32).collect();
//! let t = TensorObject::from_vec(data, &[4, 3], &Device::Cpu).unwrap();
//!
//! // Rows 1..3, every column: a view sharing `t`'s storage.
//! let view = t.slice(&[1, 0], &[3, -1]).unwrap();
//! assert_eq!(view.get_shape(), vec![2, 3]);
//! assert!(view.shares_storage(&t));
//!
//! // Gather rows 0 and 3 into a new compact block.
//! let rows = t.copy_rows(&[(0, 1), (3, 4)], 2).unwrap();
//! assert_eq!(rows.to_vec::<f32>().unwrap(), vec![0., 1., 2., 9., 10., 11.]);
//!
//! let ints = rows.as_type(DType::I64).unwrap();
//! assert_eq!(ints.read_element::<i64>(&[1, 2]).unwrap(), 11);
//! ```

mod cpu_storage;
#[cfg(feature = "cuda")]
mod cuda_backend;
mod device;
mod dtype;
mod error;
mod storage;
pub mod stride;
mod tensor;

#[cfg(feature = "cuda")]
pub use cuda_backend::CudaDevice;
pub use device::{Device, StorageKind};
pub use dtype::{DType, Element};
pub use error::{Context, Error, Result};
pub use storage::{BackendDevice, BackendStorage, ByteRun, Storage};
pub use tensor::{StridedTensor, Tensor, TensorObject, TensorStorage};
