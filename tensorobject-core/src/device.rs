use std::fmt;

#[cfg(feature = "cuda")]
use crate::cuda_backend::CudaDevice;
use crate::{
    cpu_storage::CpuDevice,
    storage::{BackendDevice, Storage},
    Result,
};

/// Which side of the host/accelerator boundary a memory domain lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Host,
    Device,
}

/// A memory domain. Cloning a device never clones or owns any storage.
#[derive(Clone)]
pub enum Device {
    #[cfg(feature = "cuda")]
    Cuda(CudaDevice),
    Cpu,
}

impl Device {
    /// Open the CUDA device with the given ordinal.
    #[cfg(feature = "cuda")]
    pub fn cuda(ordinal: usize) -> Result<Self> {
        Ok(Self::Cuda(CudaDevice::new(ordinal)?))
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => StorageKind::Device,
            Self::Cpu => StorageKind::Host,
        }
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self, Self::Cpu)
    }

    /// Allocate a zero-filled storage block of `bytes` bytes in this domain.
    pub fn alloc_zeroed(&self, bytes: usize) -> Result<Storage> {
        tracing::debug!(bytes, device = ?self, "allocating storage");
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(cuda) => Ok(Storage::Cuda(cuda.alloc_zeroed(bytes)?)),
            Self::Cpu => Ok(Storage::Cpu(CpuDevice.alloc_zeroed(bytes)?)),
        }
    }

    /// Allocate a storage block in this domain holding a copy of `bytes`.
    pub fn storage_from_bytes(&self, bytes: &[u8]) -> Result<Storage> {
        tracing::debug!(bytes = bytes.len(), device = ?self, "uploading storage");
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(cuda) => Ok(Storage::Cuda(cuda.storage_from_bytes(bytes)?)),
            Self::Cpu => Ok(Storage::Cpu(CpuDevice.storage_from_bytes(bytes)?)),
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            #[cfg(feature = "cuda")]
            (Self::Cuda(a), Self::Cuda(b)) => a.ordinal() == b.ordinal(),
            (Self::Cpu, Self::Cpu) => true,
            #[cfg(feature = "cuda")]
            _ => false,
        }
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(cuda) => write!(f, "Cuda({})", cuda.ordinal()),
            Self::Cpu => f.write_str("Cpu"),
        }
    }
}
