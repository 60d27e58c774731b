#[cfg(feature = "cuda")]
use crate::cuda_backend::CudaStorage;
use crate::{cpu_storage::CpuStorage, precondition, Device, Result};

/// A contiguous byte block owned by one memory domain.
pub enum Storage {
    #[cfg(feature = "cuda")]
    Cuda(CudaStorage),
    Cpu(CpuStorage),
}

/// A byte range inside a storage block: `(offset, len)`, both in bytes.
pub type ByteRun = (usize, usize);

pub trait BackendStorage {
    /// Size of the block in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the first byte. Only meaningful inside the owning domain.
    fn data_ptr(&self) -> *const u8;

    /// Copy `n` bytes starting at `offset` into host memory.
    fn read_bytes(&self, offset: usize, n: usize) -> Result<Vec<u8>>;

    /// Overwrite the bytes starting at `offset` with `data`.
    fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()>;
}

pub trait BackendDevice {
    type Storage: BackendStorage;

    fn alloc_zeroed(&self, bytes: usize) -> Result<Self::Storage>;

    fn storage_from_bytes(&self, bytes: &[u8]) -> Result<Self::Storage>;
}

impl Storage {
    pub fn device(&self) -> Device {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(cuda) => Device::Cuda(cuda.device().clone()),
            Self::Cpu(_) => Device::Cpu,
        }
    }

    fn backend(&self) -> &dyn BackendStorage {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(cuda) => cuda,
            Self::Cpu(cpu) => cpu,
        }
    }

    pub fn len(&self) -> usize {
        self.backend().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend().is_empty()
    }

    pub fn data_ptr(&self) -> *const u8 {
        self.backend().data_ptr()
    }

    pub fn read_bytes(&self, offset: usize, n: usize) -> Result<Vec<u8>> {
        precondition!(
            offset + n <= self.len(),
            "read of {n} bytes at {offset} overruns a {} byte block",
            self.len()
        );
        self.backend().read_bytes(offset, n)
    }

    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        precondition!(
            offset + data.len() <= self.len(),
            "write of {} bytes at {offset} overruns a {} byte block",
            data.len(),
            self.len()
        );
        self.backend().write_bytes(offset, data)
    }

    /// Copy the `runs` (relative to `base`) into host memory, packed in order.
    pub fn read_runs(&self, base: usize, runs: &[ByteRun]) -> Result<Vec<u8>> {
        self.check_runs(base, runs);
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(cuda) => cuda.read_runs(base, runs),
            Self::Cpu(cpu) => Ok(cpu.read_runs(base, runs)),
        }
    }

    /// Copy `n` bytes from `src` at `src_offset` to `dst` at `dst_offset`.
    ///
    /// Works within one block, between blocks of one domain and across
    /// domains. Blocks until the bytes have landed.
    pub fn copy_bytes(
        dst: &Storage,
        dst_offset: usize,
        src: &Storage,
        src_offset: usize,
        n: usize,
    ) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        Self::copy_runs(dst, dst_offset, src, src_offset, &[(0, n)])
    }

    /// Gather the `runs` of `src` (relative to `src_base`) and write them
    /// back to back into `dst` starting at `dst_offset`.
    pub fn copy_runs(
        dst: &Storage,
        dst_offset: usize,
        src: &Storage,
        src_base: usize,
        runs: &[ByteRun],
    ) -> Result<()> {
        src.check_runs(src_base, runs);
        let total: usize = runs.iter().map(|(_, len)| len).sum();
        precondition!(
            dst_offset + total <= dst.len(),
            "copy of {total} bytes at {dst_offset} overruns a {} byte block",
            dst.len()
        );

        match (dst, src) {
            (Self::Cpu(d), Self::Cpu(s)) => {
                CpuStorage::copy_runs(d, dst_offset, s, src_base, runs);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            (Self::Cuda(d), Self::Cuda(s)) => {
                CudaStorage::copy_runs(d, dst_offset, s, src_base, runs)
            }
            #[cfg(feature = "cuda")]
            _ => {
                tracing::debug!(
                    bytes = total,
                    src = ?src.device(),
                    dst = ?dst.device(),
                    "cross-domain copy"
                );
                let staged = src.read_runs(src_base, runs)?;
                dst.write_bytes(dst_offset, &staged)
            }
        }
    }

    fn check_runs(&self, base: usize, runs: &[ByteRun]) {
        let end = runs
            .iter()
            .map(|(offset, len)| base + offset + len)
            .max()
            .unwrap_or(0);
        precondition!(
            end <= self.len(),
            "byte runs end at {end}, past a {} byte block",
            self.len()
        );
    }
}
