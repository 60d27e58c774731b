use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cudarc::driver::{CudaContext, CudaSlice, CudaStream, DevicePtr};
use error::{CudaError, WrapErr};

use crate::{
    storage::{BackendDevice, BackendStorage, ByteRun},
    Result,
};

pub(crate) mod error;

#[derive(Clone)]
pub struct CudaDevice {
    ordinal: usize,
    stream: Arc<CudaStream>,
}

impl CudaDevice {
    pub(crate) fn new(ordinal: usize) -> Result<Self> {
        let context =
            CudaContext::new(ordinal).map_err(|cuda| CudaError::Open { cuda, ordinal })?;
        let stream = context.new_stream().w()?;
        Ok(Self { ordinal, stream })
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub(crate) fn stream(&self) -> Arc<CudaStream> {
        self.stream.clone()
    }

    /// Wait for every transfer queued on this device's stream.
    pub(crate) fn synchronize(&self) -> Result<()> {
        self.stream.synchronize().w()
    }
}

/// Device memory block.
///
/// cudarc rejects zero sized allocations, so an empty block still holds one
/// byte and tracks its logical length separately.
pub struct CudaStorage {
    slice: RwLock<CudaSlice<u8>>,
    len: usize,
    device: CudaDevice,
}

impl CudaStorage {
    pub(crate) fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn read(&self) -> RwLockReadGuard<'_, CudaSlice<u8>> {
        self.slice.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CudaSlice<u8>> {
        self.slice.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Download the span covering every run once, then pick the runs on the host.
    pub(crate) fn read_runs(&self, base: usize, runs: &[ByteRun]) -> Result<Vec<u8>> {
        let Some(lo) = runs.iter().map(|(offset, _)| base + offset).min() else {
            return Ok(Vec::new());
        };
        let hi = runs
            .iter()
            .map(|(offset, len)| base + offset + len)
            .max()
            .unwrap_or(lo);
        let span = self.read_bytes(lo, hi - lo)?;
        let total = runs.iter().map(|(_, len)| len).sum();
        let mut out = Vec::with_capacity(total);
        for (offset, len) in runs {
            let start = base + offset - lo;
            out.extend_from_slice(&span[start..start + len]);
        }
        Ok(out)
    }

    pub(crate) fn copy_runs(
        dst: &CudaStorage,
        dst_offset: usize,
        src: &CudaStorage,
        src_base: usize,
        runs: &[ByteRun],
    ) -> Result<()> {
        // A block cannot be borrowed as source and destination view at once,
        // and peer copies are not set up, so both cases go through the host.
        if std::ptr::eq(dst, src) || dst.device.ordinal != src.device.ordinal {
            tracing::debug!(
                src = src.device.ordinal,
                dst = dst.device.ordinal,
                "staging device copy through host"
            );
            let staged = src.read_runs(src_base, runs)?;
            return dst.write_bytes(dst_offset, &staged);
        }

        let (src_slice, mut dst_slice) = if (src as *const Self) < (dst as *const Self) {
            let s = src.read();
            (s, dst.write())
        } else {
            let d = dst.write();
            (src.read(), d)
        };
        let stream = dst.device.stream();
        let mut at = dst_offset;
        for (offset, len) in runs {
            let start = src_base + offset;
            let src_view = src_slice.slice(start..start + len);
            let mut dst_view = dst_slice.slice_mut(at..at + len);
            stream.memcpy_dtod(&src_view, &mut dst_view).w()?;
            at += len;
        }
        dst.device.synchronize()
    }
}

impl BackendStorage for CudaStorage {
    fn len(&self) -> usize {
        self.len
    }

    fn data_ptr(&self) -> *const u8 {
        let slice = self.read();
        let (ptr, _sync) = slice.device_ptr(&self.device.stream);
        ptr as usize as *const u8
    }

    fn read_bytes(&self, offset: usize, n: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; n];
        if n == 0 {
            return Ok(out);
        }
        let slice = self.read();
        let view = slice.slice(offset..offset + n);
        self.device
            .stream
            .memcpy_dtoh(&view, out.as_mut_slice())
            .w()?;
        self.device.synchronize()?;
        Ok(out)
    }

    fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut slice = self.write();
        let mut view = slice.slice_mut(offset..offset + data.len());
        self.device.stream.memcpy_htod(data, &mut view).w()?;
        self.device.synchronize()
    }
}

impl BackendDevice for CudaDevice {
    type Storage = CudaStorage;

    fn alloc_zeroed(&self, bytes: usize) -> Result<Self::Storage> {
        let slice = self.stream.alloc_zeros::<u8>(bytes.max(1)).w()?;
        Ok(CudaStorage {
            slice: RwLock::new(slice),
            len: bytes,
            device: self.clone(),
        })
    }

    fn storage_from_bytes(&self, bytes: &[u8]) -> Result<Self::Storage> {
        let storage = self.alloc_zeroed(bytes.len())?;
        storage.write_bytes(0, bytes)?;
        Ok(storage)
    }
}
