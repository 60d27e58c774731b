use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    storage::{BackendDevice, BackendStorage, ByteRun},
    Result,
};

pub struct CpuDevice;

/// Host memory block. The lock gives shared handles a way to write through
/// copy-assignment; the buffer length never changes after allocation.
pub struct CpuStorage {
    data: RwLock<Vec<u8>>,
}

impl CpuStorage {
    fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read_runs(&self, base: usize, runs: &[ByteRun]) -> Vec<u8> {
        let data = self.read();
        let total = runs.iter().map(|(_, len)| len).sum();
        let mut out = Vec::with_capacity(total);
        for (offset, len) in runs {
            let start = base + offset;
            out.extend_from_slice(&data[start..start + len]);
        }
        out
    }

    pub(crate) fn copy_runs(
        dst: &CpuStorage,
        dst_offset: usize,
        src: &CpuStorage,
        src_base: usize,
        runs: &[ByteRun],
    ) {
        if std::ptr::eq(dst, src) {
            if let [(offset, len)] = runs {
                let start = src_base + offset;
                dst.write().copy_within(start..start + len, dst_offset);
                return;
            }
            // The destination range may cover source runs not yet read.
            let staged = src.read_runs(src_base, runs);
            dst.write()[dst_offset..dst_offset + staged.len()].copy_from_slice(&staged);
            return;
        }

        // Lock in address order so two opposite copies cannot deadlock.
        let (src_data, mut dst_data) = if (src as *const Self) < (dst as *const Self) {
            let s = src.read();
            (s, dst.write())
        } else {
            let d = dst.write();
            (src.read(), d)
        };
        let mut at = dst_offset;
        for (offset, len) in runs {
            let start = src_base + offset;
            dst_data[at..at + len].copy_from_slice(&src_data[start..start + len]);
            at += len;
        }
    }
}

impl BackendStorage for CpuStorage {
    fn len(&self) -> usize {
        self.read().len()
    }

    fn data_ptr(&self) -> *const u8 {
        self.read().as_ptr()
    }

    fn read_bytes(&self, offset: usize, n: usize) -> Result<Vec<u8>> {
        Ok(self.read()[offset..offset + n].to_vec())
    }

    fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.write()[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

impl BackendDevice for CpuDevice {
    type Storage = CpuStorage;

    fn alloc_zeroed(&self, bytes: usize) -> Result<Self::Storage> {
        Ok(CpuStorage {
            data: RwLock::new(vec![0u8; bytes]),
        })
    }

    fn storage_from_bytes(&self, bytes: &[u8]) -> Result<Self::Storage> {
        Ok(CpuStorage {
            data: RwLock::new(bytes.to_vec()),
        })
    }
}
