//! EEPROM-style word stores.
//!
//! Both stores keep a byte image in which erased cells read as `0xFF`, and
//! encode words little-endian the way the AVR `eeprom_*_word` routines do.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use knob_traits::WordStore;

use crate::atomic::write_atomic;
use crate::error::{HwError, Result};

/// Default image size; matches the 512-byte EEPROM of small AVR parts.
pub const DEFAULT_CAPACITY: usize = 512;

const ERASED_BYTE: u8 = 0xFF;

fn read_le(image: &[u8], addr: u16) -> Result<u16> {
    let i = usize::from(addr);
    match image.get(i..i + 2) {
        Some(&[lo, hi]) => Ok(u16::from_le_bytes([lo, hi])),
        _ => Err(HwError::AddressOutOfRange { addr }),
    }
}

fn write_le(image: &mut [u8], addr: u16, value: u16) -> Result<()> {
    let i = usize::from(addr);
    let cell = image
        .get_mut(i..i + 2)
        .ok_or(HwError::AddressOutOfRange { addr })?;
    cell.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

#[derive(Debug)]
struct MemoryInner {
    image: Vec<u8>,
    writes: u64,
    fail_writes: bool,
    stuck_addr: Option<u16>,
}

/// In-RAM EEPROM image. Clones share the same cells, so a test can keep a
/// handle while the pipeline owns another.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::erased(DEFAULT_CAPACITY)
    }
}

impl MemoryStore {
    /// A fully erased image of `capacity` bytes.
    pub fn erased(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                image: vec![ERASED_BYTE; capacity],
                writes: 0,
                fail_writes: false,
                stuck_addr: None,
            })),
        }
    }

    /// Pre-load words at the given byte addresses.
    pub fn with_words(words: &[(u16, u16)]) -> Result<Self> {
        let store = Self::default();
        {
            let mut inner = store.lock();
            for &(addr, value) in words {
                write_le(&mut inner.image, addr, value)?;
            }
        }
        Ok(store)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means a test thread panicked mid-write; the
        // image itself is still usable.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Read a word without going through the trait (inspection helper).
    pub fn peek(&self, addr: u16) -> Result<u16> {
        read_le(&self.lock().image, addr)
    }

    /// Number of successful `write_word` calls so far.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    /// Make every subsequent write fail with [`HwError::WriteFault`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Silently ignore writes to `addr` (a worn-out cell that stays erased).
    pub fn set_stuck_word(&self, addr: Option<u16>) {
        self.lock().stuck_addr = addr;
    }

    /// Reset every cell to the erased state.
    pub fn erase(&self) {
        self.lock().image.fill(ERASED_BYTE);
    }
}

impl WordStore for MemoryStore {
    fn read_word(&mut self, addr: u16) -> std::result::Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.peek(addr)?)
    }

    fn write_word(
        &mut self,
        addr: u16,
        value: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Box::new(HwError::WriteFault { addr }));
        }
        if inner.stuck_addr == Some(addr) {
            tracing::trace!(addr, "write to stuck cell ignored");
            return Ok(());
        }
        write_le(&mut inner.image, addr, value)?;
        inner.writes = inner.writes.saturating_add(1);
        Ok(())
    }
}

/// EEPROM image persisted to a file on the host.
///
/// A missing file reads as fully erased. Every write rewrites the image
/// atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    image: Vec<u8>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    pub fn open_with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut image = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(HwError::Io(e)),
        };
        image.resize(capacity.max(image.len()), ERASED_BYTE);
        tracing::debug!(path = %path.display(), bytes = image.len(), "eeprom image opened");
        Ok(Self { path, image })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reset every cell to the erased state and persist the image.
    pub fn erase(&mut self) -> Result<()> {
        self.image.fill(ERASED_BYTE);
        write_atomic(&self.path, &self.image)?;
        Ok(())
    }
}

impl WordStore for FileStore {
    fn read_word(&mut self, addr: u16) -> std::result::Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Ok(read_le(&self.image, addr)?)
    }

    fn write_word(
        &mut self,
        addr: u16,
        value: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        write_le(&mut self.image, addr, value)?;
        write_atomic(&self.path, &self.image).map_err(HwError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erased_store_reads_all_ones() {
        let mut store = MemoryStore::default();
        assert_eq!(store.read_word(0).unwrap(), 0xFFFF);
        assert_eq!(store.read_word(18).unwrap(), 0xFFFF);
    }

    #[test]
    fn words_are_little_endian() {
        let mut store = MemoryStore::erased(8);
        store.write_word(2, 0x03E8).unwrap();
        let inner = store.lock();
        assert_eq!(&inner.image[2..4], &[0xE8, 0x03]);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut store = MemoryStore::erased(4);
        let err = store.read_word(3).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn clones_share_cells() {
        let a = MemoryStore::default();
        let mut b = a.clone();
        b.write_word(4, 42).unwrap();
        assert_eq!(a.peek(4).unwrap(), 42);
        assert_eq!(a.write_count(), 1);
    }

    #[test]
    fn stuck_cell_keeps_erased_value() {
        let mut store = MemoryStore::default();
        store.set_stuck_word(Some(6));
        store.write_word(6, 500).unwrap();
        assert_eq!(store.peek(6).unwrap(), 0xFFFF);
    }

    #[test]
    fn file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eeprom.bin");
        {
            let mut store = FileStore::open(&path).unwrap();
            assert_eq!(store.read_word(0).unwrap(), 0xFFFF);
            store.write_word(0, 1000).unwrap();
        }
        let mut reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.read_word(0).unwrap(), 1000);
        reopened.erase().unwrap();
        assert_eq!(reopened.read_word(0).unwrap(), 0xFFFF);
    }
}
