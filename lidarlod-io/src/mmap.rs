//! Memory-mapped access to LAS files
//!
//! Large files are mapped read-only when the `io-mmap` feature is enabled and
//! the platform supports it. Everything else is read into memory, so callers
//! always get a byte slice through [`LasSource`].

#[cfg(feature = "io-mmap")]
use memmap2::Mmap;
use lidarlod_core::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Files below this size are read into memory instead of mapped
pub const MIN_MMAP_SIZE: u64 = 64 * 1024;

/// Backing bytes of an opened LAS file
#[derive(Debug)]
pub enum LasSource {
    #[cfg(feature = "io-mmap")]
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl LasSource {
    /// Open `path`, mapping it when worthwhile and falling back to a full read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();

        #[cfg(feature = "io-mmap")]
        {
            if Self::is_mmap_supported() && len >= MIN_MMAP_SIZE {
                // The map is read-only and the file is not written while mapped.
                match unsafe { Mmap::map(&file) } {
                    Ok(mmap) => {
                        log::debug!("mapped {} ({} bytes)", path.as_ref().display(), len);
                        return Ok(Self::Mapped(mmap));
                    }
                    Err(e) => {
                        log::warn!("mmap failed for {}, reading instead: {}", path.as_ref().display(), e);
                    }
                }
            }
        }

        let mut bytes = Vec::with_capacity(len as usize);
        file.read_to_end(&mut bytes)?;
        Ok(Self::Owned(bytes))
    }

    /// Whether memory mapping is available in this build
    pub fn is_mmap_supported() -> bool {
        cfg!(all(feature = "io-mmap", any(unix, windows)))
    }

    pub fn is_mapped(&self) -> bool {
        match self {
            #[cfg(feature = "io-mmap")]
            Self::Mapped(_) => true,
            Self::Owned(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for LasSource {
    fn as_ref(&self) -> &[u8] {
        match self {
            #[cfg(feature = "io-mmap")]
            Self::Mapped(mmap) => &mmap[..],
            Self::Owned(bytes) => bytes.as_slice(),
        }
    }
}
