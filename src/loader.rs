//! ELF image loading.

use object::{Architecture, Object, ObjectSection, ObjectSegment, ObjectSymbol};

use crate::bus::SystemBus;
use crate::Uxlen;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("malformed ELF image: {0}")]
    Parse(#[from] object::Error),
    #[error("not a RISC-V image: {0:?}")]
    Architecture(Architecture),
    #[error("segment at {addr:#x} of {size:#x} bytes is outside of memory")]
    SegmentOutOfMemory { addr: Uxlen, size: Uxlen },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    pub entry: Uxlen,
    /// Address of the riscv-tests `tohost` word, if the image has one.
    pub tohost: Option<Uxlen>,
}

/// Copies the loadable segments of an ELF image into DRAM.
///
/// Bytes between the file size and the memory size of a segment are zeroed.
pub fn load_elf(image: &[u8], bus: &mut SystemBus) -> Result<LoadedImage, LoadError> {
    let file = object::File::parse(image)?;
    match file.architecture() {
        Architecture::Riscv64 | Architecture::Riscv32 => {}
        other => return Err(LoadError::Architecture(other)),
    }

    for segment in file.segments() {
        let addr = segment.address();
        let size = segment.size();
        let data = segment.data()?;
        log::debug!(
            "Loading segment at {addr:#x}: {:#x} bytes from file, {size:#x} in memory",
            data.len()
        );
        let out_of_memory = || LoadError::SegmentOutOfMemory { addr, size };
        let len = usize::try_from(size).map_err(|_| out_of_memory())?;
        if data.len() > len {
            return Err(out_of_memory());
        }
        let memory = bus.dram_mut(addr, len).map_err(|_| out_of_memory())?;
        let (filled, zeroed) = memory.split_at_mut(data.len());
        filled.copy_from_slice(data);
        zeroed.fill(0);
    }

    let tohost = file
        .symbols()
        .find(|symbol| symbol.name().map_or(false, |name| name == "tohost"))
        .map(|symbol| symbol.address())
        .or_else(|| file.section_by_name(".tohost").map(|s| s.address()));

    Ok(LoadedImage {
        entry: file.entry(),
        tohost,
    })
}
