//! Contract between the CPU and the platform memory map.
//!
//! Every access takes the CPU's cycle accumulator and adds the cost of the
//! access to it. How much an access costs (sequential or not, wait states)
//! is entirely up to the implementation. Addresses are passed through
//! untouched; alignment, mirroring and wrap-around are the bus's business.

/// Window onto the most recently selected memory region, used by the CPU to
/// fetch instructions without a full address dispatch.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ActiveRegion {
    pub base: u32,
    /// Number of addresses the window covers; zero when nothing is selected.
    pub span: u32,
    /// Applied to an address to get an offset into [`MemoryBus::active_memory`].
    pub mask: u32,
    pub prefetch_cycles32: i32,
    pub prefetch_cycles16: i32,
}

impl ActiveRegion {
    pub const NONE: ActiveRegion = ActiveRegion {
        base: 0,
        span: 0,
        mask: 0,
        prefetch_cycles32: 0,
        prefetch_cycles16: 0,
    };

    pub fn contains(&self, address: u32) -> bool {
        self.span != 0 && address.wrapping_sub(self.base) < self.span
    }

    /// Reads a little-endian word of `width` bytes from `window`, aligning the
    /// address down to the width first.
    pub fn read(&self, window: &[u8], address: u32, width: u32) -> Option<u32> {
        let offset = ((address & !(width - 1)) & self.mask) as usize;
        let bytes = window.get(offset..offset + width as usize)?;
        Some(bytes.iter().rev().fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }
}

pub trait MemoryBus {
    fn load32(&mut self, address: u32, cycles: &mut i32) -> u32;
    fn load_u16(&mut self, address: u32, cycles: &mut i32) -> u16;
    fn load_u8(&mut self, address: u32, cycles: &mut i32) -> u8;

    fn load16(&mut self, address: u32, cycles: &mut i32) -> i16 {
        self.load_u16(address, cycles) as i16
    }

    fn load8(&mut self, address: u32, cycles: &mut i32) -> i8 {
        self.load_u8(address, cycles) as i8
    }

    fn store32(&mut self, address: u32, value: u32, cycles: &mut i32);
    fn store16(&mut self, address: u32, value: u16, cycles: &mut i32);
    fn store8(&mut self, address: u32, value: u8, cycles: &mut i32);

    /// Currently selected window. Buses without a fast path report none and
    /// every fetch goes through the load methods.
    fn active_region(&self) -> ActiveRegion {
        ActiveRegion::NONE
    }

    fn active_memory(&self) -> &[u8] {
        &[]
    }

    /// Selects the region containing `address` as the active window.
    fn set_active_region(&mut self, _address: u32) {}

    /// Total cost of `count` consecutive word accesses starting at `start`.
    fn wait_multiple(&mut self, start: u32, count: u32) -> i32;
}
