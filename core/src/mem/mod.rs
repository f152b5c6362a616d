use crate::bus::{ActiveRegion, MemoryBus};

/// Cycle costs for one region. Each value is the full cost of the access,
/// the base cycle included.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionTiming {
    pub nonseq16: i32,
    pub seq16: i32,
    pub nonseq32: i32,
    pub seq32: i32,
}

impl RegionTiming {
    pub const fn uniform(cycles: i32) -> Self {
        Self { nonseq16: cycles, seq16: cycles, nonseq32: cycles, seq32: cycles }
    }

    /// Timing of a 16-bit bus with `n`/`s` wait states.
    pub const fn narrow_bus(n: i32, s: i32) -> Self {
        Self { nonseq16: 1 + n, seq16: 1 + s, nonseq32: 2 + n + s, seq32: 2 + 2 * s }
    }

    fn cost(&self, width: u32, sequential: bool) -> i32 {
        match (width, sequential) {
            (4, true) => self.seq32,
            (4, false) => self.nonseq32,
            (_, true) => self.seq16,
            (_, false) => self.nonseq16,
        }
    }
}

impl Default for RegionTiming {
    fn default() -> Self { Self::uniform(1) }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionConfig {
    pub name: String,
    pub base: u32,
    /// Address range the region answers to; the backing store mirrors across it.
    pub span: u32,
    /// Backing store size in bytes, rounded up to a power of two.
    pub size: u32,
    pub writable: bool,
    pub timing: RegionTiming,
}

impl RegionConfig {
    pub fn new(name: &str, base: u32, span: u32, size: u32, writable: bool, timing: RegionTiming) -> Self {
        Self { name: name.to_string(), base, span, size, writable, timing }
    }
}

struct Region {
    name: String,
    base: u32,
    span: u32,
    mask: u32,
    writable: bool,
    timing: RegionTiming,
    data: Vec<u8>,
}

impl Region {
    fn contains(&self, address: u32) -> bool {
        address.wrapping_sub(self.base) < self.span
    }

    fn offset(&self, address: u32) -> usize {
        (address & self.mask) as usize
    }

    fn read(&self, address: u32, width: u32) -> u32 {
        let offset = self.offset(address);
        (0..width as usize).rev().fold(0u32, |acc, i| (acc << 8) | self.data[(offset + i) & self.mask as usize] as u32)
    }

    fn write(&mut self, address: u32, value: u32, width: u32) {
        let offset = self.offset(address);
        for i in 0..width as usize {
            let index = (offset + i) & self.mask as usize;
            self.data[index] = (value >> (8 * i)) as u8;
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct LastAccess {
    region: usize,
    next: u32,
}

/// Region-table memory map with per-region wait states.
///
/// An access is sequential when it lands in the same region right after the
/// previous one (previous aligned address plus its width).
pub struct MemoryMap {
    regions: Vec<Region>,
    active: Option<usize>,
    last: Option<LastAccess>,
}

const UNMAPPED_CYCLES: i32 = 1;
/// Largest backing store a region gets; bigger sizes are clamped.
pub const MAX_REGION_SIZE: u32 = 1 << 26;

impl MemoryMap {
    pub fn new() -> Self {
        Self { regions: Vec::new(), active: None, last: None }
    }

    pub fn from_configs(configs: &[RegionConfig]) -> Self {
        let mut map = Self::new();
        for config in configs {
            map.add_region(config);
        }
        map
    }

    /// GBA-style layout: BIOS, on-board and on-chip work RAM, and a cartridge
    /// ROM window with the default 4/2 wait states.
    pub fn default_regions() -> Vec<RegionConfig> {
        vec![
            RegionConfig::new("bios", 0x0000_0000, 0x0100_0000, 0x4000, false, RegionTiming::uniform(1)),
            RegionConfig::new("ewram", 0x0200_0000, 0x0100_0000, 0x4_0000, true, RegionTiming::narrow_bus(2, 2)),
            RegionConfig::new("iwram", 0x0300_0000, 0x0100_0000, 0x8000, true, RegionTiming::uniform(1)),
            RegionConfig::new("rom", 0x0800_0000, 0x0600_0000, 0x200_0000, false, RegionTiming::narrow_bus(4, 2)),
        ]
    }

    /// Adds a region and returns its index. Later regions never shadow earlier
    /// ones; lookups take the first match.
    pub fn add_region(&mut self, config: &RegionConfig) -> usize {
        if config.size > MAX_REGION_SIZE {
            log::warn!("region {} clamped to {:#x} bytes", config.name, MAX_REGION_SIZE);
        }
        let size = config.size.clamp(4, MAX_REGION_SIZE).next_power_of_two();
        self.regions.push(Region {
            name: config.name.clone(),
            base: config.base,
            span: config.span,
            mask: size - 1,
            writable: config.writable,
            timing: config.timing,
            data: vec![0; size as usize],
        });
        self.regions.len() - 1
    }

    pub fn region_name(&self, address: u32) -> Option<&str> {
        self.region_index(address).map(|i| self.regions[i].name.as_str())
    }

    /// Copies `bytes` in at `address` regardless of writability. Returns false
    /// when the block does not fit inside one region's backing store.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> bool {
        let Some(index) = self.region_index(address) else {
            return false;
        };
        let region = &mut self.regions[index];
        let offset = region.offset(address);
        let Some(dst) = region.data.get_mut(offset..offset + bytes.len()) else {
            return false;
        };
        dst.copy_from_slice(bytes);
        true
    }

    /// Reads without charging cycles or disturbing access tracking.
    pub fn peek32(&self, address: u32) -> u32 {
        self.region_index(address)
            .map(|i| self.regions[i].read(address & !3, 4))
            .unwrap_or(0)
    }

    fn region_index(&self, address: u32) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(address))
    }

    fn charge(&mut self, address: u32, width: u32, cycles: &mut i32) -> Option<usize> {
        let aligned = address & !(width - 1);
        let Some(index) = self.region_index(aligned) else {
            self.last = None;
            *cycles += UNMAPPED_CYCLES;
            return None;
        };
        let sequential = self.last == Some(LastAccess { region: index, next: aligned });
        let cost = self.regions[index].timing.cost(width, sequential);
        *cycles += cost;
        self.last = Some(LastAccess { region: index, next: aligned.wrapping_add(width) });

        #[cfg(feature = "trace_bus")]
        log::trace!(target: "bus", "{:#010x} w{} {} +{}", address, width, if sequential { "S" } else { "N" }, cost);

        Some(index)
    }

    fn read(&mut self, address: u32, width: u32, cycles: &mut i32) -> u32 {
        match self.charge(address, width, cycles) {
            Some(index) => self.regions[index].read(address & !(width - 1), width),
            None => 0,
        }
    }

    fn write(&mut self, address: u32, value: u32, width: u32, cycles: &mut i32) {
        if let Some(index) = self.charge(address, width, cycles) {
            let region = &mut self.regions[index];
            if region.writable {
                region.write(address & !(width - 1), value, width);
            }
        }
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::from_configs(&Self::default_regions())
    }
}

impl MemoryBus for MemoryMap {
    fn load32(&mut self, address: u32, cycles: &mut i32) -> u32 {
        self.read(address, 4, cycles).rotate_right(8 * (address & 3))
    }

    fn load_u16(&mut self, address: u32, cycles: &mut i32) -> u16 {
        // Odd addresses rotate the halfword within the word.
        (self.read(address, 2, cycles) as u16).rotate_right(8 * (address & 1))
    }

    fn load16(&mut self, address: u32, cycles: &mut i32) -> i16 {
        if address & 1 != 0 {
            return self.read(address, 1, cycles) as i8 as i16;
        }
        self.read(address, 2, cycles) as i16
    }

    fn load_u8(&mut self, address: u32, cycles: &mut i32) -> u8 {
        self.read(address, 1, cycles) as u8
    }

    fn store32(&mut self, address: u32, value: u32, cycles: &mut i32) {
        self.write(address, value, 4, cycles);
    }

    fn store16(&mut self, address: u32, value: u16, cycles: &mut i32) {
        self.write(address, value as u32, 2, cycles);
    }

    fn store8(&mut self, address: u32, value: u8, cycles: &mut i32) {
        self.write(address, value as u32, 1, cycles);
    }

    fn active_region(&self) -> ActiveRegion {
        match self.active {
            Some(index) => {
                let region = &self.regions[index];
                ActiveRegion {
                    base: region.base,
                    span: region.span,
                    mask: region.mask,
                    prefetch_cycles32: region.timing.seq32,
                    prefetch_cycles16: region.timing.seq16,
                }
            }
            None => ActiveRegion::NONE,
        }
    }

    fn active_memory(&self) -> &[u8] {
        match self.active {
            Some(index) => &self.regions[index].data,
            None => &[],
        }
    }

    fn set_active_region(&mut self, address: u32) {
        self.active = self.region_index(address);
    }

    fn wait_multiple(&mut self, start: u32, count: u32) -> i32 {
        let mut total = 0;
        let mut previous = None;
        let mut address = start & !3;
        for _ in 0..count {
            match self.region_index(address) {
                Some(index) => {
                    total += self.regions[index].timing.cost(4, previous == Some(index));
                    previous = Some(index);
                    self.last = Some(LastAccess { region: index, next: address.wrapping_add(4) });
                }
                None => {
                    total += UNMAPPED_CYCLES;
                    previous = None;
                    self.last = None;
                }
            }
            address = address.wrapping_add(4);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_map() -> MemoryMap {
        MemoryMap::from_configs(&[
            RegionConfig::new("ram", 0x0200_0000, 0x0100_0000, 0x1000, true, RegionTiming::narrow_bus(2, 1)),
            RegionConfig::new("fast", 0x0300_0000, 0x0100_0000, 0x100, true, RegionTiming::uniform(1)),
            RegionConfig::new("rom", 0x0800_0000, 0x0100_0000, 0x100, false, RegionTiming::narrow_bus(4, 2)),
        ])
    }

    #[test]
    fn oversized_region_is_clamped() {
        let mut map = MemoryMap::from_configs(&[RegionConfig::new(
            "huge",
            0x1000_0000,
            0x9000_0000,
            0x9000_0000,
            true,
            RegionTiming::uniform(1),
        )]);
        let end = 0x1000_0000 + MAX_REGION_SIZE;
        assert!(map.load(end - 4, &[1, 2, 3, 4]));
        assert!(!map.load(end - 2, &[1, 2, 3, 4]));
        assert_eq!(map.peek32(end - 4), 0x0403_0201);
    }

    #[test]
    fn adjacent_access_in_same_region_is_sequential() {
        let mut map = test_map();
        let mut first = 0;
        map.load32(0x0200_0000, &mut first);
        assert_eq!(first, 5);

        let mut second = 0;
        map.load_u16(0x0200_0004, &mut second);
        assert_eq!(second, 2);

        let mut third = 0;
        map.load_u16(0x0200_0040, &mut third);
        assert_eq!(third, 3);
    }

    #[test]
    fn switching_region_breaks_sequence() {
        let mut map = test_map();
        let mut cycles = 0;
        map.load32(0x0200_0000, &mut cycles);
        map.load32(0x0300_0000, &mut cycles);
        cycles = 0;
        map.load32(0x0200_0004, &mut cycles);
        assert_eq!(cycles, 5);
    }

    #[test]
    fn misaligned_loads_rotate() {
        let mut map = test_map();
        let mut cycles = 0;
        map.store32(0x0200_0010, 0x1122_3344, &mut cycles);
        assert_eq!(map.load32(0x0200_0011, &mut cycles), 0x4411_2233);
        assert_eq!(map.load_u16(0x0200_0011, &mut cycles), 0x4433);
        assert_eq!(map.load16(0x0200_0012, &mut cycles), 0x1122);
        map.store8(0x0200_0020, 0x80, &mut cycles);
        assert_eq!(map.load16(0x0200_0020 | 1, &mut cycles), 0);
        assert_eq!(map.load16(0x0200_0021 - 1, &mut cycles), 0x0080);
        map.store8(0x0200_0021, 0xF0, &mut cycles);
        assert_eq!(map.load16(0x0200_0021, &mut cycles), -16);
        assert_eq!(map.load8(0x0200_0020, &mut cycles), -128);
    }

    #[test]
    fn stores_align_and_mirror() {
        let mut map = test_map();
        let mut cycles = 0;
        map.store32(0x0300_0103, 0xCAFE_F00D, &mut cycles);
        assert_eq!(map.load32(0x0300_0000, &mut cycles), 0xCAFE_F00D);
        map.store16(0x0300_0011, 0xBEEF, &mut cycles);
        assert_eq!(map.load_u16(0x0300_0010, &mut cycles), 0xBEEF);
    }

    #[test]
    fn read_only_regions_ignore_stores_but_charge() {
        let mut map = test_map();
        assert!(map.load(0x0800_0000, &[1, 2, 3, 4]));
        let mut cycles = 0;
        map.store32(0x0800_0000, 0, &mut cycles);
        assert_eq!(cycles, 8);
        assert_eq!(map.peek32(0x0800_0000), 0x0403_0201);
    }

    #[test]
    fn unmapped_reads_zero_for_one_cycle() {
        let mut map = test_map();
        let mut cycles = 0;
        assert_eq!(map.load32(0x0E00_0000, &mut cycles), 0);
        assert_eq!(cycles, 1);
        assert!(!map.load(0x0E00_0000, &[0]));
        assert!(!map.load(0x0300_00FE, &[0; 4]));
    }

    #[test]
    fn active_region_reports_prefetch_costs() {
        let mut map = test_map();
        assert!(!map.active_region().contains(0x0800_0000));
        map.set_active_region(0x0800_0010);
        let region = map.active_region();
        assert!(region.contains(0x0800_0000));
        assert_eq!(region.mask, 0xFF);
        assert_eq!(region.prefetch_cycles32, 6);
        assert_eq!(region.prefetch_cycles16, 3);
        assert_eq!(map.active_memory().len(), 0x100);
        map.set_active_region(0x0100_0000);
        assert_eq!(map.active_region(), ActiveRegion::NONE);
        assert!(map.active_memory().is_empty());
    }

    #[test]
    fn burst_cost_restarts_when_crossing_regions() {
        let mut map = MemoryMap::from_configs(&[
            RegionConfig::new("lo", 0x0000_0000, 0x10, 0x10, true, RegionTiming::narrow_bus(2, 1)),
            RegionConfig::new("hi", 0x0000_0010, 0x10, 0x10, true, RegionTiming::narrow_bus(4, 2)),
        ]);
        assert_eq!(map.wait_multiple(0x0, 4), 5 + 3 * 4);
        assert_eq!(map.wait_multiple(0x8, 4), 5 + 4 + 8 + 6);
        assert_eq!(map.wait_multiple(0x1C, 2), 8 + 1);
    }

    #[test]
    fn burst_leaves_following_access_sequential() {
        let mut map = test_map();
        map.wait_multiple(0x0300_0000, 2);
        let mut cycles = 0;
        map.load32(0x0300_0008, &mut cycles);
        assert_eq!(cycles, 1);
        assert_eq!(map.region_name(0x0300_0008), Some("fast"));
    }
}
