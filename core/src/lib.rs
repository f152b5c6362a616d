#![forbid(unsafe_code)]

pub mod board;
pub mod bus;
pub mod cpu;
pub mod log_buffer;
pub mod mem;

pub use board::Board;
pub use bus::{ActiveRegion, MemoryBus};
pub use cpu::{Cpu, CpuSnapshot, Exception, ExecutionMode, PrivilegeMode, Psr, ResetConfig};
pub use mem::{MemoryMap, RegionConfig, RegionTiming};

#[cfg(test)]
mod tests {
    use super::*;

    const ROM: u32 = 0x0800_0000;
    const EWRAM: u32 = 0x0200_0000;

    fn words(program: &[u32]) -> Vec<u8> {
        program.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn rom_cpu(program: &[u32]) -> Cpu {
        let mut map = MemoryMap::default();
        assert!(map.load(ROM, &words(program)));
        let mut cpu = Cpu::new();
        cpu.set_reset_config(ResetConfig { entry_point: ROM, ..ResetConfig::default() });
        cpu.associate_memory(Box::new(map));
        cpu.reset();
        cpu
    }

    #[test]
    fn rom_program_stores_into_work_ram() {
        // mov r0, #0x100 ; mov r1, #0x02000000 ; str r0, [r1] ; b .
        let mut cpu = rom_cpu(&[0xE3A0_0C01, 0xE3A0_1402, 0xE581_0000, 0xEAFF_FFFE]);

        cpu.step();
        // First fetch after reset goes through the bus: ROM N32.
        assert_eq!(cpu.last_cycles(), 8);
        cpu.step();
        // Then the window: ROM S32.
        assert_eq!(cpu.last_cycles(), 6);
        cpu.step();
        // Fetch plus one non-sequential EWRAM word.
        assert_eq!(cpu.last_cycles(), 6 + 6);

        let stored = cpu.memory_mut().map(|m| m.load32(EWRAM, &mut 0));
        assert_eq!(stored, Some(0x100));
        assert_eq!(cpu.absolute_cycles(), 8 + 6 + 12);
    }

    #[test]
    fn rom_is_read_only() {
        // mov r0, #0xFF ; mov r1, #0x08000000 ; str r0, [r1]
        let mut cpu = rom_cpu(&[0xE3A0_00FF, 0xE3A0_1302, 0xE581_0000]);
        for _ in 0..3 {
            cpu.step();
        }
        let first = cpu.memory_mut().map(|m| m.load32(ROM, &mut 0));
        assert_eq!(first, Some(0xE3A0_00FF));
    }

    #[test]
    fn branch_loop_keeps_running() {
        let mut cpu = rom_cpu(&[0xEAFF_FFFE]);
        let elapsed = cpu.run_for(1_000);
        assert!(elapsed >= 1_000);
        assert_eq!(cpu.pc(), ROM);
        assert_eq!(cpu.privilege_mode(), PrivilegeMode::System);
    }
}
