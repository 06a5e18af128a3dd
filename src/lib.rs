#![allow(
    non_camel_case_types,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

pub mod asm;
pub mod banks;
pub mod config;
pub mod core;
pub mod fifo;
pub mod func_sim;
pub mod func_unit;
pub mod instruction;
pub mod mem;
pub mod opcodes;
pub mod register_file;
pub mod scoreboard;
pub mod stats;

use color_eyre::eyre;
use std::path::Path;
use std::sync::Arc;

pub type address = u64;

/// Number of architectural registers in each register file.
pub const NUM_REGS: usize = 8;

/// Words per vector register.
pub const MAX_VECTOR_LENGTH: usize = 64;

/// Scalar data memory holds 2^13 32-bit words (32 KB).
pub const SDMEM_ADDR_BITS: usize = 13;

/// Vector data memory holds 2^17 32-bit words (512 KB).
pub const VDMEM_ADDR_BITS: usize = 17;

/// Run the full simulation pipeline over one I/O directory.
///
/// Reads `Config.txt`, `Code.asm`, `SDMEM.txt` and `VDMEM.txt`, executes the
/// program functionally to resolve the instruction trace, replays the trace
/// through the timing model, and writes the final register and memory dumps
/// (`SRF.txt`, `VRF.txt`, `SDMEMOP.txt`, `VDMEMOP.txt`) back into the
/// directory.
pub fn simulate(iodir: &Path) -> eyre::Result<stats::Stats> {
    let config = config::Config::open(&iodir.join("Config.txt"))?;
    log::info!("configuration: {config:?}");

    let program = asm::parse_program_file(&iodir.join("Code.asm"))?;
    log::info!("program: {} instructions", program.len());

    let sdmem = mem::DataMemory::open("SDMEM", &iodir.join("SDMEM.txt"), SDMEM_ADDR_BITS)?;
    let vdmem = mem::DataMemory::open("VDMEM", &iodir.join("VDMEM.txt"), VDMEM_ADDR_BITS)?;

    let execution = func_sim::FunctionalSimulator::new(program, sdmem, vdmem).run()?;
    log::info!(
        "functional simulation resolved {} instructions",
        execution.trace.len()
    );

    let func_sim::Execution {
        trace,
        scalar_regs,
        vector_regs,
        sdmem,
        vdmem,
    } = execution;

    let mut core = crate::core::Core::new(Arc::new(config), trace);
    let stats = core.run();

    scalar_regs.dump_to(&iodir.join("SRF.txt"))?;
    vector_regs.dump_to(&iodir.join("VRF.txt"))?;
    sdmem.dump_to(&iodir.join("SDMEMOP.txt"))?;
    vdmem.dump_to(&iodir.join("VDMEMOP.txt"))?;

    Ok(stats)
}
