//! End-to-end pipeline tests: functional resolution followed by timing
//! replay, plus the file-based entry point.

use color_eyre::eyre;
use pretty_assertions_sorted::assert_eq;
use std::sync::Arc;
use vcoresim::asm;
use vcoresim::config::Config;
use vcoresim::core::Core;
use vcoresim::func_sim::FunctionalSimulator;
use vcoresim::mem::DataMemory;
use vcoresim::{SDMEM_ADDR_BITS, VDMEM_ADDR_BITS};

const CONFIG: &str = r"
numLanes = 4
pipelineDepthAdd = 5
pipelineDepthMul = 7
pipelineDepthDiv = 12
vlsPipelineDepth = 11
computeQueueDepth = 4
dataQueueDepth = 4
vdmNumBanks = 8
";

const PROGRAM: &str = r"
LS SR1 SR0 0      # SR1 = 2048, the store base
LV VR1 SR0
ADDVV VR2 VR1 VR1
SV VR2 SR1
HALT
";

fn vdmem_image() -> String {
    (0..64).map(|word| format!("{word}\n")).collect()
}

#[test]
fn vector_double_kernel_runs_end_to_end() -> eyre::Result<()> {
    let config = Config::from_config_str(CONFIG)?;
    let program = asm::parse_program(PROGRAM)?;
    let sdmem = DataMemory::load("SDMEM", "2048\n", SDMEM_ADDR_BITS)?;
    let vdmem = DataMemory::load("VDMEM", &vdmem_image(), VDMEM_ADDR_BITS)?;

    let execution = FunctionalSimulator::new(program, sdmem, vdmem).run()?;

    // the oracle resolved one entry per executed instruction
    assert_eq!(execution.trace.len(), 5);
    let load = &execution.trace[1];
    assert_eq!(load.vector_length, 64);
    assert_eq!(load.addresses.len(), 64);
    assert_eq!(load.addresses[63], 63);
    let store = &execution.trace[3];
    assert_eq!(store.addresses[0], 2048);

    // functional result: every word doubled at the store base
    for word in [0u64, 1, 31, 63] {
        assert_eq!(execution.vdmem.read(2048 + word)?, 2 * word as i32);
    }

    let stats = Core::new(Arc::new(config.clone()), execution.trace.clone()).run();
    assert_eq!(stats.instructions_issued, 5);
    // LV keeps VR1 reserved while ADDVV wants to read it
    assert!(stats.hazard_stall_cycles > 0);
    assert!(stats.cycles > 0);

    // identical trace and configuration replay to identical counters
    let again = Core::new(Arc::new(config), execution.trace.clone()).run();
    assert_eq!(stats, again);
    Ok(())
}

#[test]
fn simulate_reads_and_writes_the_io_directory() -> eyre::Result<()> {
    let iodir = std::env::temp_dir().join(format!(
        "vcoresim-pipeline-{}-{:?}",
        std::process::id(),
        std::thread::current().id()
    ));
    std::fs::create_dir_all(&iodir)?;

    std::fs::write(iodir.join("Config.txt"), CONFIG)?;
    std::fs::write(iodir.join("Code.asm"), PROGRAM)?;
    std::fs::write(iodir.join("SDMEM.txt"), "2048\n")?;
    std::fs::write(iodir.join("VDMEM.txt"), vdmem_image())?;

    let stats = vcoresim::simulate(&iodir)?;
    assert!(stats.cycles > 0);

    // dumps land next to the inputs
    let srf = std::fs::read_to_string(iodir.join("SRF.txt"))?;
    let mut lines = srf.lines();
    assert_eq!(lines.next(), Some("0            "));
    // header, separator, then one row per scalar register
    assert_eq!(srf.lines().count(), 2 + 8);
    assert!(srf.contains("2048"));

    let vdmem_dump = std::fs::read_to_string(iodir.join("VDMEMOP.txt"))?;
    assert_eq!(vdmem_dump.lines().count(), 1 << VDMEM_ADDR_BITS);
    assert_eq!(vdmem_dump.lines().nth(2049), Some("2"));

    let rerun = vcoresim::simulate(&iodir)?;
    assert_eq!(stats, rerun);

    std::fs::remove_dir_all(&iodir).ok();
    Ok(())
}
