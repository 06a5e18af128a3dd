//! Issue queues, functional-unit slots and the per-cycle scheduler loop.
//!
//! The core replays the resolved instruction trace through an in-order
//! front end. Each cycle runs four phases in a fixed order: Execute
//! (retire/refill the three functional-unit slots, then advance everything
//! in flight), Decode (retry the fetched instruction against the admission
//! policy; stall on failure, never drop), Fetch (latch the next trace entry
//! unless stalled), and the bank-countdown advance. The loop terminates the
//! first cycle all three phases report no work.

use crate::banks::BankConflictModel;
use crate::config::Config;
use crate::fifo::Fifo;
use crate::func_unit::{FunctionalUnit, Writeback};
use crate::instruction::{Instruction, Register, TraceEntry};
use crate::opcodes::{Class, QueueKind};
use crate::scoreboard::Scoreboard;
use crate::stats::Stats;
use itertools::Itertools;
use smallvec::SmallVec;
use std::sync::Arc;

/// An admitted instruction waiting for its functional-unit slot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    trace_idx: usize,
    writeback: Writeback,
}

impl std::fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pc {}", self.trace_idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Issued,
    HazardStall,
    CapacityStall,
}

/// The vector core timing model.
pub struct Core {
    config: Arc<Config>,
    trace: Vec<TraceEntry>,
    scoreboard: Scoreboard,
    banks: BankConflictModel,

    /// Issue queues, indexed by [`QueueKind`].
    queues: [Fifo<QueueEntry>; 3],
    /// Single-occupancy execution slots, one per queue.
    slots: [Option<FunctionalUnit>; 3],

    pc: usize,
    /// Fetch latch: trace index of the instruction awaiting decode.
    fetched: Option<usize>,
    stall: bool,
    cycle: u64,
    stats: Stats,
}

impl Core {
    #[must_use]
    pub fn new(config: Arc<Config>, trace: Vec<TraceEntry>) -> Self {
        let queues = [
            Fifo::new(Some(config.data_queue_depth)),
            Fifo::new(Some(config.compute_queue_depth)),
            Fifo::new(None),
        ];
        Self {
            banks: BankConflictModel::new(config.vdm_num_banks),
            config,
            trace,
            scoreboard: Scoreboard::new(),
            queues,
            slots: [None, None, None],
            pc: 0,
            fetched: None,
            stall: false,
            cycle: 0,
            stats: Stats::default(),
        }
    }

    /// Run to the drain fixed point; returns the accumulated counters.
    pub fn run(&mut self) -> Stats {
        log::info!(
            "timing simulation: {} trace entries, {} banks",
            self.trace.len(),
            self.banks.num_banks()
        );
        while self.step() {}
        self.stats.cycles = self.cycle;
        self.stats.bank_conflicts = self.banks.conflicts();
        log::info!(
            "timing simulation finished after {} cycles ({} issued, {} hazard stalls, {} capacity stalls, {} bank conflicts)",
            self.stats.cycles,
            self.stats.instructions_issued,
            self.stats.hazard_stall_cycles,
            self.stats.capacity_stall_cycles,
            self.stats.bank_conflicts,
        );
        self.stats.clone()
    }

    /// One simulated cycle; `false` once every phase is idle.
    fn step(&mut self) -> bool {
        self.cycle += 1;
        log::trace!(
            "cycle {}: data {} compute {} scalar {} (banks busy {})",
            self.cycle,
            self.queues[QueueKind::VectorData as usize],
            self.queues[QueueKind::VectorCompute as usize],
            self.queues[QueueKind::Scalar as usize],
            self.banks.max_remaining(),
        );
        let mut progress = self.execute();
        progress |= self.decode();
        progress |= self.fetch();
        self.banks.advance();
        progress
    }

    /// Retire completed slot occupants, refill free slots from their queues,
    /// then advance everything still in flight.
    fn execute(&mut self) -> bool {
        for kind in QueueKind::ALL {
            let idx = kind as usize;
            let vacant = self.slots[idx]
                .as_ref()
                .map_or(true, FunctionalUnit::is_complete);
            if !vacant {
                continue;
            }
            if let Some(unit) = self.slots[idx].take() {
                log::debug!(
                    "cycle {}: retire pc {} from {kind:?} slot",
                    self.cycle,
                    unit.pc()
                );
                self.scoreboard.release_all(&unit.into_writeback().registers);
            }
            let next = self.queues[idx].dequeue();
            self.slots[idx] = next.map(|entry| {
                let trace_idx = entry.trace_idx;
                log::debug!(
                    "cycle {}: {kind:?} slot starts {} (pc {trace_idx})",
                    self.cycle,
                    self.trace[trace_idx].instruction,
                );
                FunctionalUnit::new(&self.trace[trace_idx], &self.config, entry.writeback)
            });
        }

        let mut progress = false;
        for slot in self.slots.iter_mut().flatten() {
            if !slot.is_complete() {
                slot.cycle(&mut self.banks);
                progress = true;
            }
        }
        progress
    }

    /// Retry the fetch latch against the admission policy.
    fn decode(&mut self) -> bool {
        let Some(trace_idx) = self.fetched else {
            return false;
        };
        match self.try_issue(trace_idx) {
            Admission::Issued => {
                self.stall = false;
                self.stats.instructions_issued += 1;
            }
            Admission::HazardStall => {
                self.stall = true;
                self.stats.hazard_stall_cycles += 1;
            }
            Admission::CapacityStall => {
                self.stall = true;
                self.stats.capacity_stall_cycles += 1;
            }
        }
        true
    }

    /// Latch the next trace entry; `true` while further entries exist.
    fn fetch(&mut self) -> bool {
        if !self.stall {
            self.fetched = (self.pc < self.trace.len()).then_some(self.pc);
            if let Some(idx) = self.fetched {
                log::trace!(
                    "cycle {}: fetch {} (pc {idx})",
                    self.cycle,
                    self.trace[idx].instruction
                );
            }
            self.pc += 1;
        }
        self.pc < self.trace.len()
    }

    /// Admission: the target queue must have capacity and every register the
    /// instruction names must be free. On success the class-dependent
    /// destination set is reserved and the entry enqueued with the matching
    /// writeback. A full queue is reported before any busy bit is touched,
    /// so a capacity stall leaves no state behind.
    fn try_issue(&mut self, trace_idx: usize) -> Admission {
        let instruction = &self.trace[trace_idx].instruction;
        let class = instruction.opcode.class;
        let queue = class.queue();

        if self.queues[queue as usize].full() {
            log::debug!(
                "cycle {}: capacity stall for {instruction} (pc {trace_idx}): {queue:?} queue full",
                self.cycle
            );
            return Admission::CapacityStall;
        }
        if self.scoreboard.has_collision(instruction.registers()) {
            log::debug!(
                "cycle {}: hazard stall for {instruction} (pc {trace_idx}): operands [{}]",
                self.cycle,
                instruction.registers().map(|reg| reg.to_string()).join(", "),
            );
            return Admission::HazardStall;
        }

        let writeback = Writeback {
            registers: reserved_registers(instruction),
        };
        self.scoreboard.reserve_all(&writeback.registers);
        log::debug!(
            "cycle {}: issue {instruction} (pc {trace_idx}) to {queue:?} queue",
            self.cycle
        );
        self.queues[queue as usize].enqueue(QueueEntry {
            trace_idx,
            writeback,
        });
        Admission::Issued
    }
}

/// Registers reserved at admission, by instruction class.
///
/// The same list rides along in the writeback and is released verbatim at
/// completion.
fn reserved_registers(instruction: &Instruction) -> SmallVec<[Register; 2]> {
    match instruction.opcode.class {
        // destination (or single operand) only
        Class::ScalarAlu
        | Class::RegMove
        | Class::VectorAdd
        | Class::VectorMul
        | Class::VectorDiv
        | Class::VectorMem => instruction.registers().take(1).collect(),
        // both the data and base registers stay reserved
        Class::ScalarMem => instruction.registers().take(2).collect(),
        // no architectural destination; the mask register is not tracked
        Class::Branch | Class::VectorCompare | Class::Control => SmallVec::new(),
    }
}
