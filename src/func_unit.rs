//! Functional-unit execution contexts.
//!
//! One context models a single in-flight instruction occupying an execution
//! slot. Scalar and vector-compute instructions carry a fixed latency
//! computed at construction; vector-memory instructions instead walk their
//! resolved element addresses through `numLanes` lane slots against the bank
//! model, then drain through the load/store pipeline.

use crate::address;
use crate::banks::{BankConflictModel, BANK_BUSY_CYCLES};
use crate::config::Config;
use crate::instruction::{Register, TraceEntry};
use crate::opcodes::Class;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Registers to release when an in-flight instruction completes.
///
/// A plain value interpreted by the scheduler at completion time; the set
/// released here is exactly the set reserved at admission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Writeback {
    pub registers: SmallVec<[Register; 2]>,
}

#[derive(Debug, Clone)]
enum State {
    /// Fixed remaining latency.
    Countdown { remaining: usize },
    /// Vector-memory lane walk; latency is data dependent.
    Streaming {
        pending: VecDeque<address>,
        lanes: Box<[Option<address>]>,
    },
}

/// A single in-flight instruction.
#[derive(Debug, Clone)]
pub struct FunctionalUnit {
    pc: usize,
    writeback: Writeback,
    state: State,
    drain_cycles: usize,
}

impl FunctionalUnit {
    #[must_use]
    pub fn new(entry: &TraceEntry, config: &Config, writeback: Writeback) -> Self {
        let class = entry.instruction.opcode.class;
        let state = match class {
            Class::VectorMem => State::Streaming {
                pending: entry.addresses.iter().copied().collect(),
                lanes: vec![None; config.num_lanes].into_boxed_slice(),
            },
            _ => State::Countdown {
                remaining: latency(class, entry.vector_length, config),
            },
        };
        Self {
            pc: entry.pc,
            writeback,
            state,
            // drain covers the last element's traversal of the access pipe
            drain_cycles: config.vls_pipeline_depth + BANK_BUSY_CYCLES - 1,
        }
    }

    /// Advance one cycle.
    pub fn cycle(&mut self, banks: &mut BankConflictModel) {
        match &mut self.state {
            State::Countdown { remaining } => {
                *remaining = remaining.saturating_sub(1);
            }
            State::Streaming { pending, lanes } => {
                for lane in lanes.iter_mut() {
                    if lane.is_none() {
                        *lane = pending.pop_front();
                    }
                    if let Some(addr) = *lane {
                        if banks.try_access(addr) {
                            *lane = None;
                        }
                    }
                }
                if pending.is_empty() && lanes.iter().all(Option::is_none) {
                    log::trace!("pc {}: last element issued, draining", self.pc);
                    self.state = State::Countdown {
                        remaining: self.drain_cycles,
                    };
                }
            }
        }
    }

    /// Whether all latency has elapsed. Pure; the scheduler applies the
    /// writeback when it first observes completion and vacates the slot.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Countdown { remaining: 0 })
    }

    #[must_use]
    pub fn into_writeback(self) -> Writeback {
        self.writeback
    }

    #[must_use]
    pub fn pc(&self) -> usize {
        self.pc
    }
}

/// Fixed cycle cost per instruction class.
fn latency(class: Class, vector_length: usize, config: &Config) -> usize {
    let elementwise = |depth: usize| depth - 1 + vector_length.div_ceil(config.num_lanes);
    match class {
        Class::VectorAdd | Class::VectorCompare => elementwise(config.pipeline_depth_add),
        Class::VectorMul => elementwise(config.pipeline_depth_mul),
        Class::VectorDiv => elementwise(config.pipeline_depth_div),
        Class::VectorMem => unreachable!("vector memory latency is data dependent"),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{FunctionalUnit, Writeback};
    use crate::banks::BankConflictModel;
    use crate::config::Config;
    use crate::instruction::TraceEntry;
    use bitvec::array::BitArray;

    fn config() -> Config {
        Config {
            num_lanes: 4,
            pipeline_depth_add: 5,
            pipeline_depth_mul: 7,
            pipeline_depth_div: 12,
            vls_pipeline_depth: 11,
            compute_queue_depth: 4,
            data_queue_depth: 4,
            vdm_num_banks: 8,
        }
    }

    fn entry(text: &str, vector_length: usize, addresses: Vec<u64>) -> TraceEntry {
        let instruction = crate::asm::parse_program(text)
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        let mut mask = BitArray::ZERO;
        mask.fill(true);
        TraceEntry {
            pc: 0,
            instruction,
            vector_length,
            mask,
            addresses,
        }
    }

    /// Run a unit to completion against a fresh bank model; returns cycles.
    fn cycles_to_complete(entry: &TraceEntry) -> usize {
        let config = config();
        let mut banks = BankConflictModel::new(config.vdm_num_banks);
        let mut unit = FunctionalUnit::new(entry, &config, Writeback::default());
        let mut cycles = 0;
        while !unit.is_complete() {
            unit.cycle(&mut banks);
            banks.advance();
            cycles += 1;
            assert!(cycles < 10_000, "unit never completed");
        }
        cycles
    }

    #[test]
    fn scalar_instructions_take_one_cycle() {
        assert_eq!(cycles_to_complete(&entry("ADD SR0 SR1 SR2", 64, vec![])), 1);
        assert_eq!(cycles_to_complete(&entry("LS SR0 SR1 0", 64, vec![])), 1);
        assert_eq!(cycles_to_complete(&entry("HALT", 64, vec![])), 1);
    }

    #[test]
    fn vector_arithmetic_latency_follows_the_depth_formula() {
        // full lane utilization: depth - 1 + VLR / lanes, no ceiling bump
        assert_eq!(
            cycles_to_complete(&entry("ADDVV VR0 VR1 VR2", 8, vec![])),
            5 - 1 + 2
        );
        // partial last group rounds up
        assert_eq!(
            cycles_to_complete(&entry("ADDVV VR0 VR1 VR2", 10, vec![])),
            5 - 1 + 3
        );
        assert_eq!(
            cycles_to_complete(&entry("MULVS VR0 VR1 SR2", 64, vec![])),
            7 - 1 + 16
        );
        assert_eq!(
            cycles_to_complete(&entry("DIVVV VR0 VR1 VR2", 1, vec![])),
            12 - 1 + 1
        );
        // compares share the add pipeline
        assert_eq!(
            cycles_to_complete(&entry("SLEVV VR1 VR2", 8, vec![])),
            5 - 1 + 2
        );
    }

    #[test]
    fn conflict_free_vector_load_streams_then_drains() {
        // four addresses hit four distinct banks: one streaming cycle, then
        // the drain countdown of vlsPipelineDepth + 6 - 1
        let entry = entry("LV VR0 SR1", 4, vec![0, 1, 2, 3]);
        assert_eq!(cycles_to_complete(&entry), 1 + (11 + 6 - 1));
    }

    #[test]
    fn bank_conflict_extends_the_streaming_phase() {
        // both addresses map to bank 0: the second waits out the full busy
        // window before its lane can retire
        let entry = entry("LV VR0 SR1", 2, vec![0, 8]);
        assert_eq!(cycles_to_complete(&entry), 7 + (11 + 6 - 1));
    }

    #[test]
    fn masked_off_vector_store_still_pays_the_drain_latency() {
        let entry = entry("SV VR0 SR1", 4, vec![]);
        assert_eq!(cycles_to_complete(&entry), 1 + (11 + 6 - 1));
    }
}
