//! Functional oracle: architectural execution producing the timing trace.
//!
//! Executes the decoded program against the register files, the mask and
//! length registers and the two data memories, resolving all control flow.
//! The output is the final architectural state plus one trace entry per
//! executed instruction; vector-memory entries carry the ordered element
//! addresses the instruction actually touches (mask-filtered and bounded by
//! the active vector length), which is everything the timing model needs.

use crate::instruction::{Instruction, Operand, Register, TraceEntry, VectorMask};
use crate::mem::{self, DataMemory};
use crate::opcodes::{Class, Op};
use crate::register_file::RegisterFile;
use crate::{address, MAX_VECTOR_LENGTH, NUM_REGS};
use bitvec::array::BitArray;

/// Upper bound on resolved trace length, to catch programs that never halt.
pub const STEP_LIMIT: usize = 1 << 20;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("step {step} (pc {pc}): divide by zero in lane {lane}")]
    DivideByZero { step: usize, pc: usize, lane: usize },

    #[error("step {step} (pc {pc}): {source}")]
    Memory {
        step: usize,
        pc: usize,
        #[source]
        source: mem::Error,
    },

    #[error("step {step} (pc {pc}): address {addr} is negative")]
    NegativeAddress { step: usize, pc: usize, addr: i64 },

    #[error("step {step}: program counter {pc} out of range (program has {len} instructions)")]
    PcOutOfRange { step: usize, pc: i64, len: usize },

    #[error("step {step} (pc {pc}): vector length {value} out of range 0..=64")]
    VectorLengthOutOfRange { step: usize, pc: usize, value: i32 },

    #[error("step {step} (pc {pc}): malformed operands for {opcode}")]
    MalformedOperands {
        step: usize,
        pc: usize,
        opcode: String,
    },

    #[error("program executed {STEP_LIMIT} steps without reaching HALT")]
    StepLimit,
}

/// Final architectural state plus the resolved instruction trace.
#[derive(Debug)]
pub struct Execution {
    pub trace: Vec<TraceEntry>,
    pub scalar_regs: RegisterFile,
    pub vector_regs: RegisterFile,
    pub sdmem: DataMemory,
    pub vdmem: DataMemory,
}

pub struct FunctionalSimulator {
    program: Vec<Instruction>,
    scalar_regs: RegisterFile,
    vector_regs: RegisterFile,
    sdmem: DataMemory,
    vdmem: DataMemory,
    mask: VectorMask,
    vector_length: usize,
    pc: usize,
}

impl FunctionalSimulator {
    #[must_use]
    pub fn new(program: Vec<Instruction>, sdmem: DataMemory, vdmem: DataMemory) -> Self {
        let mut mask: VectorMask = BitArray::ZERO;
        mask.fill(true);
        Self {
            program,
            scalar_regs: RegisterFile::new("SRF", NUM_REGS, 1),
            vector_regs: RegisterFile::new("VRF", NUM_REGS, MAX_VECTOR_LENGTH),
            sdmem,
            vdmem,
            mask,
            vector_length: MAX_VECTOR_LENGTH,
            pc: 0,
        }
    }

    /// Execute to HALT, resolving the trace.
    pub fn run(mut self) -> Result<Execution, Error> {
        let mut trace = Vec::new();
        loop {
            let step = trace.len();
            if step >= STEP_LIMIT {
                return Err(Error::StepLimit);
            }
            let Some(instruction) = self.program.get(self.pc) else {
                return Err(Error::PcOutOfRange {
                    step,
                    pc: self.pc as i64,
                    len: self.program.len(),
                });
            };
            let instruction = instruction.clone();
            let entry = self.execute(step, &instruction)?;
            log::trace!("step {step}: {instruction} (VLR {})", entry.vector_length);
            let halted = instruction.opcode.op == Op::HALT;
            trace.push(entry);
            if halted {
                break;
            }
        }
        Ok(Execution {
            trace,
            scalar_regs: self.scalar_regs,
            vector_regs: self.vector_regs,
            sdmem: self.sdmem,
            vdmem: self.vdmem,
        })
    }

    fn execute(&mut self, step: usize, instruction: &Instruction) -> Result<TraceEntry, Error> {
        let pc = self.pc;
        let vector_length = self.vector_length;
        let mask = self.mask;
        let op = instruction.opcode.op;
        let mut addresses = Vec::new();

        match instruction.opcode.class {
            Class::ScalarAlu => {
                let dest = self.scalar_reg(step, instruction, 0)?;
                let a = self.scalar_regs.scalar(self.scalar_reg(step, instruction, 1)?);
                let b = self.scalar_regs.scalar(self.scalar_reg(step, instruction, 2)?);
                self.scalar_regs.set_scalar(dest, scalar_alu(op, a, b));
                self.pc += 1;
            }
            Class::Branch => {
                let a = self.scalar_regs.scalar(self.scalar_reg(step, instruction, 0)?);
                let b = self.scalar_regs.scalar(self.scalar_reg(step, instruction, 1)?);
                let offset = self.immediate(step, instruction, 2)?;
                let taken = match op {
                    Op::BEQ => a == b,
                    Op::BNE => a != b,
                    Op::BGT => a > b,
                    Op::BLT => a < b,
                    Op::BGE => a >= b,
                    Op::BLE => a <= b,
                    _ => unreachable!("non-branch op in branch class"),
                };
                if taken {
                    let target = self.pc as i64 + offset;
                    self.pc = usize::try_from(target).map_err(|_| Error::PcOutOfRange {
                        step,
                        pc: target,
                        len: self.program.len(),
                    })?;
                } else {
                    self.pc += 1;
                }
            }
            Class::Control => match op {
                Op::CVM => {
                    self.mask.fill(true);
                    self.pc += 1;
                }
                // the run loop stops after recording the entry
                Op::HALT => {}
                _ => unreachable!("non-control op in control class"),
            },
            Class::RegMove => {
                let reg = self.scalar_reg(step, instruction, 0)?;
                match op {
                    Op::POP => {
                        let ones = self.mask.count_ones() as i32;
                        self.scalar_regs.set_scalar(reg, ones);
                    }
                    Op::MTCL => {
                        let value = self.scalar_regs.scalar(reg);
                        if !(0..=MAX_VECTOR_LENGTH as i32).contains(&value) {
                            return Err(Error::VectorLengthOutOfRange { step, pc, value });
                        }
                        self.vector_length = value as usize;
                    }
                    Op::MFCL => {
                        self.scalar_regs.set_scalar(reg, self.vector_length as i32);
                    }
                    _ => unreachable!("non-move op in register-move class"),
                }
                self.pc += 1;
            }
            Class::ScalarMem => {
                let reg = self.scalar_reg(step, instruction, 0)?;
                let base = self.scalar_regs.scalar(self.scalar_reg(step, instruction, 1)?);
                let offset = self.immediate(step, instruction, 2)?;
                let addr = self.mem_addr(step, i64::from(base) + offset)?;
                match op {
                    Op::LS => {
                        let word = self
                            .sdmem
                            .read(addr)
                            .map_err(|source| Error::Memory { step, pc, source })?;
                        self.scalar_regs.set_scalar(reg, word);
                    }
                    Op::SS => {
                        let word = self.scalar_regs.scalar(reg);
                        self.sdmem
                            .write(addr, word)
                            .map_err(|source| Error::Memory { step, pc, source })?;
                    }
                    _ => unreachable!("non-memory op in scalar-memory class"),
                }
                self.pc += 1;
            }
            Class::VectorAdd | Class::VectorMul | Class::VectorDiv => {
                let dest = self.vector_reg(step, instruction, 0)?;
                let lhs = self.vector_regs.vector(self.vector_reg(step, instruction, 1)?).to_vec();
                let rhs = self.elementwise_rhs(step, instruction)?;
                for lane in 0..vector_length {
                    if !mask[lane] {
                        continue;
                    }
                    let b = rhs[lane];
                    let value = vector_alu(op, lhs[lane], b)
                        .ok_or(Error::DivideByZero { step, pc, lane })?;
                    self.vector_regs.vector_mut(dest)[lane] = value;
                }
                self.pc += 1;
            }
            Class::VectorCompare => {
                let lhs = self.vector_regs.vector(self.vector_reg(step, instruction, 0)?).to_vec();
                let rhs = self.comparison_rhs(step, instruction)?;
                // compares run the full register width and rewrite the whole
                // mask, independent of the current VLR
                for lane in 0..MAX_VECTOR_LENGTH {
                    let bit = match op {
                        Op::SEQVV | Op::SEQVS => lhs[lane] == rhs[lane],
                        Op::SNEVV | Op::SNEVS => lhs[lane] != rhs[lane],
                        Op::SGTVV | Op::SGTVS => lhs[lane] > rhs[lane],
                        Op::SLTVV | Op::SLTVS => lhs[lane] < rhs[lane],
                        Op::SGEVV | Op::SGEVS => lhs[lane] >= rhs[lane],
                        Op::SLEVV | Op::SLEVS => lhs[lane] <= rhs[lane],
                        _ => unreachable!("non-compare op in compare class"),
                    };
                    self.mask.set(lane, bit);
                }
                self.pc += 1;
            }
            Class::VectorMem => {
                let vreg = self.vector_reg(step, instruction, 0)?;
                let base = i64::from(
                    self.scalar_regs.scalar(self.scalar_reg(step, instruction, 1)?),
                );
                let offsets: Vec<i64> = match op {
                    Op::LV | Op::SV => (0..vector_length).map(|lane| lane as i64).collect(),
                    Op::LVWS | Op::SVWS => {
                        let stride = i64::from(
                            self.scalar_regs.scalar(self.scalar_reg(step, instruction, 2)?),
                        );
                        (0..vector_length).map(|lane| lane as i64 * stride).collect()
                    }
                    Op::LVI | Op::SVI => {
                        let index = self
                            .vector_regs
                            .vector(self.vector_reg(step, instruction, 2)?);
                        index[..vector_length].iter().map(|&i| i64::from(i)).collect()
                    }
                    _ => unreachable!("non-memory op in vector-memory class"),
                };
                for (lane, offset) in offsets.into_iter().enumerate() {
                    if !mask[lane] {
                        continue;
                    }
                    let addr = self.mem_addr(step, base + offset)?;
                    addresses.push(addr);
                    match op {
                        Op::LV | Op::LVWS | Op::LVI => {
                            let word = self
                                .vdmem
                                .read(addr)
                                .map_err(|source| Error::Memory { step, pc, source })?;
                            self.vector_regs.vector_mut(vreg)[lane] = word;
                        }
                        Op::SV | Op::SVWS | Op::SVI => {
                            let word = self.vector_regs.vector(vreg)[lane];
                            self.vdmem
                                .write(addr, word)
                                .map_err(|source| Error::Memory { step, pc, source })?;
                        }
                        _ => unreachable!(),
                    }
                }
                self.pc += 1;
            }
        }

        Ok(TraceEntry {
            pc: step,
            instruction: instruction.clone(),
            vector_length,
            mask,
            addresses,
        })
    }

    /// Third operand of a VV/VS arithmetic form, splatted to lane width.
    fn elementwise_rhs(&self, step: usize, instruction: &Instruction) -> Result<Vec<i32>, Error> {
        match instruction.opcode.op {
            Op::ADDVV | Op::SUBVV | Op::MULVV | Op::DIVVV => Ok(self
                .vector_regs
                .vector(self.vector_reg(step, instruction, 2)?)
                .to_vec()),
            _ => {
                let value = self.scalar_regs.scalar(self.scalar_reg(step, instruction, 2)?);
                Ok(vec![value; MAX_VECTOR_LENGTH])
            }
        }
    }

    /// Second operand of a VV/VS compare form, splatted to lane width.
    fn comparison_rhs(&self, step: usize, instruction: &Instruction) -> Result<Vec<i32>, Error> {
        match instruction.opcode.op {
            Op::SEQVV | Op::SNEVV | Op::SGTVV | Op::SLTVV | Op::SGEVV | Op::SLEVV => Ok(self
                .vector_regs
                .vector(self.vector_reg(step, instruction, 1)?)
                .to_vec()),
            _ => {
                let value = self.scalar_regs.scalar(self.scalar_reg(step, instruction, 1)?);
                Ok(vec![value; MAX_VECTOR_LENGTH])
            }
        }
    }

    fn mem_addr(&self, step: usize, value: i64) -> Result<address, Error> {
        address::try_from(value).map_err(|_| Error::NegativeAddress {
            step,
            pc: self.pc,
            addr: value,
        })
    }

    fn scalar_reg(&self, step: usize, instruction: &Instruction, idx: usize) -> Result<usize, Error> {
        match instruction.operands.get(idx) {
            Some(Operand::Register(Register::Scalar(reg))) => Ok(*reg),
            _ => Err(self.malformed(step, instruction)),
        }
    }

    fn vector_reg(&self, step: usize, instruction: &Instruction, idx: usize) -> Result<usize, Error> {
        match instruction.operands.get(idx) {
            Some(Operand::Register(Register::Vector(reg))) => Ok(*reg),
            _ => Err(self.malformed(step, instruction)),
        }
    }

    fn immediate(&self, step: usize, instruction: &Instruction, idx: usize) -> Result<i64, Error> {
        match instruction.operands.get(idx) {
            Some(Operand::Immediate(value)) => Ok(*value),
            _ => Err(self.malformed(step, instruction)),
        }
    }

    fn malformed(&self, step: usize, instruction: &Instruction) -> Error {
        Error::MalformedOperands {
            step,
            pc: self.pc,
            opcode: instruction.opcode.to_string(),
        }
    }
}

fn scalar_alu(op: Op, a: i32, b: i32) -> i32 {
    match op {
        Op::ADD => a.wrapping_add(b),
        Op::SUB => a.wrapping_sub(b),
        Op::AND => a & b,
        Op::OR => a | b,
        Op::XOR => a ^ b,
        Op::SLL => match u32::try_from(b) {
            Ok(n) if n < 32 => ((a as u32) << n) as i32,
            _ => 0,
        },
        Op::SRL => match u32::try_from(b) {
            Ok(n) if n < 32 => ((a as u32) >> n) as i32,
            _ => 0,
        },
        // arithmetic shifts saturate at the sign bit
        Op::SRA => a >> u32::try_from(b).map_or(31, |n| n.min(31)),
        _ => unreachable!("non-ALU op in scalar ALU class"),
    }
}

/// `None` means divide by zero.
fn vector_alu(op: Op, a: i32, b: i32) -> Option<i32> {
    match op {
        Op::ADDVV | Op::ADDVS => Some(a.wrapping_add(b)),
        Op::SUBVV | Op::SUBVS => Some(a.wrapping_sub(b)),
        Op::MULVV | Op::MULVS => Some(a.wrapping_mul(b)),
        Op::DIVVV | Op::DIVVS => (b != 0).then(|| floor_div(a, b)),
        _ => unreachable!("non-arithmetic op in vector arithmetic class"),
    }
}

/// Division rounding toward negative infinity.
fn floor_div(a: i32, b: i32) -> i32 {
    let quotient = a.wrapping_div(b);
    let remainder = a.wrapping_rem(b);
    if remainder != 0 && (remainder < 0) != (b < 0) {
        quotient - 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::{floor_div, Error, FunctionalSimulator};
    use crate::asm::parse_program;
    use crate::mem::DataMemory;
    use pretty_assertions_sorted::assert_eq;

    fn simulator(source: &str, sdmem_image: &str, vdmem_image: &str) -> FunctionalSimulator {
        FunctionalSimulator::new(
            parse_program(source).unwrap(),
            DataMemory::load("SDMEM", sdmem_image, 13).unwrap(),
            DataMemory::load("VDMEM", vdmem_image, 17).unwrap(),
        )
    }

    #[test]
    fn scalar_loop_resolves_control_flow() {
        // sums SDMEM[1] copies of SDMEM[0] by counting SR3 down to zero
        let source = r"
LS SR1 SR0 0      # SR1 = 7
LS SR3 SR0 1      # SR3 = 3
LS SR4 SR0 2      # SR4 = 1
ADD SR2 SR2 SR1
SUB SR3 SR3 SR4
BGT SR3 SR0 -2
HALT
";
        let execution = simulator(source, "7\n3\n1\n", "").run().unwrap();
        assert_eq!(execution.scalar_regs.scalar(2), 21);
        // 3 loads + 3 iterations of the 3-instruction body + HALT
        assert_eq!(execution.trace.len(), 3 + 3 * 3 + 1);
        assert_eq!(execution.trace.last().unwrap().instruction.to_string(), "HALT");
    }

    #[test]
    fn scalar_alu_covers_shifts_and_bitwise_ops() {
        let source = r"
LS SR1 SR0 0      # 5
LS SR2 SR0 1      # 2
SLL SR3 SR1 SR2
SRA SR4 SR3 SR2
XOR SR5 SR1 SR3
HALT
";
        let execution = simulator(source, "5\n2\n", "").run().unwrap();
        assert_eq!(execution.scalar_regs.scalar(3), 20);
        assert_eq!(execution.scalar_regs.scalar(4), 5);
        assert_eq!(execution.scalar_regs.scalar(5), 17);
    }

    #[test]
    fn vector_add_respects_the_mask_and_vlr() {
        let vdmem: String = "10\n".repeat(8);
        let source = r"
LS SR1 SR0 0      # SR1 = 4
MTCL SR1
LV VR1 SR0
LVWS VR2 SR0 SR3  # stride 0: splat VDMEM[0]
SGTVS VR1 SR0     # lanes holding loads stay active
ADDVV VR3 VR1 VR1
HALT
";
        let execution = simulator(source, "4\n", &vdmem).run().unwrap();
        let vr3 = execution.vector_regs.vector(3);
        assert_eq!(&vr3[..4], &[20, 20, 20, 20]);
        // lanes beyond VLR stay untouched
        assert_eq!(&vr3[4..8], &[0, 0, 0, 0]);

        // trace entries carry the pre-execution VLR and resolved addresses
        let lv = &execution.trace[2];
        assert_eq!(lv.vector_length, 4);
        assert_eq!(lv.addresses, vec![0, 1, 2, 3]);
        let lvws = &execution.trace[3];
        assert_eq!(lvws.addresses, vec![0, 0, 0, 0]);
    }

    #[test]
    fn masked_lanes_are_skipped_in_memory_traffic() {
        let source = r"
LS SR1 SR0 0      # SR1 = 4
MTCL SR1
LV VR1 SR0        # VR1 = [1, 0, 3, 0]
SGTVS VR1 SR0     # mask lanes with VR1 > 0
LV VR2 SR2        # base 0 again, only active lanes
SV VR2 SR1        # store them at base 4
HALT
";
        let execution = simulator(source, "4\n", "1\n0\n3\n0\n").run().unwrap();
        let masked_load = &execution.trace[4];
        assert_eq!(masked_load.addresses, vec![0, 2]);
        let masked_store = &execution.trace[5];
        assert_eq!(masked_store.addresses, vec![4, 6]);
        assert_eq!(execution.vdmem.read(4).unwrap(), 1);
        assert_eq!(execution.vdmem.read(6).unwrap(), 3);
        // lane 1 was inactive, so address 5 keeps its image value
        assert_eq!(execution.vdmem.read(5).unwrap(), 0);
    }

    #[test]
    fn indexed_gather_resolves_per_element_addresses() {
        let source = r"
LS SR1 SR0 0      # SR1 = 3
MTCL SR1
LV VR3 SR0        # VR3 = [5, 1, 2]  (indices)
LVI VR1 SR0 VR3
HALT
";
        let execution = simulator(source, "3\n", "5\n1\n2\n0\n0\n77\n").run().unwrap();
        let gather = &execution.trace[3];
        assert_eq!(gather.addresses, vec![5, 1, 2]);
        assert_eq!(&execution.vector_regs.vector(1)[..3], &[77, 1, 2]);
    }

    #[test]
    fn divide_by_zero_on_an_active_lane_is_fatal() {
        let source = "DIVVV VR0 VR1 VR2\nHALT\n";
        let err = simulator(source, "", "").run().unwrap_err();
        assert!(matches!(err, Error::DivideByZero { step: 0, .. }));
    }

    #[test]
    fn out_of_range_address_is_fatal() {
        // SDMEM holds 2^13 words; base 0 + offset 9000 is out of range
        let source = "LS SR1 SR0 9000\nHALT\n";
        let err = simulator(source, "", "").run().unwrap_err();
        assert!(matches!(err, Error::Memory { step: 0, .. }));
    }

    #[test]
    fn running_off_the_end_without_halt_is_fatal() {
        let err = simulator("CVM\n", "", "").run().unwrap_err();
        assert!(matches!(err, Error::PcOutOfRange { step: 1, .. }));
    }

    #[test]
    fn pop_counts_the_full_mask_width() {
        let source = "POP SR1\nHALT\n";
        let execution = simulator(source, "", "").run().unwrap();
        assert_eq!(execution.scalar_regs.scalar(1), 64);
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-7, -2), 3);
        assert_eq!(floor_div(i32::MIN, -1), i32::MIN);
    }
}
