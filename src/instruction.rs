//! Decoded instructions and the resolved execution trace.

use crate::opcodes::Opcode;
use crate::{address, MAX_VECTOR_LENGTH, NUM_REGS};
use bitvec::BitArr;
use smallvec::SmallVec;

/// Vector mask register: bit i set means lane i is active.
pub type VectorMask = BitArr!(for MAX_VECTOR_LENGTH, in u64);

/// A scalar or vector architectural register name.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Register {
    Scalar(usize),
    Vector(usize),
}

impl Register {
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Register::Scalar(idx) | Register::Vector(idx) => idx,
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Register::Scalar(idx) => write!(f, "SR{idx}"),
            Register::Vector(idx) => write!(f, "VR{idx}"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid register name {0:?}")]
pub struct InvalidRegister(pub String);

impl std::str::FromStr for Register {
    type Err = InvalidRegister;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let (ctor, index): (fn(usize) -> Self, _) = if let Some(idx) = name.strip_prefix("SR") {
            (Register::Scalar, idx)
        } else if let Some(idx) = name.strip_prefix("VR") {
            (Register::Vector, idx)
        } else {
            return Err(InvalidRegister(name.to_string()));
        };
        match index.parse::<usize>() {
            Ok(idx) if idx < NUM_REGS => Ok(ctor(idx)),
            _ => Err(InvalidRegister(name.to_string())),
        }
    }
}

/// One operand of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Immediate(i64),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "{reg}"),
            Operand::Immediate(value) => write!(f, "{value}"),
        }
    }
}

pub type Operands = SmallVec<[Operand; 3]>;

/// A decoded assembly instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Operands,
}

impl Instruction {
    /// Register operands, in operand order.
    pub fn registers(&self) -> impl Iterator<Item = Register> + '_ {
        self.operands.iter().filter_map(|operand| match operand {
            Operand::Register(reg) => Some(*reg),
            Operand::Immediate(_) => None,
        })
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.opcode)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

/// One step of the resolved execution trace.
///
/// Produced by the functional oracle before timing simulation starts and
/// read-only afterwards. `pc` is the index of the entry in the resolved
/// stream, not the source line of the instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub pc: usize,
    pub instruction: Instruction,
    /// Vector length register value active at this point.
    pub vector_length: usize,
    /// Vector mask register value active at this point.
    pub mask: VectorMask,
    /// Resolved element addresses, in access order.
    ///
    /// Empty unless the instruction is a vector memory access; already
    /// mask-filtered and bounded by `vector_length`.
    pub addresses: Vec<address>,
}
