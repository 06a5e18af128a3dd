//! Instruction opcodes and their static issue classification.

/// Opcode mnemonics of the vector ISA.
#[derive(strum::AsRefStr, Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    // scalar ALU
    ADD,
    SUB,
    AND,
    OR,
    XOR,
    SLL,
    SRL,
    SRA,
    // branches
    BEQ,
    BNE,
    BGT,
    BLT,
    BGE,
    BLE,
    // mask and length control
    CVM,
    POP,
    MTCL,
    MFCL,
    // scalar memory
    LS,
    SS,
    // vector arithmetic
    ADDVV,
    SUBVV,
    MULVV,
    DIVVV,
    ADDVS,
    SUBVS,
    MULVS,
    DIVVS,
    // vector compares (write the mask register)
    SEQVV,
    SNEVV,
    SGTVV,
    SLTVV,
    SGEVV,
    SLEVV,
    SEQVS,
    SNEVS,
    SGTVS,
    SLTVS,
    SGEVS,
    SLEVS,
    // vector memory
    LV,
    SV,
    LVWS,
    SVWS,
    LVI,
    SVI,
    HALT,
}

/// Issue class of an opcode.
///
/// The class selects the hazard policy, the target issue queue and the
/// latency formula; no further per-opcode dispatch is needed in the timing
/// model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Class {
    ScalarAlu,
    ScalarMem,
    Branch,
    /// CVM and HALT: no register operands.
    Control,
    /// POP, MTCL, MFCL: a single scalar register operand.
    RegMove,
    VectorAdd,
    VectorMul,
    VectorDiv,
    VectorCompare,
    VectorMem,
}

/// The issue queue an instruction class is admitted to.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum QueueKind {
    VectorData = 0,
    VectorCompute = 1,
    Scalar = 2,
}

impl QueueKind {
    pub const ALL: [QueueKind; 3] = [
        QueueKind::VectorData,
        QueueKind::VectorCompute,
        QueueKind::Scalar,
    ];
}

impl Class {
    #[must_use]
    pub fn queue(self) -> QueueKind {
        match self {
            Class::VectorAdd | Class::VectorMul | Class::VectorDiv | Class::VectorCompare => {
                QueueKind::VectorCompute
            }
            Class::VectorMem => QueueKind::VectorData,
            _ => QueueKind::Scalar,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Opcode {
    pub op: Op,
    pub class: Class,
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.op.as_ref())
    }
}

impl Opcode {
    /// Number of operands the assembler expects for this opcode.
    #[must_use]
    pub fn num_operands(&self) -> usize {
        match self.class {
            Class::Control => 0,
            Class::RegMove => 1,
            Class::VectorCompare => 2,
            Class::VectorMem => match self.op {
                Op::LV | Op::SV => 2,
                _ => 3,
            },
            _ => 3,
        }
    }
}

pub type OpcodeMap = phf::Map<&'static str, Opcode>;

/// Mnemonic lookup table.
pub static OPCODES: OpcodeMap = phf::phf_map! {
    "ADD" => Opcode { op: Op::ADD, class: Class::ScalarAlu },
    "SUB" => Opcode { op: Op::SUB, class: Class::ScalarAlu },
    "AND" => Opcode { op: Op::AND, class: Class::ScalarAlu },
    "OR" => Opcode { op: Op::OR, class: Class::ScalarAlu },
    "XOR" => Opcode { op: Op::XOR, class: Class::ScalarAlu },
    "SLL" => Opcode { op: Op::SLL, class: Class::ScalarAlu },
    "SRL" => Opcode { op: Op::SRL, class: Class::ScalarAlu },
    "SRA" => Opcode { op: Op::SRA, class: Class::ScalarAlu },
    "BEQ" => Opcode { op: Op::BEQ, class: Class::Branch },
    "BNE" => Opcode { op: Op::BNE, class: Class::Branch },
    "BGT" => Opcode { op: Op::BGT, class: Class::Branch },
    "BLT" => Opcode { op: Op::BLT, class: Class::Branch },
    "BGE" => Opcode { op: Op::BGE, class: Class::Branch },
    "BLE" => Opcode { op: Op::BLE, class: Class::Branch },
    "CVM" => Opcode { op: Op::CVM, class: Class::Control },
    "POP" => Opcode { op: Op::POP, class: Class::RegMove },
    "MTCL" => Opcode { op: Op::MTCL, class: Class::RegMove },
    "MFCL" => Opcode { op: Op::MFCL, class: Class::RegMove },
    "LS" => Opcode { op: Op::LS, class: Class::ScalarMem },
    "SS" => Opcode { op: Op::SS, class: Class::ScalarMem },
    "ADDVV" => Opcode { op: Op::ADDVV, class: Class::VectorAdd },
    "SUBVV" => Opcode { op: Op::SUBVV, class: Class::VectorAdd },
    "ADDVS" => Opcode { op: Op::ADDVS, class: Class::VectorAdd },
    "SUBVS" => Opcode { op: Op::SUBVS, class: Class::VectorAdd },
    "MULVV" => Opcode { op: Op::MULVV, class: Class::VectorMul },
    "MULVS" => Opcode { op: Op::MULVS, class: Class::VectorMul },
    "DIVVV" => Opcode { op: Op::DIVVV, class: Class::VectorDiv },
    "DIVVS" => Opcode { op: Op::DIVVS, class: Class::VectorDiv },
    "SEQVV" => Opcode { op: Op::SEQVV, class: Class::VectorCompare },
    "SNEVV" => Opcode { op: Op::SNEVV, class: Class::VectorCompare },
    "SGTVV" => Opcode { op: Op::SGTVV, class: Class::VectorCompare },
    "SLTVV" => Opcode { op: Op::SLTVV, class: Class::VectorCompare },
    "SGEVV" => Opcode { op: Op::SGEVV, class: Class::VectorCompare },
    "SLEVV" => Opcode { op: Op::SLEVV, class: Class::VectorCompare },
    "SEQVS" => Opcode { op: Op::SEQVS, class: Class::VectorCompare },
    "SNEVS" => Opcode { op: Op::SNEVS, class: Class::VectorCompare },
    "SGTVS" => Opcode { op: Op::SGTVS, class: Class::VectorCompare },
    "SLTVS" => Opcode { op: Op::SLTVS, class: Class::VectorCompare },
    "SGEVS" => Opcode { op: Op::SGEVS, class: Class::VectorCompare },
    "SLEVS" => Opcode { op: Op::SLEVS, class: Class::VectorCompare },
    "LV" => Opcode { op: Op::LV, class: Class::VectorMem },
    "SV" => Opcode { op: Op::SV, class: Class::VectorMem },
    "LVWS" => Opcode { op: Op::LVWS, class: Class::VectorMem },
    "SVWS" => Opcode { op: Op::SVWS, class: Class::VectorMem },
    "LVI" => Opcode { op: Op::LVI, class: Class::VectorMem },
    "SVI" => Opcode { op: Op::SVI, class: Class::VectorMem },
    "HALT" => Opcode { op: Op::HALT, class: Class::Control },
};
