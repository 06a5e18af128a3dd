//! Assembly text front end.

use crate::instruction::{Instruction, Operand, Operands, Register};
use crate::opcodes::OPCODES;
use color_eyre::eyre::{self, WrapErr};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("line {line}: unknown opcode {mnemonic:?}")]
    UnknownOpcode { line: usize, mnemonic: String },

    #[error("line {line}: {opcode} takes {expected} operands, found {found}")]
    OperandCount {
        line: usize,
        opcode: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: bad operand {token:?}")]
    BadOperand { line: usize, token: String },
}

/// Parse a program listing into decoded instructions.
///
/// One instruction per line; `#` starts a comment; blank lines are skipped.
pub fn parse_program(source: &str) -> Result<Vec<Instruction>, Error> {
    source
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let text = raw.split('#').next().unwrap_or("").trim();
            (!text.is_empty()).then(|| parse_line(idx + 1, text))
        })
        .collect()
}

pub fn parse_program_file(path: &Path) -> eyre::Result<Vec<Instruction>> {
    let source = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read program from {}", path.display()))?;
    let program = parse_program(&source)
        .wrap_err_with(|| format!("bad program in {}", path.display()))?;
    Ok(program)
}

fn parse_line(line: usize, text: &str) -> Result<Instruction, Error> {
    let mut tokens = text.split_whitespace();
    let mnemonic = tokens.next().unwrap_or_default();
    let opcode = *OPCODES
        .get(mnemonic)
        .ok_or_else(|| Error::UnknownOpcode {
            line,
            mnemonic: mnemonic.to_string(),
        })?;

    let operands: Operands = tokens
        .map(|token| parse_operand(line, token))
        .collect::<Result<_, _>>()?;

    let expected = opcode.num_operands();
    if operands.len() != expected {
        return Err(Error::OperandCount {
            line,
            opcode: opcode.to_string(),
            expected,
            found: operands.len(),
        });
    }
    Ok(Instruction { opcode, operands })
}

fn parse_operand(line: usize, token: &str) -> Result<Operand, Error> {
    if token.starts_with("SR") || token.starts_with("VR") {
        let register: Register = token.parse().map_err(|_| Error::BadOperand {
            line,
            token: token.to_string(),
        })?;
        return Ok(Operand::Register(register));
    }
    token
        .parse::<i64>()
        .map(Operand::Immediate)
        .map_err(|_| Error::BadOperand {
            line,
            token: token.to_string(),
        })
}
