//! Architectural register files.

use color_eyre::eyre::{self, WrapErr};
use std::io::Write;
use std::path::Path;

/// A bank of fixed-width registers, each `lanes` 32-bit words wide.
///
/// The scalar file uses one lane per register, the vector file 64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    name: &'static str,
    lanes: usize,
    registers: Box<[Box<[i32]>]>,
}

impl RegisterFile {
    #[must_use]
    pub fn new(name: &'static str, num_regs: usize, lanes: usize) -> Self {
        let registers = (0..num_regs)
            .map(|_| vec![0; lanes].into_boxed_slice())
            .collect();
        Self {
            name,
            lanes,
            registers,
        }
    }

    #[must_use]
    pub fn scalar(&self, idx: usize) -> i32 {
        self.registers[idx][0]
    }

    pub fn set_scalar(&mut self, idx: usize, value: i32) {
        log::trace!("{}: R{idx} <- {value}", self.name);
        self.registers[idx][0] = value;
    }

    #[must_use]
    pub fn vector(&self, idx: usize) -> &[i32] {
        &self.registers[idx]
    }

    pub fn vector_mut(&mut self, idx: usize) -> &mut [i32] {
        &mut self.registers[idx]
    }

    /// Positional dump: an index header row, a separator, then one row per
    /// register, every cell left-aligned in a 13-character column.
    pub fn dump(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for lane in 0..self.lanes {
            write!(out, "{lane:<13}")?;
        }
        writeln!(out)?;
        writeln!(out, "{}", "-".repeat(self.lanes * 13))?;
        for register in self.registers.iter() {
            for word in register.iter() {
                write!(out, "{word:<13}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    pub fn dump_to(&self, path: &Path) -> eyre::Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path).wrap_err_with(
            || format!("failed to create {} dump at {}", self.name, path.display()),
        )?);
        self.dump(&mut file)?;
        Ok(())
    }
}
