//! Register busy-bit tracking.
//!
//! The scoreboard keeps one busy bit per architectural register. A bit is set
//! while an in-flight instruction will write that register; decode admission
//! is gated on every register an instruction names being free.

use crate::instruction::Register;
use crate::NUM_REGS;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    scalar: [bool; NUM_REGS],
    vector: [bool; NUM_REGS],
}

impl Scoreboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bit(&self, reg: Register) -> bool {
        match reg {
            Register::Scalar(idx) => self.scalar[idx],
            Register::Vector(idx) => self.vector[idx],
        }
    }

    fn bit_mut(&mut self, reg: Register) -> &mut bool {
        match reg {
            Register::Scalar(idx) => &mut self.scalar[idx],
            Register::Vector(idx) => &mut self.vector[idx],
        }
    }

    /// Checks whether any of the registers is reserved by an in-flight
    /// instruction. Pure query, no side effect.
    #[must_use]
    pub fn has_collision<I>(&self, registers: I) -> bool
    where
        I: IntoIterator<Item = Register>,
    {
        registers.into_iter().any(|reg| {
            let reserved = self.bit(reg);
            if reserved {
                log::trace!("scoreboard: collision on {reg}");
            }
            reserved
        })
    }

    /// Reserve a register for the duration of an in-flight write.
    pub fn reserve(&mut self, reg: Register) {
        let bit = self.bit_mut(reg);
        debug_assert!(!*bit, "trying to reserve an already reserved register {reg}");
        *bit = true;
        log::trace!("scoreboard: reserve {reg}");
    }

    /// Release a register at instruction completion.
    pub fn release(&mut self, reg: Register) {
        *self.bit_mut(reg) = false;
        log::trace!("scoreboard: release {reg}");
    }

    pub fn reserve_all(&mut self, registers: &[Register]) {
        for &reg in registers {
            self.reserve(reg);
        }
    }

    pub fn release_all(&mut self, registers: &[Register]) {
        for &reg in registers {
            self.release(reg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Scoreboard;
    use crate::instruction::Register::{Scalar, Vector};

    #[test]
    fn reserved_registers_collide_until_released() {
        let mut scoreboard = Scoreboard::new();
        assert!(!scoreboard.has_collision([Scalar(0), Vector(0)]));

        scoreboard.reserve(Scalar(0));
        assert!(scoreboard.has_collision([Scalar(0)]));
        // the scalar and vector files are independent
        assert!(!scoreboard.has_collision([Vector(0)]));

        scoreboard.release(Scalar(0));
        assert!(!scoreboard.has_collision([Scalar(0)]));
    }

    #[test]
    fn collision_checks_every_named_register() {
        let mut scoreboard = Scoreboard::new();
        scoreboard.reserve_all(&[Vector(2)]);
        assert!(scoreboard.has_collision([Scalar(1), Vector(2), Vector(3)]));
        scoreboard.release_all(&[Vector(2)]);
        assert!(!scoreboard.has_collision([Scalar(1), Vector(2), Vector(3)]));
    }
}
