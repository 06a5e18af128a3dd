//! Word-addressable data memory images.

use crate::address;
use color_eyre::eyre::{self, WrapErr};
use std::io::Write;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{name}: address {addr} out of range (memory holds {size} words)")]
    OutOfRange {
        name: &'static str,
        addr: address,
        size: usize,
    },

    #[error("{name}: image line {line}: bad word {token:?}")]
    BadWord {
        name: &'static str,
        line: usize,
        token: String,
    },

    #[error("{name}: image has more than {size} words")]
    ImageTooLarge { name: &'static str, size: usize },
}

/// A flat 32-bit word memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMemory {
    name: &'static str,
    words: Box<[i32]>,
}

impl DataMemory {
    #[must_use]
    pub fn new(name: &'static str, addr_bits: usize) -> Self {
        Self {
            name,
            words: vec![0; 1 << addr_bits].into_boxed_slice(),
        }
    }

    /// Load an image: one decimal word per line, remainder zero-filled.
    pub fn load(name: &'static str, image: &str, addr_bits: usize) -> Result<Self, Error> {
        let mut mem = Self::new(name, addr_bits);
        let mut next = 0;
        for (idx, line) in image.lines().enumerate() {
            let token = line.trim();
            if token.is_empty() {
                continue;
            }
            let word = token.parse::<i32>().map_err(|_| Error::BadWord {
                name,
                line: idx + 1,
                token: token.to_string(),
            })?;
            if next >= mem.words.len() {
                return Err(Error::ImageTooLarge {
                    name,
                    size: mem.words.len(),
                });
            }
            mem.words[next] = word;
            next += 1;
        }
        Ok(mem)
    }

    pub fn open(name: &'static str, path: &Path, addr_bits: usize) -> eyre::Result<Self> {
        let image = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {name} image from {}", path.display()))?;
        Ok(Self::load(name, &image, addr_bits)?)
    }

    pub fn read(&self, addr: address) -> Result<i32, Error> {
        self.words
            .get(addr as usize)
            .copied()
            .ok_or(Error::OutOfRange {
                name: self.name,
                addr,
                size: self.words.len(),
            })
    }

    pub fn write(&mut self, addr: address, value: i32) -> Result<(), Error> {
        let size = self.words.len();
        let word = self
            .words
            .get_mut(addr as usize)
            .ok_or(Error::OutOfRange {
                name: self.name,
                addr,
                size,
            })?;
        *word = value;
        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.words.len()
    }

    pub fn dump(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for word in self.words.iter() {
            writeln!(out, "{word}")?;
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
