//! Decoded bus trace
//!
//! Every manual-mode trigger the controller sees becomes a [`Phase`]; phases
//! between two chip-select releases form a [`Transaction`].

use std::fmt;

use si91x_core::qspi::BusMode;

/// One shift on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Controller to flash
    Write {
        /// Bus width
        mode: BusMode,
        /// Phase length in bits
        bits: u32,
        /// Shifted value, right-aligned
        value: u32,
    },
    /// Flash to controller; consecutive reads are merged
    Read {
        /// Bus width
        mode: BusMode,
        /// Bytes clocked in
        bytes: Vec<u8>,
    },
}

/// Phases of one chip-select assertion
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    /// Chip select index
    pub cs: u8,
    /// Phases in bus order
    pub phases: Vec<Phase>,
}

impl Transaction {
    /// First byte shifted out, if the transaction starts with a write
    pub fn opcode(&self) -> Option<u8> {
        match self.phases.first() {
            Some(Phase::Write { bits, value, .. }) => Some((*value >> bits.saturating_sub(8)) as u8),
            _ => None,
        }
    }

    /// Values of the write phases, in order
    pub fn writes(&self) -> Vec<u32> {
        self.phases
            .iter()
            .filter_map(|p| match p {
                Phase::Write { value, .. } => Some(*value),
                Phase::Read { .. } => None,
            })
            .collect()
    }

    /// All bytes read back during the transaction
    pub fn read_bytes(&self) -> Vec<u8> {
        self.phases
            .iter()
            .flat_map(|p| match p {
                Phase::Read { bytes, .. } => bytes.as_slice(),
                Phase::Write { .. } => [].as_slice(),
            })
            .copied()
            .collect()
    }

    pub(crate) fn push_write(&mut self, mode: BusMode, bits: u32, value: u32) {
        self.phases.push(Phase::Write { mode, bits, value });
    }

    pub(crate) fn push_read(&mut self, mode: BusMode, byte: u8) {
        if let Some(Phase::Read { mode: last, bytes }) = self.phases.last_mut() {
            if *last == mode {
                bytes.push(byte);
                return;
            }
        }
        self.phases.push(Phase::Read {
            mode,
            bytes: vec![byte],
        });
    }
}

fn mode_tag(mode: BusMode) -> &'static str {
    match mode {
        BusMode::Single => "",
        BusMode::Dual => "d:",
        BusMode::Quad => "q:",
        BusMode::Octa => "o:",
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs{}:", self.cs)?;
        for phase in &self.phases {
            match phase {
                Phase::Write { mode, bits, value } => {
                    let digits = (*bits as usize).div_ceil(4);
                    write!(f, " {}{:0width$x}", mode_tag(*mode), value, width = digits)?;
                }
                Phase::Read { mode, bytes } => {
                    write!(f, " {}<-", mode_tag(*mode))?;
                    for b in bytes.iter().take(16) {
                        write!(f, " {:02x}", b)?;
                    }
                    if bytes.len() > 16 {
                        write!(f, " ..({} bytes)", bytes.len())?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Completed transactions, oldest first
#[derive(Debug, Clone, Default)]
pub struct Trace {
    transactions: Vec<Transaction>,
}

impl Trace {
    /// All transactions
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Opcodes of every transaction that starts with a write
    pub fn opcodes(&self) -> Vec<u8> {
        self.transactions.iter().filter_map(|t| t.opcode()).collect()
    }

    /// Number of transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub(crate) fn push(&mut self, transaction: Transaction) {
        log::trace!("{}", transaction);
        self.transactions.push(transaction);
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.transactions {
            writeln!(f, "{}", t)?;
        }
        Ok(())
    }
}
