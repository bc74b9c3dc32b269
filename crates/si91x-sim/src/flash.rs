//! Serial NOR flash model
//!
//! Byte-stream model of a SPI NOR part: the controller shifts bytes in and
//! out while chip select is asserted, and write-type commands take effect
//! when it is released. Bus width is not modelled; dummy phases count in
//! bytes whatever the width.

use si91x_core::qspi::opcodes;

use crate::error::{Result, SimError};

/// Write-in-progress bit
pub const SR_WIP: u8 = 1 << 0;
/// Write-enable latch
pub const SR_WEL: u8 = 1 << 1;

/// Geometry and timing of the simulated part
#[derive(Debug, Clone)]
pub struct SimFlashConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Size in bytes
    pub size: usize,
    /// Program page size
    pub page_size: usize,
    /// Address bytes at power-up (3 or 4)
    pub addr_bytes: usize,
    /// Status reads reporting busy after a page program
    pub program_busy_polls: u32,
    /// Status reads reporting busy after an erase
    pub erase_busy_polls: u32,
}

impl Default for SimFlashConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0xC2, // Macronix
            device_id: 0x2016,     // MX25L3233F
            size: 4 * 1024 * 1024,
            page_size: 256,
            addr_bytes: 3,
            program_busy_polls: 1,
            erase_busy_polls: 3,
        }
    }
}

impl SimFlashConfig {
    fn validate(&self) -> Result<()> {
        if !self.size.is_power_of_two() || !self.page_size.is_power_of_two() {
            return Err(SimError::Geometry(format!(
                "size {:#x} and page size {:#x} must be powers of two",
                self.size, self.page_size
            )));
        }
        if !(3..=4).contains(&self.addr_bytes) {
            return Err(SimError::Geometry(format!(
                "{} address bytes",
                self.addr_bytes
            )));
        }
        Ok(())
    }
}

/// Dummy bytes between address and data for a read opcode
fn read_dummies(opcode: u8) -> Option<usize> {
    match opcode {
        0x03 | 0x13 => Some(0),
        0x0B | 0x0C | 0x3B | 0x3C | 0x6B | 0x6C | 0xBB | 0xBC => Some(1),
        0xEB | 0xEC => Some(3),
        _ => None,
    }
}

/// Simulated flash part
pub struct FlashModel {
    config: SimFlashConfig,
    data: Vec<u8>,
    /// SR1, SR2/CR1, CR2
    status: [u8; 3],
    write_enabled: bool,
    ewsr: bool,
    four_byte: bool,
    busy: u32,
    aai_addr: Option<u32>,
    /// Bytes shifted in during the current transaction
    rx: Vec<u8>,
    /// Bytes clocked in either direction during the current transaction
    clocked: usize,
    /// Bytes shifted out during the current transaction
    tx: usize,
    rejected: usize,
}

impl FlashModel {
    /// Erased part
    pub fn new(config: SimFlashConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            data: vec![0xFF; config.size],
            four_byte: config.addr_bytes == 4,
            config,
            status: [0; 3],
            write_enabled: false,
            ewsr: false,
            busy: 0,
            aai_addr: None,
            rx: Vec::new(),
            clocked: 0,
            tx: 0,
            rejected: 0,
        })
    }

    /// Part pre-loaded with `image` at offset zero
    pub fn with_image(config: SimFlashConfig, image: &[u8]) -> Result<Self> {
        let mut flash = Self::new(config)?;
        if image.len() > flash.data.len() {
            return Err(SimError::ImageTooLarge {
                len: image.len(),
                size: flash.data.len(),
            });
        }
        flash.data[..image.len()].copy_from_slice(image);
        Ok(flash)
    }

    /// Array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Status registers (SR1, SR2/CR1, CR2)
    pub fn status(&self) -> [u8; 3] {
        self.status
    }

    /// Make the next `polls` status reads report busy
    pub fn inject_busy(&mut self, polls: u32) {
        self.busy = polls;
    }

    /// Write-type commands ignored because the write-enable latch was clear
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    fn addr_bytes(&self) -> usize {
        if self.four_byte {
            4
        } else {
            3
        }
    }

    fn address(&self) -> Option<u32> {
        let n = self.addr_bytes();
        let bytes = self.rx.get(1..1 + n)?;
        let addr = bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
        Some(addr & (self.config.size as u32 - 1))
    }

    pub(crate) fn shift_in(&mut self, byte: u8) {
        self.rx.push(byte);
        self.clocked += 1;
    }

    pub(crate) fn shift_out(&mut self) -> u8 {
        let index = self.tx;
        self.tx += 1;
        let position = self.clocked;
        self.clocked += 1;

        let Some(&opcode) = self.rx.first() else {
            return 0xFF;
        };
        match opcode {
            opcodes::RDSR => {
                let mut sr = self.status[0] & !(SR_WIP | SR_WEL);
                if self.write_enabled {
                    sr |= SR_WEL;
                }
                if self.busy > 0 {
                    self.busy -= 1;
                    sr |= SR_WIP;
                }
                sr
            }
            opcodes::SR2_READ => self.status[1],
            opcodes::MX_READ_CONFIG => self.status[1 + index % 2],
            0x9F => match index % 3 {
                0 => self.config.manufacturer_id,
                1 => (self.config.device_id >> 8) as u8,
                _ => self.config.device_id as u8,
            },
            op => match (read_dummies(op), self.address()) {
                (Some(dummies), Some(addr)) => {
                    let header = 1 + self.addr_bytes() + dummies;
                    match position.checked_sub(header) {
                        Some(offset) => {
                            let at = (addr as usize + offset) & (self.config.size - 1);
                            self.data[at]
                        }
                        None => 0xFF,
                    }
                }
                _ => 0xFF,
            },
        }
    }

    /// Chip select released: run the collected command
    pub(crate) fn deselect(&mut self) {
        let rx = self.rx.clone();
        if let Some(&opcode) = rx.first() {
            self.execute(opcode, &rx);
        }
        self.rx.clear();
        self.clocked = 0;
        self.tx = 0;
    }

    fn require_wel(&mut self, opcode: u8) -> bool {
        if self.write_enabled {
            return true;
        }
        log::warn!("flash: opcode {:#04x} without write enable", opcode);
        self.rejected += 1;
        false
    }

    fn execute(&mut self, opcode: u8, rx: &[u8]) {
        match opcode {
            opcodes::WREN => self.write_enabled = true,
            opcodes::WRDI => {
                self.write_enabled = false;
                self.aai_addr = None;
            }
            opcodes::EWSR => self.ewsr = true,
            opcodes::WRSR => {
                if self.ewsr || self.require_wel(opcode) {
                    for (reg, byte) in self.status.iter_mut().zip(&rx[1..]) {
                        *reg = *byte;
                    }
                    self.write_enabled = false;
                    self.ewsr = false;
                    self.busy = self.config.program_busy_polls;
                }
            }
            opcodes::SR2_WRITE => {
                if self.require_wel(opcode) {
                    if let Some(b) = rx.get(1) {
                        self.status[1] = *b;
                    }
                    self.write_enabled = false;
                }
            }
            opcodes::PAGE_PROGRAM | 0x32 | 0x12 | 0x34 => {
                if self.require_wel(opcode) {
                    if let Some(addr) = self.address() {
                        let start = 1 + self.addr_bytes();
                        self.program(addr, rx.get(start..).unwrap_or(&[]));
                    }
                    self.write_enabled = false;
                    self.busy = self.config.program_busy_polls;
                }
            }
            opcodes::AAI => {
                if self.require_wel(opcode) {
                    let (addr, payload) = match self.aai_addr {
                        Some(addr) => (Some(addr), rx.get(1..).unwrap_or(&[])),
                        None => {
                            let start = 1 + self.addr_bytes();
                            (self.address(), rx.get(start..).unwrap_or(&[]))
                        }
                    };
                    if let Some(addr) = addr {
                        self.program_linear(addr, payload);
                        self.aai_addr = Some(addr.wrapping_add(payload.len() as u32));
                    }
                    self.busy = self.config.program_busy_polls;
                }
            }
            opcodes::SECTOR_ERASE => self.erase(opcode, 4 * 1024),
            0x52 => self.erase(opcode, 32 * 1024),
            opcodes::BLOCK_ERASE | 0xDC => self.erase(opcode, 64 * 1024),
            opcodes::CHIP_ERASE | 0x60 => {
                if self.require_wel(opcode) {
                    self.data.fill(0xFF);
                    self.write_enabled = false;
                    self.busy = self.config.erase_busy_polls;
                }
            }
            0xB7 => self.four_byte = true,
            0xE9 => self.four_byte = false,
            _ => log::trace!("flash: opcode {:#04x} accepted without effect", opcode),
        }
    }

    /// Page program: only 1 -> 0 transitions, wrapping within the page
    fn program(&mut self, addr: u32, payload: &[u8]) {
        let page = self.config.page_size;
        let base = addr as usize & !(page - 1);
        let mut offset = addr as usize & (page - 1);
        for byte in payload {
            self.data[base + offset] &= *byte;
            offset = (offset + 1) & (page - 1);
        }
    }

    fn program_linear(&mut self, addr: u32, payload: &[u8]) {
        for (i, byte) in payload.iter().enumerate() {
            let at = (addr as usize + i) & (self.config.size - 1);
            self.data[at] &= *byte;
        }
    }

    fn erase(&mut self, opcode: u8, size: usize) {
        if !self.require_wel(opcode) {
            return;
        }
        if let Some(addr) = self.address() {
            let base = addr as usize & !(size - 1);
            let end = (base + size).min(self.data.len());
            self.data[base..end].fill(0xFF);
        }
        self.write_enabled = false;
        self.busy = self.config.erase_busy_polls;
    }
}
