//! Controller init and the read/write/erase engine
//!
//! Every sequence here leaves auto mode and continue-fetch in the state it
//! found them, provided it runs to completion. A poll timeout returns early
//! with the controller in manual mode wherever the sequence stopped; nothing
//! is rolled back.

use super::config::{AddressWidth, BusMode, DummyDirection, FlashConfig, FlashType, FullDuplex};
use super::opcodes::{AAI, READ_BURST, SET_BURST, WRDI, WRDI2, WREN, WREN2};
use super::Qspi;
use crate::dma::{DmaChannel, DmaFlags, Hsize, Transfer};
use crate::error::{Error, Result};
use crate::poll::PollBudget;
use crate::regs::qspi::*;
use crate::window::FlashWindow;

/// Transfer split in GPDMA descriptor mode and for window copies
const SPLIT_DESC_MODE: usize = 4 * 1024 - 4;
/// Transfer split otherwise
const SPLIT_DEFAULT: usize = 32 * 1024 - 4;
/// Continuous-read mode byte sent in auto mode
const CONTINUOUS_MODE_BYTE: u32 = 0xA0;

/// Erase granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EraseKind {
    /// Sector (usually 4 KiB)
    Sector,
    /// Block (usually 64 KiB)
    Block,
    /// Whole chip; no address phase
    Chip,
}

/// Manual read options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Data-port access width
    pub hsize: Hsize,
    /// Do not clamp 32-bit addresses to the 26-bit window
    pub full_32bit_addr: bool,
}

/// Page program options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Program page size; a power of two
    pub page_size: u32,
    /// Data-port access width
    pub hsize: Hsize,
    /// Take the clock away from hardware control for each page
    pub disable_hw_ctrl: bool,
    /// Settle delay after every page
    pub delay_us: u32,
    /// Do not clamp 32-bit addresses to the 26-bit window
    pub full_32bit_addr: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            page_size: 256,
            hsize: Hsize::Byte,
            disable_hw_ctrl: false,
            delay_us: 0,
            full_32bit_addr: false,
        }
    }
}

/// Erase options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EraseOptions {
    /// Take the clock away from hardware control during the erase
    pub disable_hw_ctrl: bool,
    /// Delay after the flash reports idle
    pub delay_us: u32,
    /// Do not clamp 32-bit addresses to the 26-bit window
    pub full_32bit_addr: bool,
}

/// Auto-mode window base for a chip select
fn window_base(config: &FlashConfig) -> u32 {
    if config.cs_no.index() == 0 {
        QSPI_AUTOM_CHIP0_ADDRESS
    } else {
        QSPI_AUTOM_CHIP1_ADDRESS
    }
}

impl Qspi<'_> {
    /// Initialise the controller for the flash described by `config`
    ///
    /// Programs the idle line levels, dual-flash routing, clocking and
    /// manual-mode defaults, optionally runs [`flash_init`](Self::flash_init)
    /// and the wrap setup, and finishes with [`auto_init`](Self::auto_init).
    pub fn spi_init(
        &mut self,
        config: &FlashConfig,
        init_flash: bool,
        delay_us: u32,
        fifo_threshold: bool,
    ) -> Result<()> {
        let cs = config.cs_no;
        log::debug!("spi init on {:?} ({:?})", cs, config.flash_type);

        let d3d2 = cs.d3d2_pos();
        let neg_edge = if config.neg_edge_sampling {
            BUS_MODE_NEG_EDGE
        } else {
            0
        };
        self.regs.update32(
            QSPI_BUS_MODE,
            (0x3 << d3d2) | BUS_MODE_NEG_EDGE,
            ((config.d3d2_data as u32 & 0x3) << d3d2) | neg_edge,
        );
        let d7d4 = cs.d7d4_pos();
        self.regs.update32(
            OCTA_SPI_BUS_CONTROLLER,
            0xF << d7d4,
            (config.d7_d4_data as u32 & 0xF) << d7d4,
        );

        self.set_bus_mode(cs, BusMode::Single);

        let secondary_pos = CTRL2_SECONDARY_CSN_OFF + cs.index() as u32 * 2;
        if config.dual_flash_mode {
            self.regs.set_bits(
                OCTA_SPI_BUS_CONTROLLER2,
                CTRL2_DUAL_FLASH_MODE | ((config.secondary_csn as u32 & 0x3) << secondary_pos),
            );
        } else {
            self.regs.clear_bits(
                OCTA_SPI_BUS_CONTROLLER2,
                CTRL2_DUAL_FLASH_MODE | (0x3 << secondary_pos),
            );
        }

        self.dual_both(config, true);
        if init_flash {
            self.flash_init(config, delay_us)?;
            if let Some(wrap) = config.wrap_len {
                self.command(16, ((SET_BURST as u32) << 8) | wrap as u32, cs)?;
            }
        }
        self.dual_both(config, false);

        self.set_bus_mode(cs, config.inst_mode);

        let mut clk = (config.clk_en as u32) << CLK_CONFIG_CLK_EN_OFF;
        if config.polarity_mode {
            clk |= CLK_CONFIG_POLARITY;
        }
        self.regs.write32(QSPI_CLK_CONFIG, clk);

        if config.auto_csn_based_addr_en {
            self.regs
                .set_bits(QSPI_BUS_MODE, BusModeFlags::AUTO_CSN_BASED_ADDR.bits());
            self.regs
                .write32(QSPI_AUTO_BASE_ADDR_UNMASK_CSN0, AUTO_BASE_ADDR_UNMASK);
        } else {
            self.regs
                .clear_bits(QSPI_BUS_MODE, BusModeFlags::AUTO_CSN_BASED_ADDR.bits());
        }

        self.regs.set_bits(QSPI_CLK_CONFIG, CLK_CONFIG_ENABLE);
        self.regs.set_bits(
            QSPI_MANUAL_CONFIG,
            ((cs.index() as u32) << MANUAL_CSN_SELECT_OFF) | MANUAL_HW_CTRL_MODE,
        );

        if config.loop_back_en {
            self.regs.set_bits(QSPI_MANUAL_CONFIG_2, MANUAL2_LOOP_BACK_EN);
        } else {
            self.regs
                .clear_bits(QSPI_MANUAL_CONFIG_2, MANUAL2_LOOP_BACK_EN);
        }

        if fifo_threshold {
            self.regs.write32(QSPI_FIFO_THRESHOLD, FIFO_THRESHOLDS);
        }

        match config.full_duplex {
            FullDuplex::Enable => self.regs.set_bits(QSPI_MANUAL_CONFIG, MANUAL_FULL_DUPLEX_EN),
            FullDuplex::Disable => self
                .regs
                .clear_bits(QSPI_MANUAL_CONFIG, MANUAL_FULL_DUPLEX_EN),
            FullDuplex::Leave => {}
        }

        if config.continue_fetch_en {
            self.regs
                .set_bits(QSPI_AUTO_CONTINUE_FETCH_CTRL, CONTINUE_FETCH_EN);
        } else {
            self.regs
                .clear_bits(QSPI_AUTO_CONTINUE_FETCH_CTRL, CONTINUE_FETCH_EN);
        }

        self.auto_init(config)?;
        if config.auto_mode {
            self.auto_mode_enable()?;
        }
        Ok(())
    }

    /// Program the auto-mode read sequence for `config.cs_no`
    ///
    /// Ends with [`auto_mode_enable`](Self::auto_mode_enable).
    pub fn auto_init(&mut self, config: &FlashConfig) -> Result<()> {
        let bank = config.cs_no.index();

        if config.prefetch_en {
            self.regs
                .set_bits(QSPI_BUS_MODE, BusModeFlags::PREFETCH_EN.bits());
        } else {
            self.regs
                .clear_bits(QSPI_BUS_MODE, BusModeFlags::PREFETCH_EN.bits());
        }

        if config.addr_width == AddressWidth::Bits32 {
            self.regs.set_bits(QSPI_AUTO_CONFIG3, AUTO3_ADR_SIZE_32BIT);
        } else {
            self.regs.clear_bits(QSPI_AUTO_CONFIG3, AUTO3_ADR_SIZE_32BIT);
        }

        // AUTO_CONFIG3: command size, dummy count high nibble, word swap
        let auto3_reg = auto_config3(bank);
        let mut auto3 = self.regs.read32(auto3_reg);
        if config.uses_16bit_cmd() {
            auto3 |= AUTO3_CMD_SIZE_16BIT | ((config.read_cmd as u32) << AUTO3_RD_INST_MSB_OFF);
        } else {
            auto3 &= !AUTO3_CMD_SIZE_16BIT;
        }

        let mut dummy_count = config.dummy_count();
        if config.dummy_cycles_for_controller != 0 {
            auto3 |= AUTO3_DUMMY_BIT_MODE;
            dummy_count = dummy_count * 8
                + config.dummy_cycles_for_controller as u32 * (1 << config.dummy_mode.code());
        } else {
            auto3 &= !AUTO3_DUMMY_BIT_MODE;
        }
        auto3 |= ((dummy_count >> 4) & 0xF) << AUTO3_MS_DUMMY_OFF;

        if config.word_swap_en {
            auto3 |= AUTO3_WORD_SWAP_EN;
        } else {
            auto3 &= !AUTO3_WORD_SWAP_EN;
        }
        self.regs.write32(auto3_reg, auto3);

        // AUTO_CTRL_CONFIG_2: opcodes and read flavour
        let first_cmd = match config.cmd_16bit {
            Some(cmd) => cmd.read_msb,
            None => config.read_cmd,
        };
        let mut auto2 = (first_cmd as u32) << AUTO2_READ_CMD_OFF;
        if config.swap_en {
            auto2 |= AUTO2_RD_SWAP;
        }
        auto2 |= (((config.addr_width.code() + 1) & 0x1) << AUTO2_ADDR_WIDTH_OFF)
            | ((config.read_cmd as u32) << AUTO2_WRAP_CMD_OFF)
            | ((config.dummys_4_jump as u32) << AUTO2_JUMP_DUMMY_OFF)
            | ((config.dummy_direction == DummyDirection::Writes) as u32) << AUTO2_DUMMY_WRITES_OFF;
        if config.flash_type != FlashType::MacronixQuad {
            auto2 |= (config.continuous as u32) << AUTO2_CONTINUOUS_OFF;
        }

        // AUTO_CTRL_CONFIG_1: per-phase bus modes and dummy counts
        let extra_byte = if config.continuous {
            CONTINUOUS_MODE_BYTE
        } else {
            0
        };
        let data_mode = if config.dual_flash_mode {
            BusMode::Octa
        } else {
            config.data_mode
        };
        let extra_en = if config.extra_byte_en {
            AUTO1_EXTRA_BYTE_EN
        } else {
            0
        };
        let mut auto1 = ((dummy_count & 0xF) << AUTO1_DUMMY_OFF)
            | ((config.dummy_bytes_wrap as u32) << AUTO1_WRAP_DUMMY_OFF)
            | extra_en
            | (extra_byte << AUTO1_EXTRA_BYTE_OFF)
            | (config.inst_mode.code() << AUTO1_INST_MODE_OFF)
            | (config.addr_mode.code() << AUTO1_ADDR_MODE_OFF)
            | (config.dummy_mode.code() << AUTO1_DUMMY_MODE_OFF)
            | (config.extra_byte_mode.code() << AUTO1_EXTRA_MODE_OFF)
            | (data_mode.code() << AUTO1_DATA_MODE_OFF);

        if config.wrap_len.is_some() {
            self.regs.set_bits(QSPI_BUS_MODE, BusModeFlags::WRAP_EN.bits());
            auto1 |= 1 << AUTO1_WRAP_DUMMY_OFF;
            auto2 |= (READ_BURST as u32) << AUTO2_WRAP_CMD_OFF;
        } else {
            self.regs
                .clear_bits(QSPI_BUS_MODE, BusModeFlags::WRAP_EN.bits());
        }

        self.regs.write32(auto_ctrl_config_2(bank), auto2);
        self.regs.write32(auto_ctrl_config_1(bank), auto1);
        log::debug!(
            "auto mode on {:?}: cfg1 {:#010x} cfg2 {:#010x} cfg3 {:#010x}",
            config.cs_no,
            auto1,
            auto2,
            auto3
        );

        self.auto_mode_enable()
    }

    /// Switch to auto mode unless hardware already controls the mode
    pub fn auto_mode_enable(&mut self) -> Result<()> {
        if self.regs.read32(QSPI_STATUS) & Status::HW_CTRLD_MODE.bits() == 0 {
            self.wait_set(QSPI_MANUAL_CONFIG, MANUAL_CSN_ACTIVE)?;
            self.regs.set_bits(QSPI_BUS_MODE, BusModeFlags::AUTO_MODE.bits());
        }
        Ok(())
    }

    /// Send command, address, extra byte and dummy phases of a manual read
    ///
    /// Leaves chip select asserted with the bus in the data mode.
    pub fn config_read_phases(&mut self, config: &FlashConfig, addr: u32) -> Result<()> {
        let cs = config.cs_no;
        self.deassert_csn();

        self.set_bus_mode(cs, config.inst_mode);
        let mut prev = config.inst_mode;

        match config.cmd_16bit {
            Some(cmd) => {
                let value = ((config.read_cmd as u32) << 8) | cmd.read_msb as u32;
                self.write_phase(16, value, cs)?;
            }
            None => {
                // A8 rides in bit 3 of the command for 9-bit addressing
                let a8 = if config.addr_width == AddressWidth::Bits9 {
                    (addr & 0x100) >> 5
                } else {
                    0
                };
                self.write_phase(8, config.read_cmd as u32 | a8, cs)?;
            }
        }

        if config.addr_mode != prev {
            self.set_bus_mode(cs, config.addr_mode);
            prev = config.addr_mode;
        }
        self.write_phase(config.addr_width.phase_bits(), addr, cs)?;

        if config.extra_byte_en {
            if config.extra_byte_mode != prev {
                self.set_bus_mode(cs, config.extra_byte_mode);
                prev = config.extra_byte_mode;
            }
            self.write_phase(8, 0, cs)?;
        }

        let dummies = config.dummy_count();
        if dummies != 0 {
            if config.dummy_mode != prev {
                self.set_bus_mode(cs, config.dummy_mode);
                prev = config.dummy_mode;
            }
            match config.dummy_direction {
                DummyDirection::Reads => {
                    self.read_trigger(dummies, cs, Hsize::Byte);
                    for _ in 0..dummies {
                        self.pop_fifo(Hsize::Byte)?;
                    }
                }
                DummyDirection::Writes => self.dummy_writes(dummies, cs)?,
            }
        }

        let cycles = config.dummy_cycles_for_controller as u32;
        if cycles != 0 {
            // One byte per cycle in octal mode
            self.set_bus_mode(cs, BusMode::Octa);
            self.read_trigger(cycles, cs, Hsize::Byte);
            for _ in 0..cycles {
                self.pop_fifo(Hsize::Byte)?;
            }
            self.set_bus_mode(cs, config.dummy_mode);
            prev = config.dummy_mode;
        }

        if config.data_mode != prev {
            self.set_bus_mode(cs, config.data_mode);
        }
        Ok(())
    }

    /// Read flash through manual mode
    ///
    /// The transfer length is `buf.len()` rounded up to the access width;
    /// bytes past the end of `buf` are read and dropped. With
    /// `config.dma_mode` set and a channel supplied, the FIFO is drained by
    /// DMA instead of polling.
    pub fn manual_read(
        &mut self,
        config: &FlashConfig,
        addr: u32,
        buf: &mut [u8],
        opts: ReadOptions,
        mut dma: Option<DmaChannel<'_>>,
    ) -> Result<()> {
        let cs = config.cs_no;
        let hsize = opts.hsize;
        let mut addr = config.mask_address(addr, opts.full_32bit_addr);
        log::debug!("manual read {} bytes at {:#x} on {:?}", buf.len(), addr, cs);

        let auto_was_on = self.suspend_auto()?;

        let split = match &dma {
            Some(ch) if ch.flags.contains(DmaFlags::DEFAULT_DESC_MODE) => SPLIT_DESC_MODE,
            _ => SPLIT_DEFAULT,
        };

        if self.regs.read32(QSPI_STATUS) & Status::HW_CTRLD_MODE.bits() == 0 {
            self.regs
                .clear_bits(QSPI_BUS_MODE, BusModeFlags::AUTO_MODE.bits());
            self.wait_set(QSPI_STATUS, Status::AUTO_MODE_FSM_IDLE.bits())?;
        }

        if !config.swap_en {
            self.regs.clear_bits(
                QSPI_MANUAL_CONFIG_2,
                1 << (MANUAL2_SWAP_OFF + cs.index() as u32),
            );
        }

        let unit = hsize.bytes();
        let padded = (buf.len() + unit - 1) & !(unit - 1);
        let mut remaining = padded;
        let mut pos = 0usize;
        let mut manual = 0;
        let mut phases_sent = false;

        while remaining != 0 {
            if !phases_sent {
                self.dual_both(config, true);
                self.config_read_phases(config, addr)?;
                if config.dual_flash_mode {
                    self.dual_both(config, false);
                    self.set_bus_mode(cs, BusMode::Octa);
                }
                manual = (self.regs.read32(QSPI_MANUAL_CONFIG) & !MANUAL_READ_CLEAR)
                    | ((cs.index() as u32) << MANUAL_CSN_SELECT_OFF)
                    | (hsize.code() << MANUAL_HSIZE_OFF)
                    | MANUAL_TAKE_LEN_FRM_REG;
                phases_sent = config.continuous;
            }

            let count = if config.continuous {
                remaining.min(split)
            } else {
                unit
            };
            addr = addr.wrapping_add(count as u32);
            remaining -= count;

            self.regs.write32(
                QSPI_MANUAL_CONFIG,
                manual | MANUAL_READ_TRIGGER | manual_read_count(count as u32),
            );
            self.drain_fifo(buf, pos, count, hsize, config.dma_mode, dma.as_mut())?;
            pos += count;
        }

        self.deassert_csn();
        if config.dual_flash_mode {
            self.set_bus_mode(cs, config.data_mode);
        }
        self.resume_auto(auto_was_on)
    }

    /// Move `count` bytes of read data out of the FIFO into `buf[pos..]`
    fn drain_fifo(
        &mut self,
        buf: &mut [u8],
        pos: usize,
        count: usize,
        hsize: Hsize,
        dma_mode: bool,
        dma: Option<&mut DmaChannel<'_>>,
    ) -> Result<()> {
        let unit = hsize.bytes();
        let end = (pos + count).min(buf.len());
        let mut done = 0;

        if let (true, Some(ch)) = (dma_mode, dma) {
            // Whole units that fit in the caller's buffer
            let whole = (end.saturating_sub(pos) / unit) * unit;
            if whole != 0 {
                let channel = ch.flags.channel();
                ch.engine.start(
                    channel,
                    Transfer::FifoToMemory {
                        dst: &mut buf[pos..pos + whole],
                        width: hsize,
                    },
                )?;
                wait_dma(self.budget, ch, channel)?;
                done = whole;
            }
        }

        while done < count {
            let word = self.pop_fifo(hsize)?.to_le_bytes();
            let at = pos + done;
            if at < end {
                let n = unit.min(end - at);
                buf[at..at + n].copy_from_slice(&word[..n]);
            }
            done += unit;
        }
        Ok(())
    }

    /// Read flash through the auto-mode window
    ///
    /// The window must be initialised with [`auto_init`](Self::auto_init).
    /// `addr` is masked to the configured width, so it never leaves the
    /// window of `config.cs_no`.
    pub fn auto_read(
        &mut self,
        config: &FlashConfig,
        addr: u32,
        buf: &mut [u8],
        hsize: Hsize,
        window: &mut dyn FlashWindow,
        dma: Option<DmaChannel<'_>>,
    ) -> Result<()> {
        let mut src = window_base(config).wrapping_add(config.mask_address(addr, false));
        log::debug!("auto read {} bytes at {:#x}", buf.len(), src);

        if let (true, Some(mut ch)) = (config.dma_mode, dma) {
            let channel = ch.flags.channel();
            for chunk in buf.chunks_mut(SPLIT_DESC_MODE) {
                let len = chunk.len() as u32;
                ch.engine
                    .start(channel, Transfer::WindowToMemory { src, dst: chunk })?;
                wait_dma(self.budget, &mut ch, channel)?;
                src = src.wrapping_add(len);
            }
            return Ok(());
        }

        // Dual flash interleaves, so the window address advances at half rate
        let unit = hsize.bytes();
        let step = if config.dual_flash_mode && unit > 1 {
            unit / 2
        } else {
            unit
        };
        let mut word = [0u8; 4];
        for chunk in buf.chunks_mut(unit) {
            window.read(src, &mut word[..unit]);
            chunk.copy_from_slice(&word[..chunk.len()]);
            src = src.wrapping_add(step as u32);
        }
        Ok(())
    }

    /// Read in whichever mode `config.auto_mode` selects
    pub fn spi_read(
        &mut self,
        config: &FlashConfig,
        addr: u32,
        buf: &mut [u8],
        opts: ReadOptions,
        window: &mut dyn FlashWindow,
        dma: Option<DmaChannel<'_>>,
    ) -> Result<()> {
        if config.auto_mode {
            self.auto_read(config, addr, buf, opts.hsize, window, dma)
        } else {
            self.manual_read(config, addr, buf, opts, dma)
        }
    }

    /// Program `data` at `addr`, one page at a time
    ///
    /// With `verify` supplied the result is read back through the auto
    /// window and the first differing byte is reported as
    /// [`Error::VerifyMismatch`].
    pub fn spi_write(
        &mut self,
        config: &FlashConfig,
        addr: u32,
        data: &[u8],
        opts: WriteOptions,
        mut dma: Option<DmaChannel<'_>>,
        verify: Option<&mut dyn FlashWindow>,
    ) -> Result<()> {
        let page = opts.page_size;
        let unit = opts.hsize.bytes();
        if page == 0 || !page.is_power_of_two() || data.len() % unit != 0 {
            return Err(Error::InvalidParameters);
        }
        let cs = config.cs_no;
        let start = config.mask_address(addr, opts.full_32bit_addr);
        if start as usize % unit != 0 {
            return Err(Error::InvalidParameters);
        }
        log::debug!(
            "write {} bytes at {:#x} on {:?}, page {}",
            data.len(),
            start,
            cs,
            page
        );

        let auto_was_on = self.suspend_auto()?;
        self.continue_fetch(config, false);
        self.dual_both(config, true);

        let data_mode = if config.dual_flash_mode {
            BusMode::Octa
        } else {
            config.wr_data_mode
        };
        let swap = if config.swap_en { 1 << cs.index() } else { 0 };

        let mut addr = start;
        let mut offset = 0usize;
        let mut send_addr = true;
        while offset < data.len() {
            let left = (data.len() - offset) as u32;
            let boundary = addr & (page - 1);
            let count = if boundary != 0 {
                (page - boundary).min(left)
            } else {
                left.min(page)
            } as usize;

            self.set_bus_mode(cs, config.wr_inst_mode);
            self.write_phase(8, WREN as u32, cs)?;
            if config.uses_16bit_cmd() {
                self.write_phase(8, WREN2 as u32, cs)?;
            }
            self.deassert_csn();

            self.write_phase(8, config.wr_cmd as u32, cs)?;
            if let Some(cmd) = config.cmd_16bit {
                self.write_phase(8, cmd.write_msb as u32, cs)?;
            }
            if send_addr {
                self.set_bus_mode(cs, config.wr_addr_mode);
                self.write_phase(config.addr_width.phase_bits(), addr, cs)?;
                // AAI keeps auto-incrementing after the first address
                send_addr = config.wr_cmd != AAI;
            }
            if config.dual_flash_mode {
                self.dual_both(config, false);
            }
            log::trace!("page {:#x}+{}", addr, count);

            let chunk = &data[offset..offset + count];
            match dma.as_mut() {
                Some(ch) if config.dma_write => {
                    self.set_bus_mode(cs, data_mode);
                    self.regs.update32(QSPI_MANUAL_CONFIG_2, 0xF, swap);
                    self.regs
                        .write32(QSPI_MANUAL_WRITE_DATA_2, opts.hsize.code());
                    self.regs.write32(
                        QSPI_MANUAL_CONFIG,
                        MANUAL_TAKE_LEN_FRM_REG
                            | MANUAL_WRITE_TRIGGER
                            | manual_read_count(count as u32),
                    );
                    let channel = ch.flags.channel();
                    ch.engine.start(
                        channel,
                        Transfer::MemoryToFifo {
                            src: chunk,
                            width: opts.hsize,
                        },
                    )?;
                    wait_dma(self.budget, ch, channel)?;
                    self.wait_flash_idle(config)?;
                }
                _ => {
                    for word in chunk.chunks(unit) {
                        self.set_bus_mode(cs, data_mode);
                        self.regs.update32(QSPI_MANUAL_CONFIG_2, 0xF, swap);
                        let mut bytes = [0u8; 4];
                        bytes[..unit].copy_from_slice(word);
                        self.write_phase(opts.hsize.bits(), u32::from_le_bytes(bytes), cs)?;
                    }
                }
            }

            if opts.disable_hw_ctrl {
                self.set_hw_ctrl(false)?;
            }
            if config.dual_flash_mode {
                self.dual_both(config, true);
                self.set_bus_mode(cs, config.wr_data_mode);
            }
            self.regs.clear_bits(QSPI_MANUAL_CONFIG_2, 0xF);
            self.set_bus_mode(cs, config.inst_mode);
            self.wait_flash_idle(config)?;
            self.sleep_us(opts.delay_us);
            if opts.disable_hw_ctrl {
                self.set_hw_ctrl(true)?;
            }

            offset += count;
            addr = addr.wrapping_add(count as u32);
        }

        self.write_phase(8, WRDI as u32, cs)?;
        if config.uses_16bit_cmd() {
            self.write_phase(8, WRDI2 as u32, cs)?;
        }
        self.deassert_csn();
        self.dual_both(config, false);
        self.resume_auto(auto_was_on)?;
        self.continue_fetch(config, true);

        if let Some(window) = verify {
            let base = window_base(config).wrapping_add(start);
            let mut readback = [0u8; 64];
            for (i, expected) in data.chunks(readback.len()).enumerate() {
                let at = (i * readback.len()) as u32;
                let got = &mut readback[..expected.len()];
                window.read(base.wrapping_add(at), got);
                if let Some(idx) = got.iter().zip(expected).position(|(a, b)| a != b) {
                    let bad = start.wrapping_add(at + idx as u32);
                    log::warn!("verify mismatch at {:#x}", bad);
                    return Err(Error::VerifyMismatch { addr: bad });
                }
            }
        }
        Ok(())
    }

    /// Erase a sector, a block or the whole chip
    pub fn spi_erase(
        &mut self,
        config: &FlashConfig,
        kind: EraseKind,
        addr: u32,
        opts: EraseOptions,
    ) -> Result<()> {
        let cs = config.cs_no;
        let addr = config.mask_address(addr, opts.full_32bit_addr);
        log::debug!("{:?} erase at {:#x} on {:?}", kind, addr, cs);

        let auto_was_on = self.suspend_auto()?;
        self.continue_fetch(config, false);
        self.dual_both(config, true);

        self.set_bus_mode(cs, config.wr_inst_mode);
        if opts.disable_hw_ctrl {
            self.set_hw_ctrl(false)?;
        }

        self.write_phase(8, WREN as u32, cs)?;
        if config.uses_16bit_cmd() {
            self.write_phase(8, WREN2 as u32, cs)?;
        }
        self.deassert_csn();

        let cmd_len = if config.uses_16bit_cmd() { 16 } else { 8 };
        let cmd = match kind {
            EraseKind::Sector => config.sector_erase_cmd,
            EraseKind::Block => config.block_erase_cmd,
            EraseKind::Chip => config.chip_erase_cmd,
        };
        self.write_phase(cmd_len, cmd as u32, cs)?;
        if kind != EraseKind::Chip {
            self.write_phase(config.addr_width.phase_bits(), addr, cs)?;
        }
        self.deassert_csn();

        self.wait_flash_idle(config)?;
        self.sleep_us(opts.delay_us);
        self.dual_both(config, false);

        if opts.disable_hw_ctrl {
            self.set_hw_ctrl(true)?;
        }
        self.resume_auto(auto_was_on)?;
        self.continue_fetch(config, true);
        Ok(())
    }

    /// Configure a semi-auto read of `len` bytes at `addr`
    pub fn semi_auto_mode_config(
        &mut self,
        addr: u32,
        hsize: Hsize,
        bsize: u32,
        len: u32,
    ) -> Result<()> {
        self.wait_clear(QSPI_STATUS, Status::BUSY.bits())?;
        self.regs.write32(QSPI_SEMI_AUTO_ADDR, addr);
        self.regs.set_bits(
            QSPI_SEMI_AUTO_MODE_CONFIG,
            (hsize.code() << 8) | (bsize & 0xFF),
        );
        self.regs
            .write32(QSPI_SEMI_AUTO_MODE_CONFIG2, (len & 0xFFF) | SEMI_AUTO_MODE_EN);
        Ok(())
    }
}

/// Spin until `channel` goes idle
fn wait_dma(budget: PollBudget, ch: &mut DmaChannel<'_>, channel: u8) -> Result<()> {
    budget.run(QSPI_MANUAL_RD_WR_DATA, 1 << (channel & 31), || {
        Ok(!ch.engine.is_active(channel))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::BlockTransfer;
    use crate::qspi::config::{ChipSelect, Command16, FlashType};
    use crate::qspi::testutil::{
        controller, data_writes, phase_lengths, retention, writes_to, NoDelay,
    };
    use std::vec::Vec;

    /// Window over a flat byte image starting at the cs0 base
    struct ImageWindow {
        base: u32,
        image: Vec<u8>,
        reads: Vec<(u32, usize)>,
    }

    impl FlashWindow for ImageWindow {
        fn read(&mut self, addr: u32, buf: &mut [u8]) {
            self.reads.push((addr, buf.len()));
            let at = (addr - self.base) as usize;
            buf.copy_from_slice(&self.image[at..at + buf.len()]);
        }
    }

    /// DMA engine that fills with a pattern and is never busy
    #[derive(Default)]
    struct FillDma {
        started: Vec<(u8, usize)>,
    }

    impl BlockTransfer for FillDma {
        fn start(&mut self, channel: u8, transfer: Transfer<'_>) -> Result<()> {
            self.started.push((channel, transfer.len()));
            if let Transfer::FifoToMemory { dst, .. } | Transfer::WindowToMemory { dst, .. } =
                transfer
            {
                for (i, b) in dst.iter_mut().enumerate() {
                    *b = i as u8;
                }
            }
            Ok(())
        }

        fn is_active(&mut self, _channel: u8) -> bool {
            false
        }
    }

    fn sector_config() -> FlashConfig {
        FlashConfig {
            flash_type: FlashType::SstQuad,
            ..Default::default()
        }
    }

    #[test]
    fn test_erase_sector_sequence() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x03),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.spi_erase(&sector_config(), EraseKind::Sector, 0x0100_1000, EraseOptions::default())
                .unwrap();
        }
        // address masked to 24 bits
        assert_eq!(data_writes(&regs), [0x06, 0x20, 0x00_1000, 0x05]);
        assert_eq!(phase_lengths(&regs), [8, 8, 24, 8]);
    }

    #[test]
    fn test_chip_erase_has_no_address() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.push((QSPI_MANUAL_RD_WR_DATA, 0x00));
        let config = FlashConfig {
            cmd_16bit: Some(Command16::default()),
            chip_erase_cmd: 0x60_9F,
            status_reg_read_cmd: 0x05_FA,
            ..sector_config()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.spi_erase(&config, EraseKind::Chip, 0, EraseOptions::default())
                .unwrap();
        }
        assert_eq!(data_writes(&regs), [0x06, 0xF9, 0x609F, 0x05]);
        assert_eq!(&phase_lengths(&regs)[..3], &[8, 8, 16]);
    }

    #[test]
    fn test_erase_restores_auto_mode() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.poke(QSPI_BUS_MODE, BusModeFlags::AUTO_MODE.bits());
        // Auto mode drops on the first status read and is back for the rest
        regs.poke(QSPI_STATUS, Status::AUTO_MODE_ENABLED.bits());
        regs.scripted.extend([(QSPI_STATUS, 0), (QSPI_MANUAL_RD_WR_DATA, 0x00)]);
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.spi_erase(&sector_config(), EraseKind::Block, 0x10000, EraseOptions::default())
                .unwrap();
        }
        assert_ne!(regs.peek(QSPI_BUS_MODE) & BusModeFlags::AUTO_MODE.bits(), 0);
        assert_eq!(data_writes(&regs)[1], 0xD8);
    }

    #[test]
    fn test_write_splits_at_page_boundary() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x01),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        let data: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.spi_write(&sector_config(), 0, &data, WriteOptions::default(), None, None)
                .unwrap();
        }
        let sent = data_writes(&regs);
        // WREN, cmd, addr, 256 data, RDSR
        assert_eq!(&sent[..3], &[0x06, 0x02, 0x000000]);
        assert_eq!(sent[3..259].len(), 256);
        assert_eq!(sent[259], 0x05);
        assert_eq!(&sent[260..263], &[0x06, 0x02, 0x000100]);
        assert_eq!(sent[263..307].len(), 44);
        assert_eq!(&sent[307..], &[0x05, 0x04]);
    }

    #[test]
    fn test_write_odd_start_and_aai() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        let config = FlashConfig {
            wr_cmd: AAI,
            ..sector_config()
        };
        let data = [0xAAu8; 8];
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            let opts = WriteOptions {
                page_size: 4,
                hsize: Hsize::HalfWord,
                ..Default::default()
            };
            qspi.spi_write(&config, 0x102, &data, opts, None, None)
                .unwrap();
        }
        let sent = data_writes(&regs);
        // first page: 2 bytes up to the boundary, address sent once only
        assert_eq!(&sent[..4], &[0x06, 0xAF, 0x102, 0xAAAA]);
        assert_eq!(&sent[5..8], &[0x06, 0xAF, 0xAAAA]);
        assert_eq!(phase_lengths(&regs)[3], 16);
    }

    #[test]
    fn test_write_rejects_bad_page_size() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            let opts = WriteOptions {
                page_size: 300,
                ..Default::default()
            };
            assert_eq!(
                qspi.spi_write(&sector_config(), 0, &[1, 2], opts, None, None),
                Err(Error::InvalidParameters)
            );
        }
        assert!(regs.log.is_empty());
    }

    #[test]
    fn test_write_verify_mismatch() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let mut window = ImageWindow {
            base: QSPI_AUTOM_CHIP0_ADDRESS,
            image: std::vec![0xFF; 0x200],
            reads: Vec::new(),
        };
        window.image[0x105] = 0x00;
        regs.scripted.push((QSPI_MANUAL_RD_WR_DATA, 0x00));
        let data = [0xFFu8; 16];
        let result = {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.spi_write(
                &sector_config(),
                0x100,
                &data,
                WriteOptions::default(),
                None,
                Some(&mut window),
            )
        };
        assert_eq!(result, Err(Error::VerifyMismatch { addr: 0x105 }));
    }

    #[test]
    fn test_manual_read_polled_and_padded() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.poke(QSPI_STATUS, Status::AUTO_MODE_FSM_IDLE.bits());
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x4433_2211),
            (QSPI_MANUAL_RD_WR_DATA, 0x8877_6655),
        ]);
        let config = FlashConfig {
            continuous: true,
            ..sector_config()
        };
        let mut buf = [0u8; 6];
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            let opts = ReadOptions {
                hsize: Hsize::Word,
                ..Default::default()
            };
            qspi.manual_read(&config, 0x20, &mut buf, opts, None).unwrap();
        }
        assert_eq!(buf, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(data_writes(&regs), [0x03, 0x20]);
        let trigger = *writes_to(&regs, QSPI_MANUAL_CONFIG)
            .iter()
            .rev()
            .find(|v| *v & MANUAL_READ_TRIGGER != 0)
            .unwrap();
        assert_eq!(decode_read_count(trigger), 8);
        assert_eq!((trigger >> MANUAL_HSIZE_OFF) & 0x3, 3);
    }

    #[test]
    fn test_manual_read_non_continuous_resends_phases() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.poke(QSPI_STATUS, Status::AUTO_MODE_FSM_IDLE.bits());
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0xAB),
            (QSPI_MANUAL_RD_WR_DATA, 0xCD),
        ]);
        let mut buf = [0u8; 2];
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.manual_read(&sector_config(), 0x40, &mut buf, ReadOptions::default(), None)
                .unwrap();
        }
        assert_eq!(buf, [0xAB, 0xCD]);
        assert_eq!(data_writes(&regs), [0x03, 0x40, 0x03, 0x41]);
    }

    #[test]
    fn test_manual_read_dma() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let mut engine = FillDma::default();
        regs.poke(QSPI_STATUS, Status::AUTO_MODE_FSM_IDLE.bits());
        let config = FlashConfig {
            continuous: true,
            dma_mode: true,
            ..sector_config()
        };
        let mut buf = [0u8; 5000];
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            let dma = DmaChannel {
                engine: &mut engine,
                flags: DmaFlags::for_channel(3, DmaFlags::DEFAULT_DESC_MODE),
            };
            qspi.manual_read(&config, 0, &mut buf, ReadOptions::default(), Some(dma))
                .unwrap();
        }
        assert_eq!(engine.started, [(3, 4092), (3, 908)]);
        assert_eq!(buf[4092], 0);
        assert_eq!(buf[4093], 1);
    }

    #[test]
    fn test_read_phases_with_dummies_and_a8() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let config = FlashConfig {
            addr_width: AddressWidth::Bits9,
            extra_byte_en: true,
            dummy_bytes: 5,
            addr_mode: BusMode::Quad,
            extra_byte_mode: BusMode::Quad,
            dummy_mode: BusMode::Quad,
            data_mode: BusMode::Quad,
            ..sector_config()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.config_read_phases(&config, 0x1F0).unwrap();
            assert_eq!(qspi.bus_mode(ChipSelect::Cs0), BusMode::Quad);
        }
        assert_eq!(data_writes(&regs), [0x0B, 0x1F0, 0, 0, 0]);
        assert_eq!(phase_lengths(&regs), [8, 8, 8, 8, 0]);
    }

    #[test]
    fn test_auto_read_dual_flash_steps() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let mut window = ImageWindow {
            base: QSPI_AUTOM_CHIP1_ADDRESS,
            image: (0..64u8).collect(),
            reads: Vec::new(),
        };
        let config = FlashConfig {
            cs_no: ChipSelect::Cs1,
            dual_flash_mode: true,
            ..sector_config()
        };
        let mut buf = [0u8; 6];
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.auto_read(&config, 8, &mut buf, Hsize::Word, &mut window, None)
                .unwrap();
        }
        let base = QSPI_AUTOM_CHIP1_ADDRESS + 8;
        assert_eq!(window.reads, [(base, 4), (base + 2, 4)]);
        assert_eq!(buf, [8, 9, 10, 11, 10, 11]);
        assert!(regs.log.is_empty());
    }

    #[test]
    fn test_auto_read_masks_address() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let mut window = ImageWindow {
            base: QSPI_AUTOM_CHIP0_ADDRESS,
            image: (0..64u8).collect(),
            reads: Vec::new(),
        };
        let config = sector_config();
        assert_eq!(config.addr_width, AddressWidth::Bits24);
        let mut buf = [0u8; 2];
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.auto_read(&config, 0x0100_0010, &mut buf, Hsize::Byte, &mut window, None)
                .unwrap();
        }
        let base = QSPI_AUTOM_CHIP0_ADDRESS + 0x10;
        assert_eq!(window.reads, [(base, 1), (base + 1, 1)]);
        assert_eq!(buf, [0x10, 0x11]);
    }

    #[test]
    fn test_auto_init_registers() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.poke(QSPI_MANUAL_CONFIG, MANUAL_CSN_ACTIVE);
        let config = FlashConfig {
            read_cmd: 0xEB,
            inst_mode: BusMode::Single,
            addr_mode: BusMode::Quad,
            data_mode: BusMode::Quad,
            dummy_mode: BusMode::Quad,
            extra_byte_mode: BusMode::Quad,
            extra_byte_en: true,
            continuous: true,
            dummy_bytes: 2,
            prefetch_en: true,
            ..sector_config()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.auto_init(&config).unwrap();
        }
        let auto1 = regs.peek(QSPI_AUTO_CTRL_CONFIG_1);
        assert_eq!((auto1 >> AUTO1_DUMMY_OFF) & 0xF, 2);
        assert_eq!((auto1 >> AUTO1_DATA_MODE_OFF) & 0x3, 2);
        assert_eq!((auto1 >> AUTO1_EXTRA_BYTE_OFF) & 0xFF, 0xA0);
        assert_ne!(auto1 & AUTO1_EXTRA_BYTE_EN, 0);
        let auto2 = regs.peek(QSPI_AUTO_CTRL_CONFIG_2);
        assert_eq!((auto2 >> AUTO2_READ_CMD_OFF) & 0xFF, 0xEB);
        assert_ne!(auto2 & (1 << AUTO2_CONTINUOUS_OFF), 0);
        let bus = regs.peek(QSPI_BUS_MODE);
        assert_ne!(bus & BusModeFlags::PREFETCH_EN.bits(), 0);
        assert_ne!(bus & BusModeFlags::AUTO_MODE.bits(), 0);
    }

    #[test]
    fn test_spi_init_hands_over_to_hardware() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        // Hardware control takes effect immediately
        regs.poke(QSPI_STATUS, Status::HW_CTRLD_MODE.bits());
        let config = FlashConfig {
            cs_no: ChipSelect::Cs2,
            wrap_len: Some(1),
            ..sector_config()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.spi_init(&config, true, 0, true).unwrap();
        }
        assert_eq!(data_writes(&regs), [0xFF, 0xFF, 0xC001]);
        let manual = regs.peek(QSPI_MANUAL_CONFIG);
        assert_ne!(manual & MANUAL_HW_CTRL_MODE, 0);
        assert_eq!((manual >> MANUAL_CSN_SELECT_OFF) & 0x3, 2);
        assert_eq!(regs.peek(QSPI_FIFO_THRESHOLD), 0x33);
        assert_eq!(regs.peek(QSPI_CLK_CONFIG), (1 << 8) | 1);
        assert_eq!((regs.peek(QSPI_BUS_MODE) >> 26) & 0x3, 3);
        assert_eq!(regs.peek(QSPI_BUS_MODE) & BusModeFlags::AUTO_MODE.bits(), 0);
    }

    #[test]
    fn test_semi_auto_config() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.semi_auto_mode_config(0x1000, Hsize::Word, 4, 64)
                .unwrap();
        }
        assert_eq!(regs.peek(QSPI_SEMI_AUTO_ADDR), 0x1000);
        assert_eq!(regs.peek(QSPI_SEMI_AUTO_MODE_CONFIG), (3 << 8) | 4);
        assert_eq!(regs.peek(QSPI_SEMI_AUTO_MODE_CONFIG2), 64 | SEMI_AUTO_MODE_EN);
    }
}
