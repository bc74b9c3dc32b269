//! si91x-sim - Behavioural simulator for the Si91x QSPI and eFUSE drivers
//!
//! The simulator stands in for the hardware behind every capability the
//! drivers in `si91x-core` take: controller and retention register blocks,
//! the eFUSE block, the auto-mode window, the DMA engine and the delay
//! source. All handles share one state, so a test can run a driver
//! operation and then inspect what the flash saw on the bus.
//!
//! # Example
//!
//! ```
//! use si91x_core::qspi::{EraseKind, EraseOptions, FlashConfig};
//! use si91x_sim::{SimFlashConfig, Simulator};
//!
//! let sim = Simulator::new(SimFlashConfig::default()).unwrap();
//! let config = FlashConfig::default();
//! sim.run(|qspi, _, _| qspi.spi_erase(&config, EraseKind::Sector, 0x1000, EraseOptions::default()))
//!     .unwrap();
//! assert_eq!(sim.trace().opcodes(), [0x06, 0x20, 0x05]);
//! ```

mod controller;
mod efuse;
pub mod error;
mod flash;
mod lockbox;
pub mod trace;

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

use si91x_core::dma::{BlockTransfer, Transfer};
use si91x_core::efuse::Efuse;
use si91x_core::qspi::Qspi;
use si91x_core::regs::qspi::NPSS_REG_SIZE;
use si91x_core::regs::RegisterFile;
use si91x_core::window::FlashWindow;

pub use controller::DEFAULT_KEYHOLDER_KEY;
pub use efuse::ROWS as EFUSE_ROWS;
pub use error::{Result, SimError};
pub use flash::{SimFlashConfig, SR_WEL, SR_WIP};
pub use trace::{Phase, Trace, Transaction};

use controller::Controller;
use efuse::EfuseModel;
use flash::FlashModel;

struct State {
    controller: Controller,
    retention: Vec<u32>,
    efuse: EfuseModel,
    elapsed_ns: u64,
    dma_log: Vec<(u8, usize)>,
}

type Shared = Rc<RefCell<State>>;

/// Simulated Si91x with one serial flash attached
pub struct Simulator {
    state: Shared,
}

impl Simulator {
    /// Erased flash with the given geometry
    pub fn new(config: SimFlashConfig) -> Result<Self> {
        Ok(Self::from_flash(FlashModel::new(config)?))
    }

    /// Flash preloaded with `image` from address 0
    pub fn with_image(config: SimFlashConfig, image: &[u8]) -> Result<Self> {
        Ok(Self::from_flash(FlashModel::with_image(config, image)?))
    }

    fn from_flash(flash: FlashModel) -> Self {
        let state = State {
            controller: Controller::new(flash),
            retention: vec![0; NPSS_REG_SIZE / 4],
            efuse: EfuseModel::new(),
            elapsed_ns: 0,
            dma_log: Vec::new(),
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Controller register block
    pub fn registers(&self) -> SimRegisters {
        SimRegisters(self.state.clone())
    }

    /// NPSS retention register block
    pub fn retention(&self) -> SimRetention {
        SimRetention(self.state.clone())
    }

    /// eFUSE register block
    pub fn efuse_registers(&self) -> SimEfuseRegisters {
        SimEfuseRegisters(self.state.clone())
    }

    /// Delay source advancing simulated time
    pub fn clock(&self) -> SimClock {
        SimClock(self.state.clone())
    }

    /// Auto-mode window
    pub fn window(&self) -> SimWindow {
        SimWindow(self.state.clone())
    }

    /// DMA engine
    pub fn dma(&self) -> SimDma {
        SimDma(self.state.clone())
    }

    /// Run `f` against a QSPI driver wired to this simulator
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Qspi<'_>, &mut SimWindow, &mut SimDma) -> si91x_core::Result<T>,
    {
        let mut regs = self.registers();
        let mut retention = self.retention();
        let mut clock = self.clock();
        let mut window = self.window();
        let mut dma = self.dma();
        let mut qspi = Qspi::new(&mut regs, &mut retention, &mut clock);
        Ok(f(&mut qspi, &mut window, &mut dma)?)
    }

    /// Run `f` against an eFUSE driver wired to this simulator
    pub fn run_efuse<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Efuse<'_>) -> si91x_core::Result<T>,
    {
        let mut regs = self.efuse_registers();
        let mut clock = self.clock();
        let mut efuse = Efuse::new(&mut regs, &mut clock);
        Ok(f(&mut efuse)?)
    }

    /// Copy of the flash array
    pub fn flash_data(&self) -> Vec<u8> {
        self.state.borrow().controller.flash.data().to_vec()
    }

    /// Flash status registers 1 to 3
    pub fn flash_status(&self) -> [u8; 3] {
        self.state.borrow().controller.flash.status()
    }

    /// Program and erase commands refused for lack of write enable
    pub fn flash_rejected(&self) -> usize {
        self.state.borrow().controller.flash.rejected()
    }

    /// Make the next `polls` status reads report busy
    pub fn inject_busy(&self, polls: u32) {
        self.state.borrow_mut().controller.flash.inject_busy(polls);
    }

    /// Replace the key the keyholder hands to the AES unit
    pub fn set_keyholder_key(&self, key: [u32; 8]) {
        self.state.borrow_mut().controller.keyholder = key;
    }

    /// Transactions recorded so far
    pub fn trace(&self) -> Trace {
        self.state.borrow().controller.trace.clone()
    }

    /// Take the recorded transactions, leaving the trace empty
    pub fn take_trace(&self) -> Trace {
        std::mem::take(&mut self.state.borrow_mut().controller.trace)
    }

    /// eFUSE array contents
    pub fn fuses(&self) -> [u8; EFUSE_ROWS] {
        *self.state.borrow().efuse.fuses()
    }

    /// Strobes that did not follow the program sequence
    pub fn efuse_misordered(&self) -> usize {
        self.state.borrow().efuse.misordered()
    }

    /// Simulated time spent in delays, in nanoseconds
    pub fn elapsed_ns(&self) -> u64 {
        self.state.borrow().elapsed_ns
    }

    /// DMA transfers started, as (channel, bytes)
    pub fn dma_transfers(&self) -> Vec<(u8, usize)> {
        self.state.borrow().dma_log.clone()
    }
}

/// Controller registers
pub struct SimRegisters(Shared);

impl RegisterFile for SimRegisters {
    fn read32(&mut self, offset: usize) -> u32 {
        self.0.borrow_mut().controller.read32(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) {
        self.0.borrow_mut().controller.write32(offset, value)
    }
}

/// NPSS retention registers; plain storage
pub struct SimRetention(Shared);

impl RegisterFile for SimRetention {
    fn read32(&mut self, offset: usize) -> u32 {
        self.0.borrow().retention[offset / 4]
    }

    fn write32(&mut self, offset: usize, value: u32) {
        self.0.borrow_mut().retention[offset / 4] = value;
    }
}

/// eFUSE registers
pub struct SimEfuseRegisters(Shared);

impl RegisterFile for SimEfuseRegisters {
    fn read32(&mut self, offset: usize) -> u32 {
        self.0.borrow_mut().efuse.read32(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) {
        self.0.borrow_mut().efuse.write32(offset, value)
    }
}

/// Delays return immediately and only advance the simulated clock
pub struct SimClock(Shared);

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().elapsed_ns += ns as u64;
    }
}

/// Auto-mode window
pub struct SimWindow(Shared);

impl FlashWindow for SimWindow {
    fn read(&mut self, addr: u32, buf: &mut [u8]) {
        self.0.borrow().controller.window_read(addr, buf);
    }
}

/// DMA engine; transfers complete as soon as they are started
pub struct SimDma(Shared);

impl BlockTransfer for SimDma {
    fn start(&mut self, channel: u8, transfer: Transfer<'_>) -> si91x_core::Result<()> {
        let mut state = self.0.borrow_mut();
        state.dma_log.push((channel, transfer.len()));
        log::trace!("dma ch{}: {} bytes", channel, transfer.len());
        let controller = &mut state.controller;
        match transfer {
            Transfer::FifoToMemory { dst, .. } => {
                for byte in dst.iter_mut() {
                    match controller.fifo.pop_front() {
                        Some(b) => *byte = b,
                        None => {
                            log::warn!("dma ch{}: read FIFO underflow", channel);
                            break;
                        }
                    }
                }
            }
            Transfer::WindowToMemory { src, dst } => controller.window_read(src, dst),
            Transfer::MemoryToFifo { src, .. } => {
                if controller.dma_write_pending < src.len() {
                    log::warn!(
                        "dma ch{}: {} bytes fed, controller expects {}",
                        channel,
                        src.len(),
                        controller.dma_write_pending
                    );
                }
                controller.shift_write_bytes(src);
            }
        }
        Ok(())
    }

    fn is_active(&mut self, _channel: u8) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use si91x_core::dma::{DmaChannel, DmaFlags, Hsize};
    use si91x_core::poll::PollBudget;
    use si91x_core::qspi::{
        AesDirection, AesMode, CipherKey, EraseKind, EraseOptions, FlashConfig, KeyLen,
        ReadOptions, StandaloneAes, WriteOptions,
    };
    use si91x_core::regs::qspi::{
        BusModeFlags, Status, QSPI_AUTOM_CHIP0_ADDRESS, QSPI_BUS_MODE, QSPI_MANUAL_RD_WR_DATA,
        QSPI_STATUS,
    };
    use si91x_core::Error;

    fn sim() -> Simulator {
        Simulator::new(SimFlashConfig::default()).unwrap()
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_sector_erase_sequence() {
        let sim = Simulator::with_image(SimFlashConfig::default(), &vec![0u8; 0x3000]).unwrap();
        let config = FlashConfig::default();
        sim.run(|qspi, _, _| {
            qspi.spi_erase(&config, EraseKind::Sector, 0x1000, EraseOptions::default())
        })
        .unwrap();

        let trace = sim.trace();
        let t = trace.transactions();
        assert_eq!(trace.opcodes(), [0x06, 0x20, 0x05]);
        assert_eq!(t[1].writes(), [0x20, 0x001000]);
        // three busy polls, then idle with the write latch cleared
        assert_eq!(t[2].read_bytes(), [0x01, 0x01, 0x01, 0x00]);

        let data = sim.flash_data();
        assert!(data[0x1000..0x2000].iter().all(|b| *b == 0xFF));
        assert_eq!(data[0x0FFF], 0);
        assert_eq!(data[0x2000], 0);
    }

    #[test]
    fn test_write_splits_at_page_boundary() {
        let sim = sim();
        let config = FlashConfig::default();
        let data = pattern(300);
        sim.run(|qspi, _, _| qspi.spi_write(&config, 0, &data, WriteOptions::default(), None, None))
            .unwrap();

        let trace = sim.trace();
        assert_eq!(trace.opcodes(), [0x06, 0x02, 0x05, 0x06, 0x02, 0x05, 0x04]);
        let pages = trace.transactions();
        // opcode, address, then one phase per byte
        assert_eq!(pages[1].writes().len(), 2 + 256);
        assert_eq!(pages[4].writes()[1], 0x000100);
        assert_eq!(pages[4].writes().len(), 2 + 44);
        assert_eq!(&sim.flash_data()[..300], &data[..]);
        assert_eq!(sim.flash_rejected(), 0);
    }

    #[test]
    fn test_write_then_verify() {
        let sim = sim();
        let config = FlashConfig::default();
        let data = pattern(100);
        sim.run(|qspi, window, _| {
            qspi.spi_write(&config, 0x40, &data, WriteOptions::default(), None, Some(window))
        })
        .unwrap();
    }

    #[test]
    fn test_verify_reports_first_bad_byte() {
        let mut image = vec![0xFF; 0x100];
        image[0x45] = 0x00;
        let sim = Simulator::with_image(SimFlashConfig::default(), &image).unwrap();
        let config = FlashConfig::default();
        let data = vec![0xA5; 16];
        let err = sim
            .run(|qspi, window, _| {
                qspi.spi_write(&config, 0x40, &data, WriteOptions::default(), None, Some(window))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::Driver(Error::VerifyMismatch { addr: 0x45 })
        ));
    }

    #[test]
    fn test_dma_write() {
        let sim = sim();
        let config = FlashConfig {
            dma_write: true,
            ..Default::default()
        };
        let data = pattern(64);
        sim.run(|qspi, _, dma| {
            let ch = DmaChannel {
                engine: dma,
                flags: DmaFlags::for_channel(5, DmaFlags::empty()),
            };
            qspi.spi_write(&config, 0x200, &data, WriteOptions::default(), Some(ch), None)
        })
        .unwrap();
        assert_eq!(sim.dma_transfers(), [(5, 64)]);
        assert_eq!(&sim.flash_data()[0x200..0x240], &data[..]);
    }

    #[test]
    fn test_manual_read() {
        let image = pattern(0x100);
        let sim = Simulator::with_image(SimFlashConfig::default(), &image).unwrap();
        let config = FlashConfig::default();
        let mut buf = [0u8; 10];
        sim.run(|qspi, _, _| qspi.manual_read(&config, 0x10, &mut buf, ReadOptions::default(), None))
            .unwrap();
        assert_eq!(buf, image[0x10..0x1A]);
        // one transaction per byte without continuous mode
        assert!(sim.trace().opcodes().iter().all(|op| *op == 0x03));
        assert_eq!(sim.trace().len(), 10);
    }

    #[test]
    fn test_continuous_dma_read() {
        let image = pattern(0x2000);
        let sim = Simulator::with_image(SimFlashConfig::default(), &image).unwrap();
        let config = FlashConfig {
            continuous: true,
            dma_mode: true,
            ..Default::default()
        };
        let mut buf = vec![0u8; 5000];
        let opts = ReadOptions {
            hsize: Hsize::Word,
            ..Default::default()
        };
        sim.run(|qspi, _, dma| {
            let ch = DmaChannel {
                engine: dma,
                flags: DmaFlags::for_channel(2, DmaFlags::DEFAULT_DESC_MODE),
            };
            qspi.manual_read(&config, 0x100, &mut buf, opts, Some(ch))
        })
        .unwrap();
        assert_eq!(buf, image[0x100..0x100 + 5000]);
        assert_eq!(sim.dma_transfers(), [(2, 4092), (2, 908)]);
        assert_eq!(sim.trace().len(), 1);
    }

    #[test]
    fn test_auto_read_through_window() {
        let image = pattern(0x400);
        let sim = Simulator::with_image(SimFlashConfig::default(), &image).unwrap();
        let config = FlashConfig {
            auto_mode: true,
            ..Default::default()
        };
        let buf = sim
            .run(|qspi, window, _| {
                qspi.auto_init(&config)?;
                qspi.read_vec(&config, 0x80, 33, ReadOptions::default(), window)
            })
            .unwrap();
        assert_eq!(buf[..], image[0x80..0x80 + 33]);
        let mode = sim.registers().read32(QSPI_BUS_MODE);
        assert_ne!(mode & BusModeFlags::AUTO_MODE.bits(), 0);
    }

    #[test]
    fn test_spi_init_hands_mode_to_hardware() {
        let sim = sim();
        let config = FlashConfig {
            auto_mode: true,
            ..Default::default()
        };
        sim.run(|qspi, _, _| qspi.spi_init(&config, true, 0, false))
            .unwrap();
        let status = Status::from_bits_retain(sim.registers().read32(QSPI_STATUS));
        assert!(status.contains(Status::HW_CTRLD_MODE));
        // no initializer for an unknown part, so the flash saw nothing
        assert!(sim.trace().is_empty());
    }

    #[test]
    fn test_busy_flash_times_out() {
        let sim = sim();
        let config = FlashConfig::default();
        sim.inject_busy(100);
        let err = sim
            .run(|qspi, _, _| {
                qspi.set_budget(PollBudget::Iterations(5));
                qspi.wait_flash_idle(&config)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::Driver(Error::HardwareTimeout {
                reg: QSPI_MANUAL_RD_WR_DATA,
                ..
            })
        ));
    }

    fn ctr_key() -> CipherKey {
        CipherKey::supplied(
            KeyLen::K128,
            [0x0011_2233, 0x4455_6677, 0x8899_AABB, 0xCCDD_EEFF, 0, 0, 0, 0],
            None,
        )
    }

    fn run_standalone(sim: &Simulator, direction: AesDirection, iv: u32, input: &[u8]) -> Vec<u8> {
        let ctx = StandaloneAes {
            mode: AesMode::Ctr,
            direction,
            key: ctr_key(),
            iv,
            flip_data: false,
        };
        let mut out = vec![0u8; input.len()];
        sim.run(|qspi, _, _| qspi.aes_encrypt_decrypt_standalone(&ctx, input, &mut out))
            .unwrap();
        out
    }

    #[test]
    fn test_standalone_ctr_roundtrip() {
        let sim = sim();
        sim.run(|qspi, _, _| qspi.load_key(AesMode::Ctr, &ctr_key()))
            .unwrap();
        let plain = pattern(32);
        let cipher = run_standalone(&sim, AesDirection::Encrypt, 0x1000, &plain);
        assert_ne!(cipher, plain);
        assert_ne!(cipher[..16], cipher[16..]);
        let back = run_standalone(&sim, AesDirection::Decrypt, 0x1000, &cipher);
        assert_eq!(back, plain);
    }

    #[test]
    fn test_inline_decryption_of_secure_segment() {
        let sim = sim();
        let config = FlashConfig {
            auto_mode: true,
            ..Default::default()
        };
        let plain = pattern(64);
        sim.run(|qspi, _, _| qspi.load_key(AesMode::Ctr, &ctr_key()))
            .unwrap();
        let cipher = run_standalone(&sim, AesDirection::Encrypt, 0x2000, &plain);
        sim.run(|qspi, _, _| {
            qspi.spi_write(&config, 0x2000, &cipher, WriteOptions::default(), None, None)?;
            qspi.seg_sec_en(0, 0x2000, 0x2040)
        })
        .unwrap();
        assert_eq!(&sim.flash_data()[0x2000..0x2040], &cipher[..]);

        let mut buf = [0u8; 64];
        sim.window().read(QSPI_AUTOM_CHIP0_ADDRESS + 0x2000, &mut buf);
        assert_eq!(buf[..], plain[..]);
    }

    #[test]
    fn test_efuse_write_bit() {
        let sim = sim();
        let byte = sim
            .run_efuse(|efuse| {
                efuse.enable();
                efuse.write_bit(0x10, 3, 10)?;
                efuse.write_bit(0x10, 0, 10)?;
                efuse.memory_mapped_read_byte(0x10, 20_000_000)
            })
            .unwrap();
        assert_eq!(byte, 0x09);
        assert_eq!(sim.fuses()[0x10], 0x09);
        assert_eq!(sim.efuse_misordered(), 0);
        assert_eq!(sim.elapsed_ns(), 20_000);
    }

    #[test]
    fn test_efuse_fsm_read() {
        let sim = sim();
        sim.run_efuse(|efuse| efuse.write_bit(0x31, 7, 1)).unwrap();
        let word = sim
            .run_efuse(|efuse| {
                assert_eq!(efuse.fsm_read_byte(0x31, 180_000_000)?, 0x80);
                efuse.memory_mapped_read_word(0x30, 180_000_000)
            })
            .unwrap();
        assert_eq!(word, 0x8000);
    }
}
