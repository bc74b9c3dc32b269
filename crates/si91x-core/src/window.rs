//! Auto-mode memory window
//!
//! With auto mode enabled the controller maps flash into the CPU address
//! space, so "reading flash" is just reading memory at the window address.

/// Read access to the auto-mode window
pub trait FlashWindow {
    /// Copy `buf.len()` bytes starting at bus address `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]);
}

/// Window backed by real memory-mapped flash
pub struct MmioWindow {
    _private: (),
}

impl MmioWindow {
    /// Access the window through raw pointers
    ///
    /// # Safety
    ///
    /// Auto mode must be initialised for every chip select that will be read
    /// through this window.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl FlashWindow for MmioWindow {
    fn read(&mut self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            // SAFETY: the window is mapped while auto mode is initialised
            *byte = unsafe { core::ptr::read_volatile((addr as usize + i) as *const u8) };
        }
    }
}
