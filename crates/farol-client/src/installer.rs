//! Installer seam
//!
//! Writing firmware to flash is platform code. The client hands the
//! installer a fully verified image and nothing else; an installer is
//! never invoked with bytes that failed the hash or signature check.

/// Writes a verified firmware image to the device
pub trait FirmwareInstaller: Send {
    fn install(&mut self, firmware: &[u8]) -> anyhow::Result<()>;
}

impl<F> FirmwareInstaller for F
where
    F: FnMut(&[u8]) -> anyhow::Result<()> + Send,
{
    fn install(&mut self, firmware: &[u8]) -> anyhow::Result<()> {
        self(firmware)
    }
}
