#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Another endpoint transfer owns the DMA engine.
    DmaBusy,
    /// Every request handler slot is taken.
    RegistryFull,
    /// Endpoint number out of range for the peripheral.
    InvalidEndpoint,
}
