//! Waveshare e-paper binding of [`EpaperPanel`]
//!
//! The controller is created lazily in [`EpaperPanel::init`] because probing
//! it already talks to the chip, and a missing panel must surface as an init
//! failure of the presenter rather than a panic while the board is assembled.

use alloc::vec::Vec;

use embedded_graphics::primitives::Rectangle;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use epd_waveshare::prelude::{RefreshLut, WaveshareDisplay};
use log::{debug, error};
use thiserror_no_std::Error;

use eprobe_core::display::EpaperPanel;
use eprobe_core::display::framebuffer::FrameBuffer;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelError {
    #[error("panel controller did not respond")]
    NotResponding,
    #[error("panel used before init")]
    NotInitialized,
    #[error("SPI transfer to the panel failed")]
    Bus,
}

/// Waveshare panel `E` behind its own SPI device and control pins.
pub struct EpdPanel<E, SPI, BUSY, DC, RST, DELAY> {
    spi: SPI,
    delay: DELAY,
    pins: Option<(BUSY, DC, RST)>,
    epd: Option<E>,
    /// Scratch buffer for partial windows
    window: Vec<u8>,
    /// LUT currently loaded into the controller
    lut: Option<RefreshLut>,
}

impl<E, SPI, BUSY, DC, RST, DELAY> EpdPanel<E, SPI, BUSY, DC, RST, DELAY>
where
    E: WaveshareDisplay<SPI, BUSY, DC, RST, DELAY>,
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    pub fn new(spi: SPI, busy: BUSY, dc: DC, rst: RST, delay: DELAY) -> Self {
        Self {
            spi,
            delay,
            pins: Some((busy, dc, rst)),
            epd: None,
            window: Vec::new(),
            lut: None,
        }
    }

    /// Switch the controller between the full and the quick waveform.
    fn select_lut(&mut self, lut: RefreshLut) -> Result<(), PanelError> {
        if self.lut == Some(lut) {
            return Ok(());
        }
        let epd = self.epd.as_mut().ok_or(PanelError::NotInitialized)?;
        epd.set_lut(&mut self.spi, &mut self.delay, Some(lut))
            .map_err(|_| PanelError::Bus)?;
        self.lut = Some(lut);
        Ok(())
    }
}

impl<E, SPI, BUSY, DC, RST, DELAY> EpaperPanel for EpdPanel<E, SPI, BUSY, DC, RST, DELAY>
where
    E: WaveshareDisplay<SPI, BUSY, DC, RST, DELAY>,
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    type Error = PanelError;

    async fn init(&mut self) -> Result<(), PanelError> {
        if self.epd.is_some() {
            return Ok(());
        }
        let (busy, dc, rst) = self.pins.take().ok_or(PanelError::NotResponding)?;
        let epd = E::new(&mut self.spi, busy, dc, rst, &mut self.delay, None).map_err(|_| {
            error!("E-paper controller did not respond");
            PanelError::NotResponding
        })?;
        debug!("E-paper {}x{} ready", epd.width(), epd.height());
        self.epd = Some(epd);
        Ok(())
    }

    async fn update_full(&mut self, frame: &FrameBuffer) -> Result<(), PanelError> {
        self.select_lut(RefreshLut::Full)?;
        let epd = self.epd.as_mut().ok_or(PanelError::NotInitialized)?;
        epd.update_and_display_frame(&mut self.spi, frame.as_bytes(), &mut self.delay)
            .map_err(|_| PanelError::Bus)
    }

    async fn update_window(&mut self, frame: &FrameBuffer, window: Rectangle) -> Result<(), PanelError> {
        self.select_lut(RefreshLut::Quick)?;
        let area = frame.copy_window(&window, &mut self.window);
        let epd = self.epd.as_mut().ok_or(PanelError::NotInitialized)?;
        epd.update_partial_frame(
            &mut self.spi,
            &mut self.delay,
            &self.window,
            area.top_left.x as u32,
            area.top_left.y as u32,
            area.size.width,
            area.size.height,
        )
        .map_err(|_| PanelError::Bus)?;
        epd.display_frame(&mut self.spi, &mut self.delay)
            .map_err(|_| PanelError::Bus)
    }
}
