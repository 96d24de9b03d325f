//! E-paper dashboard
//!
//! The panel is bistable: it keeps its image without power, a full refresh
//! flickers and takes seconds, and repeated partial refreshes leave ghosting.
//! [`DisplayPresenter`] therefore redraws only the regions that change each
//! cycle and forces a full refresh every `refresh_period` cycles.

pub mod framebuffer;
pub mod layout;

use core::convert::Infallible;
use core::fmt::Write;

use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_7X14, FONT_10X20};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::{Baseline, Text};
use log::{debug, error, info};
use thiserror_no_std::Error;

use crate::sensors::SensorSample;
use crate::time::{self, TimeZoneRule, TimestampString};
use framebuffer::FrameBuffer;
use layout::{ColorPlane, DisplayLayout, DisplayRegion, FIELD_COUNT, FIELD_LABELS, LINE_HEIGHT_PX};

const VALUE_FONT: &MonoFont<'static> = &FONT_10X20;
const FOOTER_FONT: &MonoFont<'static> = &FONT_7X14;
const LABEL_FONT: &MonoFont<'static> = &FONT_6X10;

pub type ValueString = heapless::String<16>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    #[error("Display initialization failed")]
    InitFailed,
    #[error("Display refresh failed")]
    RefreshFailed,
}

impl From<Infallible> for DisplayError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

/// Trait for the e-paper panel driver.
///
/// Both update calls take the whole frame; the driver pushes what it needs
/// and blocks until the panel has finished refreshing.
pub trait EpaperPanel {
    type Error: core::fmt::Debug;

    fn init(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Write the whole frame and refresh the entire panel.
    fn update_full(&mut self, frame: &FrameBuffer) -> impl Future<Output = Result<(), Self::Error>>;

    /// Write the byte-aligned `window` of the frame and refresh only that
    /// area.
    fn update_window(
        &mut self,
        frame: &FrameBuffer,
        window: Rectangle,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

/// How the panel was refreshed for one dashboard render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Only the value, counter and footer regions
    Partial,
    /// Whole panel
    Full,
}

/// Whether `cycle` is due a full refresh
pub fn needs_full_refresh(cycle: u32, refresh_period: u32) -> bool {
    refresh_period != 0 && cycle % refresh_period == 0
}

/// Render the four dashboard values with two decimals, right aligned.
/// Pressure in hPa and gas resistance in kOhm.
pub fn format_values(sample: &SensorSample) -> [ValueString; FIELD_COUNT] {
    let quantities = [
        sample.temperature,
        sample.humidity,
        sample.pressure_hpa(),
        sample.gas_resistance_kohm(),
    ];
    quantities.map(|value| {
        let mut text = ValueString::new();
        if write!(text, "{:>7.2}", value).is_err() {
            text.clear();
            let _ = text.push_str("----");
        }
        text
    })
}

pub struct DisplayPresenter<P> {
    panel: P,
    frame: FrameBuffer,
    layout: DisplayLayout,
    zone: TimeZoneRule,
    refresh_period: u32,
}

impl<P: EpaperPanel> DisplayPresenter<P> {
    pub fn new(panel: P, layout: DisplayLayout, zone: TimeZoneRule, refresh_period: u32) -> Self {
        Self {
            panel,
            frame: FrameBuffer::new(layout.size()),
            layout,
            zone,
            refresh_period,
        }
    }

    pub fn layout(&self) -> DisplayLayout {
        self.layout
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub async fn init(&mut self) -> Result<(), DisplayError> {
        debug!("Setup display");
        self.panel.init().await.map_err(|e| {
            error!("Display init failed: {:?}", e);
            DisplayError::InitFailed
        })
    }

    /// Splash screen shown while the probe starts up.
    pub async fn show_startup(&mut self) -> Result<(), DisplayError> {
        self.frame.clear(BinaryColor::Off)?;
        let style = MonoTextStyle::new(VALUE_FONT, BinaryColor::On);
        Text::with_baseline("eProbe", Point::new(3, 2), style, Baseline::Top).draw(&mut self.frame)?;
        Text::with_baseline(".starting.", Point::new(3, 2 + LINE_HEIGHT_PX), style, Baseline::Top)
            .draw(&mut self.frame)?;
        self.full_update().await
    }

    /// Replace the status line of the startup screen with `message`.
    pub async fn show_status(&mut self, message: &str) -> Result<(), DisplayError> {
        info!("Startup: {}", message);
        let region = self.layout.status_region();
        self.paint(region, message, VALUE_FONT)?;
        self.window_update(region).await
    }

    /// Draw the static dashboard background (labels and units) and push it
    /// to both panel buffers.
    pub async fn show_main_screen(&mut self) -> Result<(), DisplayError> {
        self.draw_background()?;
        self.full_update().await?;
        self.full_update().await
    }

    /// Show `sample` and the cycle counter.
    ///
    /// Every `refresh_period` cycles the whole dashboard is redrawn and fully
    /// refreshed; otherwise only the dashboard regions are pushed.
    pub async fn render_dashboard(
        &mut self,
        sample: &SensorSample,
        cycle: u32,
    ) -> Result<RefreshKind, DisplayError> {
        let full = needs_full_refresh(cycle, self.refresh_period);
        if full {
            debug!("Full refresh at cycle {}", cycle);
            self.draw_background()?;
        }

        for (index, value) in format_values(sample).iter().enumerate() {
            self.paint(self.layout.value_region(index), value, VALUE_FONT)?;
        }

        if let Some(region) = self.layout.counter_region() {
            let mut counter = ValueString::new();
            let _ = write!(counter, "[{:06}]", cycle);
            self.paint(region, &counter, FOOTER_FONT)?;
        }

        let footer = self.footer_text(sample.timestamp, cycle);
        self.paint(self.layout.footer_region(), &footer, FOOTER_FONT)?;

        if full {
            self.full_update().await?;
            self.full_update().await?;
            Ok(RefreshKind::Full)
        } else {
            for region in self.layout.dashboard_regions() {
                self.window_update(region).await?;
            }
            Ok(RefreshKind::Partial)
        }
    }

    fn footer_text(&self, timestamp: i64, cycle: u32) -> TimestampString {
        let mut footer = time::format(timestamp, self.zone, self.layout.footer_pattern());
        if self.layout.footer_has_counter() {
            let _ = write!(footer, " ({})", cycle);
        }
        footer
    }

    fn draw_background(&mut self) -> Result<(), DisplayError> {
        self.frame.clear(BinaryColor::Off)?;
        let style = MonoTextStyle::new(LABEL_FONT, BinaryColor::On);
        for (index, (label, unit)) in FIELD_LABELS.iter().enumerate() {
            let top = self.layout.value_region(index).area.top_left.y;
            Text::with_baseline(label, Point::new(2, top + 2), style, Baseline::Top)
                .draw(&mut self.frame)?;
            Text::with_baseline(unit, Point::new(2, top + 14), style, Baseline::Top)
                .draw(&mut self.frame)?;
        }
        Ok(())
    }

    /// Fill `region` with its background and draw `text` clipped to it.
    fn paint(&mut self, region: DisplayRegion, text: &str, font: &MonoFont<'_>) -> Result<(), DisplayError> {
        let (fg, bg) = match region.plane {
            ColorPlane::Normal => (BinaryColor::On, BinaryColor::Off),
            ColorPlane::Inverted => (BinaryColor::Off, BinaryColor::On),
        };
        self.frame.fill_solid(&region.area, bg)?;

        let style = MonoTextStyle::new(font, fg);
        let mut clipped = self.frame.clipped(&region.area);
        Text::with_baseline(text, region.text_origin(), style, Baseline::Top).draw(&mut clipped)?;
        Ok(())
    }

    async fn full_update(&mut self) -> Result<(), DisplayError> {
        self.panel.update_full(&self.frame).await.map_err(|e| {
            error!("Full display refresh failed: {:?}", e);
            DisplayError::RefreshFailed
        })
    }

    async fn window_update(&mut self, region: DisplayRegion) -> Result<(), DisplayError> {
        let window = self.frame.align_window(&region.area);
        self.panel
            .update_window(&self.frame, window)
            .await
            .map_err(|e| {
                error!("Partial display refresh failed: {:?}", e);
                DisplayError::RefreshFailed
            })
    }
}
