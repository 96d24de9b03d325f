//! Static screen layouts
//!
//! Every value the dashboard shows lives in a fixed rectangle. Value rows are
//! laid out by field index (`y = index × 50`) on both panels so partial refreshes can
//! be scoped to exactly the row that changed.

use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::time::{PATTERN_DATE_TIME, PATTERN_TIME};

/// Number of sensor values on the dashboard
pub const FIELD_COUNT: usize = 4;

/// Height of a value region
pub const VALUE_HEIGHT_PX: u32 = 24;

/// Vertical distance between two value rows
pub const VALUE_PITCH_PX: i32 = 50;

/// Left edge of the value column; the label column sits to its left
pub const VALUE_X_PX: i32 = 34;

/// Text line height used by the startup screens
pub const LINE_HEIGHT_PX: i32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLayout {
    /// 2.13" 128x250 panel. The inverted footer carries time and counter.
    Wide128x250,
    /// 1.54" 200x200 panel with a separate counter region top right and a
    /// dated footer.
    Square200,
}

/// Foreground/background scheme of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPlane {
    /// Black text on white
    Normal,
    /// White text on black
    Inverted,
}

/// A rectangle of the panel that is redrawn and refreshed as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRegion {
    pub area: Rectangle,
    pub plane: ColorPlane,
}

impl DisplayRegion {
    pub const fn new(x: i32, y: i32, width: u32, height: u32, plane: ColorPlane) -> Self {
        Self {
            area: Rectangle::new(Point::new(x, y), Size::new(width, height)),
            plane,
        }
    }

    /// Top-left text position inside the region
    pub fn text_origin(&self) -> Point {
        self.area.top_left + Point::new(2, 2)
    }
}

/// Label and unit drawn next to each value on the main screen
pub const FIELD_LABELS: [(&str, &str); FIELD_COUNT] = [
    ("TEMP", "C"),
    ("HUM", "%"),
    ("PRES", "hPa"),
    ("GAS", "kOhm"),
];

impl DisplayLayout {
    pub const fn size(self) -> Size {
        match self {
            Self::Wide128x250 => Size::new(128, 250),
            Self::Square200 => Size::new(200, 200),
        }
    }

    pub const fn value_width(self) -> u32 {
        match self {
            Self::Wide128x250 => 94,
            Self::Square200 => 100,
        }
    }

    /// Region of the value at `index` (0 = temperature … 3 = gas)
    pub const fn value_region(self, index: usize) -> DisplayRegion {
        DisplayRegion::new(
            VALUE_X_PX,
            index as i32 * VALUE_PITCH_PX,
            self.value_width(),
            VALUE_HEIGHT_PX,
            ColorPlane::Normal,
        )
    }

    /// Separate cycle counter region, if the layout has one
    pub const fn counter_region(self) -> Option<DisplayRegion> {
        match self {
            Self::Wide128x250 => None,
            Self::Square200 => Some(DisplayRegion::new(136, 0, 64, 22, ColorPlane::Normal)),
        }
    }

    /// Inverted timestamp footer
    pub const fn footer_region(self) -> DisplayRegion {
        match self {
            Self::Wide128x250 => DisplayRegion::new(0, 200, 128, 34, ColorPlane::Inverted),
            Self::Square200 => DisplayRegion::new(0, 180, 200, 20, ColorPlane::Inverted),
        }
    }

    pub const fn footer_pattern(self) -> &'static str {
        match self {
            Self::Wide128x250 => PATTERN_TIME,
            Self::Square200 => PATTERN_DATE_TIME,
        }
    }

    /// Whether the footer also shows the cycle counter
    pub const fn footer_has_counter(self) -> bool {
        self.counter_region().is_none()
    }

    /// Inverted status line of the startup screen
    pub const fn status_region(self) -> DisplayRegion {
        DisplayRegion::new(
            0,
            3 * LINE_HEIGHT_PX - LINE_HEIGHT_PX / 2,
            self.size().width,
            34,
            ColorPlane::Inverted,
        )
    }

    /// All regions refreshed on an incremental dashboard update
    pub fn dashboard_regions(self) -> heapless::Vec<DisplayRegion, 6> {
        let mut regions = heapless::Vec::new();
        for index in 0..FIELD_COUNT {
            let _ = regions.push(self.value_region(index));
        }
        if let Some(counter) = self.counter_region() {
            let _ = regions.push(counter);
        }
        let _ = regions.push(self.footer_region());
        regions
    }
}
