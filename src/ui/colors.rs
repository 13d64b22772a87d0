pub const GREEN_RGB: (u8, u8, u8) = (34, 197, 94);
pub const YELLOW_RGB: (u8, u8, u8) = (234, 179, 8);
pub const RED_RGB: (u8, u8, u8) = (239, 68, 68);
pub const ERROR_RGB: (u8, u8, u8) = (128, 128, 128);

pub const WARNING_THRESHOLD: f64 = 50.0;
pub const CRITICAL_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Normal,
    Warning,
    Critical,
}

impl UsageLevel {
    /// Levels are always judged on consumption, whatever the display mode.
    pub fn for_utilization(utilization: f64) -> Self {
        if utilization >= CRITICAL_THRESHOLD {
            UsageLevel::Critical
        } else if utilization >= WARNING_THRESHOLD {
            UsageLevel::Warning
        } else {
            UsageLevel::Normal
        }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            UsageLevel::Normal => GREEN_RGB,
            UsageLevel::Warning => YELLOW_RGB,
            UsageLevel::Critical => RED_RGB,
        }
    }
}

pub fn utilization_rgb(utilization: f64) -> (u8, u8, u8) {
    UsageLevel::for_utilization(utilization).rgb()
}

pub fn muted_rgb(color: (u8, u8, u8)) -> (u8, u8, u8) {
    let (r, g, b) = color;
    (
        (r as f32 * 0.35) as u8,
        (g as f32 * 0.35) as u8,
        (b as f32 * 0.35) as u8,
    )
}
