use crate::core::models::{UsageBucket, UsageSnapshot};
use crate::ui::colors;

pub const ICON_SIZE: u32 = 22;
const BACKGROUND: (u8, u8, u8, u8) = (0, 0, 0, 70);
const CORNER_RADIUS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    /// No snapshot delivered yet.
    Pending,
    Normal,
    Error,
}

impl IconState {
    pub fn for_snapshot(snapshot: Option<&UsageSnapshot>) -> Self {
        match snapshot {
            None => IconState::Pending,
            Some(s) if s.is_error() => IconState::Error,
            Some(_) => IconState::Normal,
        }
    }
}

/// Draws the two-bar tray icon: short window on top, long window below.
pub struct IconRenderer {
    size: u32,
}

impl IconRenderer {
    pub fn new() -> Self {
        Self { size: ICON_SIZE }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// RGBA pixels for the given snapshot.
    pub fn render(&self, snapshot: Option<&UsageSnapshot>, show_as_remaining: bool) -> Vec<u8> {
        let width = self.size as usize;
        let height = self.size as usize;
        let mut pixels = vec![0u8; width * height * 4];

        self.draw_rounded_rect(&mut pixels, width, height, CORNER_RADIUS, BACKGROUND);

        let state = IconState::for_snapshot(snapshot);
        let (short, long) = match snapshot {
            Some(s) => (s.short_window().clone(), s.long_window().clone()),
            None => (UsageBucket::empty(), UsageBucket::empty()),
        };

        let bar_height = (height as f64 * 0.35) as usize;
        let bar_gap = 2;
        let bar_width = width - 4;
        let bar_x = 2;
        let short_y = 2;
        let long_y = short_y + bar_height + bar_gap;

        for (bucket, y) in [(&short, short_y), (&long, long_y)] {
            let color = match state {
                IconState::Normal => colors::utilization_rgb(bucket.utilization),
                IconState::Pending | IconState::Error => colors::ERROR_RGB,
            };
            let fraction = match state {
                IconState::Normal => bucket.displayed_percent(show_as_remaining) / 100.0,
                IconState::Pending | IconState::Error => 0.0,
            };
            let fill = ((bar_width as f64) * fraction.clamp(0.0, 1.0)).round() as usize;
            self.draw_bar(
                &mut pixels,
                width,
                bar_x,
                y,
                bar_width,
                bar_height,
                fill,
                color,
                colors::muted_rgb(color),
            );
        }

        pixels
    }

    /// Same as [`IconRenderer::render`] but in the ARGB32 layout StatusNotifier hosts expect.
    pub fn render_argb(&self, snapshot: Option<&UsageSnapshot>, show_as_remaining: bool) -> Vec<u8> {
        let mut pixels = self.render(snapshot, show_as_remaining);
        rgba_to_argb(&mut pixels);
        pixels
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_bar(
        &self,
        pixels: &mut [u8],
        stride: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        fill: usize,
        color: (u8, u8, u8),
        empty_color: (u8, u8, u8),
    ) {
        let (r, g, b) = color;
        let (er, eg, eb) = empty_color;

        for dy in 0..height {
            for dx in 0..width {
                let idx = ((y + dy) * stride + x + dx) * 4;
                if idx + 3 >= pixels.len() {
                    continue;
                }
                if dx < fill {
                    pixels[idx..idx + 4].copy_from_slice(&[r, g, b, 255]);
                } else {
                    pixels[idx..idx + 4].copy_from_slice(&[er, eg, eb, 140]);
                }
            }
        }
    }

    fn draw_rounded_rect(
        &self,
        pixels: &mut [u8],
        width: usize,
        height: usize,
        radius: f32,
        color: (u8, u8, u8, u8),
    ) {
        let (r, g, b, a) = color;
        for y in 0..height {
            for x in 0..width {
                if !inside_rounded_rect(x, y, width, height, radius) {
                    continue;
                }
                let idx = (y * width + x) * 4;
                if idx + 3 < pixels.len() {
                    pixels[idx..idx + 4].copy_from_slice(&[r, g, b, a]);
                }
            }
        }
    }
}

impl Default for IconRenderer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn rgba_to_argb(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.rotate_right(1);
    }
}

fn inside_rounded_rect(x: usize, y: usize, width: usize, height: usize, radius: f32) -> bool {
    let x = x as f32;
    let y = y as f32;
    let width = width as f32;
    let height = height as f32;
    let r = radius.max(0.0);

    if x >= r && x < width - r {
        return true;
    }
    if y >= r && y < height - r {
        return true;
    }

    let cx = if x < r { r } else { width - r };
    let cy = if y < r { r } else { height - r };
    let dx = x - cx;
    let dy = y - cy;
    dx * dx + dy * dy <= r * r
}
