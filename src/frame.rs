//! Frame containers.
//!
//! - `Frame`: decoded RGB24 image produced by a `FrameSource`.
//! - `FrameSlot`: the most recent annotated frame of a feed (last-write-wins).
//!
//! All pixel data inside the crate is RGB24, row-major, no padding. Sources
//! normalise device formats before constructing a `Frame`.

use anyhow::{anyhow, Result};

/// Width of the "no feed" placeholder shown when a source cannot be opened.
pub const PLACEHOLDER_WIDTH: u32 = 854;
/// Height of the "no feed" placeholder.
pub const PLACEHOLDER_HEIGHT: u32 = 480;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded RGB24 image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Per-source sequence number, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Build a frame from RGB24 bytes. Length must be `width * height * 3`.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Solid black frame of the given size.
    pub fn black(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * 3;
        Self {
            data: vec![0u8; len],
            width,
            height,
            sequence: 0,
        }
    }

    /// Black placeholder displayed for a feed whose source failed to open.
    pub fn placeholder() -> Self {
        Self::black(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGB value at (x, y), or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Copy into an `image` buffer (for encoding or resizing).
    pub fn to_rgb_image(&self) -> Result<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }

    /// Draw on the frame in place through an `image` buffer.
    pub fn edit_image(&mut self, edit: impl FnOnce(&mut image::RgbImage)) -> Result<()> {
        if self.data.len() != rgb_len(self.width, self.height)? {
            return Err(anyhow!("frame buffer does not match {}x{}", self.width, self.height));
        }
        let data = std::mem::take(&mut self.data);
        let mut img = image::RgbImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))?;
        edit(&mut img);
        self.data = img.into_raw();
        Ok(())
    }
}

fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// FrameSlot: most recent annotated frame of a feed
// ----------------------------------------------------------------------------

/// Holds the latest annotated frame of one feed.
///
/// Written only by that feed's tick, read by user actions (capture, manual
/// record) that run between ticks. No versioning: the newest frame wins.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Option<Frame>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, frame: Frame) {
        self.latest = Some(frame);
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.latest.as_ref()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_validates_length() {
        assert!(Frame::from_rgb(vec![0u8; 12], 2, 2, 1).is_ok());
        assert!(Frame::from_rgb(vec![0u8; 11], 2, 2, 1).is_err());
    }

    #[test]
    fn edit_image_writes_back_into_frame() -> Result<()> {
        let mut frame = Frame::black(4, 3);
        frame.sequence = 9;
        frame.edit_image(|img| img.put_pixel(3, 2, image::Rgb([1, 2, 3])))?;

        assert_eq!(frame.pixel(3, 2), Some([1, 2, 3]));
        assert_eq!(frame.pixel(4, 2), None);
        assert_eq!(frame.pixels().len(), 4 * 3 * 3);
        assert_eq!(frame.sequence, 9);
        Ok(())
    }

    #[test]
    fn placeholder_has_fixed_size() {
        let frame = Frame::placeholder();
        assert_eq!(frame.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
    }

    #[test]
    fn frame_slot_keeps_last_write() {
        let mut slot = FrameSlot::new();
        assert!(slot.latest().is_none());

        let mut first = Frame::black(2, 2);
        first.sequence = 1;
        let mut second = Frame::black(2, 2);
        second.sequence = 2;

        slot.store(first);
        slot.store(second);

        assert_eq!(slot.latest().map(|f| f.sequence), Some(2));
    }
}
