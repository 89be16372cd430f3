//! Detection overlay.
//!
//! Draws a 2-pixel box in the class colour and a caption (`label 0.87`)
//! above the box, using a tiny built-in bitmap font. Drawing goes through the
//! frame's `image` buffer.

use image::{Rgb, RgbImage};

use crate::detect::{BoundingBox, Detection};
use crate::frame::Frame;

const BOX_THICKNESS: u32 = 2;
const GLYPH_SCALE: i64 = 2;
const GLYPH_WIDTH: i64 = 3;
const GLYPH_HEIGHT: i64 = 5;
const CAPTION_OFFSET: i64 = 8;

const PLACEHOLDER_TEXT: &str = "no feed";
const PLACEHOLDER_COLOR: [u8; 3] = [200, 200, 200];

/// Black "no feed" frame shown for a source that failed to open.
pub fn no_feed_frame() -> Frame {
    let mut frame = Frame::placeholder();
    let text_width = PLACEHOLDER_TEXT.len() as i64 * (GLYPH_WIDTH + 1) * GLYPH_SCALE;
    let x = (frame.width as i64 - text_width) / 2;
    let y = (frame.height as i64 - GLYPH_HEIGHT * GLYPH_SCALE) / 2;
    let drawn = frame.edit_image(|img| draw_text(img, x, y, PLACEHOLDER_TEXT, Rgb(PLACEHOLDER_COLOR)));
    if let Err(err) = drawn {
        log::warn!("placeholder text not drawn: {:#}", err);
    }
    frame
}

/// Draw all detections onto the frame.
pub fn annotate(frame: &mut Frame, detections: &[Detection]) {
    if detections.is_empty() {
        return;
    }
    let drawn = frame.edit_image(|img| {
        for det in detections {
            let color = Rgb(det.class().color());
            if let Some(bbox) = clamp_box(&det.bbox, img.dimensions()) {
                draw_rect(img, bbox, color, BOX_THICKNESS);
            }
            let text_height = GLYPH_HEIGHT * GLYPH_SCALE;
            let y = (det.bbox.y1 as i64 - CAPTION_OFFSET - text_height).max(0);
            draw_text(img, det.bbox.x1 as i64, y, &det.caption(), color);
        }
    });
    if let Err(err) = drawn {
        log::warn!("frame {}: annotation skipped: {:#}", frame.sequence, err);
    }
}

/// Pixel box clamped to image bounds; `None` when nothing of it is visible.
pub fn clamp_box(bbox: &BoundingBox, dims: (u32, u32)) -> Option<[u32; 4]> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }
    let (x0, x1) = (bbox.x1.min(bbox.x2), bbox.x1.max(bbox.x2));
    let (y0, y1) = (bbox.y1.min(bbox.y2), bbox.y1.max(bbox.y2));
    if x1 < 0 || y1 < 0 || x0 >= w as i32 || y0 >= h as i32 {
        return None;
    }
    let clamp = |v: i32, max: u32| -> u32 { v.clamp(0, max as i32 - 1) as u32 };
    Some([clamp(x0, w), clamp(y0, h), clamp(x1, w), clamp(y1, h)])
}

/// Rectangle border `thickness` pixels wide, drawn inwards from `bbox_px`.
pub fn draw_rect(img: &mut RgbImage, bbox_px: [u32; 4], color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    let [x0, y0, x1, y1] = bbox_px;
    for t in 0..thickness {
        let xx0 = x0.saturating_add(t);
        let yy0 = y0.saturating_add(t);
        let xx1 = x1.saturating_sub(t);
        let yy1 = y1.saturating_sub(t);
        if xx1 >= w || yy1 >= h || xx0 > xx1 || yy0 > yy1 {
            continue;
        }
        for x in xx0..=xx1 {
            img.put_pixel(x, yy0, color);
            img.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            img.put_pixel(xx0, y, color);
            img.put_pixel(xx1, y, color);
        }
    }
}

/// Render `text` with its top-left corner at (x, y). Pixels outside the image
/// and unsupported characters are skipped.
pub fn draw_text(img: &mut RgbImage, x: i64, y: i64, text: &str, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    let advance = (GLYPH_WIDTH + 1) * GLYPH_SCALE;
    for (i, ch) in text.chars().enumerate() {
        let rows = glyph(ch);
        let origin_x = x + i as i64 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        let px = origin_x + col * GLYPH_SCALE + dx;
                        let py = y + row as i64 * GLYPH_SCALE + dy;
                        if px >= 0 && py >= 0 && px < w as i64 && py < h as i64 {
                            img.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

fn glyph(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b110, 0b001, 0b010, 0b100, 0b111],
        '3' => [0b110, 0b001, 0b010, 0b001, 0b110],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b110, 0b001, 0b110],
        '6' => [0b011, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b110],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        _ => [0; 5],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::LabelClass;

    fn detection(label: &str) -> Detection {
        Detection {
            bbox: BoundingBox {
                x1: 10,
                y1: 30,
                x2: 40,
                y2: 60,
            },
            label: label.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn no_feed_frame_is_placeholder_sized_with_text() {
        let frame = no_feed_frame();
        assert_eq!(frame.dimensions(), (854, 480));
        let lit = frame.pixels().chunks(3).filter(|px| *px == PLACEHOLDER_COLOR).count();
        assert!(lit > 0);
        assert_eq!(frame.pixel(0, 0), Some([0, 0, 0]));
    }

    #[test]
    fn box_edges_use_class_color() {
        let mut frame = Frame::black(64, 64);
        annotate(&mut frame, &[detection("person")]);

        let person = LabelClass::Person.color();
        assert_eq!(frame.pixel(10, 30), Some(person));
        assert_eq!(frame.pixel(40, 60), Some(person));
        assert_eq!(frame.pixel(11, 45), Some(person));
        // interior untouched
        assert_eq!(frame.pixel(25, 45), Some([0, 0, 0]));
    }

    #[test]
    fn vehicle_and_other_colors() {
        let mut frame = Frame::black(64, 64);
        annotate(&mut frame, &[detection("bus")]);
        assert_eq!(frame.pixel(40, 45), Some(LabelClass::Vehicle.color()));

        let mut frame = Frame::black(64, 64);
        annotate(&mut frame, &[detection("kite")]);
        assert_eq!(frame.pixel(40, 45), Some(LabelClass::Other.color()));
    }

    #[test]
    fn caption_is_drawn_above_box() {
        let mut frame = Frame::black(64, 64);
        annotate(&mut frame, &[detection("person")]);
        let above = (0..30)
            .flat_map(|y| (0..64).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) != Some([0, 0, 0]))
            .count();
        assert!(above > 0);
    }

    #[test]
    fn drawing_near_edges_does_not_panic() {
        let mut img = RgbImage::new(8, 8);
        let bbox = BoundingBox {
            x1: -5,
            y1: -5,
            x2: 20,
            y2: 20,
        };
        let clamped = clamp_box(&bbox, img.dimensions());
        assert_eq!(clamped, Some([0, 0, 7, 7]));
        if let Some(px) = clamped {
            draw_rect(&mut img, px, Rgb([1, 1, 1]), BOX_THICKNESS);
        }
        draw_text(&mut img, 6, 6, "person 1.00", Rgb([1, 1, 1]));
        assert_eq!(img.get_pixel(7, 7).0, [1, 1, 1]);
    }

    #[test]
    fn box_outside_frame_is_skipped() {
        let bbox = BoundingBox {
            x1: 20,
            y1: 20,
            x2: 30,
            y2: 30,
        };
        assert_eq!(clamp_box(&bbox, (8, 8)), None);
    }
}
