use crate::detection::Detection;
use ab_glyph::FontArc;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

pub const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Box outline width in pixels, drawn inward from the box edges.
pub const BOX_THICKNESS: i32 = 2;

/// Label glyph height in pixels.
pub const LABEL_SCALE: f32 = 16.0;

/// Gap between the label baseline and the top edge of the box.
pub const LABEL_GAP: i32 = 5;

/// Horizontal strokes per label; two offset passes give a bold label.
const LABEL_STROKES: i32 = 2;

/// Draw every detection in order, each box with its caption. Later boxes and
/// labels overwrite earlier ones where they overlap.
pub fn draw_detections(frame: &mut RgbImage, detections: &[Detection], font: &FontArc) {
    for detection in detections {
        let (x1, y1, x2, y2) = pixel_corners(detection);
        draw_box(frame, x1, y1, x2, y2);
        draw_label(frame, x1, y1, &detection.caption(), font);
    }
}

/// Box corners truncated to integer pixels.
fn pixel_corners(detection: &Detection) -> (i32, i32, i32, i32) {
    let b = detection.bbox;
    (b.x1 as i32, b.y1 as i32, b.x2 as i32, b.y2 as i32)
}

/// Unfilled rectangle covering (x1, y1)..=(x2, y2). Nothing outside that
/// rectangle is touched; parts off the frame are clipped.
pub fn draw_box(frame: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32) {
    if x2 < x1 || y2 < y1 {
        return;
    }
    let width = x2 - x1 + 1;
    let height = y2 - y1 + 1;

    for inset in 0..BOX_THICKNESS {
        let w = width - 2 * inset;
        let h = height - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(frame, rect, BOX_COLOR);
    }
}

/// Label text whose baseline sits [`LABEL_GAP`] pixels above `(x, y)`.
pub fn draw_label(frame: &mut RgbImage, x: i32, y: i32, text: &str, font: &FontArc) {
    let (_, text_height) = text_size(LABEL_SCALE, font, text);
    let top = y - LABEL_GAP - text_height as i32;
    for stroke in 0..LABEL_STROKES {
        draw_text_mut(frame, LABEL_COLOR, x + stroke, top, LABEL_SCALE, font, text);
    }
}
