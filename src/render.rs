//! Software overlay rendering.
//!
//! A `Canvas` is an RGBA buffer with bounds-safe primitives; overlays are
//! drawn at projective coordinates on top of a converted color or depth
//! frame. Presentation is a buffer handoff: callers keep the RGBA data or
//! encode a PNG snapshot.

use rayon::prelude::*;

use crate::skeleton::Joint;
use crate::types::{ColorFrame, DepthFrame, Gesture, Projective};

pub const SKELETON_LINE_COLOR: [u8; 4] = [0, 0, 255, 255];
pub const SKELETON_JOINT_COLOR: [u8; 4] = [0, 0, 255, 255];
pub const SKELETON_LINE_THICKNESS: i32 = 4;
pub const SKELETON_JOINT_RADIUS: i32 = 6;

const RAISE_HAND_COLOR: [u8; 4] = [255, 0, 0, 255];
const WAVE_COLOR: [u8; 4] = [255, 255, 0, 255];
const CLICK_COLOR: [u8; 4] = [0, 0, 255, 255];

pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        data.chunks_exact_mut(4).for_each(|px| px[3] = 255);
        Self {
            width,
            height,
            data,
        }
    }

    /// Expand an RGB24 frame to an RGBA canvas.
    pub fn from_color_frame(frame: &ColorFrame) -> Self {
        let mut data = vec![0u8; frame.width as usize * frame.height as usize * 4];
        data.par_chunks_mut(4)
            .zip(frame.data.par_chunks_exact(3))
            .for_each(|(dst, src)| {
                dst[0] = src[0];
                dst[1] = src[1];
                dst[2] = src[2];
                dst[3] = 255;
            });
        Self {
            width: frame.width,
            height: frame.height,
            data,
        }
    }

    /// Grayscale depth view, scaled so the device's full range maps onto
    /// 0-255.
    pub fn from_depth_frame(frame: &DepthFrame) -> Self {
        let mut data = vec![0u8; frame.width as usize * frame.height as usize * 4];
        data.par_chunks_mut(4)
            .zip(frame.data.par_iter().copied())
            .for_each(|(dst, sample)| {
                let value =
                    (sample as u32 * 255 / DepthFrame::MAX_DEPTH_MM as u32).min(255) as u8;
                dst[0] = value;
                dst[1] = value;
                dst[2] = value;
                dst[3] = 255;
            });
        Self {
            width: frame.width,
            height: frame.height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn fill(&mut self, color: [u8; 4]) {
        self.data
            .chunks_exact_mut(4)
            .for_each(|px| px.copy_from_slice(&color));
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ])
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 {
            return;
        }
        let (ux, uy) = (x as u32, y as u32);
        if ux >= self.width || uy >= self.height {
            return;
        }
        let idx = ((uy * self.width + ux) as usize) * 4;
        self.data[idx..idx + 4].copy_from_slice(&color);
    }

    pub fn draw_line(&mut self, p0: (f32, f32), p1: (f32, f32), color: [u8; 4], thickness: i32) {
        let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
        let (x1, y1) = (p1.0 as i32, p1.1 as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (thickness.max(1) - 1) / 2;

        loop {
            self.put_pixel(x0, y0, color);
            if radius > 0 {
                for ox in -radius..=radius {
                    for oy in -radius..=radius {
                        if ox == 0 && oy == 0 {
                            continue;
                        }
                        if ox.abs() + oy.abs() <= radius {
                            self.put_pixel(x0 + ox, y0 + oy, color);
                        }
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    pub fn draw_circle(&mut self, center: (i32, i32), radius: i32, color: [u8; 4]) {
        let (cx, cy) = center;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    pub fn draw_rect(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: [u8; 4], thickness: i32) {
        self.draw_line((x1, y1), (x2, y1), color, thickness);
        self.draw_line((x2, y1), (x2, y2), color, thickness);
        self.draw_line((x2, y2), (x1, y2), color, thickness);
        self.draw_line((x1, y2), (x1, y1), color, thickness);
    }

    pub fn to_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("canvas buffer matches its dimensions")
    }
}

/// Stick-figure overlay: one line per segment, one dot per joint.
pub fn draw_skeleton(
    canvas: &mut Canvas,
    joints: &[(Joint, Projective)],
    segments: &[(Joint, Joint)],
) {
    let find = |joint: Joint| {
        joints
            .iter()
            .find(|(j, _)| *j == joint)
            .map(|(_, p)| (p.x, p.y))
    };

    for &(a, b) in segments {
        if let (Some(pa), Some(pb)) = (find(a), find(b)) {
            canvas.draw_line(pa, pb, SKELETON_LINE_COLOR, SKELETON_LINE_THICKNESS);
        }
    }

    for &(_, p) in joints {
        canvas.draw_circle(
            (p.x as i32, p.y as i32),
            SKELETON_JOINT_RADIUS,
            SKELETON_JOINT_COLOR,
        );
    }
}

/// Marker per recognized gesture: a dot where a hand was raised, a thick
/// stroke for a wave, a filled disc for a push/click.
pub fn draw_gesture_marker(canvas: &mut Canvas, gesture: Gesture, start: (f32, f32), end: (f32, f32)) {
    match gesture {
        Gesture::RaiseHand => {
            canvas.draw_circle((start.0 as i32, start.1 as i32), 3, RAISE_HAND_COLOR);
        }
        Gesture::Wave => {
            canvas.draw_line(start, end, WAVE_COLOR, 6);
        }
        Gesture::Click => {
            canvas.draw_circle((start.0 as i32, start.1 as i32), 9, CLICK_COLOR);
        }
    }
}

/// Polyline through the recorded hand positions.
pub fn draw_trail(canvas: &mut Canvas, points: &[(f32, f32)], color: [u8; 4], thickness: i32) {
    for pair in points.windows(2) {
        canvas.draw_line(pair[0], pair[1], color, thickness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OutputMode;

    #[test]
    fn out_of_bounds_pixels_are_dropped() {
        let mut canvas = Canvas::new(8, 8);
        canvas.put_pixel(-1, 0, [255; 4]);
        canvas.put_pixel(0, -1, [255; 4]);
        canvas.put_pixel(8, 0, [255; 4]);
        canvas.put_pixel(0, 8, [255; 4]);
        assert!(canvas.data().chunks_exact(4).all(|px| px[0] == 0));
    }

    #[test]
    fn circle_paints_its_center() {
        let mut canvas = Canvas::new(16, 16);
        canvas.draw_circle((8, 8), 3, [10, 20, 30, 255]);
        assert_eq!(canvas.pixel(8, 8), Some([10, 20, 30, 255]));
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn color_frame_expands_to_rgba() {
        let mut frame = ColorFrame::empty(OutputMode {
            width: 4,
            height: 2,
            fps: 30,
        });
        frame.data[0] = 9;
        frame.data[1] = 8;
        frame.data[2] = 7;
        let canvas = Canvas::from_color_frame(&frame);
        assert_eq!(canvas.data().len(), 4 * 2 * 4);
        assert_eq!(canvas.pixel(0, 0), Some([9, 8, 7, 255]));
    }

    #[test]
    fn depth_scaling_maps_full_range() {
        let mut frame = DepthFrame::empty(OutputMode {
            width: 2,
            height: 1,
            fps: 30,
        });
        frame.data[0] = DepthFrame::MAX_DEPTH_MM;
        frame.data[1] = DepthFrame::MAX_DEPTH_MM / 2;
        let canvas = Canvas::from_depth_frame(&frame);
        assert_eq!(canvas.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(1, 0), Some([127, 127, 127, 255]));
    }

    #[test]
    fn skeleton_draws_segment_endpoints() {
        let mut canvas = Canvas::new(64, 64);
        let joints = [
            (Joint::Head, Projective {
                x: 10.0,
                y: 10.0,
                depth: 2000.0,
            }),
            (Joint::Neck, Projective {
                x: 30.0,
                y: 30.0,
                depth: 2000.0,
            }),
        ];
        draw_skeleton(&mut canvas, &joints, &[(Joint::Head, Joint::Neck)]);
        assert_eq!(canvas.pixel(10, 10), Some(SKELETON_JOINT_COLOR));
        assert_eq!(canvas.pixel(20, 20), Some(SKELETON_LINE_COLOR));
    }
}
