use crate::pipeline::{Landmark, LandmarkType, VideoFrame};
use image::{Rgba, RgbaImage};

pub const MARKER_RADIUS: i64 = 5;
pub const MARKER_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Landmark kinds that receive a marker.
pub fn is_marked(kind: LandmarkType) -> bool {
    matches!(
        kind,
        LandmarkType::LeftEye
            | LandmarkType::RightEye
            | LandmarkType::NoseBase
            | LandmarkType::MouthLeft
            | LandmarkType::MouthRight
    )
}

/// Copies `frame` into a new buffer and draws a marker at each marked landmark.
///
/// The source buffer is never touched. Timestamp and rotation carry over.
pub fn render_landmarks(frame: &VideoFrame, landmarks: &[Landmark]) -> VideoFrame {
    let mut canvas = frame.buffer().clone();
    for landmark in landmarks.iter().filter(|l| is_marked(l.kind)) {
        let (x, y) = (landmark.position.x, landmark.position.y);
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        fill_disc(&mut canvas, x.round() as i64, y.round() as i64, MARKER_RADIUS, MARKER_COLOR);
    }
    frame.derive(canvas)
}

fn fill_disc(canvas: &mut RgbaImage, cx: i64, cy: i64, radius: i64, color: Rgba<u8>) {
    let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));
    // Centers far off-canvas saturate to an empty range.
    let x0 = cx.saturating_sub(radius).max(0);
    let x1 = cx.saturating_add(radius).min(width - 1);
    let y0 = cy.saturating_sub(radius).max(0);
    let y1 = cy.saturating_add(radius).min(height - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= radius * radius {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
