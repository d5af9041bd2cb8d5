//! Hard-edged raster primitives. All coordinates here are buffer pixels
//! (screen space); callers map drawing-space geometry through the view first.
//!
//! A pixel is covered when its center `(x + 0.5, y + 0.5)` falls inside the
//! shape, so every primitive is deterministic and free of anti-aliasing.

use std::f32::consts::TAU;

use eframe::egui;
use egui::{Pos2, Vec2};
use image::Rgba;
use rand::Rng;

use crate::canvas::Surface;

/// Radius below which a disc still covers the pixel containing its center.
const MIN_RADIUS: f32 = 0.5;

/// Pixel ranges of the box `center ± reach`, intersected with the surface.
/// `None` when the box misses the surface entirely.
fn clipped_bounds(
    surface: &Surface,
    center: Pos2,
    reach: f32,
) -> Option<(std::ops::RangeInclusive<i64>, std::ops::RangeInclusive<i64>)> {
    let (w, h) = surface.dimensions();
    let min_x = ((center.x - reach).floor() as i64).max(0);
    let max_x = ((center.x + reach).ceil() as i64).min(w as i64 - 1);
    let min_y = ((center.y - reach).floor() as i64).max(0);
    let max_y = ((center.y + reach).ceil() as i64).min(h as i64 - 1);
    if min_x > max_x || min_y > max_y {
        return None;
    }
    Some((min_x..=max_x, min_y..=max_y))
}

/// Liang-Barsky: the part of `start → end` inside `[min, max]`. Solved in f64
/// so far-off endpoints keep their precision near the surface.
fn clip_segment(start: Pos2, end: Pos2, min: Pos2, max: Pos2) -> Option<(Pos2, Pos2)> {
    let (sx, sy) = (start.x as f64, start.y as f64);
    let (dx, dy) = (end.x as f64 - sx, end.y as f64 - sy);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    let edges = [
        (-dx, sx - min.x as f64),
        (dx, max.x as f64 - sx),
        (-dy, sy - min.y as f64),
        (dy, max.y as f64 - sy),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }
    let at = |t: f64| Pos2::new((sx + dx * t) as f32, (sy + dy * t) as f32);
    Some((at(t0), at(t1)))
}

/// Fill a disc. The pixel containing `center` is always painted.
pub fn stamp_disc(surface: &mut Surface, center: Pos2, radius: f32, color: Rgba<u8>) {
    let r = radius.max(0.0);
    let r2 = r * r;
    surface.put(center.x.floor() as i64, center.y.floor() as i64, color);
    let Some((xs, ys)) = clipped_bounds(surface, center, r) else { return };

    for y in ys {
        let dy = y as f32 + 0.5 - center.y;
        for x in xs.clone() {
            let dx = x as f32 + 0.5 - center.x;
            if dx * dx + dy * dy <= r2 {
                surface.put(x, y, color);
            }
        }
    }
}

/// Straight segment with round caps, stamped densely (at most one pixel apart).
/// Only the part within `radius` of the surface is stamped.
pub fn draw_segment(surface: &mut Surface, start: Pos2, end: Pos2, width: f32, color: Rgba<u8>) {
    let radius = (width * 0.5).max(MIN_RADIUS);
    let (w, h) = surface.dimensions();
    let margin = radius + 1.0;
    let Some((start, end)) = clip_segment(
        start,
        end,
        Pos2::new(-margin, -margin),
        Pos2::new(w as f32 + margin, h as f32 + margin),
    ) else {
        return;
    };
    let delta = end - start;
    let distance = delta.length();

    if distance < 0.1 {
        stamp_disc(surface, start, radius, color);
        return;
    }

    let steps = distance.ceil() as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp_disc(surface, start + delta * t, radius, color);
    }
}

/// Axis-aligned rectangle outline with corners `a` and `b` in any order.
/// Corners are joined round, matching the segment caps.
pub fn stroke_rect(surface: &mut Surface, a: Pos2, b: Pos2, width: f32, color: Rgba<u8>) {
    let min = a.min(b);
    let max = a.max(b);
    let top_right = Pos2::new(max.x, min.y);
    let bottom_left = Pos2::new(min.x, max.y);
    draw_segment(surface, min, top_right, width, color);
    draw_segment(surface, top_right, max, width, color);
    draw_segment(surface, max, bottom_left, width, color);
    draw_segment(surface, bottom_left, min, width, color);
}

/// Circle outline: pixels whose center lies within `width / 2` of the ring.
pub fn stroke_circle(surface: &mut Surface, center: Pos2, radius: f32, width: f32, color: Rgba<u8>) {
    let half = (width * 0.5).max(MIN_RADIUS);
    if radius <= half {
        stamp_disc(surface, center, radius + half, color);
        return;
    }
    let Some((xs, ys)) = clipped_bounds(surface, center, radius + half) else { return };

    for y in ys {
        let dy = y as f32 + 0.5 - center.y;
        for x in xs.clone() {
            let dx = x as f32 + 0.5 - center.x;
            let d = (dx * dx + dy * dy).sqrt();
            if (d - radius).abs() <= half {
                surface.put(x, y, color);
            }
        }
    }
}

/// Filled square mark with its top-left corner at `origin`.
pub fn fill_square(surface: &mut Surface, origin: Pos2, side: f32, color: Rgba<u8>) {
    let count = side.round().max(1.0) as i64;
    let (w, h) = surface.dimensions();
    let x0 = origin.x.floor() as i64;
    let y0 = origin.y.floor() as i64;
    for y in y0.max(0)..y0.saturating_add(count).min(h as i64) {
        for x in x0.max(0)..x0.saturating_add(count).min(w as i64) {
            surface.put(x, y, color);
        }
    }
}

/// Offsets for one spray burst: random angle, radius uniform in `[0, radius]`.
/// Sampling the radius uniformly (rather than its square) concentrates marks
/// toward the center.
pub fn spray_offsets<R: Rng + ?Sized>(rng: &mut R, count: usize, radius: f32) -> Vec<Vec2> {
    (0..count)
        .map(|_| {
            let angle = rng.random::<f32>() * TAU;
            let r = rng.random::<f32>() * radius;
            Vec2::new(angle.cos() * r, angle.sin() * r)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::EMPTY_INK;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const INK: Rgba<u8> = Rgba([10, 20, 30, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn painted(surface: &Surface, x: u32, y: u32) -> bool {
        *surface.ink().get_pixel(x, y) != EMPTY_INK
    }

    #[test]
    fn tiny_disc_covers_its_own_pixel() {
        let mut s = Surface::new(5, 5, WHITE);
        stamp_disc(&mut s, Pos2::new(2.9, 2.1), 0.0, INK);
        assert!(painted(&s, 2, 2));
        assert_eq!(s.ink().pixels().filter(|p| **p != EMPTY_INK).count(), 1);
    }

    #[test]
    fn segment_is_continuous_and_bounded() {
        let mut s = Surface::new(40, 20, WHITE);
        draw_segment(&mut s, Pos2::new(5.0, 10.0), Pos2::new(35.0, 10.0), 4.0, INK);
        for x in 5..35 {
            assert!(painted(&s, x, 10), "gap at x={x}");
        }
        assert!(!painted(&s, 20, 4));
        assert!(!painted(&s, 20, 15));
    }

    #[test]
    fn segment_off_surface_is_clipped() {
        let mut s = Surface::new(10, 10, WHITE);
        draw_segment(&mut s, Pos2::new(-50.0, -50.0), Pos2::new(5.0, 5.0), 3.0, INK);
        assert!(painted(&s, 5, 5));
    }

    #[test]
    fn rect_outline_leaves_interior_empty() {
        let mut s = Surface::new(80, 80, WHITE);
        stroke_rect(&mut s, Pos2::new(60.0, 60.0), Pos2::new(10.0, 10.0), 2.0, INK);
        assert!(painted(&s, 10, 30));
        assert!(painted(&s, 60, 30));
        assert!(painted(&s, 30, 10));
        assert!(painted(&s, 30, 60));
        assert!(!painted(&s, 35, 35));
        assert!(!painted(&s, 70, 70));
    }

    #[test]
    fn circle_outline_is_a_ring() {
        let mut s = Surface::new(60, 60, WHITE);
        stroke_circle(&mut s, Pos2::new(30.0, 30.0), 20.0, 2.0, INK);
        assert!(painted(&s, 49, 29) || painted(&s, 50, 29));
        assert!(!painted(&s, 30, 30));
        assert!(!painted(&s, 2, 2));
    }

    #[test]
    fn far_off_segment_is_clipped_to_the_surface() {
        let mut s = Surface::new(16, 16, WHITE);
        draw_segment(&mut s, Pos2::new(-1e9, 8.0), Pos2::new(1e9, 8.0), 2.0, INK);
        for x in 0..16 {
            assert!(painted(&s, x, 8), "gap at x={x}");
        }
        assert!(!painted(&s, 8, 2));

        let mut s = Surface::new(16, 16, WHITE);
        draw_segment(&mut s, Pos2::new(-1e9, -1e9), Pos2::new(-1e9, 1e9), 2.0, INK);
        assert!(s.ink().pixels().all(|p| *p == EMPTY_INK));
    }

    #[test]
    fn huge_shapes_only_touch_the_surface() {
        let mut s = Surface::new(16, 16, WHITE);
        draw_segment(&mut s, Pos2::new(4.0, 4.0), Pos2::new(14.0, 4.0), 3000.0, INK);
        assert!(s.ink().pixels().all(|p| *p == INK));

        let mut s = Surface::new(16, 16, WHITE);
        stroke_circle(&mut s, Pos2::new(8.0, 8.0), 4000.0, 2.0, INK);
        assert!(s.ink().pixels().all(|p| *p == EMPTY_INK));

        let mut s = Surface::new(16, 16, WHITE);
        stamp_disc(&mut s, Pos2::new(1e6, 1e6), 1e3, INK);
        assert!(s.ink().pixels().all(|p| *p == EMPTY_INK));
    }

    #[test]
    fn clipping_keeps_visible_segments_unchanged() {
        let mut clipped = Surface::new(40, 20, WHITE);
        draw_segment(&mut clipped, Pos2::new(5.0, 10.0), Pos2::new(35.0, 10.0), 4.0, INK);
        let mut expected = Surface::new(40, 20, WHITE);
        for i in 0..=30 {
            stamp_disc(&mut expected, Pos2::new(5.0 + i as f32, 10.0), 2.0, INK);
        }
        assert_eq!(clipped.ink(), expected.ink());
    }

    #[test]
    fn spray_stays_inside_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        let offsets = spray_offsets(&mut rng, 30, 5.0);
        assert_eq!(offsets.len(), 30);
        assert!(offsets.iter().all(|o| o.length() <= 5.0 + 1e-4));
    }

    #[test]
    fn spray_density_favours_center() {
        let mut rng = StdRng::seed_from_u64(42);
        let offsets = spray_offsets(&mut rng, 20_000, 10.0);
        // Uniform-area sampling would put 25% inside r/2; radius-uniform puts ~50%.
        let inner = offsets.iter().filter(|o| o.length() <= 5.0).count() as f32;
        let share = inner / offsets.len() as f32;
        assert!(share > 0.45 && share < 0.55, "inner share {share}");
    }

    #[test]
    fn square_mark_scales_with_side() {
        let mut s = Surface::new(10, 10, WHITE);
        fill_square(&mut s, Pos2::new(2.0, 2.0), 3.0, INK);
        assert!(painted(&s, 4, 4));
        assert!(!painted(&s, 5, 5));
    }
}
