use std::f32::consts::TAU;

use image::{
    Rgba, RgbaImage,
    imageops::{self, FilterType},
};
use imageproc::{
    drawing::{
        draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut,
        draw_line_segment_mut, draw_polygon_mut,
    },
    point::Point,
    rect::Rect,
};

use super::{Color, DrawCommand};

/// Arcs and oversized ellipses are drawn as polygons with at most this many edges.
const MAX_ARC_STEPS: f32 = 256.0;

/// Applies `commands` in order onto `surface`. `sprite` backs [`DrawCommand::Sprite`];
/// sprite commands are skipped when it is missing.
pub fn render(surface: &mut RgbaImage, commands: &[DrawCommand], sprite: Option<&RgbaImage>) {
    for command in commands {
        match *command {
            DrawCommand::Disc {
                center,
                radius,
                color,
            } => fill_ellipse(surface, center, radius, radius, color),
            DrawCommand::Ring {
                center,
                radius,
                thickness,
                color,
            } => draw_arc(surface, center, radius, 0.0, TAU, thickness, color),
            DrawCommand::Arc {
                center,
                radius,
                start,
                end,
                thickness,
                color,
            } => {
                let sweep = (end - start).clamp(0.0, TAU);
                draw_arc(surface, center, radius, start, sweep, thickness, color)
            }
            DrawCommand::Segment {
                from,
                to,
                thickness,
                color,
            } => draw_segment(surface, from, to, thickness, color),
            DrawCommand::Ellipse {
                center,
                radius_x,
                radius_y,
                color,
            } => fill_ellipse(surface, center, radius_x, radius_y, color),
            DrawCommand::Rect {
                origin,
                width,
                height,
                color,
            } => {
                if width >= 1.0 && height >= 1.0 {
                    let rect = Rect::at(origin.0.round() as i32, origin.1.round() as i32)
                        .of_size(width.round() as u32, height.round() as u32);
                    draw_filled_rect_mut(surface, rect, Rgba(color));
                }
            }
            DrawCommand::Sprite { center, width } => {
                if let Some(sprite) = sprite {
                    draw_sprite(surface, sprite, center, width);
                }
            }
        }
    }
}

/// Mirrors the surface so the output reads like a mirror to the person in front of the
/// camera.
pub fn mirror(surface: &mut RgbaImage) {
    imageops::flip_horizontal_in_place(surface);
}

fn arc_steps(sweep: f32, radius: f32) -> usize {
    (sweep.abs() * radius / 4.0).ceil().clamp(8.0, MAX_ARC_STEPS) as usize
}

fn outside(surface: &RgbaImage, min: (f32, f32), max: (f32, f32)) -> bool {
    max.0 < 0.0
        || max.1 < 0.0
        || min.0 >= surface.width() as f32
        || min.1 >= surface.height() as f32
}

/// Strokes a circular arc as a strip of quads, one per step of the sweep.
fn draw_arc(
    surface: &mut RgbaImage,
    center: (f32, f32),
    radius: f32,
    start: f32,
    sweep: f32,
    thickness: f32,
    color: Color,
) {
    let half = thickness.max(1.0) / 2.0;
    let (inner, outer) = ((radius - half).max(0.0), radius + half);
    if outside(
        surface,
        (center.0 - outer, center.1 - outer),
        (center.0 + outer, center.1 + outer),
    ) {
        return;
    }
    let steps = arc_steps(sweep, outer);
    let at = |r: f32, angle: f32| (center.0 + r * angle.cos(), center.1 + r * angle.sin());
    for i in 0..steps {
        let a0 = start + sweep * i as f32 / steps as f32;
        let a1 = start + sweep * (i + 1) as f32 / steps as f32;
        fill_polygon(
            surface,
            &[at(inner, a0), at(outer, a0), at(outer, a1), at(inner, a1)],
            color,
        );
    }
}

fn draw_segment(
    surface: &mut RgbaImage,
    from: (f32, f32),
    to: (f32, f32),
    thickness: f32,
    color: Color,
) {
    let half = thickness / 2.0;
    if half < 1.0 {
        draw_line_segment_mut(surface, from, to, Rgba(color));
        return;
    }
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length > f32::EPSILON {
        let (nx, ny) = (-dy / length * half, dx / length * half);
        fill_polygon(
            surface,
            &[
                (from.0 + nx, from.1 + ny),
                (to.0 + nx, to.1 + ny),
                (to.0 - nx, to.1 - ny),
                (from.0 - nx, from.1 - ny),
            ],
            color,
        );
    }
    // Round caps.
    fill_ellipse(surface, from, half, half, color);
    fill_ellipse(surface, to, half, half, color);
}

fn fill_ellipse(
    surface: &mut RgbaImage,
    center: (f32, f32),
    radius_x: f32,
    radius_y: f32,
    color: Color,
) {
    if radius_x <= 0.0 || radius_y <= 0.0 {
        return;
    }
    if outside(
        surface,
        (center.0 - radius_x, center.1 - radius_y),
        (center.0 + radius_x, center.1 + radius_y),
    ) {
        return;
    }

    // imageproc walks every span of the full shape, so anything larger than the surface
    // goes through the clipped polygon fill instead.
    let largest = surface.width().max(surface.height()) as f32;
    if radius_x.max(radius_y) > largest {
        let steps = arc_steps(TAU, radius_x.max(radius_y));
        let outline: Vec<(f32, f32)> = (0..steps)
            .map(|i| {
                let angle = TAU * i as f32 / steps as f32;
                (
                    center.0 + radius_x * angle.cos(),
                    center.1 + radius_y * angle.sin(),
                )
            })
            .collect();
        fill_polygon(surface, &outline, color);
        return;
    }

    let origin = (center.0.round() as i32, center.1.round() as i32);
    let (rx, ry) = (radius_x.round() as i32, radius_y.round() as i32);
    if rx == ry {
        draw_filled_circle_mut(surface, origin, rx, Rgba(color));
    } else {
        draw_filled_ellipse_mut(surface, origin, rx, ry, Rgba(color));
    }
}

/// Fills an open polygon. Polygons entirely off the surface, or that collapse below three
/// distinct pixels, are skipped.
fn fill_polygon(surface: &mut RgbaImage, points: &[(f32, f32)], color: Color) {
    let (min, max) = points.iter().fold(
        ((f32::MAX, f32::MAX), (f32::MIN, f32::MIN)),
        |(min, max), &(x, y)| ((min.0.min(x), min.1.min(y)), (max.0.max(x), max.1.max(y))),
    );
    if outside(surface, min, max) {
        return;
    }

    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let point = Point::new(x.round() as i32, y.round() as i32);
        if polygon.last() != Some(&point) {
            polygon.push(point);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() < 3 {
        return;
    }
    draw_polygon_mut(surface, &polygon, Rgba(color));
}

fn draw_sprite(surface: &mut RgbaImage, sprite: &RgbaImage, center: (f32, f32), width: f32) {
    if sprite.width() == 0 || width < 1.0 {
        return;
    }
    let target_w = width.round() as u32;
    let target_h =
        ((sprite.height() as f32 * width / sprite.width() as f32).round() as u32).max(1);
    let scaled = imageops::resize(sprite, target_w, target_h, FilterType::Triangle);
    let left = (center.0 - target_w as f32 / 2.0).round() as i64;
    let top = (center.1 - target_h as f32 / 2.0).round() as i64;
    imageops::overlay(surface, &scaled, left, top);
}
