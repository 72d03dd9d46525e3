use canvas_protocol::PixelPoint;
use canvas_runtime::StrokePaint;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StrokeVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// Strokes thinner than one pixel still cover one pixel.
const MIN_HALF_WIDTH: f64 = 0.5;

/// Expands a polyline into triangle-list quads, one per segment, each
/// extended by half the stroke width at both ends so consecutive segments
/// overlap at the joint. A polyline whose points all coincide becomes a
/// single square dot.
pub fn push_polyline_quads(
    vertices: &mut Vec<StrokeVertex>,
    points: &[PixelPoint],
    paint: &StrokePaint,
) {
    let Some(first) = points.first() else {
        return;
    };
    let half_width = (paint.width / 2.0).max(MIN_HALF_WIDTH);
    let color = paint.color.to_f32_array();

    let mut emitted = false;
    for segment in points.windows(2) {
        let (start, end) = (segment[0], segment[1]);
        let (dx, dy) = (end.x - start.x, end.y - start.y);
        let length = (dx * dx + dy * dy).sqrt();
        if length == 0.0 {
            continue;
        }
        let (ux, uy) = (dx / length * half_width, dy / length * half_width);
        // Normal is the direction rotated a quarter turn.
        let (nx, ny) = (-uy, ux);
        let corners = [
            (start.x - ux - nx, start.y - uy - ny),
            (start.x - ux + nx, start.y - uy + ny),
            (end.x + ux + nx, end.y + uy + ny),
            (end.x + ux - nx, end.y + uy - ny),
        ];
        push_quad(vertices, corners, color);
        emitted = true;
    }

    if !emitted {
        let corners = [
            (first.x - half_width, first.y - half_width),
            (first.x - half_width, first.y + half_width),
            (first.x + half_width, first.y + half_width),
            (first.x + half_width, first.y - half_width),
        ];
        push_quad(vertices, corners, color);
    }
}

fn push_quad(vertices: &mut Vec<StrokeVertex>, corners: [(f64, f64); 4], color: [f32; 4]) {
    let vertex = |(x, y): (f64, f64)| StrokeVertex {
        position: [x as f32, y as f32],
        color,
    };
    let [a, b, c, d] = corners.map(vertex);
    vertices.extend_from_slice(&[a, b, c, a, c, d]);
}
