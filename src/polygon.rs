//! Polygon outline, scanline fill and centroid.

use alloc::vec::Vec;

use embedded_hal::digital::OutputPin;

use crate::refresh::Area;
use crate::{Amoled, DriverError, Error, Interface, Panel};

/// Default capacity of the per-scanline crossing list
pub const MAX_POLY_CORNERS: usize = 32;

/// A polygon vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Point { x, y }
    }
}

/// Area-weighted centroid of a closed polygon.
///
/// Returns `None` for an empty or zero-area polygon.
pub fn centroid(points: &[Point]) -> Option<Point> {
    let mut area = 0i128;
    let mut sx = 0i128;
    let mut sy = 0i128;

    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        let cross = a.x as i128 * b.y as i128 - a.y as i128 * b.x as i128;
        area += cross;
        sx += (a.x as i128 + b.x as i128) * cross;
        sy += (a.y as i128 + b.y as i128) * cross;
    }

    if area == 0 {
        return None;
    }
    let cx = i32::try_from(sx / (3 * area)).ok()?;
    let cy = i32::try_from(sy / (3 * area)).ok()?;
    Some(Point::new(cx, cy))
}

/// Vertices rotated by `angle` radians around `center`
fn transform(points: &[Point], angle: f32, center: Point) -> Option<Vec<(f32, f32)>> {
    let mut out = Vec::new();
    out.try_reserve_exact(points.len()).ok()?;

    if angle == 0.0 {
        out.extend(points.iter().map(|p| (p.x as f32, p.y as f32)));
        return Some(out);
    }

    let (sin, cos) = (libm::sinf(angle), libm::cosf(angle));
    let (cx, cy) = (center.x as f32, center.y as f32);
    out.extend(points.iter().map(|p| {
        let dx = p.x as f32 - cx;
        let dy = p.y as f32 - cy;
        (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
    }));
    Some(out)
}

fn bounds(points: &[(f32, f32)]) -> (i32, i32, i32, i32) {
    points.iter().fold(
        (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
        |(min_x, max_x, min_y, max_y), &(x, y)| {
            let (x, y) = (x as i32, y as i32);
            (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
        },
    )
}

/// Edges of the closed polygon crossing scanline `y`, as `x` positions
fn crossings(points: &[(f32, f32)], y: i32) -> impl Iterator<Item = i32> + '_ {
    let y = y as f32;
    let prev = points.len() - 1;
    points.iter().enumerate().filter_map(move |(i, &(xi, yi))| {
        let (xj, yj) = points[if i == 0 { prev } else { i - 1 }];
        if (yi < y && yj >= y) || (yj < y && yi >= y) {
            Some((xi + (y - yi) / (yj - yi) * (xj - xi)) as i32)
        } else {
            None
        }
    })
}

impl<IFACE, RESET, P> Amoled<IFACE, RESET, P>
where
    IFACE: Interface,
    RESET: OutputPin,
    P: Panel,
{
    /// Draw the open polyline through `points`, offset by `(x, y)`.
    pub fn polygon(
        &mut self,
        points: &[Point],
        x: i32,
        y: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        self.polygon_rotated(points, x, y, color, 0.0, Point::default())
    }

    /// Like [`polygon`](Self::polygon), with the vertices first rotated by
    /// `angle` radians around `center`.
    #[allow(clippy::too_many_arguments)]
    pub fn polygon_rotated(
        &mut self,
        points: &[Point],
        x: i32,
        y: i32,
        color: u16,
        angle: f32,
        center: Point,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if points.is_empty() {
            return Err(Error::PolygonData);
        }
        let work = transform(points, angle, center).ok_or(Error::OutOfMemory)?;

        self.batch(|d| {
            let at = |p: (f32, f32)| (p.0 as i32 + x, p.1 as i32 + y);
            let (sx, sy) = at(work[0]);
            let mut area = Area::point(sx, sy);
            for edge in work.windows(2) {
                let (x0, y0) = at(edge[0]);
                let (x1, y1) = at(edge[1]);
                area.include(x1, y1);
                d.line(x0, y0, x1, y1, color)?;
            }
            Ok(Some(area))
        })
    }

    /// Fill the closed polygon `points`, offset by `(x, y)`.
    pub fn fill_polygon(
        &mut self,
        points: &[Point],
        x: i32,
        y: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        self.fill_polygon_rotated(points, x, y, color, 0.0, Point::default())
    }

    /// Like [`fill_polygon`](Self::fill_polygon), with the vertices first
    /// rotated by `angle` radians around `center`.
    ///
    /// Fails with [`Error::PolygonTooComplex`] before drawing anything when a
    /// scanline crosses more edges than the configured corner capacity.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_polygon_rotated(
        &mut self,
        points: &[Point],
        x: i32,
        y: i32,
        color: u16,
        angle: f32,
        center: Point,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if points.is_empty() {
            return Err(Error::PolygonData);
        }
        let work = transform(points, angle, center).ok_or(Error::OutOfMemory)?;
        let (min_x, max_x, min_y, max_y) = bounds(&work);

        let corners = self.max_poly_corners;
        if (min_y..max_y).any(|row| crossings(&work, row).count() > corners) {
            return Err(Error::PolygonTooComplex { corners });
        }

        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(corners)
            .map_err(|_| Error::OutOfMemory)?;

        self.batch(|d| {
            for row in min_y..max_y {
                nodes.clear();
                nodes.extend(crossings(&work, row));
                nodes.sort_unstable();

                // an unpaired trailing crossing is dropped
                for pair in nodes.chunks_exact(2) {
                    let (from, to) = (pair[0], pair[1]);
                    if from >= max_x {
                        break;
                    }
                    if to > min_x {
                        let (from, to) = (from.max(min_x), to.min(max_x));
                        d.fast_hline(x + from, y + row, to - from + 1, color)?;
                    }
                }
            }
            Ok(Some(Area::new(min_x + x, min_y + y, max_x + x, max_y + y)))
        })
    }

    /// Centroid of the closed polygon `points`
    pub fn polygon_center(&self, points: &[Point]) -> Result<Point, DriverError<IFACE, RESET>> {
        centroid(points).ok_or(Error::PolygonData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::WHITE;
    use crate::mock::display;
    use crate::Rm67162;

    fn square(size: i32) -> [Point; 4] {
        [
            Point::new(0, 0),
            Point::new(size, 0),
            Point::new(size, size),
            Point::new(0, size),
        ]
    }

    #[test]
    fn centroid_of_square() {
        assert_eq!(centroid(&square(2)), Some(Point::new(1, 1)));
        let d = display(Rm67162);
        assert_eq!(d.polygon_center(&square(10)).unwrap(), Point::new(5, 5));
    }

    #[test]
    fn centroid_far_from_origin() {
        let base = 1_200_000_000;
        let far: Vec<Point> = square(10)
            .iter()
            .map(|p| Point::new(p.x + base, p.y + base))
            .collect();
        assert_eq!(centroid(&far), Some(Point::new(base + 5, base + 5)));
    }

    #[test]
    fn centroid_rejects_degenerate_input() {
        assert_eq!(centroid(&[]), None);
        let line = [Point::new(0, 0), Point::new(4, 4), Point::new(8, 8)];
        assert_eq!(centroid(&line), None);
        let d = display(Rm67162);
        assert!(matches!(d.polygon_center(&line), Err(Error::PolygonData)));
    }

    #[test]
    fn fill_polygon_offsets_and_flushes_once() {
        let mut d = display(Rm67162);
        d.interface.ops.clear();
        d.fill_polygon(&square(10), 5, 5, WHITE).unwrap();

        assert_eq!(d.interface.pixel_writes().len(), 1);
        assert_eq!(d.get_pixel(10, 10), Some(WHITE));
        assert_eq!(d.get_pixel(5, 6), Some(WHITE));
        assert_eq!(d.get_pixel(15, 14), Some(WHITE));
        assert_eq!(d.get_pixel(16, 10), Some(0));
        assert_eq!(d.get_pixel(10, 15), Some(0));
    }

    #[test]
    fn fill_polygon_checks_capacity_first() {
        let mut d = display(Rm67162);
        d.set_max_polygon_corners(1);
        d.interface.ops.clear();
        let result = d.fill_polygon(&square(10), 0, 0, WHITE);
        assert!(matches!(result, Err(Error::PolygonTooComplex { corners: 1 })));
        assert!(d.interface.ops.is_empty());
        assert!(d.framebuffer().iter().all(|&c| c == 0));
    }

    #[test]
    fn empty_polygon_is_rejected() {
        let mut d = display(Rm67162);
        assert!(matches!(d.polygon(&[], 0, 0, WHITE), Err(Error::PolygonData)));
        assert!(matches!(d.fill_polygon(&[], 0, 0, WHITE), Err(Error::PolygonData)));
    }

    #[test]
    fn outline_is_open_and_one_flush() {
        let mut d = display(Rm67162);
        d.interface.ops.clear();
        d.polygon(&square(10), 20, 20, WHITE).unwrap();
        assert_eq!(d.interface.pixel_writes().len(), 1);
        assert_eq!(d.get_pixel(25, 20), Some(WHITE));
        assert_eq!(d.get_pixel(30, 25), Some(WHITE));
        assert_eq!(d.get_pixel(25, 30), Some(WHITE));
        // the closing edge back to the first vertex is not drawn
        assert_eq!(d.get_pixel(20, 25), Some(0));
    }

    #[test]
    fn rotation_about_center() {
        let mut d = display(Rm67162);
        let bar = [Point::new(0, 0), Point::new(10, 0)];
        d.polygon_rotated(&bar, 50, 50, WHITE, core::f32::consts::FRAC_PI_2, Point::new(0, 0))
            .unwrap();
        assert_eq!(d.get_pixel(50, 55), Some(WHITE));
        assert_eq!(d.get_pixel(55, 50), Some(0));
    }
}
