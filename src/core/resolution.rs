use crate::types::{SwathError, SwathResult};

/// How the swath area behind a resolution estimate was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaMethod {
    /// Gauss shoelace formula over the projected perimeter polygon
    Shoelace,
    /// Bounding-box approximation, used when the perimeter self-intersects
    BoundingBox,
}

/// Square cell size derived from swath area and native pixel count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionEstimate {
    /// Cell side length in target CRS units
    pub cell_size: f64,
    pub method: AreaMethod,
}

/// Estimate a square cell size that preserves the swath's native sampling
/// density: the projected swath area divided across rows x cols pixels.
///
/// The perimeter must already be projected into the target CRS. A
/// self-intersecting perimeter polygon is recoverable: the area falls back
/// to the perimeter's bounding box and the estimate records that method so
/// callers can attach a diagnostic.
pub fn estimate_cell_size(
    projected_perimeter: &[(f64, f64)],
    rows: usize,
    cols: usize,
) -> SwathResult<ResolutionEstimate> {
    if projected_perimeter.len() < 3 {
        return Err(SwathError::InvalidGeometry(format!(
            "cannot derive a resolution from {} projected perimeter points",
            projected_perimeter.len()
        )));
    }

    let pixel_count = (rows * cols) as f64;
    if pixel_count == 0.0 {
        return Err(SwathError::InvalidGeometry(
            "cannot derive a resolution for an empty swath".to_string(),
        ));
    }

    let (area, method) = if is_simple_polygon(projected_perimeter) {
        (shoelace_area(projected_perimeter), AreaMethod::Shoelace)
    } else {
        log::warn!(
            "Projected perimeter self-intersects, falling back to bounding-box area"
        );
        (
            bounding_box_area(projected_perimeter),
            AreaMethod::BoundingBox,
        )
    };

    if area <= 0.0 || !area.is_finite() {
        return Err(SwathError::InvalidGeometry(format!(
            "projected swath area {} cannot yield a resolution",
            area
        )));
    }

    let cell_size = (area / pixel_count).sqrt();
    log::debug!(
        "Estimated cell size {} from area {} over {} pixels ({:?})",
        cell_size,
        area,
        pixel_count,
        method
    );

    Ok(ResolutionEstimate { cell_size, method })
}

/// Unsigned polygon area by the Gauss shoelace formula
pub fn shoelace_area(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    let mut doubled = 0.0;

    for i in 0..n {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % n];
        doubled += x0 * y1 - x1 * y0;
    }

    doubled.abs() / 2.0
}

fn bounding_box_area(points: &[(f64, f64)]) -> f64 {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    (x_max - x_min) * (y_max - y_min)
}

/// Whether the closed polygon has no properly-crossing edge pair.
///
/// Quadratic over perimeter edges; perimeters are boundary-only samples so
/// the edge count stays small relative to the swath size.
fn is_simple_polygon(points: &[(f64, f64)]) -> bool {
    let n = points.len();

    for i in 0..n {
        for j in (i + 1)..n {
            // Edges sharing an endpoint (neighbours in the closed loop)
            // touch by construction.
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }

            let a = points[i];
            let b = points[(i + 1) % n];
            let c = points[j];
            let d = points[(j + 1) % n];

            if segments_properly_intersect(a, b, c, d) {
                return false;
            }
        }
    }

    true
}

fn segments_properly_intersect(
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
    d: (f64, f64),
) -> bool {
    let orient_abc = orientation(a, b, c);
    let orient_abd = orientation(a, b, d);
    let orient_cda = orientation(c, d, a);
    let orient_cdb = orientation(c, d, b);

    orient_abc * orient_abd < 0.0 && orient_cda * orient_cdb < 0.0
}

fn orientation(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shoelace_unit_square() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        assert_relative_eq!(shoelace_area(&square), 1.0);
    }

    #[test]
    fn test_estimate_preserves_sampling_density() {
        // A 10 x 10 unit swath across 4 x 5 pixels: each cell covers
        // 100 / 20 = 5 square units, side sqrt(5).
        let square = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let estimate = estimate_cell_size(&square, 4, 5).unwrap();

        assert_eq!(estimate.method, AreaMethod::Shoelace);
        assert_relative_eq!(estimate.cell_size, 5.0_f64.sqrt());
    }

    #[test]
    fn test_self_intersecting_falls_back_to_bounding_box() {
        // Bowtie: edges (0,0)-(2,2) and (2,0)-(0,2) cross at (1,1).
        let bowtie = [(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0)];
        let estimate = estimate_cell_size(&bowtie, 2, 2).unwrap();

        assert_eq!(estimate.method, AreaMethod::BoundingBox);
        assert_relative_eq!(estimate.cell_size, 1.0);
    }

    #[test]
    fn test_too_few_points_rejected() {
        let result = estimate_cell_size(&[(0.0, 0.0), (1.0, 1.0)], 2, 2);
        assert!(matches!(result, Err(SwathError::InvalidGeometry(_))));
    }

    #[test]
    fn test_collinear_perimeter_rejected() {
        let line = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
        let result = estimate_cell_size(&line, 2, 2);
        assert!(matches!(result, Err(SwathError::InvalidGeometry(_))));
    }

    #[test]
    fn test_dense_convex_perimeter_is_simple() {
        // Circle sampled densely, as a real swath perimeter would be.
        let circle: Vec<(f64, f64)> = (0..64)
            .map(|i| {
                let theta = i as f64 / 64.0 * std::f64::consts::TAU;
                (theta.cos(), theta.sin())
            })
            .collect();

        let estimate = estimate_cell_size(&circle, 8, 8).unwrap();
        assert_eq!(estimate.method, AreaMethod::Shoelace);
        // Area of the inscribed 64-gon is just under pi.
        assert!(estimate.cell_size < (std::f64::consts::PI / 64.0).sqrt());
        assert!(estimate.cell_size > (3.0_f64 / 64.0).sqrt());
    }
}
