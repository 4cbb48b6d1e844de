// SPDX-FileCopyrightText: © 2025 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Error::Alignment;
use crate::Result;

use super::model::Point;
use imageproc::geometric_transformations::Projection;

/// Five landmark positions of a canonical face in a 512x512 crop.
/// Same landmark order as `DetectedFace::landmarks`.
pub const FACE_TEMPLATE_512: [Point; 5] = [
    Point::new(192.98138, 239.94708),
    Point::new(318.90277, 240.1936),
    Point::new(256.63416, 314.01935),
    Point::new(201.26117, 371.41043),
    Point::new(313.08905, 371.15118),
];

/// Face template scaled for crops of `face_size` pixels.
pub fn face_template(face_size: u32) -> [Point; 5] {
    let scale = face_size as f32 / 512.0;
    FACE_TEMPLATE_512.map(|p| Point::new(p.x * scale, p.y * scale))
}

/// A 2x3 affine transform mapping source pixel coordinates to destination pixel coordinates.
///
/// ```text
/// | x' |   | a b c |   | x |
/// | y' | = | d e f | * | y |
///                      | 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub m: [[f32; 3]; 2],
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    pub fn new(m: [[f32; 3]; 2]) -> Self {
        Self { m }
    }

    pub fn apply(&self, p: Point) -> Point {
        let [[a, b, c], [d, e, f]] = self.m;
        Point::new(a * p.x + b * p.y + c, d * p.x + e * p.y + f)
    }

    pub fn invert(&self) -> Result<Affine> {
        let [[a, b, c], [d, e, f]] = self.m;
        let det = a * e - b * d;
        if det.abs() < f32::EPSILON {
            return Err(Alignment(format!("affine transform is singular: {:?}", self.m)));
        }
        let (ia, ib, id, ie) = (e / det, -b / det, -d / det, a / det);
        Ok(Affine::new([
            [ia, ib, -(ia * c + ib * f)],
            [id, ie, -(id * c + ie * f)],
        ]))
    }

    /// Multiplies every coefficient, translation included, by `factor`.
    pub fn scale(&self, factor: f32) -> Affine {
        Affine::new(self.m.map(|row| row.map(|v| v * factor)))
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Affine {
        let mut m = self.m;
        m[0][2] += dx;
        m[1][2] += dy;
        Affine::new(m)
    }

    pub fn to_projection(&self) -> Result<Projection> {
        let [[a, b, c], [d, e, f]] = self.m;
        Projection::from_matrix([a, b, c, d, e, f, 0.0, 0.0, 1.0])
            .ok_or_else(|| Alignment(format!("affine transform is singular: {:?}", self.m)))
    }

    /// Least-squares similarity transform (rotation, uniform scale, translation)
    /// mapping each `src` point onto the matching `dst` point.
    pub fn estimate_similarity(src: &[Point], dst: &[Point]) -> Result<Affine> {
        if src.len() != dst.len() || src.len() < 2 {
            return Err(Alignment(format!(
                "need at least two matching points, got {} and {}",
                src.len(),
                dst.len()
            )));
        }

        let n = src.len() as f64;
        let mean = |points: &[Point]| {
            let (sx, sy) = points
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
            (sx / n, sy / n)
        };
        let (xm, ym) = mean(src);
        let (um, vm) = mean(dst);

        let (mut num_a, mut num_b, mut denom) = (0.0, 0.0, 0.0);
        for (s, d) in src.iter().zip(dst) {
            let (x, y) = (s.x as f64 - xm, s.y as f64 - ym);
            let (u, v) = (d.x as f64 - um, d.y as f64 - vm);
            num_a += x * u + y * v;
            num_b += x * v - y * u;
            denom += x * x + y * y;
        }

        if denom < f64::EPSILON {
            return Err(Alignment("source points are coincident".into()));
        }

        let a = num_a / denom;
        let b = num_b / denom;
        let tx = um - (a * xm - b * ym);
        let ty = vm - (b * xm + a * ym);

        Ok(Affine::new([
            [a as f32, -b as f32, tx as f32],
            [b as f32, a as f32, ty as f32],
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `second` applied after `first`.
    fn compose(second: &Affine, first: &Affine) -> Affine {
        let [[a, b, c], [d, e, f]] = second.m;
        let [[a2, b2, c2], [d2, e2, f2]] = first.m;
        Affine::new([
            [a * a2 + b * d2, a * b2 + b * e2, a * c2 + b * f2 + c],
            [d * a2 + e * d2, d * b2 + e * e2, d * c2 + e * f2 + f],
        ])
    }

    fn assert_close(a: &Affine, b: &Affine) {
        for (ra, rb) in a.m.iter().zip(b.m.iter()) {
            for (va, vb) in ra.iter().zip(rb.iter()) {
                assert!((va - vb).abs() < 1e-3, "{:?} != {:?}", a.m, b.m);
            }
        }
    }

    #[test]
    fn estimate_recovers_known_similarity() {
        let angle: f32 = 0.3;
        let scale: f32 = 1.7;
        let expected = Affine::new([
            [scale * angle.cos(), -scale * angle.sin(), 40.0],
            [scale * angle.sin(), scale * angle.cos(), -12.5],
        ]);

        let src = FACE_TEMPLATE_512;
        let dst = src.map(|p| expected.apply(p));

        let estimated = Affine::estimate_similarity(&src, &dst).unwrap();
        assert_close(&estimated, &expected);
    }

    #[test]
    fn estimate_maps_template_onto_itself() {
        let estimated =
            Affine::estimate_similarity(&FACE_TEMPLATE_512, &FACE_TEMPLATE_512).unwrap();
        assert_close(&estimated, &Affine::IDENTITY);
    }

    #[test]
    fn estimate_rejects_degenerate_points() {
        let src = [Point::new(5.0, 5.0); 5];
        assert!(Affine::estimate_similarity(&src, &FACE_TEMPLATE_512).is_err());
        assert!(Affine::estimate_similarity(&src[..1], &FACE_TEMPLATE_512[..1]).is_err());
    }

    #[test]
    fn inverse_composes_to_identity() {
        let m = Affine::new([[0.8, -0.4, 17.0], [0.4, 0.8, -3.0]]);
        let inverse = m.invert().unwrap();
        assert_close(&compose(&inverse, &m), &Affine::IDENTITY);
        assert_close(&compose(&m, &inverse), &Affine::IDENTITY);
    }

    #[test]
    fn singular_transform_has_no_inverse() {
        let m = Affine::new([[1.0, 2.0, 0.0], [2.0, 4.0, 0.0]]);
        assert!(m.invert().is_err());
    }

    #[test]
    fn scale_and_translate() {
        let m = Affine::new([[1.0, 0.0, 2.0], [0.0, 1.0, 3.0]])
            .scale(2.0)
            .translate(1.0, 1.0);
        assert_eq!(m.m, [[2.0, 0.0, 5.0], [0.0, 2.0, 7.0]]);
    }

    #[test]
    fn template_scales_with_face_size() {
        let t = face_template(256);
        assert!((t[2].x - 128.31708).abs() < 1e-3);
        assert!((t[2].y - 157.00967).abs() < 1e-3);
    }
}
