use log::debug;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::enums::Orientation;
use crate::slice::SlicePlane;
use crate::volume::Spacing;

/// Largest resampled plane, in pixels (4096 x 4096).
pub(crate) const MAX_RESAMPLED_PIXELS: usize = 1 << 24;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Output `(width, height)` of a plane whose pixels are `min_spacing`
    /// wide along both axes, or `None` if that plane would exceed
    /// [`MAX_RESAMPLED_PIXELS`].
    pub(crate) fn isotropic_plane_dimensions(
        spacing: Spacing,
        orientation: Orientation,
        plane_dim: (usize, usize),
    ) -> Option<(usize, usize)> {
        let (width, height) = plane_dim;
        let (column_spacing, row_spacing) = spacing.in_plane(orientation);
        let inv_min_spacing = 1.0 / f64::from(spacing.min());

        let new_width = (width as f64 * f64::from(column_spacing) * inv_min_spacing).round();
        let new_height = (height as f64 * f64::from(row_spacing) * inv_min_spacing).round();

        let pixels = new_width * new_height;
        if !pixels.is_finite() || pixels > MAX_RESAMPLED_PIXELS as f64 {
            debug!(
                "skipping resample of {} plane to {new_width}x{new_height}",
                orientation.name()
            );
            return None;
        }

        Some(((new_width as usize).max(1), (new_height as usize).max(1)))
    }

    /// Bilinear resample of `plane` to `width x height`, using pixel centres
    /// and clamping at the edges.
    pub(crate) fn resample_plane(plane: &SlicePlane, width: usize, height: usize) -> SlicePlane {
        if (width, height) == (plane.width(), plane.height()) {
            return plane.clone();
        }
        let source = plane.data().view();
        let (slice_height, slice_width) = source.dim();

        let pixel_data: Vec<f32> = (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..width).map(move |x| {
                    let norm_x = (x as f32 + 0.5) / width as f32;
                    let norm_y = (y as f32 + 0.5) / height as f32;

                    let src_x = norm_x * slice_width as f32 - 0.5;
                    let src_y = norm_y * slice_height as f32 - 0.5;

                    let src_x = src_x.clamp(0.0, (slice_width - 1) as f32);
                    let src_y = src_y.clamp(0.0, (slice_height - 1) as f32);

                    Self::bilinear_interpolate(&source, src_y, src_x)
                })
            })
            .collect();

        // width * height values by construction
        let data = Array2::from_shape_vec((height, width), pixel_data)
            .unwrap_or_else(|_| Array2::zeros((height, width)));
        SlicePlane::from_array(plane.orientation, data)
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::extract_slice;
    use crate::volume::VolumeBuffer;
    use approx::assert_abs_diff_eq;

    #[test]
    fn thick_slices_stretch_rows() {
        let spacing = Spacing::new(0.5, 0.5, 2.0).unwrap();
        let dim = Interpolator::isotropic_plane_dimensions(spacing, Orientation::Coronal, (8, 4));
        assert_eq!(dim, Some((8, 16)));
        let axial = Interpolator::isotropic_plane_dimensions(spacing, Orientation::Axial, (8, 8));
        assert_eq!(axial, Some((8, 8)));
    }

    #[test]
    fn extreme_spacing_exceeds_pixel_budget() {
        let tiny = Spacing::new(1e-6, 1.0, 1.0).unwrap();
        assert_eq!(
            Interpolator::isotropic_plane_dimensions(tiny, Orientation::Sagittal, (256, 200)),
            None
        );
        let tinier = Spacing::new(1e-40, 1.0, 1.0).unwrap();
        assert_eq!(
            Interpolator::isotropic_plane_dimensions(tinier, Orientation::Coronal, (4, 4)),
            None
        );
    }

    #[test]
    fn resample_preserves_constant_plane() {
        let volume = VolumeBuffer::new(vec![7.0; 27], (3, 3, 3), None).unwrap();
        let plane = extract_slice(Some(&volume), Orientation::Sagittal, 1).unwrap();
        let resampled = Interpolator::resample_plane(&plane, 3, 9);
        assert_eq!((resampled.width(), resampled.height()), (3, 9));
        for value in resampled.data() {
            assert_abs_diff_eq!(*value, 7.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn bilinear_midpoint() {
        let plane = ndarray::array![[0.0_f32, 10.0], [20.0, 30.0]];
        let value = Interpolator::bilinear_interpolate(&plane.view(), 0.5, 0.5);
        assert_abs_diff_eq!(value, 15.0, epsilon = 1e-5);
    }
}
