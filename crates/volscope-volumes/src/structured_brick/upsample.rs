//! Region resampling for sources coarser than the volume grid.
//!
//! A region written with a `scaleFactor` is stretched onto the grid before
//! it is scattered: its extent and origin are multiplied by the factor and
//! the voxels are resampled into a scratch buffer. Only upsampling is
//! supported.

use std::borrow::Cow;

use glam::{IVec3, Vec3};
use rayon::prelude::*;
use volscope_core::{Result, VolscopeError};
use volscope_native::VoxelType;

/// Interpolation used when stretching a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsampleFilter {
    /// Repeat the nearest source voxel.
    #[default]
    Nearest,
    /// Trilinear interpolation with the corner voxels aligned.
    Linear,
}

impl UpsampleFilter {
    /// Parses the `upsampleFilter` parameter spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nearest" => Some(Self::Nearest),
            "linear" => Some(Self::Linear),
            _ => None,
        }
    }

    /// Returns the `upsampleFilter` parameter spelling.
    pub fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
        }
    }
}

/// A region ready to be scattered into brick storage.
#[derive(Debug)]
pub struct Region<'a> {
    /// Voxel bytes, x fastest. Owned when the region was resampled.
    pub data: Cow<'a, [u8]>,
    /// First voxel of the region in volume coordinates.
    pub origin: IVec3,
    /// Region shape in voxels.
    pub extent: IVec3,
}

impl Region<'_> {
    /// Returns whether the data lives in a resampling scratch buffer.
    pub fn is_resampled(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }

    /// Number of (y, z) scanlines in the region.
    #[allow(clippy::cast_sign_loss)]
    pub fn scanlines(&self) -> usize {
        self.extent.y as usize * self.extent.z as usize
    }
}

/// Returns the factor to resample by, or `None` when resampling is off.
///
/// A factor with any component `<= 0` disables resampling, as does a factor
/// of exactly one. Components in `(0, 1)` would downsample and are rejected.
pub fn effective_scale(factor: Vec3) -> Result<Option<Vec3>> {
    if factor.cmple(Vec3::ZERO).any() || factor == Vec3::ONE {
        return Ok(None);
    }
    if factor.cmplt(Vec3::ONE).any() || !factor.is_finite() {
        return Err(VolscopeError::InvalidArgument(format!(
            "scale factor {factor} would downsample; only upsampling is supported"
        )));
    }
    Ok(Some(factor))
}

/// Stretches a region by `factor`, borrowing `source` when no resampling applies.
///
/// `source` must hold exactly `extent` voxels of `voxel_type`.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn scale_region<'a>(
    source: &'a [u8],
    voxel_type: VoxelType,
    origin: IVec3,
    extent: IVec3,
    factor: Vec3,
    filter: UpsampleFilter,
) -> Result<Region<'a>> {
    let Some(factor) = effective_scale(factor)? else {
        return Ok(Region {
            data: Cow::Borrowed(source),
            origin,
            extent,
        });
    };

    let target_extent = (extent.as_vec3() * factor).floor();
    let target_origin = (origin.as_vec3() * factor).floor();
    if target_extent.max_element() > i32::MAX as f32
        || target_origin.abs().max_element() > i32::MAX as f32
    {
        return Err(VolscopeError::InvalidArgument(format!(
            "region {extent} at {origin} scaled by {factor} does not fit the grid"
        )));
    }
    let target_extent = target_extent.as_ivec3();
    let target_origin = target_origin.as_ivec3();

    let voxel_size = voxel_type.size();
    let bytes = (target_extent.x as usize)
        .checked_mul(target_extent.y as usize)
        .and_then(|n| n.checked_mul(target_extent.z as usize))
        .and_then(|n| n.checked_mul(voxel_size))
        .ok_or_else(|| {
            VolscopeError::InvalidArgument(format!("upsampled region {target_extent} is too large"))
        })?;

    log::debug!(
        "upsampling region {extent} at {origin} to {target_extent} at {target_origin} ({} filter)",
        filter.name()
    );

    let mut scratch = vec![0_u8; bytes];
    let source = SourceGrid {
        data: source,
        extent,
        voxel_type,
    };
    match filter {
        UpsampleFilter::Nearest => source.fill_nearest(&mut scratch, target_extent, factor),
        UpsampleFilter::Linear => source.fill_linear(&mut scratch, target_extent),
    }

    Ok(Region {
        data: Cow::Owned(scratch),
        origin: target_origin,
        extent: target_extent,
    })
}

struct SourceGrid<'a> {
    data: &'a [u8],
    extent: IVec3,
    voxel_type: VoxelType,
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, clippy::cast_precision_loss)]
impl SourceGrid<'_> {
    fn offset(&self, x: usize, y: usize, z: usize) -> usize {
        let (ex, ey) = (self.extent.x as usize, self.extent.y as usize);
        ((z * ey + y) * ex + x) * self.voxel_type.size()
    }

    fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        let offset = self.offset(x, y, z);
        self.voxel_type
            .decode(&self.data[offset..offset + self.voxel_type.size()])
    }

    fn fill_nearest(&self, out: &mut [u8], target: IVec3, factor: Vec3) {
        let nearest = |t: i32, e: i32, f: f32| -> Vec<usize> {
            (0..t)
                .map(|i| ((i as f32 / f).floor() as usize).min(e as usize - 1))
                .collect()
        };
        let (xs, ys, zs) = (
            nearest(target.x, self.extent.x, factor.x),
            nearest(target.y, self.extent.y, factor.y),
            nearest(target.z, self.extent.z, factor.z),
        );

        let size = self.voxel_type.size();
        let row_len = xs.len() * size;
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, dst)| {
                let (sy, sz) = (ys[row % ys.len()], zs[row / ys.len()]);
                for (voxel, &sx) in dst.chunks_exact_mut(size).zip(&xs) {
                    let offset = self.offset(sx, sy, sz);
                    voxel.copy_from_slice(&self.data[offset..offset + size]);
                }
            });
    }

    fn fill_linear(&self, out: &mut [u8], target: IVec3) {
        // align-corners: first and last target voxels land on the source ends
        let taps = |t: i32, e: i32| -> Vec<(usize, usize, f32)> {
            let last = e as usize - 1;
            let step = if t > 1 { last as f32 / (t - 1) as f32 } else { 0.0 };
            (0..t)
                .map(|i| {
                    let s = i as f32 * step;
                    let i0 = (s.floor() as usize).min(last);
                    (i0, (i0 + 1).min(last), s - i0 as f32)
                })
                .collect()
        };
        let (xs, ys, zs) = (
            taps(target.x, self.extent.x),
            taps(target.y, self.extent.y),
            taps(target.z, self.extent.z),
        );

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let size = self.voxel_type.size();
        let row_len = xs.len() * size;
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, dst)| {
                let (y0, y1, fy) = ys[row % ys.len()];
                let (z0, z1, fz) = zs[row / ys.len()];
                for (voxel, &(x0, x1, fx)) in dst.chunks_exact_mut(size).zip(&xs) {
                    let edge = |y, z| lerp(self.value(x0, y, z), self.value(x1, y, z), fx);
                    let face = |z| lerp(edge(y0, z), edge(y1, z), fy);
                    self.voxel_type.encode(lerp(face(z0), face(z1), fz), voxel);
                }
            });
    }
}
