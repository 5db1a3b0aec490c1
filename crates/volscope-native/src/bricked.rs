//! Ghost-padded bricked voxel storage and sampling.
//!
//! The volume is split into bricks of `BRICK_SIZE³` voxels. Each brick is
//! stored with one extra ghost layer on its upper faces, holding a copy of
//! the first voxels of the neighbouring bricks. A trilinear lookup whose base
//! corner lies in a brick therefore never has to leave that brick.
//!
//! Bricks are allocated the first time a region write touches them. Voxels
//! that were never written read as zero.
//!
//! Region writes go through `&self` so that disjoint regions can be streamed
//! in from several threads at once. Each global voxel owns its own set of
//! storage slots (its primary slot plus its ghost copies), so writes to
//! different voxels never touch the same bytes. Writing the same voxel from
//! two threads at once is a caller error with an unspecified result.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use glam::{Affine3A, IVec3, Vec3, Vec4};
use volscope_core::{Result, VolscopeError};

use crate::kernel::{AdaptiveSampling, ClipBox, KernelSettings, VolumeKernel};
use crate::transfer_function::TransferFunction;
use crate::voxel_type::VoxelType;

/// log2 of the brick edge length.
pub const BRICK_BITS: i32 = 3;

/// Brick edge length in voxels.
pub const BRICK_SIZE: i32 = 1 << BRICK_BITS;

/// Ghost voxels replicated on the upper face of each brick, per axis.
pub const GHOST_WIDTH: i32 = 1;

#[allow(clippy::cast_sign_loss)]
const STORED_EDGE: usize = (BRICK_SIZE + GHOST_WIDTH) as usize;
const STORED_VOXELS: usize = STORED_EDGE * STORED_EDGE * STORED_EDGE;
const MAX_VOXEL_SIZE: usize = 8;

type BrickData = Box<[AtomicU8]>;

/// CPU kernel for structured volumes stored in ghost-padded bricks.
pub struct BrickedKernel {
    voxel_type: VoxelType,
    dims: IVec3,
    brick_grid: IVec3,
    bricks: Box<[OnceLock<BrickData>]>,
    grid_origin: Vec3,
    grid_spacing: Vec3,
    settings: KernelSettings,
}

impl fmt::Debug for BrickedKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrickedKernel")
            .field("voxel_type", &self.voxel_type)
            .field("dims", &self.dims)
            .field("brick_grid", &self.brick_grid)
            .field("populated_bricks", &self.populated_bricks())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
impl BrickedKernel {
    /// Creates the storage for a volume of `dims` voxels of `voxel_type`.
    pub fn new(voxel_type: VoxelType, dims: IVec3) -> Result<Self> {
        if dims.cmple(IVec3::ZERO).any() {
            return Err(VolscopeError::InvalidDimensions(dims));
        }

        let bricks_along = |n: i32| (n - 1) / BRICK_SIZE + 1;
        let brick_grid = IVec3::new(
            bricks_along(dims.x),
            bricks_along(dims.y),
            bricks_along(dims.z),
        );
        let brick_count = (brick_grid.x as usize)
            .checked_mul(brick_grid.y as usize)
            .and_then(|n| n.checked_mul(brick_grid.z as usize))
            .ok_or_else(|| {
                VolscopeError::InvalidArgument(format!("volume of {dims} voxels is too large"))
            })?;

        log::debug!(
            "bricked kernel: {dims} {voxel_type} voxels in {brick_grid} bricks of {BRICK_SIZE}³"
        );

        Ok(Self {
            voxel_type,
            dims,
            brick_grid,
            bricks: (0..brick_count).map(|_| OnceLock::new()).collect(),
            grid_origin: Vec3::ZERO,
            grid_spacing: Vec3::ONE,
            settings: KernelSettings::default(),
        })
    }

    /// Returns the voxel type.
    pub fn voxel_type(&self) -> VoxelType {
        self.voxel_type
    }

    /// Returns the volume dimensions in voxels.
    pub fn dimensions(&self) -> IVec3 {
        self.dims
    }

    /// Returns the number of bricks along each axis.
    pub fn brick_grid(&self) -> IVec3 {
        self.brick_grid
    }

    /// Returns how many bricks have been allocated by region writes.
    pub fn populated_bricks(&self) -> usize {
        self.bricks.iter().filter(|b| b.get().is_some()).count()
    }

    /// Returns whether a region lies entirely inside the volume.
    pub fn contains_region(&self, origin: IVec3, extent: IVec3) -> bool {
        let fits = |o: i32, e: i32, d: i32| o >= 0 && o.checked_add(e).is_some_and(|end| end <= d);
        fits(origin.x, extent.x, self.dims.x)
            && fits(origin.y, extent.y, self.dims.y)
            && fits(origin.z, extent.z, self.dims.z)
    }

    /// Places the voxel grid in object space.
    pub fn set_grid(&mut self, origin: Vec3, spacing: Vec3) {
        self.grid_origin = origin;
        self.grid_spacing = spacing;
    }

    /// Copies one scanline of a region into brick storage.
    ///
    /// `source` holds the whole region in x-fastest order with `extent`
    /// voxels. Task `task_index` copies the scanline at
    /// `y = task_index % extent.y`, `z = task_index / extent.y`. Voxels
    /// outside the volume are skipped.
    pub fn set_region(
        &self,
        source: &[u8],
        origin: IVec3,
        extent: IVec3,
        task_index: usize,
    ) -> Result<()> {
        if extent.cmple(IVec3::ZERO).any() {
            return Err(backend_failure(format!("region extent {extent} is not positive")));
        }
        let voxel_size = self.voxel_type.size();
        let (ex, ey, ez) = (extent.x as usize, extent.y as usize, extent.z as usize);
        let row_len = ex * voxel_size;
        if source.len() < row_len * ey * ez {
            return Err(backend_failure(format!(
                "region source holds {} bytes, {extent} {} voxels need {}",
                source.len(),
                self.voxel_type,
                row_len * ey * ez
            )));
        }

        let (y, z) = (task_index % ey, task_index / ey);
        if z >= ez {
            return Err(backend_failure(format!(
                "scanline task {task_index} out of range for region {extent}"
            )));
        }

        let inside = |start: i32, offset: usize, dim: i32| {
            i32::try_from(offset)
                .ok()
                .and_then(|offset| start.checked_add(offset))
                .filter(|coord| (0..dim).contains(coord))
        };
        let (Some(gy), Some(gz)) = (
            inside(origin.y, y, self.dims.y),
            inside(origin.z, z, self.dims.z),
        ) else {
            return Ok(());
        };

        let row = &source[(z * ey + y) * row_len..][..row_len];
        for (x, bytes) in row.chunks_exact(voxel_size).enumerate() {
            if let Some(gx) = inside(origin.x, x, self.dims.x) {
                self.write_voxel(IVec3::new(gx, gy, gz), bytes);
            }
        }
        Ok(())
    }

    /// Reads the voxel at integer coordinates, or `None` outside the volume.
    pub fn voxel(&self, coord: IVec3) -> Option<f32> {
        if coord.cmplt(IVec3::ZERO).any() || coord.cmpge(self.dims).any() {
            return None;
        }
        let brick = coord >> BRICK_BITS;
        let local = coord & IVec3::splat(BRICK_SIZE - 1);
        Some(self.read_slot(
            self.brick_index(brick),
            [local.x as usize, local.y as usize, local.z as usize],
        ))
    }

    /// Maps a sample value through the attached transfer function.
    pub fn classify(&self, value: f32) -> Option<Vec4> {
        self.settings
            .transfer_function
            .as_ref()
            .map(|tf| tf.classify(value))
    }

    /// Trilinear sample at continuous voxel-index coordinates.
    ///
    /// Returns NaN outside `[0, dims - 1]`.
    pub fn sample_voxel_space(&self, coord: Vec3) -> f32 {
        let upper = (self.dims - IVec3::ONE).as_vec3();
        if !(coord.cmpge(Vec3::ZERO).all() && coord.cmple(upper).all()) {
            return f32::NAN;
        }

        let max_base = (self.dims - IVec3::splat(2)).max(IVec3::ZERO);
        let base = coord.floor().as_ivec3().min(max_base);
        let frac = coord - base.as_vec3();

        let brick_index = self.brick_index(base >> BRICK_BITS);
        let local = base & IVec3::splat(BRICK_SIZE - 1);
        let (lx, ly, lz) = (local.x as usize, local.y as usize, local.z as usize);

        let mut corners = [0.0_f32; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let (dx, dy, dz) = (i & 1, (i >> 1) & 1, i >> 2);
            *corner = self.read_slot(brick_index, [lx + dx, ly + dy, lz + dz]);
        }

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let x00 = lerp(corners[0], corners[1], frac.x);
        let x10 = lerp(corners[2], corners[3], frac.x);
        let x01 = lerp(corners[4], corners[5], frac.x);
        let x11 = lerp(corners[6], corners[7], frac.x);
        let y0 = lerp(x00, x10, frac.y);
        let y1 = lerp(x01, x11, frac.y);
        lerp(y0, y1, frac.z)
    }

    fn brick_index(&self, brick: IVec3) -> usize {
        let grid = self.brick_grid;
        (brick.z as usize * grid.y as usize + brick.y as usize) * grid.x as usize + brick.x as usize
    }

    fn brick(&self, index: usize) -> &[AtomicU8] {
        let bytes = STORED_VOXELS * self.voxel_type.size();
        self.bricks[index].get_or_init(|| (0..bytes).map(|_| AtomicU8::new(0)).collect())
    }

    fn slot_offset(&self, local: [usize; 3]) -> usize {
        ((local[2] * STORED_EDGE + local[1]) * STORED_EDGE + local[0]) * self.voxel_type.size()
    }

    fn write_voxel(&self, coord: IVec3, bytes: &[u8]) {
        for (bz, lz) in axis_slots(coord.z) {
            for (by, ly) in axis_slots(coord.y) {
                for (bx, lx) in axis_slots(coord.x) {
                    let brick = self.brick(self.brick_index(IVec3::new(bx, by, bz)));
                    let offset = self.slot_offset([lx, ly, lz]);
                    for (slot, &byte) in brick[offset..].iter().zip(bytes) {
                        slot.store(byte, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    fn read_slot(&self, brick_index: usize, local: [usize; 3]) -> f32 {
        let Some(brick) = self.bricks[brick_index].get() else {
            return 0.0;
        };
        let size = self.voxel_type.size();
        let offset = self.slot_offset(local);
        let mut buf = [0_u8; MAX_VOXEL_SIZE];
        for (dst, src) in buf.iter_mut().zip(&brick[offset..offset + size]) {
            *dst = src.load(Ordering::Relaxed);
        }
        self.voxel_type.decode(&buf[..size])
    }
}

/// Storage slots of a voxel along one axis: its primary slot, plus the ghost
/// slot in the brick below when the voxel starts a brick.
#[allow(clippy::cast_sign_loss)]
fn axis_slots(coord: i32) -> impl Iterator<Item = (i32, usize)> {
    let brick = coord >> BRICK_BITS;
    let local = (coord & (BRICK_SIZE - 1)) as usize;
    let ghost = (local == 0 && brick > 0).then_some((brick - 1, BRICK_SIZE as usize));
    std::iter::once((brick, local)).chain(ghost)
}

fn backend_failure(message: String) -> VolscopeError {
    VolscopeError::NativeBackendFailure(message)
}

impl VolumeKernel for BrickedKernel {
    fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    fn set_gradient_shading(&mut self, enabled: bool) {
        self.settings.gradient_shading = enabled;
    }

    fn set_pre_integration(&mut self, enabled: bool) {
        self.settings.pre_integration = enabled;
    }

    fn set_single_shade(&mut self, enabled: bool) {
        self.settings.single_shade = enabled;
    }

    fn set_adaptive_sampling(&mut self, adaptive: AdaptiveSampling) {
        self.settings.adaptive = adaptive;
    }

    fn set_sampling_rate(&mut self, rate: f32) {
        self.settings.sampling_rate = rate;
    }

    fn set_specular(&mut self, specular: Vec3) {
        self.settings.specular = specular;
    }

    fn set_ns(&mut self, ns: f32) {
        self.settings.ns = ns;
    }

    fn set_transfer_function(&mut self, transfer_function: Arc<TransferFunction>) {
        self.settings.transfer_function = Some(transfer_function);
    }

    fn set_clip_box(&mut self, clip_box: ClipBox) {
        self.settings.clip_box = clip_box;
    }

    fn set_transforms(&mut self, transform: Affine3A, inverse: Affine3A) {
        self.settings.transform = transform;
        self.settings.inverse_transform = inverse;
    }

    fn bounding_box(&self) -> (Vec3, Vec3) {
        let lower = self.grid_origin;
        let upper = self.grid_origin + (self.dims - IVec3::ONE).as_vec3() * self.grid_spacing;

        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { lower.x } else { upper.x },
                if i & 2 == 0 { lower.y } else { upper.y },
                if i & 4 == 0 { lower.z } else { upper.z },
            );
            let world = self.settings.transform.transform_point3(corner);
            min = min.min(world);
            max = max.max(world);
        }
        (min, max)
    }

    fn compute_samples(&self, positions: &[Vec3]) -> Result<Vec<f32>> {
        let settings = &self.settings;
        Ok(positions
            .iter()
            .map(|&world| {
                if !settings.clip_box.admits(world) {
                    return f32::NAN;
                }
                let object = settings.inverse_transform.transform_point3(world);
                self.sample_voxel_space((object - self.grid_origin) / self.grid_spacing)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_region(kernel: &BrickedKernel, values: &[f32], origin: IVec3, extent: IVec3) {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        for task in 0..(extent.y * extent.z) as usize {
            kernel.set_region(bytes, origin, extent, task).unwrap();
        }
    }

    fn ramp(dims: IVec3, f: impl Fn(i32, i32, i32) -> f32) -> Vec<f32> {
        let mut values = Vec::new();
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    values.push(f(x, y, z));
                }
            }
        }
        values
    }

    #[test]
    fn test_rejects_non_positive_dims() {
        assert!(matches!(
            BrickedKernel::new(VoxelType::Float, IVec3::new(4, 0, 4)),
            Err(VolscopeError::InvalidDimensions(_))
        ));
        assert!(matches!(
            BrickedKernel::new(VoxelType::UChar, IVec3::new(-1, 4, 4)),
            Err(VolscopeError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_brick_grid() {
        let kernel = BrickedKernel::new(VoxelType::Float, IVec3::new(8, 9, 17)).unwrap();
        assert_eq!(kernel.brick_grid(), IVec3::new(1, 2, 3));
        assert_eq!(kernel.populated_bricks(), 0);
    }

    #[test]
    fn test_write_and_read_back() {
        let dims = IVec3::new(10, 9, 3);
        let kernel = BrickedKernel::new(VoxelType::Float, dims).unwrap();
        let values = ramp(dims, |x, y, z| (x + 100 * y + 10_000 * z) as f32);
        write_region(&kernel, &values, IVec3::ZERO, dims);

        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let expected = (x + 100 * y + 10_000 * z) as f32;
                    assert_eq!(kernel.voxel(IVec3::new(x, y, z)), Some(expected));
                }
            }
        }
        assert_eq!(kernel.voxel(dims), None);
        assert_eq!(kernel.voxel(IVec3::new(-1, 0, 0)), None);
    }

    #[test]
    fn test_unwritten_bricks_stay_unallocated() {
        let kernel = BrickedKernel::new(VoxelType::Float, IVec3::splat(32)).unwrap();
        write_region(&kernel, &[5.0], IVec3::new(20, 20, 20), IVec3::ONE);
        assert_eq!(kernel.populated_bricks(), 1);
        assert_eq!(kernel.voxel(IVec3::new(20, 20, 20)), Some(5.0));
        assert_eq!(kernel.voxel(IVec3::ZERO), Some(0.0));

        // the first voxel of a brick is replicated into the ghost layers below it
        write_region(&kernel, &[1.0], IVec3::new(8, 8, 8), IVec3::ONE);
        assert_eq!(kernel.populated_bricks(), 1 + 8);
    }

    #[test]
    fn test_interpolation_across_brick_boundary() {
        let dims = IVec3::new(17, 2, 2);
        let kernel = BrickedKernel::new(VoxelType::Float, dims).unwrap();
        write_region(&kernel, &ramp(dims, |x, _, _| x as f32), IVec3::ZERO, dims);

        for x in [0.0, 3.25, 7.5, 7.99, 8.0, 8.25, 15.5, 16.0] {
            let sample = kernel.sample_voxel_space(Vec3::new(x, 0.5, 0.5));
            assert!((sample - x).abs() < 1e-4, "sample at {x} was {sample}");
        }
    }

    #[test]
    fn test_single_voxel_axis() {
        let dims = IVec3::new(4, 1, 1);
        let kernel = BrickedKernel::new(VoxelType::UChar, dims).unwrap();
        kernel.set_region(&[0, 10, 20, 30], IVec3::ZERO, dims, 0).unwrap();
        assert!((kernel.sample_voxel_space(Vec3::new(1.5, 0.0, 0.0)) - 15.0).abs() < 1e-4);
        assert!(kernel.sample_voxel_space(Vec3::new(1.5, 0.5, 0.0)).is_nan());
    }

    #[test]
    fn test_out_of_bounds_voxels_are_clipped() {
        let dims = IVec3::splat(4);
        let kernel = BrickedKernel::new(VoxelType::Float, dims).unwrap();
        assert!(!kernel.contains_region(IVec3::new(2, 0, 0), IVec3::new(4, 1, 1)));
        write_region(
            &kernel,
            &[1.0, 2.0, 3.0, 4.0],
            IVec3::new(2, 0, 0),
            IVec3::new(4, 1, 1),
        );
        assert_eq!(kernel.voxel(IVec3::new(2, 0, 0)), Some(1.0));
        assert_eq!(kernel.voxel(IVec3::new(3, 0, 0)), Some(2.0));
        assert_eq!(kernel.populated_bricks(), 1);
    }

    #[test]
    fn test_regions_past_i32_max_are_clipped() {
        let kernel = BrickedKernel::new(VoxelType::Float, IVec3::splat(4)).unwrap();
        for origin in [
            IVec3::new(i32::MAX, 0, 0),
            IVec3::new(0, i32::MAX, 0),
            IVec3::new(0, 0, i32::MAX),
        ] {
            write_region(&kernel, &[1.0; 8], origin, IVec3::splat(2));
        }
        assert_eq!(kernel.populated_bricks(), 0);
    }

    #[test]
    fn test_bad_task_and_short_source_fail() {
        let kernel = BrickedKernel::new(VoxelType::Float, IVec3::splat(4)).unwrap();
        let values = [0.0_f32; 4];
        let bytes: &[u8] = bytemuck::cast_slice(&values);
        let err = kernel
            .set_region(bytes, IVec3::ZERO, IVec3::new(4, 1, 1), 1)
            .unwrap_err();
        assert!(err.is_fatal());
        let err = kernel
            .set_region(bytes, IVec3::ZERO, IVec3::new(4, 2, 1), 0)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_bounding_box_uses_grid_and_transform() {
        let mut kernel = BrickedKernel::new(VoxelType::Float, IVec3::new(5, 3, 2)).unwrap();
        assert_eq!(kernel.bounding_box(), (Vec3::ZERO, Vec3::new(4.0, 2.0, 1.0)));

        kernel.set_grid(Vec3::ONE, Vec3::splat(0.5));
        let xfm = Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0));
        kernel.set_transforms(xfm, xfm.inverse());
        let (min, max) = kernel.bounding_box();
        assert!(min.abs_diff_eq(Vec3::new(11.0, 1.0, 1.0), 1e-5));
        assert!(max.abs_diff_eq(Vec3::new(13.0, 2.0, 1.5), 1e-5));
    }

    #[test]
    fn test_compute_samples_clip_and_bounds() {
        let dims = IVec3::splat(4);
        let mut kernel = BrickedKernel::new(VoxelType::Float, dims).unwrap();
        write_region(&kernel, &ramp(dims, |x, _, _| x as f32), IVec3::ZERO, dims);

        let samples = kernel
            .compute_samples(&[Vec3::splat(1.5), Vec3::splat(-1.0), Vec3::splat(3.0)])
            .unwrap();
        assert!((samples[0] - 1.5).abs() < 1e-5);
        assert!(samples[1].is_nan());
        assert!((samples[2] - 3.0).abs() < 1e-5);

        kernel.set_clip_box(ClipBox::new(Vec3::ZERO, Vec3::splat(2.0)));
        let samples = kernel
            .compute_samples(&[Vec3::splat(1.5), Vec3::splat(3.0)])
            .unwrap();
        assert!((samples[0] - 1.5).abs() < 1e-5);
        assert!(samples[1].is_nan());
    }

    #[test]
    fn test_classify_needs_transfer_function() {
        let mut kernel = BrickedKernel::new(VoxelType::Float, IVec3::ONE).unwrap();
        assert!(kernel.classify(0.5).is_none());
        kernel.set_transfer_function(Arc::new(TransferFunction::new(
            "ramp",
            vec![Vec3::ZERO, Vec3::ONE],
            vec![0.0, 1.0],
        )));
        let rgba = kernel.classify(0.5).unwrap();
        assert!(rgba.abs_diff_eq(Vec4::splat(0.5), 1e-5));
    }

    #[test]
    fn test_typed_voxels() {
        let dims = IVec3::new(2, 1, 1);
        for ty in VoxelType::ALL {
            let kernel = BrickedKernel::new(ty, dims).unwrap();
            let bytes: Vec<u8> = match ty {
                VoxelType::UChar => vec![1, 3],
                VoxelType::Short => bytemuck::cast_slice(&[1_i16, 3]).to_vec(),
                VoxelType::UShort => bytemuck::cast_slice(&[1_u16, 3]).to_vec(),
                VoxelType::Float => bytemuck::cast_slice(&[1.0_f32, 3.0]).to_vec(),
                VoxelType::Double => bytemuck::cast_slice(&[1.0_f64, 3.0]).to_vec(),
            };
            kernel.set_region(&bytes, IVec3::ZERO, dims, 0).unwrap();
            let sample = kernel.sample_voxel_space(Vec3::new(0.5, 0.0, 0.0));
            assert!((sample - 2.0).abs() < 1e-5, "{ty}: {sample}");
        }
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(64))]

        #[test]
        fn prop_voxel_reads_back_and_samples_exactly(
            x in 0..20_i32,
            y in 0..20_i32,
            z in 0..20_i32,
            value in -1000.0..1000.0_f32,
        ) {
            let kernel = BrickedKernel::new(VoxelType::Float, IVec3::splat(20)).unwrap();
            let p = IVec3::new(x, y, z);
            write_region(&kernel, &[value], p, IVec3::ONE);
            proptest::prop_assert_eq!(kernel.voxel(p), Some(value));
            // an integer position only weighs its own voxel, ghost copy or not
            proptest::prop_assert_eq!(kernel.sample_voxel_space(p.as_vec3()), value);
        }
    }
}
