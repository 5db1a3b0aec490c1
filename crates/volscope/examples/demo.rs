//! Streams a synthetic density field into a bricked volume and samples it.
//!
//! Run with: cargo run --example demo

use volscope::*;

fn sphere_density(dims: IVec3, z0: i32, depth: i32) -> Vec<f32> {
    let center = (dims - IVec3::ONE).as_vec3() * 0.5;
    let radius = center.x;
    let mut values = Vec::with_capacity((dims.x * dims.y * depth) as usize);
    for z in z0..z0 + depth {
        for y in 0..dims.y {
            for x in 0..dims.x {
                let d = IVec3::new(x, y, z).as_vec3().distance(center) / radius;
                values.push((1.0 - d).max(0.0));
            }
        }
    }
    values
}

fn main() -> Result<()> {
    init()?;
    init_single_process()?;
    log::info!("running as {:?}", role()?);

    let dims = IVec3::splat(64);
    let volume = register_structured_volume("sphere", VoxelType::Float, dims)?;

    // stream the field in slabs, as a file reader would
    let depth = 16;
    for z0 in (0..dims.z).step_by(depth as usize) {
        let slab = sphere_density(dims, z0, depth);
        let extent = IVec3::new(dims.x, dims.y, depth);
        volume.set_region_typed(&slab, IVec3::new(0, 0, z0), extent)?;
    }

    let tf = transfer_function_preset("viridis")
        .ok_or(VolscopeError::MissingDependency("transfer function"))?;
    volume
        .set_transfer_function(tf)?
        .set_param("gridSpacing", Vec3::splat(1.0 / 63.0))?
        .set_param("samplingRate", 0.5_f32)?;
    volume.commit()?;

    let (lower, upper) = volume.finish()?;
    println!("{}: bounds {lower} .. {upper}", volume.describe()?);

    let ray: Vec<Vec3> = (0..=8)
        .map(|i| lower.lerp(upper, i as f32 / 8.0))
        .collect();
    for (p, s) in ray.iter().zip(volume.compute_samples(&ray)?) {
        println!("  {p:>30} -> {s:.3}");
    }

    world()?.barrier()?;
    shutdown();
    Ok(())
}
