//! Basic integration tests for volscope.
//!
//! Note: volscope keeps its registry in global state, so all tests touching
//! it are combined into a single test function.

use std::thread;

use volscope::*;

fn ramp_x(dims: IVec3) -> Vec<f32> {
    let mut values = Vec::new();
    for _z in 0..dims.z {
        for _y in 0..dims.y {
            for x in 0..dims.x {
                values.push(x as f32);
            }
        }
    }
    values
}

/// Main integration test that runs all basic tests in sequence.
#[test]
fn test_basics() {
    assert!(matches!(
        register_structured_volume("early", VoxelType::Float, IVec3::ONE),
        Err(VolscopeError::NotInitialized)
    ));

    init_with_options(Options {
        log_level: "debug".to_string(),
        ..Options::default()
    })
    .expect("init failed");
    assert!(is_initialized());
    assert!(matches!(init(), Err(VolscopeError::AlreadyInitialized)));

    // Test 1: register and look up
    {
        let volume = register_structured_volume("density", VoxelType::Float, IVec3::splat(16))
            .expect("register failed");
        assert_eq!(volume.name(), "density");
        assert!(get_structured_volume("density").is_some());
        assert!(get_structured_volume("nonexistent").is_none());
        assert!(matches!(
            register_structured_volume("density", VoxelType::UChar, IVec3::ONE),
            Err(VolscopeError::VolumeExists(_))
        ));
        assert_eq!(volume.describe().unwrap(), "structured_brick_volume<float>");
    }

    // Test 2: commit and sampling need data first
    {
        let volume = get_structured_volume("density").unwrap();
        volume
            .set_transfer_function(transfer_function_preset("grayscale").unwrap())
            .unwrap();
        assert!(matches!(volume.commit(), Err(VolscopeError::PrecommitRequired)));
        assert!(matches!(
            volume.compute_samples(&[Vec3::ZERO]),
            Err(VolscopeError::IllegalState(_))
        ));
    }

    // Test 3: full lifecycle
    {
        let dims = IVec3::splat(16);
        let volume = get_structured_volume("density").unwrap();
        volume
            .set_region_typed(&ramp_x(dims), IVec3::ZERO, dims)
            .unwrap();
        volume
            .set_param("gridSpacing", Vec3::splat(0.5))
            .unwrap()
            .set_param("samplingRate", 0.25_f32)
            .unwrap();
        volume.commit().unwrap();

        let (lower, upper) = volume.finish().unwrap();
        assert!(lower.abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(upper.abs_diff_eq(Vec3::splat(7.5), 1e-6));
        assert!(volume.set_param("boundingBoxMax", Vec3::ONE).is_err());
        assert_eq!(volume.get_param("boundingBoxMax", Vec3::ZERO).unwrap(), upper);

        let positions: Vec<Vec3> = (0..1024)
            .map(|i| Vec3::new((i % 16) as f32 * 0.45, 1.0, 2.0))
            .collect();
        let samples = volume.compute_samples(&positions).unwrap();
        assert_eq!(samples.len(), 1024);
        for (p, s) in positions.iter().zip(&samples) {
            assert!((s - p.x * 2.0).abs() < 1e-3, "sample at {p} was {s}");
        }
        assert!(volume.compute_samples(&[]).unwrap().is_empty());
        assert!(volume.compute_samples(&[Vec3::splat(-1.0)]).unwrap()[0].is_nan());
    }

    // Test 4: clipping box and transform
    {
        let volume = get_structured_volume("density").unwrap();
        volume
            .set_param("volumeClippingBoxLower", Vec3::ZERO)
            .unwrap()
            .set_param("volumeClippingBoxUpper", Vec3::splat(2.0))
            .unwrap();
        volume.commit().unwrap();
        let samples = volume
            .compute_samples(&[Vec3::splat(1.0), Vec3::splat(3.0)])
            .unwrap();
        assert!((samples[0] - 2.0).abs() < 1e-4);
        assert!(samples[1].is_nan());

        volume
            .set_param("xfm.l.vx", Vec3::ZERO)
            .unwrap();
        assert!(matches!(volume.commit(), Err(VolscopeError::InvalidArgument(_))));
        volume.set_param("xfm.l.vx", Vec3::X).unwrap();
        volume.commit().unwrap();
    }

    // Test 5: upsampled region writes
    {
        let volume =
            register_structured_volume("coarse", VoxelType::UChar, IVec3::splat(4)).unwrap();
        volume.set_param("scaleFactor", Vec3::splat(2.0)).unwrap();
        volume
            .set_region(&[0, 10, 20, 30, 40, 50, 60, 70], IVec3::ZERO, IVec3::splat(2))
            .unwrap();
        volume
            .set_transfer_function(transfer_function_preset("viridis").unwrap())
            .unwrap();
        volume.commit().unwrap();
        let samples = volume
            .compute_samples(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(3.0, 3.0, 3.0)])
            .unwrap();
        assert_eq!(samples, vec![0.0, 70.0]);
    }

    // Test 6: concurrent region writes through handles
    {
        let dims = IVec3::new(32, 8, 8);
        let volume = register_structured_volume("slabs", VoxelType::UShort, dims).unwrap();
        let slab = IVec3::new(8, 8, 8);
        thread::scope(|s| {
            for i in 0..4 {
                let volume = volume.clone();
                s.spawn(move || {
                    let voxels = vec![i as u16 * 100; 512];
                    volume
                        .set_region_typed(&voxels, IVec3::new(i * 8, 0, 0), slab)
                        .unwrap();
                });
            }
        });
        volume
            .set_transfer_function(transfer_function_preset("coolwarm").unwrap())
            .unwrap();
        volume.commit().unwrap();
        let samples = volume
            .compute_samples(&[Vec3::new(4.0, 4.0, 4.0), Vec3::new(28.0, 4.0, 4.0)])
            .unwrap();
        assert_eq!(samples, vec![0.0, 300.0]);
    }

    // Test 7: remove volumes
    {
        assert!(remove_volume("coarse").unwrap());
        assert!(!remove_volume("coarse").unwrap());
        assert!(get_structured_volume("coarse").is_none());
        assert!(matches!(
            get_structured_volume("density").unwrap().commit(),
            Ok(())
        ));
        remove_all_volumes().unwrap();
        assert!(get_structured_volume("density").is_none());
    }

    shutdown();
    assert!(!is_initialized());
    init().expect("re-init after shutdown failed");
    assert!(get_structured_volume("slabs").is_none());
    shutdown();
}
