use nalgebra::Matrix4;
use tracing::debug;

use crate::metadata::{ImagePlaneModule, MetadataRegistry};

/// Pair of series instance UIDs for two images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesInstanceInformation {
    pub series_instance_uid1: String,
    pub series_instance_uid2: String,
}

/// True when every orientation component differs by less than `tolerance`.
pub fn is_same_image_plane(a: &ImagePlaneModule, b: &ImagePlaneModule, tolerance: f64) -> bool {
    a.image_orientation_patient
        .iter()
        .zip(&b.image_orientation_patient)
        .all(|(va, vb)| (va - vb).abs() < tolerance)
}

/// Translation taking points of `b`'s frame into `a`'s frame.
///
/// Only co-oriented planes are registered; anything needing a rotation yields
/// `None`, as does missing geometry.
pub fn compute_transform(
    a: Option<&ImagePlaneModule>,
    b: Option<&ImagePlaneModule>,
    tolerance: f64,
) -> Option<Matrix4<f64>> {
    let (Some(a), Some(b)) = (a, b) else {
        debug!("spatial registration requires image plane information for both images");
        return None;
    };

    if !is_same_image_plane(a, b, tolerance) {
        debug!(
            orientation_a = ?a.image_orientation_patient,
            orientation_b = ?b.image_orientation_patient,
            "spatial registration only supports images of the same orientation"
        );
        return None;
    }

    let translation = a.position() - b.position();
    Some(Matrix4::new_translation(&translation))
}

/// Registration matrix between two images, looked up through the metadata
/// providers.
pub fn calculate_image_ids_spatial_registration(
    metadata: &MetadataRegistry,
    image_id1: &str,
    image_id2: &str,
    tolerance: f64,
) -> Option<Matrix4<f64>> {
    let plane1 = metadata.image_plane(image_id1);
    let plane2 = metadata.image_plane(image_id2);
    compute_transform(plane1.as_ref(), plane2.as_ref(), tolerance)
}

pub fn series_instance_information(
    metadata: &MetadataRegistry,
    image_id1: &str,
    image_id2: &str,
) -> Option<SeriesInstanceInformation> {
    let (Some(series1), Some(series2)) = (
        metadata.general_series(image_id1),
        metadata.general_series(image_id2),
    ) else {
        debug!("spatial registration requires series information for both images");
        return None;
    };

    Some(SeriesInstanceInformation {
        series_instance_uid1: series1.series_instance_uid,
        series_instance_uid2: series2.series_instance_uid,
    })
}

#[cfg(test)]
mod calculator_tests {
    use super::*;
    use crate::config::DEFAULT_ORIENTATION_TOLERANCE;
    use crate::utils::test_utils::plane;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const AXIAL: [f64; 6] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    #[test]
    fn test_translation_is_source_minus_target() {
        let source = plane(AXIAL, [0.0, 0.0, 0.0]);
        let target = plane(AXIAL, [10.0, 0.0, 5.0]);

        let transform =
            compute_transform(Some(&source), Some(&target), DEFAULT_ORIENTATION_TOLERANCE)
                .expect("co-oriented planes register");

        let expected = Matrix4::new_translation(&Vector3::new(-10.0, 0.0, -5.0));
        assert_relative_eq!(transform, expected);
        assert_relative_eq!(
            transform.transform_point(&Point3::new(0.0, 0.0, 100.0)),
            Point3::new(-10.0, 0.0, 95.0)
        );
    }

    #[test]
    fn test_rotation_block_is_identity() {
        let transform = compute_transform(
            Some(&plane(AXIAL, [3.0, -4.0, 8.0])),
            Some(&plane([1.0, 0.0, 0.01, 0.0, 1.0, -0.02], [1.0, 1.0, 1.0])),
            DEFAULT_ORIENTATION_TOLERANCE,
        )
        .unwrap();
        assert_relative_eq!(
            transform.fixed_view::<3, 3>(0, 0).into_owned(),
            nalgebra::Matrix3::identity()
        );
        assert_relative_eq!(transform[(0, 3)], 2.0);
        assert_relative_eq!(transform[(1, 3)], -5.0);
        assert_relative_eq!(transform[(2, 3)], 7.0);
        assert_relative_eq!(transform[(3, 3)], 1.0);
    }

    #[test]
    fn test_different_orientation_is_not_registered() {
        let axial = plane(AXIAL, [0.0, 0.0, 0.0]);
        let coronal = plane([1.0, 0.0, 0.0, 0.0, 0.0, -1.0], [0.0, 0.0, 0.0]);
        assert_eq!(
            compute_transform(Some(&axial), Some(&coronal), DEFAULT_ORIENTATION_TOLERANCE),
            None
        );
    }

    #[test]
    fn test_missing_geometry_is_not_registered() {
        let axial = plane(AXIAL, [0.0, 0.0, 0.0]);
        assert_eq!(
            compute_transform(Some(&axial), None, DEFAULT_ORIENTATION_TOLERANCE),
            None
        );
        assert_eq!(
            compute_transform(None, Some(&axial), DEFAULT_ORIENTATION_TOLERANCE),
            None
        );
    }

    #[test]
    fn test_tolerance_applies_per_component() {
        let mut rng = StdRng::seed_from_u64(7);
        let base = plane(AXIAL, [0.0, 0.0, 0.0]);

        for _ in 0..200 {
            let mut within = AXIAL;
            for v in within.iter_mut() {
                *v += rng.random_range(-0.049..0.049);
            }
            let position = [
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
            ];
            let transform = compute_transform(
                Some(&base),
                Some(&plane(within, position)),
                DEFAULT_ORIENTATION_TOLERANCE,
            )
            .expect("all components inside tolerance");
            assert_relative_eq!(transform[(0, 3)], -position[0], epsilon = 1e-12);
            assert_relative_eq!(transform[(1, 3)], -position[1], epsilon = 1e-12);
            assert_relative_eq!(transform[(2, 3)], -position[2], epsilon = 1e-12);

            let mut outside = within;
            let component = rng.random_range(0..6);
            let offset = rng.random_range(0.051..0.5);
            outside[component] = AXIAL[component]
                + if rng.random_bool(0.5) { offset } else { -offset };
            assert_eq!(
                compute_transform(
                    Some(&base),
                    Some(&plane(outside, position)),
                    DEFAULT_ORIENTATION_TOLERANCE
                ),
                None
            );
        }
    }

    #[test]
    fn test_image_id_helpers_use_metadata() {
        let (metadata, provider) = crate::utils::test_utils::metadata_registry();
        crate::utils::test_utils::add_image(&provider, "a", "series-a", AXIAL, [0.0, 0.0, 0.0]);
        crate::utils::test_utils::add_image(&provider, "b", "series-b", AXIAL, [1.0, 2.0, 3.0]);

        let transform = calculate_image_ids_spatial_registration(
            &metadata,
            "a",
            "b",
            DEFAULT_ORIENTATION_TOLERANCE,
        )
        .unwrap();
        assert_relative_eq!(
            transform,
            Matrix4::new_translation(&Vector3::new(-1.0, -2.0, -3.0))
        );

        let info = series_instance_information(&metadata, "a", "b").unwrap();
        assert_eq!(info.series_instance_uid1, "series-a");
        assert_eq!(info.series_instance_uid2, "series-b");
        assert_eq!(series_instance_information(&metadata, "a", "missing"), None);
        assert_eq!(
            calculate_image_ids_spatial_registration(
                &metadata,
                "a",
                "missing",
                DEFAULT_ORIENTATION_TOLERANCE
            ),
            None
        );
    }
}
