use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;

use super::{
    GeneralSeriesModule, ImagePlaneModule, MetadataModule, MetadataProvider, MetadataQuery,
    MetadataValue,
};
use crate::error::SyncError;

/// Metadata held in memory, keyed by image id.
///
/// Can be seeded from a JSON document of the form
///
/// ```json
/// {
///   "ct-0": {
///     "imagePlaneModule": {
///       "imageOrientationPatient": [1, 0, 0, 0, 1, 0],
///       "imagePositionPatient": [0, 0, 0]
///     },
///     "generalSeriesModule": { "seriesInstanceUID": "1.2.3" }
///   }
/// }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMetadataProvider {
    image_planes: RefCell<HashMap<String, ImagePlaneModule>>,
    series: RefCell<HashMap<String, GeneralSeriesModule>>,
}

#[derive(Deserialize)]
struct ImageEntry {
    #[serde(rename = "imagePlaneModule")]
    image_plane: Option<ImagePlaneModule>,
    #[serde(rename = "generalSeriesModule")]
    general_series: Option<GeneralSeriesModule>,
}

impl InMemoryMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SyncError> {
        let entries: HashMap<String, ImageEntry> = serde_json::from_str(raw)?;
        let provider = Self::new();
        for (image_id, entry) in entries {
            if let Some(plane) = entry.image_plane {
                provider.insert_image_plane(&image_id, plane);
            }
            if let Some(series) = entry.general_series {
                provider.insert_general_series(&image_id, series);
            }
        }
        Ok(provider)
    }

    pub fn insert_image_plane(&self, image_id: &str, module: ImagePlaneModule) {
        self.image_planes
            .borrow_mut()
            .insert(image_id.to_string(), module);
    }

    pub fn insert_general_series(&self, image_id: &str, module: GeneralSeriesModule) {
        self.series.borrow_mut().insert(image_id.to_string(), module);
    }

    pub fn remove_image(&self, image_id: &str) {
        self.image_planes.borrow_mut().remove(image_id);
        self.series.borrow_mut().remove(image_id);
    }
}

impl MetadataProvider for InMemoryMetadataProvider {
    fn get(&self, query: &MetadataQuery<'_>) -> Option<MetadataValue> {
        match *query {
            MetadataQuery::Image {
                module: MetadataModule::ImagePlane,
                image_id,
            } => self
                .image_planes
                .borrow()
                .get(image_id)
                .copied()
                .map(MetadataValue::ImagePlane),
            MetadataQuery::Image {
                module: MetadataModule::GeneralSeries,
                image_id,
            } => self
                .series
                .borrow()
                .get(image_id)
                .cloned()
                .map(MetadataValue::GeneralSeries),
            _ => None,
        }
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;
    use crate::metadata::MetadataRegistry;
    use std::rc::Rc;

    const DOCUMENT: &str = r#"{
        "ct-0": {
            "imagePlaneModule": {
                "imageOrientationPatient": [1, 0, 0, 0, 1, 0],
                "imagePositionPatient": [0, 0, -20.5]
            },
            "generalSeriesModule": { "seriesInstanceUID": "1.2.840.1" }
        },
        "pet-0": {
            "generalSeriesModule": { "seriesInstanceUID": "1.2.840.2" }
        }
    }"#;

    #[test]
    fn test_json_document_is_loaded() {
        let provider = InMemoryMetadataProvider::from_json_str(DOCUMENT).unwrap();
        let registry = MetadataRegistry::new();
        registry.add_provider(Rc::new(provider), 0);

        let plane = registry.image_plane("ct-0").unwrap();
        assert_eq!(plane.image_position_patient, [0.0, 0.0, -20.5]);
        assert_eq!(
            registry.general_series("pet-0").unwrap().series_instance_uid,
            "1.2.840.2"
        );
        assert_eq!(registry.image_plane("pet-0"), None);
        assert_eq!(registry.image_plane("mr-0"), None);
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let err = InMemoryMetadataProvider::from_json_str(r#"{"ct-0": {"imagePlaneModule": 3}}"#)
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidMetadata(_)));
    }

    #[test]
    fn test_remove_image() {
        let provider = InMemoryMetadataProvider::from_json_str(DOCUMENT).unwrap();
        provider.remove_image("ct-0");
        let query = MetadataQuery::Image {
            module: MetadataModule::GeneralSeries,
            image_id: "ct-0",
        };
        assert_eq!(provider.get(&query), None);
    }
}
