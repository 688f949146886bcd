//! Per-image metadata lookup.
//!
//! The host registers any number of providers; a query goes to them in
//! descending priority and the first answer wins. The transform registry
//! plugs in here as the provider of the spatial registration module.

pub mod memory;

pub use memory::InMemoryMetadataProvider;

use nalgebra::{Matrix4, Vector3};
use serde::Deserialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataModule {
    ImagePlane,
    GeneralSeries,
    SpatialRegistration,
}

impl MetadataModule {
    pub fn name(&self) -> &'static str {
        match self {
            MetadataModule::ImagePlane => "imagePlaneModule",
            MetadataModule::GeneralSeries => "generalSeriesModule",
            MetadataModule::SpatialRegistration => "spatialRegistrationModule",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataQuery<'a> {
    Image {
        module: MetadataModule,
        image_id: &'a str,
    },
    SpatialRegistration {
        viewport_ids: [&'a str; 2],
        series_instance_uids: [&'a str; 2],
    },
}

impl MetadataQuery<'_> {
    pub fn module(&self) -> MetadataModule {
        match self {
            MetadataQuery::Image { module, .. } => *module,
            MetadataQuery::SpatialRegistration { .. } => MetadataModule::SpatialRegistration,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    ImagePlane(ImagePlaneModule),
    GeneralSeries(GeneralSeriesModule),
    SpatialRegistration(Matrix4<f64>),
}

/// Image orientation and position in patient space.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlaneModule {
    /// Row direction cosines followed by column direction cosines.
    pub image_orientation_patient: [f64; 6],
    pub image_position_patient: [f64; 3],
}

impl ImagePlaneModule {
    pub fn row_cosines(&self) -> Vector3<f64> {
        Vector3::from_column_slice(&self.image_orientation_patient[..3])
    }

    pub fn column_cosines(&self) -> Vector3<f64> {
        Vector3::from_column_slice(&self.image_orientation_patient[3..])
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::from(self.image_position_patient)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneralSeriesModule {
    #[serde(rename = "seriesInstanceUID")]
    pub series_instance_uid: String,
}

pub trait MetadataProvider {
    fn get(&self, query: &MetadataQuery<'_>) -> Option<MetadataValue>;
}

/// Ordered set of metadata providers.
#[derive(Default)]
pub struct MetadataRegistry {
    providers: RefCell<Vec<(i32, Rc<dyn MetadataProvider>)>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Providers with equal priority are asked in registration order.
    pub fn add_provider(&self, provider: Rc<dyn MetadataProvider>, priority: i32) {
        let mut providers = self.providers.borrow_mut();
        let at = providers
            .iter()
            .position(|(p, _)| *p < priority)
            .unwrap_or(providers.len());
        providers.insert(at, (priority, provider));
    }

    /// Also removes the transform cache a `SpatialRegistration` registered
    /// here. The service keeps answering from its own cache, but host
    /// providers have to be added again.
    pub fn remove_all_providers(&self) {
        self.providers.borrow_mut().clear();
    }

    pub fn get(&self, query: &MetadataQuery<'_>) -> Option<MetadataValue> {
        let providers: Vec<Rc<dyn MetadataProvider>> = self
            .providers
            .borrow()
            .iter()
            .map(|(_, p)| Rc::clone(p))
            .collect();
        providers.iter().find_map(|p| p.get(query))
    }

    pub fn image_plane(&self, image_id: &str) -> Option<ImagePlaneModule> {
        match self.get(&MetadataQuery::Image {
            module: MetadataModule::ImagePlane,
            image_id,
        })? {
            MetadataValue::ImagePlane(module) => Some(module),
            _ => None,
        }
    }

    pub fn general_series(&self, image_id: &str) -> Option<GeneralSeriesModule> {
        match self.get(&MetadataQuery::Image {
            module: MetadataModule::GeneralSeries,
            image_id,
        })? {
            MetadataValue::GeneralSeries(module) => Some(module),
            _ => None,
        }
    }

    pub fn spatial_registration(
        &self,
        viewport_ids: [&str; 2],
        series_instance_uids: [&str; 2],
    ) -> Option<Matrix4<f64>> {
        match self.get(&MetadataQuery::SpatialRegistration {
            viewport_ids,
            series_instance_uids,
        })? {
            MetadataValue::SpatialRegistration(matrix) => Some(matrix),
            _ => None,
        }
    }
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let priorities: Vec<i32> = self.providers.borrow().iter().map(|(p, _)| *p).collect();
        f.debug_struct("MetadataRegistry")
            .field("provider_priorities", &priorities)
            .finish()
    }
}
