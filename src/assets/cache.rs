use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use itertools::Itertools;
use log::{debug, error, trace, warn};
use simview_assets::DecodeError;
use simview_assets::descriptors::{GeometryDescriptor, MaterialDescriptor, TextureDescriptor};
use simview_assets::geometry::decode_geometry;
use simview_assets::texture::decode_texture;

use crate::assets::table::AssetTable;
use crate::assets::types::{Geometry, Material, Texture};
use crate::assets::{AssetError, AssetKind};

/// A download that still has to happen, for one of the fetched asset kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetRequest {
    Geometry(GeometryDescriptor),
    Texture(TextureDescriptor),
}

impl AssetRequest {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetRequest::Geometry(_) => AssetKind::Geometry,
            AssetRequest::Texture(_) => AssetKind::Texture,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AssetRequest::Geometry(descriptor) => &descriptor.name,
            AssetRequest::Texture(descriptor) => &descriptor.name,
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            AssetRequest::Geometry(descriptor) => &descriptor.hash,
            AssetRequest::Texture(descriptor) => &descriptor.hash,
        }
    }

    /// Turns the downloaded payload into the renderable resource. Runs on the fetch workers.
    pub fn decode(&self, payload: &[u8]) -> Result<LoadedAsset, DecodeError> {
        match self {
            AssetRequest::Geometry(descriptor) => Ok(LoadedAsset::Geometry {
                name: descriptor.name.clone(),
                geometry: decode_geometry(payload, descriptor)?.into(),
            }),
            AssetRequest::Texture(descriptor) => {
                let decoded = decode_texture(payload, descriptor)?;
                let declared = descriptor.width as usize * descriptor.height as usize;
                if declared != 0 && declared != decoded.pixel_count() {
                    warn!(
                        "Texture {} declares {}x{} pixels, but the payload carries {}",
                        descriptor.name,
                        descriptor.width,
                        descriptor.height,
                        decoded.pixel_count()
                    );
                }
                Ok(LoadedAsset::Texture {
                    name: descriptor.name.clone(),
                    texture: Texture::from_decoded(&descriptor.name, decoded),
                })
            }
        }
    }
}

#[derive(Debug)]
pub enum LoadedAsset {
    Geometry { name: String, geometry: Geometry },
    Texture { name: String, texture: Texture },
}

impl LoadedAsset {
    pub fn kind(&self) -> AssetKind {
        match self {
            LoadedAsset::Geometry { .. } => AssetKind::Geometry,
            LoadedAsset::Texture { .. } => AssetKind::Texture,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LoadedAsset::Geometry { name, .. } | LoadedAsset::Texture { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchJob {
    pub url: String,
    pub request: AssetRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFailure {
    pub kind: AssetKind,
    pub name: String,
    pub reason: String,
}

/// The three asset tables plus the bookkeeping that keeps a name from being downloaded twice.
pub struct AssetCache {
    base_url: String,
    geometries: AssetTable<Geometry>,
    materials: AssetTable<Material>,
    textures: AssetTable<Texture>,
    in_flight: DashSet<(AssetKind, String)>,
    /// Only the latest failure per asset, the server replays its loads on every reconnect.
    failures: DashMap<(AssetKind, String), AssetFailure>,
}

impl AssetCache {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            geometries: AssetTable::new(),
            materials: AssetTable::new(),
            textures: AssetTable::new(),
            in_flight: DashSet::new(),
            failures: DashMap::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn geometries(&self) -> &AssetTable<Geometry> {
        &self.geometries
    }

    pub fn materials(&self) -> &AssetTable<Material> {
        &self.materials
    }

    pub fn textures(&self) -> &AssetTable<Texture> {
        &self.textures
    }

    pub fn on_geometry_load<F>(&self, name: &str, callback: F)
    where
        F: FnOnce(Arc<Geometry>) + Send + 'static,
    {
        self.geometries.get_or_create(name).on_ready(callback);
    }

    pub fn on_material_load<F>(&self, name: &str, callback: F)
    where
        F: FnOnce(Arc<Material>) + Send + 'static,
    {
        self.materials.get_or_create(name).on_ready(callback);
    }

    pub fn on_texture_load<F>(&self, name: &str, callback: F)
    where
        F: FnOnce(Arc<Texture>) + Send + 'static,
    {
        self.textures.get_or_create(name).on_ready(callback);
    }

    /// Returns the download to perform, or `None` if the geometry is already loaded or on its way.
    pub fn request_geometry(&self, descriptor: GeometryDescriptor) -> Option<FetchJob> {
        self.request(AssetRequest::Geometry(descriptor))
    }

    /// Returns the download to perform, or `None` if the texture is already loaded or on its way.
    pub fn request_texture(&self, descriptor: TextureDescriptor) -> Option<FetchJob> {
        self.request(AssetRequest::Texture(descriptor))
    }

    fn request(&self, request: AssetRequest) -> Option<FetchJob> {
        let kind = request.kind();
        let resolved = match &request {
            AssetRequest::Geometry(descriptor) => self.geometries.is_resolved(&descriptor.name),
            AssetRequest::Texture(descriptor) => self.textures.is_resolved(&descriptor.name),
        };

        if resolved {
            trace!("Skipping {} {}, it is already loaded", kind, request.name());
            return None;
        }

        if !self.in_flight.insert((kind, request.name().to_string())) {
            trace!("Skipping {} {}, it is already being fetched", kind, request.name());
            return None;
        }

        Some(FetchJob {
            url: format!("{}{}", self.base_url, request.hash()),
            request,
        })
    }

    /// Materials don't have a payload, they are built right away. A referenced texture is attached
    /// whenever it resolves, which may be right now.
    pub fn load_material(&self, descriptor: &MaterialDescriptor) -> Result<(), AssetError> {
        let slot = self.materials.get_or_create(&descriptor.name);
        if slot.is_resolved() {
            // The server replays its materials on every reconnect.
            debug!("Material {} is already loaded", descriptor.name);
            return Ok(());
        }

        let material = Arc::new(Material::from_descriptor(descriptor));
        if let Some(texture_name) = &descriptor.texture {
            let target = material.clone();
            self.on_texture_load(texture_name, move |texture| target.attach_texture(texture));
        }

        slot.resolve(material)
            .map_err(|_| AssetError::DuplicateResolution {
                kind: AssetKind::Material,
                name: descriptor.name.clone(),
            })
    }

    /// Resolves the slot of a finished download. Must be called from the dispatcher thread.
    pub fn fulfill(&self, asset: LoadedAsset) -> Result<(), AssetError> {
        let kind = asset.kind();
        let name = asset.name().to_string();
        self.in_flight.remove(&(kind, name.clone()));

        let result = match asset {
            LoadedAsset::Geometry { geometry, .. } => self
                .geometries
                .get_or_create(&name)
                .resolve(Arc::new(geometry))
                .map_err(|_| ()),
            LoadedAsset::Texture { texture, .. } => self
                .textures
                .get_or_create(&name)
                .resolve(Arc::new(texture))
                .map_err(|_| ()),
        };

        match result {
            Ok(()) => {
                debug!("Loaded {} {}", kind, name);
                Ok(())
            }
            Err(()) => Err(AssetError::DuplicateResolution { kind, name }),
        }
    }

    /// The slot stays pending (so whatever waits on it stays hidden), but the failure is reported
    /// and a later load of the same name is allowed to try again.
    pub fn record_failure(&self, request: &AssetRequest, error: &AssetError) {
        let kind = request.kind();
        error!("Loading {} {} failed: {}", kind, request.name(), error);
        self.in_flight
            .remove(&(kind, request.name().to_string()));
        self.failures.insert(
            (kind, request.name().to_string()),
            AssetFailure {
                kind,
                name: request.name().to_string(),
                reason: error.to_string(),
            },
        );
    }

    /// The most recent failure of every asset that failed at least once, ordered by name.
    pub fn failures(&self) -> Vec<AssetFailure> {
        let mut failures = self
            .failures
            .iter()
            .map(|entry| entry.value().clone())
            .collect_vec();
        failures.sort_by(|a, b| a.name.cmp(&b.name));
        failures
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Slots that have been referenced but not resolved, across all kinds.
    pub fn pending_count(&self) -> usize {
        self.geometries.pending_count() + self.materials.pending_count() + self.textures.pending_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simview_assets::descriptors::BufferLayout;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn geometry_descriptor(name: &str) -> GeometryDescriptor {
        GeometryDescriptor {
            name: name.to_string(),
            hash: format!("{name}-hash"),
            index_layout: BufferLayout(0, 0),
            vertex_layout: BufferLayout(0, 0),
            normal_layout: BufferLayout(0, 0),
            uv_layout: BufferLayout(0, 0),
        }
    }

    fn texture_descriptor(name: &str) -> TextureDescriptor {
        TextureDescriptor {
            name: name.to_string(),
            hash: format!("{name}-hash"),
            width: 1,
            height: 1,
            repeat: [1.0, 1.0],
            texture_type: None,
        }
    }

    fn material_descriptor(name: &str, texture: Option<&str>) -> MaterialDescriptor {
        MaterialDescriptor {
            name: name.to_string(),
            color: [1.0, 0.0, 0.0, 1.0],
            shininess: 0.5,
            reflectance: 0.0,
            specular: 0.5,
            emission: 0.0,
            texture: texture.map(str::to_string),
        }
    }

    #[test]
    fn builds_urls_from_hashes() {
        let cache = AssetCache::new("http://localhost:8000/asset/");
        let job = cache.request_geometry(geometry_descriptor("cube")).unwrap();
        assert_eq!(job.url, "http://localhost:8000/asset/cube-hash");
    }

    #[test]
    fn does_not_duplicate_in_flight_or_completed_fetches() {
        let cache = AssetCache::new("asset/");
        let job = cache.request_geometry(geometry_descriptor("cube")).unwrap();
        assert!(cache.request_geometry(geometry_descriptor("cube")).is_none());

        let loaded = job.request.decode(&[]).unwrap();
        cache.fulfill(loaded).unwrap();
        assert_eq!(cache.in_flight_count(), 0);
        assert!(cache.request_geometry(geometry_descriptor("cube")).is_none());
    }

    #[test]
    fn referenced_but_unloaded_geometry_is_still_fetched() {
        let cache = AssetCache::new("asset/");
        cache.on_geometry_load("cube", |_| {});
        assert!(cache.request_geometry(geometry_descriptor("cube")).is_some());
    }

    #[test]
    fn fulfill_wakes_waiters() {
        let cache = AssetCache::new("asset/");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        cache.on_texture_load("wood", move |texture| {
            assert_eq!(texture.label, "wood");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let job = cache.request_texture(texture_descriptor("wood")).unwrap();
        cache
            .fulfill(job.request.decode(&[1, 2, 3]).unwrap())
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn duplicate_fulfillment_is_an_error() {
        let cache = AssetCache::new("asset/");
        let request = AssetRequest::Geometry(geometry_descriptor("cube"));
        cache.fulfill(request.decode(&[]).unwrap()).unwrap();

        let err = cache.fulfill(request.decode(&[]).unwrap()).unwrap_err();
        assert!(matches!(err, AssetError::DuplicateResolution { kind: AssetKind::Geometry, .. }));
    }

    #[test]
    fn failures_are_reported_and_retryable() {
        let cache = AssetCache::new("asset/");
        let job = cache.request_texture(texture_descriptor("wood")).unwrap();
        let error = AssetError::from(job.request.decode(&[1, 2]).unwrap_err());

        cache.record_failure(&job.request, &error);

        let failures = cache.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, AssetKind::Texture);
        assert_eq!(failures[0].name, "wood");
        assert!(!cache.textures().is_resolved("wood"));
        assert!(cache.request_texture(texture_descriptor("wood")).is_some());
    }

    #[test]
    fn repeated_failures_keep_only_the_latest() {
        let cache = AssetCache::new("asset/");
        for attempt in 0..100 {
            let job = cache.request_geometry(geometry_descriptor("cube")).unwrap();
            let error = AssetError::from(DecodeError::TruncatedPixels { len: attempt });
            cache.record_failure(&job.request, &error);
        }

        let failures = cache.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, AssetKind::Geometry);
        assert!(failures[0].reason.contains("99 bytes"));
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[test]
    fn material_texture_attaches_in_either_order() {
        let cache = AssetCache::new("asset/");

        cache
            .load_material(&material_descriptor("early", Some("wood")))
            .unwrap();
        let early = cache.materials().get("early").unwrap().value().unwrap();
        assert!(early.texture().is_none());

        let job = cache.request_texture(texture_descriptor("wood")).unwrap();
        cache
            .fulfill(job.request.decode(&[9, 9, 9]).unwrap())
            .unwrap();
        assert!(early.texture().is_some());

        cache
            .load_material(&material_descriptor("late", Some("wood")))
            .unwrap();
        let late = cache.materials().get("late").unwrap().value().unwrap();
        assert_eq!(late.texture().unwrap().data, vec![9, 9, 9, 255]);
    }

    #[test]
    fn reloading_a_material_keeps_the_first() {
        let cache = AssetCache::new("asset/");
        cache.load_material(&material_descriptor("red", None)).unwrap();
        let first = cache.materials().get("red").unwrap().value().unwrap();

        cache.load_material(&material_descriptor("red", None)).unwrap();
        let second = cache.materials().get("red").unwrap().value().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
