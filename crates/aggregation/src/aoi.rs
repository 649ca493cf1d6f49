//! Area-of-interest resolution.
//!
//! An AOI asset is a GeoJSON document: a bare geometry, a feature, or a
//! feature collection. Whatever its shape, it resolves to one
//! [`AoiGeometry`] holding every polygon it contains. Containment is the
//! union of those polygons.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use climate_common::{BoundingBox, ClimateError, ClimateResult};

/// A GeoJSON position; extra ordinates (altitude) are ignored.
pub type Position = Vec<f64>;

/// The subset of GeoJSON an AOI asset may contain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GeoJson {
    Point {
        coordinates: serde_json::Value,
    },
    MultiPoint {
        coordinates: serde_json::Value,
    },
    LineString {
        coordinates: serde_json::Value,
    },
    MultiLineString {
        coordinates: serde_json::Value,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJson>,
    },
    Feature {
        #[serde(default)]
        geometry: Option<Box<GeoJson>>,
    },
    FeatureCollection {
        features: Vec<GeoJson>,
    },
}

impl GeoJson {
    /// Collect every polygon, descending through features and collections.
    /// Points and lines carry no area and are skipped.
    pub fn polygons(&self) -> ClimateResult<Vec<Polygon>> {
        let mut out = Vec::new();
        self.collect_polygons(&mut out)?;
        Ok(out)
    }

    fn collect_polygons(&self, out: &mut Vec<Polygon>) -> ClimateResult<()> {
        match self {
            GeoJson::Polygon { coordinates } => out.extend(Polygon::from_rings(coordinates)?),
            GeoJson::MultiPolygon { coordinates } => {
                for rings in coordinates {
                    out.extend(Polygon::from_rings(rings)?);
                }
            }
            GeoJson::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.collect_polygons(out)?;
                }
            }
            GeoJson::Feature { geometry } => {
                if let Some(geometry) = geometry {
                    geometry.collect_polygons(out)?;
                }
            }
            GeoJson::FeatureCollection { features } => {
                for feature in features {
                    feature.collect_polygons(out)?;
                }
            }
            GeoJson::Point { .. }
            | GeoJson::MultiPoint { .. }
            | GeoJson::LineString { .. }
            | GeoJson::MultiLineString { .. } => {}
        }
        Ok(())
    }
}

/// A polygon ring set: one exterior ring and zero or more holes, as `(lon, lat)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<(f64, f64)>>,
}

impl Polygon {
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    /// Build from GeoJSON rings. A polygon whose exterior has fewer than
    /// three vertices encloses nothing and yields `None`.
    fn from_rings(rings: &[Vec<Position>]) -> ClimateResult<Option<Self>> {
        let mut rings = rings.iter().map(|ring| parse_ring(ring));
        let exterior = match rings.next() {
            Some(ring) => ring?,
            None => return Ok(None),
        };
        if exterior.len() < 3 {
            return Ok(None);
        }
        let holes = rings.collect::<ClimateResult<Vec<_>>>()?;
        Ok(Some(Self { exterior, holes }))
    }

    /// Point-in-polygon test: inside the exterior and outside every hole.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        ring_contains(&self.exterior, lon, lat)
            && !self.holes.iter().any(|hole| ring_contains(hole, lon, lat))
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.exterior.iter().copied())
    }
}

fn parse_ring(ring: &[Position]) -> ClimateResult<Vec<(f64, f64)>> {
    ring.iter()
        .map(|pos| match pos.as_slice() {
            [lon, lat, ..] => Ok((*lon, *lat)),
            _ => Err(ClimateError::Asset(format!(
                "position {:?} needs at least longitude and latitude",
                pos
            ))),
        })
        .collect()
}

/// Ray casting; works for closed and unclosed rings.
fn ring_contains(ring: &[(f64, f64)], lon: f64, lat: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];

        if ((yi > lat) != (yj > lat)) && (lon < (xj - xi) * (lat - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// The resolved analysis region: the union of one or more polygons.
///
/// The bounding box is always derived from the polygons, including when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AoiGeometryRepr")]
pub struct AoiGeometry {
    polygons: Vec<Polygon>,
    bbox: BoundingBox,
}

#[derive(Deserialize)]
struct AoiGeometryRepr {
    polygons: Vec<Polygon>,
}

impl TryFrom<AoiGeometryRepr> for AoiGeometry {
    type Error = String;

    fn try_from(repr: AoiGeometryRepr) -> Result<Self, Self::Error> {
        AoiGeometry::new(repr.polygons).ok_or_else(|| "AOI geometry needs at least one polygon".to_string())
    }
}

impl AoiGeometry {
    /// Returns `None` for an empty polygon list.
    pub fn new(polygons: Vec<Polygon>) -> Option<Self> {
        let bbox = polygons
            .iter()
            .filter_map(Polygon::bbox)
            .reduce(|a, b| a.union(&b))?;
        Some(Self { polygons, bbox })
    }

    /// Rectangle AOI, handy for whole-domain runs.
    pub fn from_bbox(bbox: BoundingBox) -> Self {
        let ring = vec![
            (bbox.min_lon, bbox.min_lat),
            (bbox.max_lon, bbox.min_lat),
            (bbox.max_lon, bbox.max_lat),
            (bbox.min_lon, bbox.max_lat),
            (bbox.min_lon, bbox.min_lat),
        ];
        Self {
            polygons: vec![Polygon::new(ring)],
            bbox,
        }
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Check if a point lies inside any polygon.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.bbox.contains(lon, lat) && self.polygons.iter().any(|p| p.contains(lon, lat))
    }
}

/// Lookup of AOI assets by identifier.
#[async_trait]
pub trait AoiAssetStore: Send + Sync {
    async fn fetch(&self, asset_id: &str) -> ClimateResult<GeoJson>;
}

/// Reads `<root>/<asset_id>.geojson`. Asset ids may contain `/`.
#[derive(Debug, Clone)]
pub struct GeoJsonAssetStore {
    root: PathBuf,
}

impl GeoJsonAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn asset_path(&self, asset_id: &str) -> ClimateResult<PathBuf> {
        let relative = Path::new(asset_id);
        if asset_id.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ClimateError::Asset(format!("invalid asset id '{}'", asset_id)));
        }
        Ok(self.root.join(format!("{}.geojson", asset_id)))
    }
}

#[async_trait]
impl AoiAssetStore for GeoJsonAssetStore {
    async fn fetch(&self, asset_id: &str) -> ClimateResult<GeoJson> {
        let path = self.asset_path(asset_id)?;
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ClimateError::Asset(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ClimateError::Asset(format!("failed to parse {}: {}", path.display(), e))
        })
    }
}

/// Assets held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetStore {
    assets: HashMap<String, GeoJson>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, asset_id: impl Into<String>, asset: GeoJson) -> Self {
        self.assets.insert(asset_id.into(), asset);
        self
    }
}

#[async_trait]
impl AoiAssetStore for InMemoryAssetStore {
    async fn fetch(&self, asset_id: &str) -> ClimateResult<GeoJson> {
        self.assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| ClimateError::Asset(format!("asset '{}' not found", asset_id)))
    }
}

/// Turns an asset reference into a single analysis geometry.
pub struct AoiResolver<'a> {
    store: &'a dyn AoiAssetStore,
}

impl<'a> AoiResolver<'a> {
    pub fn new(store: &'a dyn AoiAssetStore) -> Self {
        Self { store }
    }

    /// Resolve `asset_id`, failing with `InvalidAoi` when it holds no polygons.
    pub async fn resolve(&self, asset_id: &str) -> ClimateResult<AoiGeometry> {
        let asset = self.store.fetch(asset_id).await?;
        let polygons = asset.polygons()?;
        let count = polygons.len();

        let geometry = AoiGeometry::new(polygons).ok_or_else(|| ClimateError::InvalidAoi {
            asset_id: asset_id.to_string(),
        })?;

        info!(
            asset = %asset_id,
            polygons = count,
            bbox = ?geometry.bbox(),
            "Resolved AOI"
        );
        Ok(geometry)
    }
}
