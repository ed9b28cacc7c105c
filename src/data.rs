use crate::config::AppConfig;
use crate::error::Error;
use crate::types::{key_from_json, AttainmentRecord, RegionFeature};
use csv::ReaderBuilder;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Load both datasets concurrently and suspend until both resolve. The
/// pipeline only runs once both are in hand; a failure on either side is a
/// `Fetch` error the caller surfaces as a visible unavailable state.
pub async fn load_datasets(config: &AppConfig) -> Result<(Value, Vec<AttainmentRecord>), Error> {
    tokio::try_join!(
        load_geometry(&config.input.counties),
        load_records(&config.input.education),
    )
}

async fn load_geometry(source: &str) -> Result<Value, Error> {
    let raw = read_source(source).await?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::MalformedTopology(format!("{source}: {e}")))
}

async fn load_records(source: &str) -> Result<Vec<AttainmentRecord>, Error> {
    let raw = read_source(source).await?;
    if source.rsplit('.').next() == Some("csv") {
        parse_records_csv(&raw)
    } else {
        serde_json::from_str(&raw).map_err(|e| Error::MalformedRecords(format!("{source}: {e}")))
    }
}

/// Sources are either http(s) URLs or local paths; both resolve to the raw
/// document text.
async fn read_source(source: &str) -> Result<String, Error> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::fetch(source, e))?;
        response.text().await.map_err(|e| Error::fetch(source, e))
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| Error::fetch(source, e))
    }
}

/// CSV records are read by header name so region keys stay exactly as
/// written (a serde round-trip would strip leading zeros from numeric-
/// looking FIPS codes).
fn parse_records_csv(raw: &str) -> Result<Vec<AttainmentRecord>, Error> {
    let mut rdr = ReaderBuilder::new().from_reader(raw.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| Error::MalformedRecords(e.to_string()))?
        .clone();

    let col = |name: &str| -> Result<usize, Error> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::MalformedRecords(format!("column '{name}' not found in CSV")))
    };
    let fips_idx = col("fips")?;
    let state_idx = col("state")?;
    let area_idx = col("area_name")?;
    let value_idx = col("bachelorsOrHigher")?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| Error::MalformedRecords(e.to_string()))?;
        let fips = record.get(fips_idx).unwrap_or("").to_string();
        if fips.is_empty() {
            continue;
        }
        let value: f64 = record
            .get(value_idx)
            .unwrap_or("")
            .parse()
            .map_err(|_| {
                Error::MalformedRecords(format!("non-numeric bachelorsOrHigher for fips {fips}"))
            })?;
        records.push(AttainmentRecord {
            fips,
            state: record.get(state_idx).unwrap_or("").to_string(),
            area_name: record.get(area_idx).unwrap_or("").to_string(),
            bachelors_or_higher: value,
        });
    }

    Ok(records)
}

/// Region-key lookup over the attainment dataset. Keys are expected unique;
/// on duplicates the first-encountered record wins.
pub struct AttainmentIndex {
    by_fips: HashMap<String, AttainmentRecord>,
}

impl AttainmentIndex {
    pub fn build(records: Vec<AttainmentRecord>) -> Self {
        let mut by_fips = HashMap::with_capacity(records.len());
        for record in records {
            by_fips.entry(record.fips.clone()).or_insert(record);
        }
        AttainmentIndex { by_fips }
    }

    pub fn lookup(&self, id: &str) -> Option<&AttainmentRecord> {
        self.by_fips.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_fips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fips.is_empty()
    }
}

/// Extract one `RegionFeature` per county geometry from the geometry
/// document. Topology documents and flat GeoJSON FeatureCollections are both
/// accepted; the document's `type` field picks the decoder.
pub fn extract_features(document: Value, object_name: &str) -> Result<Vec<RegionFeature>, Error> {
    match document.get("type").and_then(Value::as_str) {
        Some("Topology") => topology_features(document, object_name),
        Some("FeatureCollection") => collection_features(document),
        other => Err(Error::MalformedTopology(format!(
            "expected a Topology or FeatureCollection document, got type {other:?}"
        ))),
    }
}

// ---- topology decoding ----------------------------------------------------

#[derive(Deserialize)]
struct TopologyDoc {
    #[serde(default)]
    transform: Option<TopoTransform>,
    arcs: Vec<Vec<Vec<f64>>>,
    objects: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct TopoTransform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum TopoGeometry {
    GeometryCollection {
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        #[serde(default)]
        id: Option<Value>,
        arcs: Vec<Vec<i64>>,
    },
    MultiPolygon {
        #[serde(default)]
        id: Option<Value>,
        arcs: Vec<Vec<Vec<i64>>>,
    },
    #[serde(other)]
    Unsupported,
}

fn topology_features(document: Value, object_name: &str) -> Result<Vec<RegionFeature>, Error> {
    let topo: TopologyDoc = serde_json::from_value(document)
        .map_err(|e| Error::MalformedTopology(e.to_string()))?;

    let object = topo.objects.get(object_name).ok_or_else(|| {
        Error::MalformedTopology(format!("missing object collection {object_name:?}"))
    })?;
    let geometry: TopoGeometry = serde_json::from_value(object.clone())
        .map_err(|e| Error::MalformedTopology(format!("object {object_name:?}: {e}")))?;

    let decoder = ArcDecoder {
        arcs: &topo.arcs,
        transform: topo.transform.as_ref(),
    };

    let mut features = Vec::new();
    collect_topo_features(&decoder, geometry, &mut features)?;
    Ok(features)
}

fn collect_topo_features(
    decoder: &ArcDecoder,
    geometry: TopoGeometry,
    out: &mut Vec<RegionFeature>,
) -> Result<(), Error> {
    match geometry {
        TopoGeometry::GeometryCollection { geometries } => {
            for child in geometries {
                collect_topo_features(decoder, child, out)?;
            }
        }
        TopoGeometry::Polygon { id, arcs } => {
            if let Some(id) = feature_id(id) {
                let polygon = decoder.polygon(&arcs)?;
                out.push(RegionFeature {
                    id,
                    geometry: MultiPolygon::new(vec![polygon]),
                });
            }
        }
        TopoGeometry::MultiPolygon { id, arcs } => {
            if let Some(id) = feature_id(id) {
                let polygons = arcs
                    .iter()
                    .map(|rings| decoder.polygon(rings))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(RegionFeature {
                    id,
                    geometry: MultiPolygon::new(polygons),
                });
            }
        }
        TopoGeometry::Unsupported => {}
    }
    Ok(())
}

fn feature_id(id: Option<Value>) -> Option<String> {
    let id = id.as_ref().and_then(key_from_json);
    if id.is_none() {
        tracing::warn!("skipping geometry without a feature id");
    }
    id
}

struct ArcDecoder<'a> {
    arcs: &'a [Vec<Vec<f64>>],
    transform: Option<&'a TopoTransform>,
}

impl ArcDecoder<'_> {
    /// One arc as absolute projected coordinates. With a transform present
    /// the stored positions are quantized deltas; a negative index selects
    /// the complement arc reversed.
    fn arc(&self, index: i64) -> Result<Vec<Coord<f64>>, Error> {
        let (pos, reversed) = if index < 0 {
            ((-1 - index) as usize, true)
        } else {
            (index as usize, false)
        };
        let arc = self.arcs.get(pos).ok_or_else(|| {
            Error::MalformedTopology(format!("arc index {index} out of range"))
        })?;

        let mut coords = Vec::with_capacity(arc.len());
        match self.transform {
            Some(t) => {
                let (mut x, mut y) = (0.0_f64, 0.0_f64);
                for position in arc {
                    let [dx, dy] = position_xy(position)?;
                    x += dx;
                    y += dy;
                    coords.push(Coord {
                        x: x * t.scale[0] + t.translate[0],
                        y: y * t.scale[1] + t.translate[1],
                    });
                }
            }
            None => {
                for position in arc {
                    let [x, y] = position_xy(position)?;
                    coords.push(Coord { x, y });
                }
            }
        }

        if reversed {
            coords.reverse();
        }
        Ok(coords)
    }

    /// Stitch a ring from its arc references; consecutive arcs share their
    /// junction point, so every arc after the first drops its head.
    fn ring(&self, arc_refs: &[i64]) -> Result<LineString<f64>, Error> {
        let mut ring = Vec::new();
        for (i, &index) in arc_refs.iter().enumerate() {
            let coords = self.arc(index)?;
            if i == 0 {
                ring.extend(coords);
            } else {
                ring.extend(coords.into_iter().skip(1));
            }
        }
        Ok(LineString::new(ring))
    }

    fn polygon(&self, rings: &[Vec<i64>]) -> Result<Polygon<f64>, Error> {
        let mut decoded = rings.iter().map(|r| self.ring(r));
        let exterior = decoded.next().transpose()?.ok_or_else(|| {
            Error::MalformedTopology("polygon with no rings".to_string())
        })?;
        let interiors = decoded.collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(exterior, interiors))
    }
}

fn position_xy(position: &[f64]) -> Result<[f64; 2], Error> {
    if position.len() < 2 {
        return Err(Error::MalformedTopology(format!(
            "position with {} coordinates",
            position.len()
        )));
    }
    Ok([position[0], position[1]])
}

// ---- flat GeoJSON path ----------------------------------------------------

fn collection_features(document: Value) -> Result<Vec<RegionFeature>, Error> {
    let geojson: geojson::GeoJson = serde_json::from_value(document)
        .map_err(|e| Error::MalformedTopology(e.to_string()))?;

    let collection = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(Error::MalformedTopology(
                "GeoJSON geometry input must be a FeatureCollection".to_string(),
            ))
        }
    };

    let mut features = Vec::new();
    for feature in collection.features {
        let id = match feature.id {
            Some(geojson::feature::Id::String(s)) => s,
            Some(geojson::feature::Id::Number(n)) => n.to_string(),
            None => {
                tracing::warn!("skipping feature without an id");
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(geometry) => {
                let converted: geo::Geometry<f64> = geometry
                    .value
                    .try_into()
                    .map_err(|e| Error::MalformedTopology(format!("feature {id}: {e:?}")))?;
                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        features.push(RegionFeature { id, geometry });
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::{extract_features, AttainmentIndex};
    use crate::types::AttainmentRecord;

    // Two unit-scale squares, delta-encoded against an identity-ish
    // transform, under a "counties" collection.
    const TWO_COUNTY_TOPOLOGY: &str = r#"{
        "type": "Topology",
        "transform": {"scale": [1, 1], "translate": [0, 0]},
        "objects": {
            "counties": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "id": "01001", "arcs": [[0]]},
                    {"type": "Polygon", "id": "01003", "arcs": [[1]]}
                ]
            }
        },
        "arcs": [
            [[0, 0], [10, 0], [0, 10], [-10, 0], [0, -10]],
            [[20, 0], [10, 0], [0, 10], [-10, 0], [0, -10]]
        ]
    }"#;

    fn record(fips: &str, name: &str, value: f64) -> AttainmentRecord {
        AttainmentRecord {
            fips: fips.to_string(),
            state: "AL".to_string(),
            area_name: name.to_string(),
            bachelors_or_higher: value,
        }
    }

    #[test]
    fn topology_decodes_to_one_feature_per_geometry() {
        let doc = serde_json::from_str(TWO_COUNTY_TOPOLOGY).unwrap();
        let features = extract_features(doc, "counties").unwrap();

        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "01001");
        assert_eq!(features[1].id, "01003");

        // Delta decoding: the first square spans x 0..10, the second 20..30.
        use geo::BoundingRect;
        let first = features[0].geometry.bounding_rect().unwrap();
        assert_eq!((first.min().x, first.max().x), (0.0, 10.0));
        assert_eq!((first.min().y, first.max().y), (0.0, 10.0));
        let second = features[1].geometry.bounding_rect().unwrap();
        assert_eq!((second.min().x, second.max().x), (20.0, 30.0));
    }

    #[test]
    fn negative_arc_index_reverses_the_shared_arc() {
        // Two triangles sharing arc 0 along their common edge; the second
        // references it as ~0.
        let doc = serde_json::from_str(
            r#"{
                "type": "Topology",
                "objects": {
                    "counties": {
                        "type": "GeometryCollection",
                        "geometries": [
                            {"type": "Polygon", "id": 1, "arcs": [[0, 1]]},
                            {"type": "Polygon", "id": 2, "arcs": [[-1, 2]]}
                        ]
                    }
                },
                "arcs": [
                    [[0, 0], [4, 4]],
                    [[4, 4], [0, 4], [0, 0]],
                    [[0, 0], [4, 0], [4, 4]]
                ]
            }"#,
        )
        .unwrap();

        let features = extract_features(doc, "counties").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "1");
        assert_eq!(features[1].id, "2");

        use geo::{Contains, Point};
        assert!(features[0].geometry.contains(&Point::new(1.0, 3.0)));
        assert!(features[1].geometry.contains(&Point::new(3.0, 1.0)));
    }

    #[test]
    fn missing_object_collection_is_malformed() {
        let doc = serde_json::from_str(TWO_COUNTY_TOPOLOGY).unwrap();
        let err = extract_features(doc, "tracts").unwrap_err();
        assert!(matches!(err, crate::error::Error::MalformedTopology(_)));
        assert!(err.to_string().contains("tracts"));
    }

    #[test]
    fn feature_collection_documents_are_accepted() {
        let doc = serde_json::from_str(
            r#"{
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "id": 1001,
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
                    }
                }]
            }"#,
        )
        .unwrap();

        let features = extract_features(doc, "counties").unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, "1001");
    }

    #[test]
    fn index_keeps_first_record_on_duplicate_keys() {
        let index = AttainmentIndex::build(vec![
            record("01001", "Autauga", 20.0),
            record("01001", "Duplicate", 99.0),
            record("01003", "Baldwin", 80.0),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("01001").unwrap().area_name, "Autauga");
        assert_eq!(index.lookup("01003").unwrap().bachelors_or_higher, 80.0);
        assert!(index.lookup("99999").is_none());
    }

    #[test]
    fn csv_records_keep_leading_zeros() {
        let records = super::parse_records_csv(
            "fips,state,area_name,bachelorsOrHigher\n01001,AL,Autauga County,24.6\n",
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fips, "01001");
        assert_eq!(records[0].area_name, "Autauga County");
        assert!((records[0].bachelors_or_higher - 24.6).abs() < f64::EPSILON);
    }
}
