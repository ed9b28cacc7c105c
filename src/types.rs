use geo::MultiPolygon;
use serde::{Deserialize, Deserializer, Serialize};

/// One county boundary in projected coordinate space, keyed by FIPS code.
#[derive(Debug, Clone)]
pub struct RegionFeature {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
}

/// One row of the attainment dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct AttainmentRecord {
    #[serde(deserialize_with = "region_key")]
    pub fips: String,
    pub state: String,
    pub area_name: String,
    #[serde(rename = "bachelorsOrHigher")]
    pub bachelors_or_higher: f64,
}

/// One classification bucket: `[lower, upper]` of the value domain and the
/// fill it maps to.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBucket {
    pub lower: f64,
    pub upper: f64,
    pub color: String,
}

/// A joined region: boundary, resolved record (None when the dataset has no
/// row for the region), and the derived display encoding.
#[derive(Debug, Clone)]
pub struct RegionDatum {
    pub feature: RegionFeature,
    pub record: Option<AttainmentRecord>,
    pub value: f64,
    pub label: String,
    pub bucket: ColorBucket,
    pub color: String,
}

impl RegionDatum {
    pub fn payload(&self) -> ShapePayload {
        ShapePayload {
            fips: self.feature.id.clone(),
            label: self.label.clone(),
            value: self.value,
        }
    }
}

/// The label+value payload attached to each drawn shape; hover handlers read
/// it back to populate the tooltip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapePayload {
    pub fips: String,
    pub label: String,
    pub value: f64,
}

/// Region keys appear as strings in some exports and bare numbers in others
/// (the upstream county topology carries numeric FIPS ids). Both sides of
/// the join normalize through here so `1001` and `"1001"` meet.
fn region_key<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    struct KeyVisitor;

    impl serde::de::Visitor<'_> for KeyVisitor {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a region key as a string or number")
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_owned())
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    de.deserialize_any(KeyVisitor)
}

/// Same normalization for ids carried in geometry documents.
pub(crate) fn key_from_json(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
