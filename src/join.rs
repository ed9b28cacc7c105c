use crate::classify::ThresholdScale;
use crate::data::AttainmentIndex;
use crate::types::{RegionDatum, RegionFeature};

/// The joined map data plus the keys that had no attainment record.
pub struct JoinOutcome {
    pub regions: Vec<RegionDatum>,
    pub unmatched: Vec<String>,
}

/// Join every feature with its attainment record, classifying the value into
/// a color bucket. Feature order is preserved and every feature yields
/// exactly one datum: a missing record is a diagnostic, not a failure, and
/// the region falls back to value 0 with the scale's color for 0.
pub fn join_regions(
    features: Vec<RegionFeature>,
    index: &AttainmentIndex,
    scale: &ThresholdScale,
) -> JoinOutcome {
    let mut regions = Vec::with_capacity(features.len());
    let mut unmatched = Vec::new();

    for feature in features {
        let datum = match index.lookup(&feature.id) {
            Some(record) => {
                let value = record.bachelors_or_higher;
                let bucket = scale.bucket_for(value);
                RegionDatum {
                    color: bucket.color.clone(),
                    label: format!("{}, {}", record.area_name, record.state),
                    value,
                    bucket,
                    record: Some(record.clone()),
                    feature,
                }
            }
            None => {
                tracing::warn!(region = %feature.id, "no attainment record for region");
                unmatched.push(feature.id.clone());
                let bucket = scale.bucket_for(0.0);
                RegionDatum {
                    color: bucket.color.clone(),
                    label: String::new(),
                    value: 0.0,
                    bucket,
                    record: None,
                    feature,
                }
            }
        };
        regions.push(datum);
    }

    JoinOutcome { regions, unmatched }
}

#[cfg(test)]
mod tests {
    use super::join_regions;
    use crate::classify::ThresholdScale;
    use crate::data::AttainmentIndex;
    use crate::types::{AttainmentRecord, RegionFeature};
    use geo::{Coord, LineString, MultiPolygon, Polygon};

    fn square(offset: f64) -> MultiPolygon<f64> {
        let ring = LineString::new(vec![
            Coord { x: offset, y: 0.0 },
            Coord { x: offset + 10.0, y: 0.0 },
            Coord { x: offset + 10.0, y: 10.0 },
            Coord { x: offset, y: 10.0 },
            Coord { x: offset, y: 0.0 },
        ]);
        MultiPolygon::new(vec![Polygon::new(ring, vec![])])
    }

    fn feature(id: &str, offset: f64) -> RegionFeature {
        RegionFeature {
            id: id.to_string(),
            geometry: square(offset),
        }
    }

    fn record(fips: &str, name: &str, value: f64) -> AttainmentRecord {
        AttainmentRecord {
            fips: fips.to_string(),
            state: "AL".to_string(),
            area_name: name.to_string(),
            bachelors_or_higher: value,
        }
    }

    fn scenario() -> (AttainmentIndex, ThresholdScale) {
        let records = vec![record("01001", "Autauga", 20.0), record("01003", "Baldwin", 80.0)];
        let scale = ThresholdScale::from_values(
            records.iter().map(|r| r.bachelors_or_higher),
            vec!["#c0".to_string(), "#c1".to_string(), "#c2".to_string()],
        )
        .unwrap();
        (AttainmentIndex::build(records), scale)
    }

    #[test]
    fn matched_regions_take_their_bucket_color_and_label() {
        let (index, scale) = scenario();
        let outcome = join_regions(
            vec![feature("01001", 0.0), feature("01003", 20.0)],
            &index,
            &scale,
        );

        assert!(outcome.unmatched.is_empty());
        assert_eq!(outcome.regions.len(), 2);

        let autauga = &outcome.regions[0];
        assert_eq!(autauga.label, "Autauga, AL");
        assert_eq!(autauga.color, "#c1");
        assert_eq!((autauga.bucket.lower, autauga.bucket.upper), (20.0, 50.0));

        let baldwin = &outcome.regions[1];
        assert_eq!(baldwin.label, "Baldwin, AL");
        assert_eq!(baldwin.color, "#c2");
        assert_eq!((baldwin.bucket.lower, baldwin.bucket.upper), (50.0, 80.0));
    }

    #[test]
    fn join_preserves_cardinality_and_order() {
        let (index, scale) = scenario();
        let ids = ["01003", "99999", "01001"];
        let outcome = join_regions(
            ids.iter().map(|id| feature(id, 0.0)).collect(),
            &index,
            &scale,
        );

        let joined: Vec<&str> = outcome.regions.iter().map(|d| d.feature.id.as_str()).collect();
        assert_eq!(joined, ids);
    }

    #[test]
    fn unmatched_region_falls_back_and_is_diagnosed() {
        let (index, scale) = scenario();
        let outcome = join_regions(vec![feature("99999", 0.0)], &index, &scale);

        assert_eq!(outcome.unmatched, vec!["99999".to_string()]);
        let datum = &outcome.regions[0];
        assert!(datum.record.is_none());
        assert_eq!(datum.value, 0.0);
        assert_eq!(datum.label, "");
        // 0 sits below the observed domain, so the fallback takes the
        // leading palette color.
        assert_eq!(datum.color, "#c0");
    }

    #[test]
    fn matched_values_sit_inside_their_buckets() {
        let (index, scale) = scenario();
        let outcome = join_regions(
            vec![feature("01001", 0.0), feature("01003", 20.0)],
            &index,
            &scale,
        );
        for datum in outcome.regions {
            assert!(datum.bucket.lower <= datum.value && datum.value <= datum.bucket.upper);
        }
    }
}
