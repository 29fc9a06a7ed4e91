//! Radius search over every bin that carries coordinates.
//!
//! This is a full scan: each call computes the haversine distance to every
//! coordinate-bearing bin. That is fine for fleets of a few thousand bins;
//! anything larger wants a spatial index in the store.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::geo::Coordinates;
use crate::model::Bin;
use crate::store::BinStore;

pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// Query-string form of a nearby search; parsed by [`NearbyParams::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NearbyParams {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub radius: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub center: Coordinates,
    pub radius_km: f64,
}

fn parse_number(field: &'static str, raw: &str) -> CoreResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| CoreError::validation(field, format!("{field} must be a number")))
}

impl NearbyParams {
    pub fn validate(&self) -> CoreResult<NearbyQuery> {
        let (Some(latitude), Some(longitude)) = (&self.latitude, &self.longitude) else {
            return Err(CoreError::validation(
                "latitude",
                "Missing required parameters: latitude, longitude",
            ));
        };
        let center = Coordinates::new(
            parse_number("latitude", latitude)?,
            parse_number("longitude", longitude)?,
        )?;
        let radius_km = match self.radius.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_RADIUS_KM,
            // An unreadable radius behaves like NaN: nothing is in range.
            Some(raw) => raw.parse::<f64>().unwrap_or(f64::NAN),
        };
        Ok(NearbyQuery { center, radius_km })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyBin {
    #[serde(flatten)]
    pub bin: Bin,
    /// Kilometers from the query center.
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyResult {
    pub center: Coordinates,
    pub radius_km: f64,
    pub bins: Vec<NearbyBin>,
    pub count: usize,
    #[serde(skip)]
    pub scanned: usize,
}

/// Keeps bins within `radius_km` of `center`, nearest first. Equal distances
/// keep their input order.
pub fn rank_by_distance(center: Coordinates, radius_km: f64, candidates: Vec<Bin>) -> Vec<NearbyBin> {
    let mut nearby: Vec<NearbyBin> = candidates
        .into_iter()
        .filter_map(|bin| {
            let distance = center.distance_km(&bin.coordinates()?);
            (distance <= radius_km).then_some(NearbyBin { bin, distance })
        })
        .collect();
    nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    nearby
}

pub async fn find_nearby(bins: &dyn BinStore, query: &NearbyQuery) -> CoreResult<NearbyResult> {
    // NaN fails this comparison too.
    if !(query.radius_km > 0.0) {
        return Ok(NearbyResult {
            center: query.center,
            radius_km: query.radius_km,
            bins: Vec::new(),
            count: 0,
            scanned: 0,
        });
    }

    let candidates = bins.bins_with_coordinates().await?;
    let scanned = candidates.len();
    let ranked = rank_by_distance(query.center, query.radius_km, candidates);
    Ok(NearbyResult {
        center: query.center,
        radius_km: query.radius_km,
        count: ranked.len(),
        bins: ranked,
        scanned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewBin;
    use crate::store::MemoryStore;
    use chrono::Utc;

    // One degree of latitude is ~111.19 km on this sphere.
    const KM_PER_DEGREE: f64 = 111.194_926_644_558_74;

    fn bin_at(id: &str, latitude: f64, longitude: f64) -> NewBin {
        let mut bin = NewBin::new(id, id, "somewhere");
        bin.coordinates = Some(Coordinates { latitude, longitude });
        bin
    }

    fn params(lat: &str, lon: &str, radius: Option<&str>) -> NearbyParams {
        NearbyParams {
            latitude: Some(lat.into()),
            longitude: Some(lon.into()),
            radius: radius.map(str::to_string),
        }
    }

    #[test]
    fn radius_defaults_to_five_km() {
        let query = params("1.5", "-2", None).validate().unwrap();
        assert_eq!(query.radius_km, DEFAULT_RADIUS_KM);
        let query = params("1.5", "-2", Some(" ")).validate().unwrap();
        assert_eq!(query.radius_km, DEFAULT_RADIUS_KM);
    }

    #[test]
    fn rejects_bad_coordinates_but_not_a_bad_radius() {
        let missing = NearbyParams {
            latitude: Some("1".into()),
            ..Default::default()
        };
        assert!(missing.validate().is_err());
        assert!(params("north", "0", None).validate().is_err());
        assert!(params("91", "0", None).validate().is_err());
        assert!(params("0", "-180.5", None).validate().is_err());
        assert!(params("0", "0", Some("far")).validate().unwrap().radius_km.is_nan());
        assert!(params("-90", "180", Some("-3")).validate().is_ok());
    }

    #[test]
    fn ranks_nearest_first_and_drops_outliers() {
        let now = Utc::now();
        let center = Coordinates { latitude: 0.0, longitude: 0.0 };
        let candidates = vec![
            bin_at("a", 0.5 / KM_PER_DEGREE, 0.0).into_bin(now),
            bin_at("b", 2.0 / KM_PER_DEGREE, 0.0).into_bin(now),
            bin_at("c", 0.9 / KM_PER_DEGREE, 0.0).into_bin(now),
        ];
        let ranked = rank_by_distance(center, 1.0, candidates);
        let ids: Vec<_> = ranked.iter().map(|n| n.bin.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert!((ranked[0].distance - 0.5).abs() < 1e-6);
        assert!((ranked[1].distance - 0.9).abs() < 1e-6);
    }

    #[test]
    fn equal_distances_keep_input_order() {
        let now = Utc::now();
        let center = Coordinates { latitude: 0.0, longitude: 0.0 };
        let candidates = vec![
            bin_at("east", 0.0, 0.01).into_bin(now),
            bin_at("west", 0.0, -0.01).into_bin(now),
        ];
        let ranked = rank_by_distance(center, 5.0, candidates);
        assert_eq!(ranked[0].bin.id, "east");
        assert_eq!(ranked[1].bin.id, "west");
    }

    #[tokio::test]
    async fn non_positive_or_unreadable_radius_is_empty_not_an_error() {
        let store = MemoryStore::new();
        store.insert_bin(&bin_at("a", 0.0, 0.0)).await.unwrap();
        for radius in ["0", "-1", "abc"] {
            let query = params("0", "0", Some(radius)).validate().unwrap();
            let result = find_nearby(&store, &query).await.unwrap();
            assert_eq!(result.count, 0);
            assert!(result.bins.is_empty());
        }
    }

    #[tokio::test]
    async fn bins_without_coordinates_are_skipped() {
        let store = MemoryStore::new();
        store.insert_bin(&bin_at("placed", 0.0, 0.0)).await.unwrap();
        store
            .insert_bin(&NewBin::new("floating", "floating", "depot"))
            .await
            .unwrap();
        let query = params("0", "0", None).validate().unwrap();
        let result = find_nearby(&store, &query).await.unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.scanned, 1);
        assert_eq!(result.bins[0].distance, 0.0);
    }

    #[test]
    fn serializes_with_camel_case_radius() {
        let result = NearbyResult {
            center: Coordinates { latitude: 1.0, longitude: 2.0 },
            radius_km: 5.0,
            bins: Vec::new(),
            count: 0,
            scanned: 3,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["radiusKm"], 5.0);
        assert_eq!(json["center"]["latitude"], 1.0);
        assert!(json.get("scanned").is_none());
    }
}
