use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Iti, LineId, Position, Route, StopId, TransportMode},
    error::DecodeError,
};

/// Body of the line catalog feed: line id to a raw line record. Records are
/// decoded one at a time so a bad line only loses that line.
pub type LinesResponse = HashMap<String, serde_json::Value>;

/// Body of the snapshot feed, one raw [`PresentRecord`] per entry.
pub type PresentResponse = Vec<serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRecord {
    #[serde(default, deserialize_with = "lenient::optional_id")]
    pub id: Option<LineId>,
    #[serde(default)]
    pub bgcolor: String,
    #[serde(default)]
    pub fgcolor: String,
    pub mode: TransportMode,
    /// Remaining fields, including the `destination<N>` names.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LineRecord {
    pub fn decode(value: serde_json::Value) -> Result<Self, DecodeError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn destinations(&self) -> BTreeMap<Iti, String> {
        self.extra
            .iter()
            .filter_map(|(field, value)| {
                let iti = field.strip_prefix("destination")?.parse::<u32>().ok()?;
                Some((Iti(iti), value.as_str()?.to_string()))
            })
            .collect()
    }
}

/// One entry of the snapshot feed: a vehicle currently present at a stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentRecord {
    #[serde(deserialize_with = "lenient::id")]
    pub line: LineId,
    pub route: PresentRoute,
    pub stop: PresentStop,
}

impl PresentRecord {
    pub fn decode(value: serde_json::Value) -> Result<Self, DecodeError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn route(&self) -> Route {
        Route {
            line: self.line.clone(),
            iti: self.route.iti,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentRoute {
    #[serde(deserialize_with = "lenient::iti")]
    pub iti: Iti,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentStop {
    #[serde(deserialize_with = "lenient::id")]
    pub id: StopId,
    #[serde(default, deserialize_with = "lenient::coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::coordinate")]
    pub longitude: Option<f64>,
}

impl PresentStop {
    pub fn position(&self) -> Option<Position> {
        Some(Position::new(self.latitude?, self.longitude?))
    }
}

/// A single live message: the vehicle on `route` moved from `origin` to `destination`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopEvent {
    pub route: Route,
    pub origin: StopRef,
    pub destination: StopRef,
}

impl StopEvent {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRef {
    #[serde(deserialize_with = "lenient::id")]
    pub id: StopId,
    #[serde(default, deserialize_with = "lenient::coordinate")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::coordinate")]
    pub lon: Option<f64>,
}

impl StopRef {
    pub fn position(&self) -> Option<Position> {
        Some(Position::new(self.lat?, self.lon?))
    }
}

// The producer keeps every field as text, so numbers may arrive quoted and
// unknown coordinates as "".
mod lenient {
    use serde::{de::Error as _, Deserialize, Deserializer};

    use crate::domain::Iti;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(i64),
        Float(f64),
        Text(String),
    }

    impl Scalar {
        fn into_text(self) -> String {
            match self {
                Scalar::Int(v) => v.to_string(),
                Scalar::Float(v) => v.to_string(),
                Scalar::Text(v) => v,
            }
        }
    }

    pub fn id<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: From<String>,
    {
        Ok(T::from(Scalar::deserialize(deserializer)?.into_text()))
    }

    pub fn optional_id<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: From<String>,
    {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(|v| T::from(v.into_text())))
    }

    pub fn iti<'de, D>(deserializer: D) -> Result<Iti, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Scalar::deserialize(deserializer)? {
            Scalar::Int(v) => u32::try_from(v).map(Iti).map_err(D::Error::custom),
            Scalar::Text(v) => v.trim().parse::<u32>().map(Iti).map_err(D::Error::custom),
            Scalar::Float(v) => Err(D::Error::custom(format!("invalid itinerary {v}"))),
        }
    }

    pub fn coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Scalar>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Scalar::Int(v)) => Ok(Some(v as f64)),
            Some(Scalar::Float(v)) => Ok(Some(v)),
            Some(Scalar::Text(v)) if v.trim().is_empty() => Ok(None),
            Some(Scalar::Text(v)) => v.trim().parse::<f64>().map(Some).map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_event_with_blank_sentinel_coordinates() {
        let event = StopEvent::decode(
            r#"{"route":"1.0","origin":{"id":"-1","lat":"","lon":""},
                "destination":{"id":"B","lat":"50.86","lon":4.36}}"#,
        )
        .expect("decode");

        assert_eq!(event.route, Route::new("1", 0));
        assert!(event.origin.id.is_sentinel());
        assert_eq!(event.origin.position(), None);
        assert_eq!(event.destination.position(), Some(Position::new(50.86, 4.36)));
    }

    #[test]
    fn decodes_numeric_stop_ids() {
        let event = StopEvent::decode(
            r#"{"route":"5.2","origin":{"id":-1},"destination":{"id":8012,"lat":50.8,"lon":4.3}}"#,
        )
        .expect("decode");

        assert!(event.origin.id.is_sentinel());
        assert_eq!(event.destination.id, StopId::new("8012"));
    }

    #[test]
    fn rejects_event_with_malformed_route() {
        let err = StopEvent::decode(
            r#"{"route":"nodot","origin":{"id":"-1"},"destination":{"id":"-1"}}"#,
        )
        .expect_err("must fail");
        assert!(err.to_string().contains("nodot"), "unexpected error: {err}");
    }

    #[test]
    fn line_record_collects_destinations_by_itinerary() {
        let record: LineRecord = serde_json::from_str(
            r#"{"id":"1","bgcolor":"C4008F","fgcolor":"FFFFFF","mode":"M",
                "destination1":"GARE DE L'OUEST","destination2":"STOCKEL","name":"ignored"}"#,
        )
        .expect("decode");

        assert_eq!(record.mode, TransportMode::Metro);
        assert_eq!(record.id, Some(LineId::new("1")));
        let destinations = record.destinations();
        assert_eq!(destinations.len(), 2);
        assert_eq!(destinations[&Iti(2)], "STOCKEL");
    }

    #[test]
    fn present_record_accepts_text_and_numbers() {
        let record: PresentRecord = serde_json::from_str(
            r#"{"line":"1","route":{"iti":"0","destination":"x"},
                "stop":{"id":"A","latitude":"50.85","longitude":4.35,"name":"Gare"}}"#,
        )
        .expect("decode");

        assert_eq!(record.route(), Route::new("1", 0));
        assert_eq!(record.stop.position(), Some(Position::new(50.85, 4.35)));
    }

    #[test]
    fn bad_present_record_does_not_spoil_its_neighbours() {
        let body: PresentResponse = serde_json::from_str(
            r#"[{"line":"1","route":{"iti":0},"stop":{"id":"A","latitude":50.85,"longitude":4.35}},
                {"line":"1","route":{"iti":0},"stop":{"id":"B","latitude":"n/a","longitude":4.36}}]"#,
        )
        .expect("body");

        let decoded: Vec<_> = body.into_iter().map(PresentRecord::decode).collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(
            decoded[0].as_ref().expect("record A").stop.id,
            StopId::new("A")
        );
        assert!(decoded[1].is_err());
    }

    #[test]
    fn line_record_without_mode_is_rejected() {
        let err = LineRecord::decode(serde_json::json!({"id": "N04", "bgcolor": "000000"}))
            .expect_err("must fail");
        assert!(err.to_string().contains("mode"), "unexpected error: {err}");
    }

    #[test]
    fn present_record_without_coordinates_has_no_position() {
        let record: PresentRecord =
            serde_json::from_str(r#"{"line":"92","route":{"iti":1},"stop":{"id":"A"}}"#)
                .expect("decode");
        assert_eq!(record.stop.position(), None);
    }
}
