use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(LineId);
id_newtype!(StopId);

impl StopId {
    /// Reserved id meaning "not at any stop": the vehicle enters or leaves observation.
    pub const SENTINEL: &'static str = "-1";

    pub fn is_sentinel(&self) -> bool {
        self.0 == Self::SENTINEL
    }
}

/// Itinerary (direction) number of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iti(pub u32);

impl fmt::Display for Iti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One directional service of a line, written `<line>.<iti>` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Route {
    pub line: LineId,
    pub iti: Iti,
}

impl Route {
    pub fn new(line: impl Into<LineId>, iti: u32) -> Self {
        Self {
            line: line.into(),
            iti: Iti(iti),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.line, self.iti)
    }
}

impl FromStr for Route {
    type Err = DecodeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || DecodeError::InvalidRoute(raw.to_string());
        let (line, iti) = raw.split_once('.').ok_or_else(invalid)?;
        if line.is_empty() {
            return Err(invalid());
        }
        let iti = iti.trim().parse::<u32>().map_err(|_| invalid())?;
        Ok(Self {
            line: LineId::new(line),
            iti: Iti(iti),
        })
    }
}

impl TryFrom<String> for Route {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Route> for String {
    fn from(value: Route) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportMode {
    #[serde(rename = "M", alias = "metro")]
    Metro,
    #[serde(rename = "T", alias = "tram")]
    Tram,
    #[serde(rename = "B", alias = "bus")]
    Bus,
}

impl TransportMode {
    pub fn asset_name(self) -> &'static str {
        match self {
            Self::Metro => "metro",
            Self::Tram => "tram",
            Self::Bus => "bus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Linear interpolation towards `target`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, target: Position, t: f64) -> Position {
        let t = t.clamp(0.0, 1.0);
        Position {
            latitude: self.latitude + (target.latitude - self.latitude) * t,
            longitude: self.longitude + (target.longitude - self.longitude) * t,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_route_at_first_dot() {
        let route: Route = "1.0".parse().expect("route");
        assert_eq!(route, Route::new("1", 0));
        assert_eq!(route.to_string(), "1.0");
    }

    #[test]
    fn rejects_routes_without_itinerary() {
        assert!("12".parse::<Route>().is_err());
        assert!(".1".parse::<Route>().is_err());
        assert!("12.x".parse::<Route>().is_err());
    }

    #[test]
    fn sentinel_stop_is_minus_one() {
        assert!(StopId::new("-1").is_sentinel());
        assert!(!StopId::new("8012").is_sentinel());
    }

    #[test]
    fn lerp_clamps_progress() {
        let from = Position::new(50.0, 4.0);
        let to = Position::new(51.0, 5.0);
        assert_eq!(from.lerp(to, 0.5), Position::new(50.5, 4.5));
        assert_eq!(from.lerp(to, 2.0), to);
    }
}
