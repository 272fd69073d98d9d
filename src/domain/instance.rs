// Problem instance: surgeries, days, rooms and doctors

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Mean and standard deviation of a surgery duration, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    pub mu: f64,
    pub sigma: f64,
}

impl MeanStd {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }
}

/// Separator between room and doctor ids in `mu_sigma` keys. Room and doctor
/// ids must not contain it.
pub const KEY_SEPARATOR: char = '|';

/// How the duration of a surgery is specified.
#[derive(Debug, Clone, PartialEq)]
pub enum DurationSpec {
    /// One pair for every room and doctor, gated by specialty compatibility.
    Flat(MeanStd),
    /// Explicit pair per `(room id, doctor id)`; missing pairs are inadmissible.
    PerRoomDoctor(BTreeMap<(String, String), MeanStd>),
}

/// Failure to resolve the duration specification of a surgery.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DurationSpecError {
    #[error("surgery '{surgery}' has no duration: expected 'mu_sigma' or 'duration_mean' and 'duration_std'")]
    Missing { surgery: String },

    #[error("surgery '{surgery}' has 'duration_mean' without 'duration_std' (or the reverse)")]
    Incomplete { surgery: String },

    #[error("surgery '{surgery}' has malformed mu_sigma key '{key}', expected '<room>|<doctor>'")]
    MalformedKey { surgery: String, key: String },
}

/// Errors raised while loading an instance document.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} id '{id}' contains the reserved separator '|'")]
    ReservedSeparator { kind: &'static str, id: String },
}

#[derive(Debug, Deserialize)]
struct RawSurgery {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    specialty: Option<String>,
    #[serde(default)]
    mu_sigma: Option<BTreeMap<String, MeanStd>>,
    #[serde(default, alias = "mu")]
    duration_mean: Option<f64>,
    #[serde(default, alias = "sigma")]
    duration_std: Option<f64>,
}

/// A surgery to be scheduled exactly once.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawSurgery")]
pub struct Surgery {
    pub id: String,
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub duration: DurationSpec,
}

impl Surgery {
    pub fn flat(id: impl Into<String>, mu: f64, sigma: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            specialty: None,
            duration: DurationSpec::Flat(MeanStd::new(mu, sigma)),
        }
    }

    pub fn per_room_doctor(
        id: impl Into<String>,
        pairs: impl IntoIterator<Item = ((String, String), MeanStd)>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            specialty: None,
            duration: DurationSpec::PerRoomDoctor(pairs.into_iter().collect()),
        }
    }

    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

}

impl TryFrom<RawSurgery> for Surgery {
    type Error = DurationSpecError;

    fn try_from(raw: RawSurgery) -> Result<Self, Self::Error> {
        // An explicit table wins over a flat pair when both are present.
        let duration = match (raw.mu_sigma, raw.duration_mean, raw.duration_std) {
            (Some(table), _, _) => {
                let mut pairs = BTreeMap::new();
                for (key, stats) in table {
                    let (room, doctor) = key
                        .split_once(KEY_SEPARATOR)
                        .filter(|(_, doctor)| !doctor.contains(KEY_SEPARATOR))
                        .ok_or_else(|| DurationSpecError::MalformedKey {
                            surgery: raw.id.clone(),
                            key: key.clone(),
                        })?;
                    pairs.insert((room.to_string(), doctor.to_string()), stats);
                }
                DurationSpec::PerRoomDoctor(pairs)
            }
            (None, Some(mu), Some(sigma)) => DurationSpec::Flat(MeanStd::new(mu, sigma)),
            (None, None, None) => return Err(DurationSpecError::Missing { surgery: raw.id }),
            (None, _, _) => return Err(DurationSpecError::Incomplete { surgery: raw.id }),
        };

        Ok(Self {
            id: raw.id,
            name: raw.name,
            specialty: raw.specialty,
            duration,
        })
    }
}

/// A planning day with its regular operating hours.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Day {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Regular-hours capacity in minutes
    #[serde(rename = "H", alias = "regular_hours")]
    pub regular_hours: f64,
}

impl Day {
    pub fn new(id: impl Into<String>, regular_hours: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            regular_hours,
        }
    }
}

/// An operating room.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Room {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "types")]
    pub specialties: Option<BTreeSet<String>>,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            specialties: None,
        }
    }

    pub fn with_specialties<I, S>(mut self, specialties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specialties = Some(specialties.into_iter().map(Into::into).collect());
        self
    }

    pub fn supports(&self, specialty: &str) -> bool {
        self.specialties
            .as_ref()
            .is_some_and(|set| set.contains(specialty))
    }
}

/// A surgeon.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Doctor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Minutes available per day id; days not listed fall back to the day's H
    #[serde(default)]
    pub daily_capacity: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub specialties: Option<BTreeSet<String>>,
}

impl Doctor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            daily_capacity: None,
            specialties: None,
        }
    }

    pub fn with_capacity(mut self, day: impl Into<String>, minutes: f64) -> Self {
        self.daily_capacity
            .get_or_insert_with(BTreeMap::new)
            .insert(day.into(), minutes);
        self
    }

    pub fn with_specialties<I, S>(mut self, specialties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specialties = Some(specialties.into_iter().map(Into::into).collect());
        self
    }

    pub fn capacity_on(&self, day: &Day) -> f64 {
        self.daily_capacity
            .as_ref()
            .and_then(|caps| caps.get(&day.id))
            .copied()
            .unwrap_or(day.regular_hours)
    }

    pub fn practices(&self, specialty: &str) -> bool {
        self.specialties
            .as_ref()
            .is_some_and(|set| set.contains(specialty))
    }
}

/// Complete problem instance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Instance {
    pub surgeries: Vec<Surgery>,
    pub days: Vec<Day>,
    pub rooms: Vec<Room>,
    pub doctors: Vec<Doctor>,
}

impl Instance {
    pub fn new(
        surgeries: Vec<Surgery>,
        days: Vec<Day>,
        rooms: Vec<Room>,
        doctors: Vec<Doctor>,
    ) -> Self {
        Self {
            surgeries,
            days,
            rooms,
            doctors,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, InstanceError> {
        let instance: Self = serde_json::from_str(s)?;
        instance.check_ids()?;
        Ok(instance)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InstanceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Capacity of doctor `k` on day `d`, by index.
    pub fn doctor_capacity(&self, k: usize, d: usize) -> f64 {
        self.doctors[k].capacity_on(&self.days[d])
    }

    pub fn room_index(&self, id: &str) -> Option<usize> {
        self.rooms.iter().position(|r| r.id == id)
    }

    pub fn doctor_index(&self, id: &str) -> Option<usize> {
        self.doctors.iter().position(|k| k.id == id)
    }

    /// Room and doctor ids must be usable in `mu_sigma` keys.
    fn check_ids(&self) -> Result<(), InstanceError> {
        let rooms = self.rooms.iter().map(|r| ("room", &r.id));
        let doctors = self.doctors.iter().map(|k| ("doctor", &k.id));
        for (kind, id) in rooms.chain(doctors) {
            if id.contains(KEY_SEPARATOR) {
                return Err(InstanceError::ReservedSeparator {
                    kind,
                    id: id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_and_table_durations() {
        let json = r#"{
            "surgeries": [
                {"id": "S1", "specialty": "Ortho", "duration_mean": 90, "duration_std": 15},
                {"id": "S2", "mu_sigma": {"OR1|Dr_A": {"mu": 60, "sigma": 10}}}
            ],
            "days": [{"id": "Mon", "H": 480}],
            "rooms": [{"id": "OR1", "types": ["Ortho"]}],
            "doctors": [{"id": "Dr_A", "daily_capacity": {"Mon": 420}, "specialties": ["Ortho"]}]
        }"#;

        let instance = Instance::from_json_str(json).unwrap();
        assert_eq!(
            instance.surgeries[0].duration,
            DurationSpec::Flat(MeanStd::new(90.0, 15.0))
        );
        match &instance.surgeries[1].duration {
            DurationSpec::PerRoomDoctor(pairs) => {
                let key = ("OR1".to_string(), "Dr_A".to_string());
                assert_eq!(pairs.get(&key), Some(&MeanStd::new(60.0, 10.0)));
            }
            other => panic!("expected table, got {:?}", other),
        }
        assert!(instance.rooms[0].supports("Ortho"));
        assert_eq!(instance.doctor_capacity(0, 0), 420.0);
    }

    #[test]
    fn missing_duration_is_rejected() {
        let json = r#"{
            "surgeries": [{"id": "S9"}],
            "days": [], "rooms": [], "doctors": []
        }"#;
        let err = Instance::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("S9"));
    }

    #[test]
    fn malformed_table_key_is_rejected() {
        let json = r#"{
            "surgeries": [{"id": "S3", "mu_sigma": {"OR1-Dr_A": {"mu": 1, "sigma": 1}}}],
            "days": [], "rooms": [], "doctors": []
        }"#;
        let err = Instance::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("OR1-Dr_A"));
    }

    #[test]
    fn separator_in_ids_or_keys_is_rejected() {
        let json = r#"{
            "surgeries": [{"id": "S1", "duration_mean": 60, "duration_std": 5}],
            "days": [{"id": "Mon", "H": 480}],
            "rooms": [{"id": "OR|1"}],
            "doctors": [{"id": "Dr_A"}]
        }"#;
        let err = Instance::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            InstanceError::ReservedSeparator { kind: "room", ref id } if id == "OR|1"
        ));

        let json = r#"{
            "surgeries": [{"id": "S2", "mu_sigma": {"OR|1|Dr_A": {"mu": 1, "sigma": 1}}}],
            "days": [], "rooms": [], "doctors": []
        }"#;
        let err = Instance::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("OR|1|Dr_A"));
    }

    #[test]
    fn doctor_capacity_defaults_to_regular_hours() {
        let day = Day::new("Tue", 480.0);
        let doctor = Doctor::new("Dr_B").with_capacity("Mon", 300.0);
        assert_eq!(doctor.capacity_on(&day), 480.0);
        assert_eq!(Doctor::new("Dr_C").capacity_on(&day), 480.0);
    }
}
