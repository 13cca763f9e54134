use serde::{Serialize, Serializer};
use std::fmt;

/// School days, in timetable order.
pub const DAYS: [Day; 5] = [
    Day::Monday,
    Day::Tuesday,
    Day::Wednesday,
    Day::Thursday,
    Day::Friday,
];

/// Teaching periods, in timetable order. The gap between 11:15 and 11:45 is
/// the morning break and is not bookable.
pub const PERIODS: [Period; 6] = [
    Period::P1,
    Period::P2,
    Period::P3,
    Period::P4,
    Period::P5,
    Period::P6,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    pub fn parse(s: &str) -> Option<Self> {
        DAYS.iter().copied().find(|d| d.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
}

impl Period {
    pub fn parse(s: &str) -> Option<Self> {
        PERIODS.iter().copied().find(|p| p.as_str() == s)
    }

    /// The wire label, which doubles as the stored value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "09:00-09:45",
            Self::P2 => "09:45-10:30",
            Self::P3 => "10:30-11:15",
            Self::P4 => "11:45-12:30",
            Self::P5 => "12:30-13:15",
            Self::P6 => "13:15-14:30",
        }
    }
}

impl Serialize for Day {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    pub day: Day,
    pub period: Period,
}

impl Slot {
    /// Returns `None` unless both labels are catalog values. Matching is exact:
    /// "monday" or "9:00-9:45" are not slots.
    pub fn parse(day: &str, period: &str) -> Option<Self> {
        Some(Self {
            day: Day::parse(day)?,
            period: Period::parse(period)?,
        })
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day, self.period)
    }
}

pub fn all_slots() -> impl Iterator<Item = Slot> {
    DAYS.into_iter()
        .flat_map(|day| PERIODS.into_iter().map(move |period| Slot { day, period }))
}

pub fn catalog_json() -> serde_json::Value {
    serde_json::json!({
        "days": DAYS.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
        "periods": PERIODS.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        "slots": all_slots()
            .map(|s| serde_json::json!({ "day": s.day.as_str(), "period": s.period.as_str() }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_thirty_unique_slots() {
        let slots: Vec<Slot> = all_slots().collect();
        assert_eq!(slots.len(), 30);
        let mut dedup = slots.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), 30);
        assert_eq!(slots.first().map(|s| s.to_string()).as_deref(), Some("Monday 09:00-09:45"));
        assert_eq!(slots.last().map(|s| s.to_string()).as_deref(), Some("Friday 13:15-14:30"));
    }

    #[test]
    fn parse_is_exact() {
        assert!(Slot::parse("Monday", "09:00-09:45").is_some());
        assert!(Slot::parse("Funday", "09:00-09:45").is_none());
        assert!(Slot::parse("monday", "09:00-09:45").is_none());
        assert!(Slot::parse("Monday", "11:15-11:45").is_none());
        assert!(Slot::parse("Saturday", "09:00-09:45").is_none());
    }

    #[test]
    fn ordering_follows_catalog() {
        let a = Slot::parse("Tuesday", "09:00-09:45").expect("slot");
        let b = Slot::parse("Monday", "13:15-14:30").expect("slot");
        assert!(b < a);
        assert_eq!(PERIODS.iter().position(|p| p.as_str() == "11:45-12:30"), Some(3));
        assert!(Day::Friday > Day::Thursday);
    }

    #[test]
    fn labels_serialize_as_wire_strings() {
        assert_eq!(serde_json::to_value(Day::Wednesday).expect("day"), "Wednesday");
        assert_eq!(serde_json::to_value(Period::P2).expect("period"), "09:45-10:30");
    }

    #[test]
    fn catalog_json_lists_labels_verbatim() {
        let v = catalog_json();
        assert_eq!(v["days"][0], "Monday");
        assert_eq!(v["periods"][5], "13:15-14:30");
        assert_eq!(v["slots"].as_array().map(|a| a.len()), Some(30));
    }
}
