use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Which recurring-date table applies to a region (seasons are inverted south
/// of the equator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    North,
    South,
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hemisphere::North => write!(f, "north"),
            Hemisphere::South => write!(f, "south"),
        }
    }
}

impl std::str::FromStr for Hemisphere {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(Hemisphere::North),
            "south" | "s" => Ok(Hemisphere::South),
            other => Err(format!("unknown hemisphere: {}", other)),
        }
    }
}

/// Monday-first order, matching `Weekday::num_days_from_monday`.
const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Set of weekdays on which a user wants the daily digest.
///
/// Stored as comma-separated three-letter tokens (`Mon,Tue,...`) so rows
/// written by older versions of the bot load unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryDays(u8);

impl DeliveryDays {
    const ALL_BITS: u8 = 0b0111_1111;

    pub fn all() -> Self {
        Self(Self::ALL_BITS)
    }

    pub fn none() -> Self {
        Self(0)
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & bit(day) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= bit(day);
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !bit(day);
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_all(&self) -> bool {
        self.0 == Self::ALL_BITS
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the contained days Monday first.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEK.iter().copied().filter(|d| self.contains(*d))
    }

    /// Parse a comma/space separated list such as `"Mon,Wed"` or
    /// `"monday friday"`. An empty string yields the empty set.
    pub fn parse_list(s: &str) -> std::result::Result<Self, String> {
        let mut days = Self::none();
        for token in s.split([',', ' ']).map(str::trim).filter(|t| !t.is_empty()) {
            match token.to_ascii_lowercase().as_str() {
                "all" | "daily" | "everyday" => return Ok(Self::all()),
                "weekdays" => {
                    WEEK[..5].iter().for_each(|d| days.insert(*d));
                }
                "weekends" => {
                    days.insert(Weekday::Sat);
                    days.insert(Weekday::Sun);
                }
                _ => {
                    let day: Weekday = token
                        .parse()
                        .map_err(|_| format!("unknown weekday: {}", token))?;
                    days.insert(day);
                }
            }
        }
        Ok(days)
    }

    /// Canonical storage form: `Mon,Tue,Wed,Thu,Fri,Sat,Sun` order.
    pub fn to_tokens(&self) -> String {
        self.iter().map(token).collect::<Vec<_>>().join(",")
    }
}

impl Default for DeliveryDays {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<Weekday> for DeliveryDays {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut days = Self::none();
        for d in iter {
            days.insert(d);
        }
        days
    }
}

impl fmt::Debug for DeliveryDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeliveryDays({})", self.to_tokens())
    }
}

impl fmt::Display for DeliveryDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            write!(f, "every day")
        } else if self.is_empty() {
            write!(f, "no days")
        } else {
            write!(f, "{}", self.iter().map(token).collect::<Vec<_>>().join(", "))
        }
    }
}

impl std::str::FromStr for DeliveryDays {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse_list(s)
    }
}

impl Serialize for DeliveryDays {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_tokens())
    }
}

impl<'de> Deserialize<'de> for DeliveryDays {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_list(&s).map_err(serde::de::Error::custom)
    }
}

fn bit(day: Weekday) -> u8 {
    1 << day.num_days_from_monday()
}

/// Three-letter token, e.g. `Mon`.
pub fn token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}
