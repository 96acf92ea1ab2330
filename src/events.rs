use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::HeatError;
use crate::names::NameTable;

pub const CHANNEL: &str = "BDArmory.BDACompetitionMode";
const RESULTS_HEADER: &str = "Dumping Results";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weapon {
    Guns,
    Rockets,
    Missiles,
    Ramming,
}

impl Weapon {
    pub const ALL: [Weapon; 4] = [
        Weapon::Guns,
        Weapon::Rockets,
        Weapon::Missiles,
        Weapon::Ramming,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillCredit {
    Clean,
    HeadShot,
    KillSteal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTally {
    GunHits,
    RocketHits,
    RocketPartsHit,
    MissileHits,
    MissilePartsHit,
    RammedPartsLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageTally {
    Guns,
    Rockets,
    Missiles,
    Battle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    DumpingResults,
    Alive,
    Dead,
    Mia,
    Hits(HitTally),
    Damage(DamageTally),
    Kill(Weapon, KillCredit),
    GmKill,
    PartsLostToAsteroids,
    HpLeft,
    Accuracy,
    Result,
    DeadTeams,
    Waypoints,
    TagMode,
}

const TAG_WORDS: &[(&str, Tag)] = &[
    ("ALIVE", Tag::Alive),
    ("DEAD", Tag::Dead),
    ("MIA", Tag::Mia),
    ("WHOSHOTWHOWITHGUNS", Tag::Hits(HitTally::GunHits)),
    ("WHODAMAGEDWHOWITHGUNS", Tag::Damage(DamageTally::Guns)),
    ("WHOHITWHOWITHMISSILES", Tag::Hits(HitTally::MissileHits)),
    ("WHOPARTSHITWHOWITHMISSILES", Tag::Hits(HitTally::MissilePartsHit)),
    ("WHODAMAGEDWHOWITHMISSILES", Tag::Damage(DamageTally::Missiles)),
    ("WHOHITWHOWITHROCKETS", Tag::Hits(HitTally::RocketHits)),
    ("WHOPARTSHITWHOWITHROCKETS", Tag::Hits(HitTally::RocketPartsHit)),
    ("WHODAMAGEDWHOWITHROCKETS", Tag::Damage(DamageTally::Rockets)),
    ("WHORAMMEDWHO", Tag::Hits(HitTally::RammedPartsLost)),
    ("WHODAMAGEDWHOWITHBATTLEDAMAGE", Tag::Damage(DamageTally::Battle)),
    ("CLEANKILLGUNS", Tag::Kill(Weapon::Guns, KillCredit::Clean)),
    ("CLEANKILLROCKETS", Tag::Kill(Weapon::Rockets, KillCredit::Clean)),
    ("CLEANKILLMISSILES", Tag::Kill(Weapon::Missiles, KillCredit::Clean)),
    ("CLEANKILLRAMMING", Tag::Kill(Weapon::Ramming, KillCredit::Clean)),
    ("HEADSHOTGUNS", Tag::Kill(Weapon::Guns, KillCredit::HeadShot)),
    ("HEADSHOTROCKETS", Tag::Kill(Weapon::Rockets, KillCredit::HeadShot)),
    ("HEADSHOTMISSILES", Tag::Kill(Weapon::Missiles, KillCredit::HeadShot)),
    ("HEADSHOTRAMMING", Tag::Kill(Weapon::Ramming, KillCredit::HeadShot)),
    ("KILLSTEALGUNS", Tag::Kill(Weapon::Guns, KillCredit::KillSteal)),
    ("KILLSTEALROCKETS", Tag::Kill(Weapon::Rockets, KillCredit::KillSteal)),
    ("KILLSTEALMISSILES", Tag::Kill(Weapon::Missiles, KillCredit::KillSteal)),
    ("KILLSTEALRAMMING", Tag::Kill(Weapon::Ramming, KillCredit::KillSteal)),
    ("GMKILL", Tag::GmKill),
    ("PARTSLOSTTOASTEROIDS", Tag::PartsLostToAsteroids),
    ("HPLEFT", Tag::HpLeft),
    ("ACCURACY", Tag::Accuracy),
    ("RESULT", Tag::Result),
    ("DEADTEAMS", Tag::DeadTeams),
    ("WAYPOINTS", Tag::Waypoints),
];

impl Tag {
    pub fn classify(word: &str) -> Option<Tag> {
        if let Some((_, tag)) = TAG_WORDS.iter().find(|(w, _)| *w == word) {
            return Some(*tag);
        }
        if word.starts_with("TAG") {
            return Some(Tag::TagMode);
        }
        None
    }

    /// Splits a record into its tag and the raw payload after the tag.
    ///
    /// The results header is checked first since it is free text with `:` inside
    /// its timestamp; every other tag is the exact word before the first `:`.
    pub fn of_record(record: &str) -> Option<(Tag, &str)> {
        if let Some(rest) = record.strip_prefix(RESULTS_HEADER) {
            return Some((Tag::DumpingResults, rest));
        }
        let (word, payload) = split_tag(record)?;
        Tag::classify(word).map(|tag| (tag, payload))
    }

    pub fn name(self) -> &'static str {
        if self == Tag::DumpingResults {
            return RESULTS_HEADER;
        }
        if self == Tag::TagMode {
            return "TAG";
        }
        TAG_WORDS
            .iter()
            .find(|(_, tag)| *tag == self)
            .map(|(word, _)| *word)
            .unwrap_or("UNKNOWN")
    }

    /// Terminal-state payloads end with the raw craft name, and team payloads are JSON
    /// read as written; neither is encoded.
    fn takes_encoded_payload(self) -> bool {
        !matches!(
            self,
            Tag::DumpingResults
                | Tag::Alive
                | Tag::Dead
                | Tag::Mia
                | Tag::Result
                | Tag::DeadTeams
                | Tag::TagMode
        )
    }
}

pub fn channel_record(line: &str) -> Option<&str> {
    if !line.contains(CHANNEL) {
        return None;
    }
    let (_, record) = line.trim().split_once(' ')?;
    Some(record)
}

pub fn split_tag(record: &str) -> Option<(&str, &str)> {
    record.split_once(':')
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "AccuracyFields", from = "AccuracyFields")]
pub struct ShotCounts {
    pub hits: u32,
    pub shots: u32,
    pub rocket_strikes: u32,
    pub rockets_fired: u32,
}

impl ShotCounts {
    pub fn accuracy(&self) -> f64 {
        percentage(self.hits, self.shots)
    }

    pub fn rocket_accuracy(&self) -> f64 {
        percentage(self.rocket_strikes, self.rockets_fired)
    }
}

pub(crate) fn percentage(hits: impl Into<u64>, shots: impl Into<u64>) -> f64 {
    let (hits, shots) = (hits.into(), shots.into());
    if shots > 0 {
        100.0 * hits as f64 / shots as f64
    } else {
        0.0
    }
}

#[derive(Serialize, Deserialize)]
struct AccuracyFields {
    accuracy: f64,
    hits: u32,
    shots: u32,
    rocket_accuracy: f64,
    rocket_strikes: u32,
    rockets_fired: u32,
}

impl From<ShotCounts> for AccuracyFields {
    fn from(counts: ShotCounts) -> Self {
        AccuracyFields {
            accuracy: counts.accuracy(),
            hits: counts.hits,
            shots: counts.shots,
            rocket_accuracy: counts.rocket_accuracy(),
            rocket_strikes: counts.rocket_strikes,
            rockets_fired: counts.rockets_fired,
        }
    }
}

impl From<AccuracyFields> for ShotCounts {
    fn from(fields: AccuracyFields) -> Self {
        ShotCounts {
            hits: fields.hits,
            shots: fields.shots,
            rocket_strikes: fields.rocket_strikes,
            rockets_fired: fields.rockets_fired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "(u32, f64, f64)", from = "(u32, f64, f64)")]
pub struct WaypointMark {
    pub index: u32,
    pub deviation: f64,
    pub timestamp: f64,
}

impl From<WaypointMark> for (u32, f64, f64) {
    fn from(mark: WaypointMark) -> Self {
        (mark.index, mark.deviation, mark.timestamp)
    }
}

impl From<(u32, f64, f64)> for WaypointMark {
    fn from((index, deviation, timestamp): (u32, f64, f64)) -> Self {
        WaypointMark {
            index,
            deviation,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Draw,
    #[serde(rename = "Mutual Annihilation")]
    MutualAnnihilation,
}

impl Outcome {
    fn parse(raw: &str) -> Option<Outcome> {
        match raw.trim() {
            "Win" => Some(Outcome::Win),
            "Draw" => Some(Outcome::Draw),
            "Mutual Annihilation" | "MutualAnnihilation" => Some(Outcome::MutualAnnihilation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub team: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Alive {
        craft: String,
    },
    Dead {
        craft: String,
        order: u32,
        time: f64,
    },
    Mia {
        craft: String,
    },
    Hits {
        craft: String,
        tally: HitTally,
        by: BTreeMap<String, u32>,
    },
    Damage {
        craft: String,
        tally: DamageTally,
        by: BTreeMap<String, f64>,
    },
    Kill {
        craft: String,
        killer: String,
        weapon: Weapon,
        credit: KillCredit,
    },
    GmKill {
        craft: String,
        reason: String,
    },
    AsteroidLoss {
        craft: String,
        parts: u32,
    },
    HpRemaining {
        craft: String,
        hp: f64,
    },
    Accuracy {
        craft: String,
        counts: ShotCounts,
    },
    Waypoints {
        craft: String,
        marks: Vec<WaypointMark>,
    },
    Result {
        outcome: Outcome,
        teams: Vec<TeamRoster>,
    },
    DeadTeams {
        teams: Vec<TeamRoster>,
    },
    Duration {
        seconds: f64,
        started_at: Option<NaiveDateTime>,
    },
}

/// Decodes one raw log line.
pub fn decode_line(line: &str, names: &NameTable, line_no: usize) -> Result<Option<Event>, HeatError> {
    let Some(record) = channel_record(line) else {
        return Ok(None);
    };
    let Some((tag, raw_payload)) = Tag::of_record(record) else {
        tracing::debug!(line = line_no, record, "skipping unrecognised record");
        return Ok(None);
    };
    if tag == Tag::TagMode {
        return Ok(None);
    }
    let payload = if tag.takes_encoded_payload() {
        names.encode(raw_payload)
    } else {
        raw_payload.to_string()
    };
    Decoder {
        names,
        line: line_no,
        tag,
        raw: raw_payload,
    }
    .decode(&payload)
    .map(Some)
}

struct Decoder<'a> {
    names: &'a NameTable,
    line: usize,
    tag: Tag,
    raw: &'a str,
}

impl Decoder<'_> {
    fn decode(&self, payload: &str) -> Result<Event, HeatError> {
        match self.tag {
            Tag::DumpingResults => self.duration(payload),
            Tag::Alive => Ok(Event::Alive {
                craft: self.terminal_craft(payload)?,
            }),
            Tag::Mia => Ok(Event::Mia {
                craft: self.terminal_craft(payload)?,
            }),
            Tag::Dead => {
                let mut parts = payload.splitn(3, ':');
                let order = self.number(parts.next())?;
                let time = self.number(parts.next())?;
                let craft = self.terminal_craft(parts.next().unwrap_or_default())?;
                Ok(Event::Dead { craft, order, time })
            }
            Tag::Hits(tally) => {
                let (craft, by) = self.by_attacker(payload)?;
                Ok(Event::Hits { craft, tally, by })
            }
            Tag::Damage(tally) => {
                let (craft, by) = self.by_attacker(payload)?;
                Ok(Event::Damage { craft, tally, by })
            }
            Tag::Kill(weapon, credit) => {
                let (craft, killer) = self.craft_and_rest(payload)?;
                Ok(Event::Kill {
                    craft,
                    killer: self.names.resolve(killer, self.line)?,
                    weapon,
                    credit,
                })
            }
            Tag::GmKill => {
                let (craft, encoded) = self.craft_and_rest(payload)?;
                // Free text: taken from the raw payload so craft names inside it survive.
                let reason = self
                    .raw
                    .strip_prefix(craft.as_str())
                    .and_then(|rest| rest.strip_prefix(':'))
                    .unwrap_or(encoded);
                Ok(Event::GmKill {
                    craft,
                    reason: reason.to_string(),
                })
            }
            Tag::PartsLostToAsteroids => {
                let (craft, parts) = self.craft_and_rest(payload)?;
                Ok(Event::AsteroidLoss {
                    craft,
                    parts: self.number(Some(parts))?,
                })
            }
            Tag::HpLeft => {
                let (craft, hp) = self.craft_and_rest(payload)?;
                Ok(Event::HpRemaining {
                    craft,
                    hp: self.number(Some(hp))?,
                })
            }
            Tag::Accuracy => self.accuracy(payload),
            Tag::Waypoints => self.waypoints(payload),
            Tag::Result => self.result(payload),
            Tag::DeadTeams => Ok(Event::DeadTeams {
                teams: self.rosters(payload)?,
            }),
            Tag::TagMode => Err(self.malformed("tag mode records are not decoded")),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> HeatError {
        HeatError::malformed(self.line, self.tag.name(), reason)
    }

    fn number<T: std::str::FromStr>(&self, raw: Option<&str>) -> Result<T, HeatError> {
        let raw = raw.ok_or_else(|| self.malformed("missing field"))?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| self.malformed(format!("invalid number {raw:?}")))
    }

    fn terminal_craft(&self, raw: &str) -> Result<String, HeatError> {
        if raw.is_empty() {
            return Err(self.malformed("missing craft name"));
        }
        Ok(raw.to_string())
    }

    fn craft_and_rest<'p>(&self, payload: &'p str) -> Result<(String, &'p str), HeatError> {
        let (craft, rest) = payload
            .split_once(':')
            .ok_or_else(|| self.malformed("missing ':' after craft"))?;
        Ok((self.names.resolve(craft, self.line)?, rest))
    }

    /// `<craft>:<value>:<attacker>:<value>:<attacker>...`; a repeated attacker overwrites.
    fn by_attacker<T: std::str::FromStr>(
        &self,
        payload: &str,
    ) -> Result<(String, BTreeMap<String, T>), HeatError> {
        let (craft, rest) = self.craft_and_rest(payload)?;
        let mut by = BTreeMap::new();
        if rest.is_empty() {
            return Ok((craft, by));
        }
        let fields: Vec<&str> = rest.split(':').collect();
        if fields.len() % 2 != 0 {
            return Err(self.malformed("unpaired value/attacker fields"));
        }
        for pair in fields.chunks(2) {
            let value = self.number(Some(pair[0]))?;
            let attacker = self.names.resolve(pair[1], self.line)?;
            by.insert(attacker, value);
        }
        Ok((craft, by))
    }

    fn accuracy(&self, payload: &str) -> Result<Event, HeatError> {
        let (craft, rest) = self.craft_and_rest(payload)?;
        let (guns, rockets) = rest
            .split_once(':')
            .ok_or_else(|| self.malformed("missing rocket accuracy"))?;
        let (hits, shots) = guns
            .split_once('/')
            .ok_or_else(|| self.malformed("gun accuracy is not hits/shots"))?;
        let (rocket_strikes, rockets_fired) = rockets
            .split_once('/')
            .ok_or_else(|| self.malformed("rocket accuracy is not strikes/fired"))?;
        Ok(Event::Accuracy {
            craft,
            counts: ShotCounts {
                hits: self.number(Some(hits))?,
                shots: self.number(Some(shots))?,
                rocket_strikes: self.number(Some(rocket_strikes))?,
                rockets_fired: self.number(Some(rockets_fired))?,
            },
        })
    }

    /// `<craft>:<index>:<deviation>:<time>;<index>:<deviation>:<time>...`
    fn waypoints(&self, payload: &str) -> Result<Event, HeatError> {
        let (craft, rest) = self.craft_and_rest(payload)?;
        let mut marks = Vec::new();
        for entry in rest.split(';').filter(|e| !e.trim().is_empty()) {
            let mut fields = entry.split(':');
            let mark = WaypointMark {
                index: self.number(fields.next())?,
                deviation: self.number(fields.next())?,
                timestamp: self.number(fields.next())?,
            };
            if fields.next().is_some() {
                return Err(self.malformed(format!("unexpected waypoint fields in {entry:?}")));
            }
            marks.push(mark);
        }
        Ok(Event::Waypoints { craft, marks })
    }

    fn result(&self, payload: &str) -> Result<Event, HeatError> {
        let (kind, teams) = match payload.split_once(':') {
            Some((kind, teams)) => (kind, Some(teams)),
            None => (payload, None),
        };
        let outcome = Outcome::parse(kind)
            .ok_or_else(|| self.malformed(format!("unknown result {kind:?}")))?;
        let teams = match teams {
            Some(raw) if !raw.trim().is_empty() => self.rosters(raw)?,
            _ => Vec::new(),
        };
        Ok(Event::Result { outcome, teams })
    }

    fn rosters(&self, raw: &str) -> Result<Vec<TeamRoster>, HeatError> {
        let parsed: RosterJson = serde_json::from_str(raw)
            .map_err(|err| self.malformed(format!("invalid team JSON: {err}")))?;
        let rosters = match parsed {
            RosterJson::One(team) => vec![team],
            RosterJson::Many(teams) => teams,
        };
        rosters
            .into_iter()
            .map(|roster| {
                let members = roster
                    .members
                    .iter()
                    .map(|member| self.names.known(member, self.line))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TeamRoster {
                    team: roster.team,
                    members,
                })
            })
            .collect()
    }

    /// ` (in <seconds>s) at <timestamp>`
    fn duration(&self, payload: &str) -> Result<Event, HeatError> {
        let open = payload
            .find('(')
            .ok_or_else(|| self.malformed("missing '(' before duration"))?;
        let close = payload[open..]
            .find(')')
            .map(|i| open + i)
            .ok_or_else(|| self.malformed("missing ')' after duration"))?;
        let inner = payload[open + 1..close].trim();
        let inner = inner.strip_prefix("in").unwrap_or(inner).trim();
        let inner = inner.strip_suffix('s').unwrap_or(inner);
        let seconds: f64 = self.number(Some(inner))?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(self.malformed(format!("invalid duration {inner:?}")));
        }
        let started_at = payload[close..]
            .split_once(" at ")
            .map(|(_, ts)| parse_timestamp(ts.trim()))
            .transpose()
            .map_err(|reason| self.malformed(reason))?;
        Ok(Event::Duration {
            seconds,
            started_at,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RosterJson {
    One(TeamRoster),
    Many(Vec<TeamRoster>),
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("invalid timestamp {raw:?}"))
}
