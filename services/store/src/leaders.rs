//! Heads of state and government (`leaders_current.csv`, `leaders_history.csv`).
//!
//! "Current" is a heuristic: per (country, role) the open-ended term with the
//! latest start, else the term with the latest start. A historical term whose
//! end date was never recorded is indistinguishable from an ongoing one.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::offline::OfflineStore;
use crate::schema::{field, normalize_iso3, parse_year, FieldAliases};
use crate::table::{RowRef, Table};

const LEADER_COLUMNS: &[&str] = &[
    "iso3",
    "country",
    "role",
    "person",
    "person_qid",
    "start",
    "end",
    "end_cause",
    "party",
    "party_qid",
];

const LEADER_SCHEMA: &[FieldAliases] = &[
    field("person", &["name", "leader"]),
    field("person_qid", &["qid"]),
    field("start", &["start_date", "inicio"]),
    field("end", &["end_date", "fim"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderRole {
    HeadOfState,
    HeadOfGovernment,
}

impl LeaderRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "head_of_state" | "hos" => Some(LeaderRole::HeadOfState),
            "head_of_government" | "hog" => Some(LeaderRole::HeadOfGovernment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderTerm {
    pub iso3: String,
    pub country: Option<String>,
    pub role: LeaderRole,
    pub person: Option<String>,
    pub person_qid: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub end_cause: Option<String>,
    pub party: Option<String>,
    pub party_qid: Option<String>,
}

impl LeaderTerm {
    fn from_row(r: &RowRef<'_>) -> Option<Self> {
        let role = match r.get("role").and_then(LeaderRole::parse) {
            Some(role) => role,
            None => {
                debug!(role = ?r.get("role"), "skipping leader row with unknown role");
                return None;
            }
        };
        Some(Self {
            iso3: r.get("iso3").map(normalize_iso3).unwrap_or_default(),
            country: r.text("country"),
            role,
            person: r.text("person"),
            person_qid: r.text("person_qid"),
            start: parse_date(r.get("start")),
            end: parse_date(r.get("end")),
            end_cause: r.text("end_cause"),
            party: r.text("party"),
            party_qid: r.text("party_qid"),
        })
    }

    pub fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountryLeaders {
    pub current: Vec<LeaderTerm>,
    pub history: Vec<LeaderTerm>,
}

/// Parse `YYYY-MM-DD` from the start of a Wikidata-style timestamp
/// (`+2016-03-09T00:00:00Z`), or a bare year as January 1st.
pub fn parse_date(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim().trim_start_matches('+');
    if let Some(head) = s.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
            return Some(d);
        }
    }
    let year = parse_year(Some(s))?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Apply the current-leader heuristic to a set of terms, one per (iso3, role).
pub fn pick_current(terms: &[LeaderTerm]) -> Vec<LeaderTerm> {
    let mut best: BTreeMap<(String, LeaderRole), &LeaderTerm> = BTreeMap::new();
    for term in terms {
        let key = (term.iso3.clone(), term.role);
        let better = match best.get(&key) {
            None => true,
            Some(cur) => {
                (term.is_open_ended(), term.start) > (cur.is_open_ended(), cur.start)
            }
        };
        if better {
            best.insert(key, term);
        }
    }
    best.into_values().cloned().collect()
}

fn terms_for(table: &Table, iso3: &str) -> Vec<LeaderTerm> {
    table
        .rows()
        .filter_map(|r| LeaderTerm::from_row(&r))
        .filter(|t| t.iso3 == iso3)
        .collect()
}

impl OfflineStore {
    pub fn load_leaders_current(&self) -> Vec<LeaderTerm> {
        self.load(&self.paths().leaders_current(), LEADER_SCHEMA, LEADER_COLUMNS)
            .rows()
            .filter_map(|r| LeaderTerm::from_row(&r))
            .collect()
    }

    pub fn load_leaders_history(&self) -> Vec<LeaderTerm> {
        self.load(&self.paths().leaders_history(), LEADER_SCHEMA, LEADER_COLUMNS)
            .rows()
            .filter_map(|r| LeaderTerm::from_row(&r))
            .collect()
    }

    /// Current-file rows and history rows for one country, in file order.
    /// Without current-file rows, `current` is derived from the history.
    pub fn leaders_for_iso3(&self, iso3: &str) -> CountryLeaders {
        let iso3 = normalize_iso3(iso3);
        let current_table = self.load(&self.paths().leaders_current(), LEADER_SCHEMA, LEADER_COLUMNS);
        let history_table = self.load(&self.paths().leaders_history(), LEADER_SCHEMA, LEADER_COLUMNS);

        let history = terms_for(&history_table, &iso3);
        let mut current = terms_for(&current_table, &iso3);
        if current.is_empty() {
            current = pick_current(&history);
        }
        CountryLeaders { current, history }
    }

    /// One term per role, head of state first.
    pub fn current_leaders(&self, iso3: &str) -> Vec<LeaderTerm> {
        pick_current(&self.leaders_for_iso3(iso3).current)
    }
}
