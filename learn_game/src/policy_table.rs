use crate::board::{GameState, IsGameOver, StateKey};
use crate::error::PersistenceError;
use crate::players::Mark;
use chrono::offset::Local;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};

pub const WIN_VALUE: f64 = 1.0;
pub const LOSS_VALUE: f64 = 0.0;
pub const NEUTRAL_VALUE: f64 = 0.5;

/// Roughly the number of positions reachable in legal play.
const REACHABLE_STATES: usize = 5_500;

/// Learned value of every board position one agent has visited.
///
/// Values lie in `[0, 1]` and estimate how good a position is for the owner:
/// 1.0 is a won game, 0.0 a lost one. Entries appear the first time a
/// position is evaluated and are never removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    values: HashMap<StateKey, f64>,
}

impl Deref for PolicyTable {
    type Target = HashMap<StateKey, f64>;
    fn deref(&self) -> &<Self as Deref>::Target {
        &self.values
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(StateKey, f64)> for PolicyTable {
    fn from_iter<I: IntoIterator<Item = (StateKey, f64)>>(iter: I) -> Self {
        PolicyTable {
            values: iter.into_iter().collect(),
        }
    }
}

/// Starting value of a position nobody has learned anything about yet.
pub fn bootstrap_value(state: &GameState, mark: Mark) -> f64 {
    match state.is_game_over() {
        IsGameOver::Win(winner) if winner == mark => WIN_VALUE,
        IsGameOver::Win(_) => LOSS_VALUE,
        IsGameOver::Drawn | IsGameOver::InPlay => NEUTRAL_VALUE,
    }
}

impl PolicyTable {
    pub fn new() -> Self {
        PolicyTable {
            values: HashMap::with_capacity(REACHABLE_STATES),
        }
    }

    /// Value of `state` for the player holding `mark`, inserting the
    /// bootstrap value on first sight.
    pub fn value_of(&mut self, state: &GameState, mark: Mark) -> f64 {
        *self
            .values
            .entry(state.to_state_key())
            .or_insert_with(|| bootstrap_value(state, mark))
    }

    pub fn update(&mut self, key: StateKey, value: f64) {
        self.values.insert(key, value);
    }

    /// One temporal-difference step: moves `V(from)` a `learning_rate`
    /// fraction of the way toward `V(toward)`. Unknown keys count as neutral.
    pub fn backup(&mut self, from: &StateKey, toward: &StateKey, learning_rate: f64) -> f64 {
        let target = self.values.get(toward).copied().unwrap_or(NEUTRAL_VALUE);
        let value = self.values.entry(from.clone()).or_insert(NEUTRAL_VALUE);
        *value += learning_rate * (target - *value);
        *value
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        serde_pickle::to_vec(self, serde_pickle::SerOptions::new()).map_err(PersistenceError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<PolicyTable, PersistenceError> {
        let table: PolicyTable = serde_pickle::from_slice(bytes, serde_pickle::DeOptions::new())
            .map_err(PersistenceError::Decode)?;
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), PersistenceError> {
        for (key, &value) in self.iter() {
            if StateKey::parse(key.as_str()).is_none() {
                return Err(PersistenceError::InvalidKey(key.to_string()));
            }
            // also rejects NaN
            if !(LOSS_VALUE..=WIN_VALUE).contains(&value) {
                return Err(PersistenceError::InvalidValue {
                    key: key.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Everything written to disk for one agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub agent: String,
    pub mark: Mark,
    pub saved_at: String,
    pub table: PolicyTable,
}

impl PolicySnapshot {
    pub fn new(agent: &str, mark: Mark, table: PolicyTable) -> Self {
        PolicySnapshot {
            agent: agent.to_owned(),
            mark,
            saved_at: Local::now().to_rfc3339(),
            table,
        }
    }

    /// Fails unless the snapshot was learned playing `expected`.
    pub fn expect_mark(self, expected: Mark) -> Result<PolicySnapshot, PersistenceError> {
        if self.mark == expected {
            Ok(self)
        } else {
            Err(PersistenceError::SymbolMismatch {
                expected,
                found: self.mark,
            })
        }
    }
}

pub fn policy_file_name(agent: &str) -> String {
    format!("policy_{agent}.pol")
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `snapshot` to `<dir>/policy_<agent>.pol` and, when asked, a dated
/// JSON copy next to it. Returns the path of the pickle file.
pub fn policy_to_disk(
    dir: &Path,
    snapshot: &PolicySnapshot,
    export_json: bool,
) -> Result<PathBuf, PersistenceError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let pickle_path = dir.join(policy_file_name(&snapshot.agent));
    let data = serde_pickle::to_vec(snapshot, serde_pickle::SerOptions::new())
        .map_err(PersistenceError::Encode)?;
    let mut file = File::create(&pickle_path).map_err(io_error(&pickle_path))?;
    file.write_all(&data).map_err(io_error(&pickle_path))?;
    info!(
        "saved {} states for {} to {}",
        snapshot.table.len(),
        snapshot.agent,
        pickle_path.display()
    );

    if export_json {
        let today = Local::now().date_naive();
        let json_path = dir.join(format!("policy_{}-{}.json", snapshot.agent, today));
        let data_json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&json_path, data_json).map_err(io_error(&json_path))?;
        debug!("exported JSON copy to {}", json_path.display());
    }
    Ok(pickle_path)
}

pub fn policy_from_disk(path: &Path) -> Result<PolicySnapshot, PersistenceError> {
    let file = File::open(path).map_err(io_error(path))?;
    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = vec![];
    reader.read_to_end(&mut buf).map_err(io_error(path))?;
    let snapshot: PolicySnapshot = serde_pickle::from_slice(&buf, serde_pickle::DeOptions::new())
        .map_err(PersistenceError::Decode)?;
    snapshot.table.validate()?;
    info!(
        "loaded {} states for {} from {}",
        snapshot.table.len(),
        snapshot.agent,
        path.display()
    );
    Ok(snapshot)
}

pub fn policy_from_disk_json(path: &Path) -> Result<PolicySnapshot, PersistenceError> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    let snapshot: PolicySnapshot = serde_json::from_str(&text)?;
    snapshot.table.validate()?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(key: &str) -> GameState {
        GameState::from_key(key).expect("valid key")
    }

    fn key(raw: &str) -> StateKey {
        StateKey::parse(raw).expect("valid key")
    }

    #[test]
    fn bootstrap_values_follow_outcome() {
        let mut q = PolicyTable::new();
        let cross_wins = state("XXXOO----");
        assert_eq!(q.value_of(&cross_wins, Mark::Cross), WIN_VALUE);
        let mut q = PolicyTable::new();
        assert_eq!(q.value_of(&cross_wins, Mark::Nought), LOSS_VALUE);
        let mut q = PolicyTable::new();
        assert_eq!(q.value_of(&state("X---O----"), Mark::Cross), NEUTRAL_VALUE);
        assert_eq!(q.value_of(&state("XOXXOOOXX"), Mark::Cross), NEUTRAL_VALUE);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn value_of_keeps_learned_value() {
        let mut q = PolicyTable::new();
        let s = state("X--------");
        q.update(s.to_state_key(), 0.9);
        assert_eq!(q.value_of(&s, Mark::Cross), 0.9);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn backup_moves_toward_target() {
        let mut q = PolicyTable::new();
        q.update(key("X--------"), 0.5);
        q.update(key("X-O-X----"), 1.0);
        let v = q.backup(&key("X--------"), &key("X-O-X----"), 0.5);
        assert_eq!(v, 0.75);
        assert_eq!(q[&key("X--------")], 0.75);
        assert_eq!(q[&key("X-O-X----")], 1.0);
    }

    #[test]
    fn backup_treats_unknown_states_as_neutral() {
        let mut q = PolicyTable::new();
        q.update(key("----X----"), 0.0);
        let v = q.backup(&key("----X----"), &key("O---X----"), 0.1);
        assert!((v - 0.05).abs() < 1e-12);
    }

    #[test]
    fn bytes_round_trip_exactly() {
        let q: PolicyTable = [
            (key("---------"), 0.1 + 0.2),
            (key("X--------"), 1.0 / 3.0),
            (key("XO-------"), f64::MIN_POSITIVE),
        ]
        .into_iter()
        .collect();
        let decoded = PolicyTable::from_bytes(&q.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.len(), q.len());
        for (k, v) in q.iter() {
            assert_eq!(decoded[k].to_bits(), v.to_bits());
        }
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = PolicyTable::from_bytes(b"definitely not a pickle").unwrap_err();
        assert!(matches!(err, PersistenceError::Decode(_)));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let mut raw = HashMap::new();
        raw.insert("XXXX".to_owned(), 0.5_f64);
        let bytes = serde_pickle::to_vec(
            &serde_json::json!({ "values": raw }),
            serde_pickle::SerOptions::new(),
        )
        .unwrap();
        let err = PolicyTable::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidKey(k) if k == "XXXX"));
    }

    #[test]
    fn values_outside_unit_range_are_rejected() {
        for bad in [7.0, -0.25, f64::NAN, f64::INFINITY] {
            let q: PolicyTable = [(key("X--------"), 0.5), (key("XO-------"), bad)]
                .into_iter()
                .collect();
            let err = PolicyTable::from_bytes(&q.to_bytes().unwrap()).unwrap_err();
            assert!(
                matches!(&err, PersistenceError::InvalidValue { key: k, .. } if k == "XO-------"),
                "{bad} gave {err}"
            );
        }
    }

    #[test]
    fn snapshot_to_disk_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = PolicyTable::new();
        table.update(key("X--------"), 0.625);
        let snapshot = PolicySnapshot::new("p1", Mark::Cross, table);
        let path = policy_to_disk(dir.path(), &snapshot, true).unwrap();
        assert_eq!(path, dir.path().join("policy_p1.pol"));

        let loaded = policy_from_disk(&path).unwrap();
        assert_eq!(loaded, snapshot);

        let json = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .find(|p| p.extension().is_some_and(|ext| ext == "json"))
            .expect("json export written");
        let from_json = policy_from_disk_json(&json).unwrap();
        assert_eq!(from_json.agent, "p1");
        assert!((from_json.table[&key("X--------")] - 0.625).abs() < 1e-12);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = policy_from_disk(&dir.path().join("policy_nobody.pol")).unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }

    #[test]
    fn wrong_symbol_is_refused() {
        let snapshot = PolicySnapshot::new("p2", Mark::Nought, PolicyTable::new());
        assert!(snapshot.clone().expect_mark(Mark::Nought).is_ok());
        assert!(matches!(
            snapshot.expect_mark(Mark::Cross),
            Err(PersistenceError::SymbolMismatch {
                expected: Mark::Cross,
                found: Mark::Nought
            })
        ));
    }
}
