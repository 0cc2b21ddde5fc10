//! Estimate Snapshots
//!
//! Persisted refinement state for one session: the candidate names and, in
//! the same order, each candidate's `{observation_count, running_mean,
//! running_variance}`.

use crate::backend::Backend;
use crate::cache::{Cache, CacheKey, SessionId, StoreError};
use crate::codec::Codec;
use rankbench_stats::EstimateState;
use serde::{Deserialize, Serialize};

/// Field under which a session's estimates are stored
pub const ESTIMATES_FIELD: &str = "estimates";

/// Estimates of every candidate in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Candidate names
    pub names: Vec<String>,
    /// Estimate state per name, same order
    pub estimates: Vec<EstimateState>,
}

impl SessionSnapshot {
    /// Pair names with states
    pub fn new(names: Vec<String>, estimates: Vec<EstimateState>) -> Self {
        Self { names, estimates }
    }

    /// Completed rounds, if all candidates agree
    pub fn rounds(&self) -> Option<u64> {
        let first = self.estimates.first()?.observation_count;
        self.estimates
            .iter()
            .all(|s| s.observation_count == first)
            .then_some(first)
    }

    /// State recorded for `name`
    pub fn state_for(&self, name: &str) -> Option<EstimateState> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.estimates.get(i).copied())
    }

    /// States reordered to match `names`; `None` unless the candidate sets are identical
    pub fn aligned_to<S: AsRef<str>>(&self, names: &[S]) -> Option<Vec<EstimateState>> {
        if names.len() != self.names.len() || self.estimates.len() != self.names.len() {
            return None;
        }
        names.iter().map(|n| self.state_for(n.as_ref())).collect()
    }
}

/// Loader/saver of session estimates
pub trait EstimateStore {
    /// Load the snapshot for `session`, if one was saved
    fn load_estimates(&self, session: &SessionId) -> Result<Option<SessionSnapshot>, StoreError>;

    /// Save (replace) the snapshot for `session`
    fn save_estimates(
        &mut self,
        session: &SessionId,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StoreError>;
}

impl<B: Backend, C: Codec> EstimateStore for Cache<B, C> {
    fn load_estimates(&self, session: &SessionId) -> Result<Option<SessionSnapshot>, StoreError> {
        self.load(&CacheKey::new(session, ESTIMATES_FIELD)?)
    }

    fn save_estimates(
        &mut self,
        session: &SessionId,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StoreError> {
        self.save(&CacheKey::new(session, ESTIMATES_FIELD)?, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DirBackend, JsonCodec, MemoryBackend, TomlCodec};

    fn state(n: u64, mean: f64) -> EstimateState {
        EstimateState {
            observation_count: n,
            running_mean: mean,
            running_variance: 0.25,
        }
    }

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot::new(
            vec!["forward".into(), "reverse".into()],
            vec![state(12, 410.0), state(12, 95.5)],
        )
    }

    #[test]
    fn test_alignment() {
        let snap = snapshot();
        assert_eq!(snap.rounds(), Some(12));
        assert_eq!(snap.state_for("reverse"), Some(state(12, 95.5)));
        assert_eq!(
            snap.aligned_to(&["reverse", "forward"]),
            Some(vec![state(12, 95.5), state(12, 410.0)])
        );
        assert_eq!(snap.aligned_to(&["reverse"]), None);
        assert_eq!(snap.aligned_to(&["reverse", "symbolic"]), None);
    }

    #[test]
    fn test_uneven_rounds() {
        let snap = SessionSnapshot::new(
            vec!["a".into(), "b".into()],
            vec![state(3, 1.0), state(4, 1.0)],
        );
        assert_eq!(snap.rounds(), None);
        assert_eq!(SessionSnapshot::new(vec![], vec![]).rounds(), None);
    }

    #[test]
    fn test_memory_store() {
        let mut store = Cache::new(MemoryBackend::new(), JsonCodec);
        let session = SessionId::new("model-7").unwrap();

        assert_eq!(store.load_estimates(&session).unwrap(), None);
        store.save_estimates(&session, &snapshot()).unwrap();
        assert_eq!(store.load_estimates(&session).unwrap(), Some(snapshot()));
    }

    #[test]
    fn test_dir_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId::new("model-7").unwrap();

        let mut store = Cache::new(DirBackend::new(dir.path()), TomlCodec);
        store.save_estimates(&session, &snapshot()).unwrap();
        drop(store);

        let reopened = Cache::new(DirBackend::new(dir.path()), TomlCodec);
        assert_eq!(reopened.load_estimates(&session).unwrap(), Some(snapshot()));
        assert!(dir.path().join("model-7").join("estimates.toml").exists());
    }
}
