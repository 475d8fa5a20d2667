use std::sync::Arc;

use super::ModelError;

/// Position and velocity of a contact station in the ground frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StationKinematics {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

/// A timestamped generalized state (coordinates and speeds) plus the kinematic
/// cache filled when a model realizes it.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    time: f64,
    q: Vec<f64>,
    u: Vec<f64>,
    /// Station kinematics indexed by contact, valid only for the model
    /// configuration that produced it.
    stations: Option<Vec<StationKinematics>>,
}

impl State {
    pub fn new(time: f64, q: Vec<f64>, u: Vec<f64>) -> Self {
        Self {
            time,
            q,
            u,
            stations: None,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Generalized coordinates.
    pub fn q(&self) -> &[f64] {
        &self.q
    }

    /// Generalized speeds.
    pub fn u(&self) -> &[f64] {
        &self.u
    }

    /// Copy of this state with the kinematic cache dropped.
    pub fn fresh_copy(&self) -> Self {
        Self {
            time: self.time,
            q: self.q.clone(),
            u: self.u.clone(),
            stations: None,
        }
    }

    pub fn is_realized(&self) -> bool {
        self.stations.is_some()
    }

    pub(crate) fn set_stations(&mut self, stations: Vec<StationKinematics>) {
        self.stations = Some(stations);
    }

    /// Cached kinematics of one station, if the state has been realized.
    pub fn station(&self, index: usize) -> Option<&StationKinematics> {
        self.stations.as_ref().and_then(|s| s.get(index))
    }
}

/// Ordered, immutable sequence of states produced upstream (e.g. by inverse
/// kinematics). Cheap to share between threads.
#[derive(Debug, Clone)]
pub struct StateTrajectory {
    states: Arc<[State]>,
}

impl StateTrajectory {
    /// Build a trajectory, checking every state against the expected number of
    /// coordinates and speeds. Any kinematic cache carried by the input states
    /// is dropped.
    pub fn new(states: Vec<State>, nq: usize, nu: usize) -> Result<Self, ModelError> {
        for state in &states {
            if state.q.len() != nq {
                return Err(ModelError::CoordinateCount {
                    what: "coordinates",
                    expected: nq,
                    provided: state.q.len(),
                });
            }
            if state.u.len() != nu {
                return Err(ModelError::CoordinateCount {
                    what: "speeds",
                    expected: nu,
                    provided: state.u.len(),
                });
            }
        }
        let states: Vec<State> = states.iter().map(State::fresh_copy).collect();
        Ok(Self {
            states: states.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn front(&self) -> Option<&State> {
        self.states.first()
    }

    /// Iterate over independent copies of the states. Each copy starts with an
    /// empty kinematic cache, so geometry realized under an earlier parameter
    /// set can never leak into a new evaluation.
    pub fn iter_fresh(&self) -> impl Iterator<Item = State> + '_ {
        self.states.iter().map(State::fresh_copy)
    }

    /// Times of every state, in order.
    pub fn times(&self) -> Vec<f64> {
        self.states.iter().map(State::time).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_copy_drops_cache() {
        let mut s = State::new(0.1, vec![0.0; 3], vec![0.0; 3]);
        s.set_stations(vec![StationKinematics::default()]);
        assert!(s.is_realized());
        let copy = s.fresh_copy();
        assert!(!copy.is_realized());
        assert_eq!(copy.time(), 0.1);
    }

    #[test]
    fn trajectory_rejects_wrong_coordinate_count() {
        let states = vec![State::new(0.0, vec![0.0; 2], vec![0.0; 3])];
        let err = StateTrajectory::new(states, 3, 3).unwrap_err();
        assert!(matches!(err, ModelError::CoordinateCount { provided: 2, .. }));
    }

    #[test]
    fn trajectory_never_hands_out_realized_states() {
        let mut s = State::new(0.0, vec![0.0; 3], vec![0.0; 3]);
        s.set_stations(vec![StationKinematics::default()]);
        let traj = StateTrajectory::new(vec![s], 3, 3).unwrap();
        assert!(traj.iter_fresh().all(|s| !s.is_realized()));
        assert!(!traj.states()[0].is_realized());
    }
}
