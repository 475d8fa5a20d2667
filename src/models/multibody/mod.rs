//! Minimal rigid multibody layer used as the dynamics engine of the calibration.
//!
//! The calibration core only needs a handful of capabilities from a dynamics
//! model: set marker heights and contact stiffnesses, re-initialize the derived
//! structure, realize station kinematics at a state, and report the total
//! mass and gravity. Those capabilities are expressed by the [`Multibody`]
//! trait so that the objective and the model pool stay generic over the
//! engine. [`PlanarFootModel`] is the concrete engine shipped with the crate.

pub mod planar;
pub mod state;

pub use planar::{Body, ContactElement, Marker, PlanarFootModel};
pub use state::{StationKinematics, State, StateTrajectory};

use thiserror::Error;

/// Index of a marker inside a model. Valid for every clone of the model it was
/// resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerIndex(pub usize);

/// Index of a contact element inside a model. Valid for every clone of the
/// model it was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactIndex(pub usize);

/// Errors raised while building or initializing a multibody model.
///
/// All of these are configuration mistakes and are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("body '{0}' is not part of the model")]
    MissingBody(String),

    #[error("marker '{0}' is not part of the model")]
    MissingMarker(String),

    #[error("contact element '{0}' is not part of the model")]
    MissingContact(String),

    #[error("contact '{contact}' references station marker '{station}' which does not exist")]
    MissingStation { contact: String, station: String },

    #[error("a component named '{0}' already exists")]
    DuplicateName(String),

    #[error("model has no bodies with positive mass")]
    Massless,

    #[error("model must be initialized with init_system() before use")]
    NotInitialized,

    #[error("state has {provided} {what}, the model expects {expected}")]
    CoordinateCount {
        what: &'static str,
        expected: usize,
        provided: usize,
    },
}

/// Capabilities the calibration requires from a dynamics model.
///
/// Implementations must be cheap enough to deep-clone once per worker thread
/// and must not share mutable state between clones.
pub trait Multibody: Clone + Send + Sync + 'static {
    /// Expensive one-time initialization. Resolves every named reference and
    /// builds derived structure; fails if the definition is incomplete.
    fn init_system(&mut self) -> Result<(), ModelError>;

    /// Lightweight structural re-initialization after marker or stiffness
    /// changes. Requires a prior successful [`Multibody::init_system`].
    fn refresh(&mut self);

    /// Resolve a marker by name.
    fn marker_index(&self, name: &str) -> Option<MarkerIndex>;

    /// Resolve a contact element by name.
    fn contact_index(&self, name: &str) -> Option<ContactIndex>;

    /// Vertical (y) component of a marker's location in its body frame.
    fn marker_height(&self, marker: MarkerIndex) -> f64;

    fn set_marker_height(&mut self, marker: MarkerIndex, height: f64);

    fn contact_stiffness(&self, contact: ContactIndex) -> f64;

    fn set_contact_stiffness(&mut self, contact: ContactIndex, stiffness: f64);

    /// Handles of every contact element, captured at initialization.
    fn contacts(&self) -> &[ContactIndex];

    /// Compute position and velocity dependent quantities for `state` and
    /// store them in the state's kinematic cache.
    fn realize_velocity(&self, state: &mut State);

    /// World-frame height of a contact element's station. Reads the cache
    /// filled by [`Multibody::realize_velocity`].
    fn station_height(&self, state: &State, contact: ContactIndex) -> f64;

    /// Sum of the masses of every body.
    fn total_mass(&self) -> f64;

    /// Gravity vector in the ground frame.
    fn gravity(&self) -> [f64; 3];

    /// Body weight magnitude, `total_mass * |g|`.
    fn weight(&self) -> f64 {
        let g = self.gravity();
        self.total_mass() * (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt()
    }
}
