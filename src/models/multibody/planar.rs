// src/models/multibody/planar.rs

//! Planar rigid-segment model with point contacts.
//!
//! The segment moves relative to ground through a planar joint with
//! generalized coordinates `q = [rz, tx, ty]` (rotation about z, translation
//! along x and y) and speeds `u = [wz, vx, vy]`. Every body is rigidly fixed
//! to the segment at its `origin`; markers are located in their body's frame.
//! Contact elements sit on a marker ("station") and carry a stiffness.

use super::state::{State, StationKinematics};
use super::{ContactIndex, MarkerIndex, ModelError, Multibody};

/// Number of generalized coordinates (and speeds) of the planar joint.
pub const PLANAR_DOFS: usize = 3;

/// Standard gravity, m/s^2.
pub const STANDARD_GRAVITY: f64 = 9.81;

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub name: String,
    /// Mass in kg
    pub mass: f64,
    /// Body origin expressed in the segment frame
    pub origin: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    /// Name of the body the marker is attached to
    pub body: String,
    /// Location in the body frame
    pub location: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactElement {
    pub name: String,
    /// Name of the marker the contact point sits on
    pub station: String,
    /// Contact stiffness in N/m
    pub stiffness: f64,
}

#[derive(Debug, Clone)]
pub struct PlanarFootModel {
    name: String,
    bodies: Vec<Body>,
    markers: Vec<Marker>,
    contact_elements: Vec<ContactElement>,
    gravity: [f64; 3],

    // Derived by init_system()
    initialized: bool,
    total_mass: f64,
    marker_bodies: Vec<usize>,
    contact_handles: Vec<ContactIndex>,
    station_markers: Vec<usize>,
    // Derived by refresh()
    station_locations: Vec<[f64; 3]>,
}

impl PlanarFootModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bodies: Vec::new(),
            markers: Vec::new(),
            contact_elements: Vec::new(),
            gravity: [0.0, -STANDARD_GRAVITY, 0.0],
            initialized: false,
            total_mass: 0.0,
            marker_bodies: Vec::new(),
            contact_handles: Vec::new(),
            station_markers: Vec::new(),
            station_locations: Vec::new(),
        }
    }

    /// Build a single-body foot carrying `num_contacts` contact markers spread
    /// evenly from heel to toes, named `marker{i}` with contacts
    /// `marker{i}_contact`.
    pub fn foot_with_contacts(
        num_contacts: usize,
        mass: f64,
        stiffness: f64,
    ) -> Result<Self, ModelError> {
        const X_HEEL: f64 = -0.03;
        const X_TOES: f64 = 0.28;
        const MARKER_Y: f64 = -0.027;

        let mut model = Self::new("foot");
        model.add_body("calcn_r", mass, [0.0, 0.0, 0.0])?;
        for icontact in 0..num_contacts {
            let name = format!("marker{}", icontact);
            let frac = if num_contacts > 1 {
                icontact as f64 / (num_contacts - 1) as f64
            } else {
                0.0
            };
            let x = X_HEEL + frac * (X_TOES - X_HEEL);
            model.add_marker(&name, "calcn_r", [x, MARKER_Y, 0.0])?;
            model.add_contact(&format!("{}_contact", name), &name, stiffness)?;
        }
        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_gravity(&mut self, gravity: [f64; 3]) {
        self.gravity = gravity;
    }

    pub fn add_body(
        &mut self,
        name: &str,
        mass: f64,
        origin: [f64; 3],
    ) -> Result<(), ModelError> {
        if self.bodies.iter().any(|b| b.name == name) {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        self.bodies.push(Body {
            name: name.to_string(),
            mass,
            origin,
        });
        self.initialized = false;
        Ok(())
    }

    /// Add a marker. The body is resolved lazily by `init_system()`.
    pub fn add_marker(
        &mut self,
        name: &str,
        body: &str,
        location: [f64; 3],
    ) -> Result<(), ModelError> {
        if self.markers.iter().any(|m| m.name == name) {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        self.markers.push(Marker {
            name: name.to_string(),
            body: body.to_string(),
            location,
        });
        self.initialized = false;
        Ok(())
    }

    /// Add a contact element on `station`. The station marker is resolved
    /// lazily by `init_system()`.
    pub fn add_contact(
        &mut self,
        name: &str,
        station: &str,
        stiffness: f64,
    ) -> Result<(), ModelError> {
        if self.contact_elements.iter().any(|c| c.name == name) {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        self.contact_elements.push(ContactElement {
            name: name.to_string(),
            station: station.to_string(),
            stiffness,
        });
        self.initialized = false;
        Ok(())
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn contact_elements(&self) -> &[ContactElement] {
        &self.contact_elements
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of generalized coordinates.
    pub fn nq(&self) -> usize {
        PLANAR_DOFS
    }

    /// Number of generalized speeds.
    pub fn nu(&self) -> usize {
        PLANAR_DOFS
    }

    fn segment_location(&self, marker: usize) -> [f64; 3] {
        let m = &self.markers[marker];
        let origin = self.bodies[self.marker_bodies[marker]].origin;
        [
            origin[0] + m.location[0],
            origin[1] + m.location[1],
            origin[2] + m.location[2],
        ]
    }
}

impl Multibody for PlanarFootModel {
    fn init_system(&mut self) -> Result<(), ModelError> {
        let mut marker_bodies = Vec::with_capacity(self.markers.len());
        for marker in &self.markers {
            let body = self
                .bodies
                .iter()
                .position(|b| b.name == marker.body)
                .ok_or_else(|| ModelError::MissingBody(marker.body.clone()))?;
            marker_bodies.push(body);
        }

        let mut station_markers = Vec::with_capacity(self.contact_elements.len());
        for contact in &self.contact_elements {
            let marker = self
                .markers
                .iter()
                .position(|m| m.name == contact.station)
                .ok_or_else(|| ModelError::MissingStation {
                    contact: contact.name.clone(),
                    station: contact.station.clone(),
                })?;
            station_markers.push(marker);
        }

        let total_mass: f64 = self.bodies.iter().map(|b| b.mass).sum();
        if total_mass <= 0.0 {
            return Err(ModelError::Massless);
        }

        self.marker_bodies = marker_bodies;
        self.station_markers = station_markers;
        self.contact_handles = (0..self.contact_elements.len()).map(ContactIndex).collect();
        self.total_mass = total_mass;
        self.initialized = true;
        self.refresh();
        Ok(())
    }

    fn refresh(&mut self) {
        if !self.initialized {
            return;
        }
        let locations: Vec<[f64; 3]> = self
            .station_markers
            .iter()
            .map(|&m| self.segment_location(m))
            .collect();
        self.station_locations = locations;
    }

    fn marker_index(&self, name: &str) -> Option<MarkerIndex> {
        self.markers
            .iter()
            .position(|m| m.name == name)
            .map(MarkerIndex)
    }

    fn contact_index(&self, name: &str) -> Option<ContactIndex> {
        self.contact_elements
            .iter()
            .position(|c| c.name == name)
            .map(ContactIndex)
    }

    fn marker_height(&self, marker: MarkerIndex) -> f64 {
        self.markers[marker.0].location[1]
    }

    fn set_marker_height(&mut self, marker: MarkerIndex, height: f64) {
        self.markers[marker.0].location[1] = height;
    }

    fn contact_stiffness(&self, contact: ContactIndex) -> f64 {
        self.contact_elements[contact.0].stiffness
    }

    fn set_contact_stiffness(&mut self, contact: ContactIndex, stiffness: f64) {
        self.contact_elements[contact.0].stiffness = stiffness;
    }

    fn contacts(&self) -> &[ContactIndex] {
        &self.contact_handles
    }

    fn realize_velocity(&self, state: &mut State) {
        let coord = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(f64::NAN);
        let (rz, tx, ty) = (coord(state.q(), 0), coord(state.q(), 1), coord(state.q(), 2));
        let (wz, vx, vy) = (coord(state.u(), 0), coord(state.u(), 1), coord(state.u(), 2));
        let (s, c) = rz.sin_cos();

        let stations = self
            .station_locations
            .iter()
            .map(|p| {
                // Station offset from the joint origin, rotated into ground.
                let rx = c * p[0] - s * p[1];
                let ry = s * p[0] + c * p[1];
                StationKinematics {
                    position: [tx + rx, ty + ry, p[2]],
                    velocity: [vx - wz * ry, vy + wz * rx, 0.0],
                }
            })
            .collect();
        state.set_stations(stations);
    }

    fn station_height(&self, state: &State, contact: ContactIndex) -> f64 {
        state
            .station(contact.0)
            .map(|k| k.position[1])
            .unwrap_or(f64::NAN)
    }

    fn total_mass(&self) -> f64 {
        self.total_mass
    }

    fn gravity(&self) -> [f64; 3] {
        self.gravity
    }
}
