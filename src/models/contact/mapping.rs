//! Affine map from the normalized optimization vector to physical model quantities.

use crate::model_params::ContactModelParams;
use crate::models::multibody::{ContactIndex, MarkerIndex, ModelError, Multibody};

/// Physical values produced by [`ParameterMapping::physical`].
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalParameters {
    /// Marker heights in the body frame, m
    pub marker_heights: Vec<f64>,
    /// Contact stiffnesses, N/m
    pub stiffnesses: Vec<f64>,
}

/// Maps `x in [0,1]^(2n)` onto `n` marker heights and `n` contact stiffnesses.
///
/// Marker and contact handles are resolved once against the canonical model and
/// reused for every clone.
#[derive(Debug, Clone)]
pub struct ParameterMapping {
    markers: Vec<MarkerIndex>,
    contacts: Vec<ContactIndex>,
    height_bounds: (f64, f64),
    stiffness_factor: f64,
}

impl ParameterMapping {
    /// Resolve `marker{i}` / `marker{i}_contact` for every contact. Fails if any
    /// name following the convention is absent from the model.
    pub fn new<M: Multibody>(model: &M, params: &ContactModelParams) -> Result<Self, ModelError> {
        let mut markers = Vec::with_capacity(params.num_contacts);
        let mut contacts = Vec::with_capacity(params.num_contacts);
        for icontact in 0..params.num_contacts {
            let marker_name = params.marker_name(icontact);
            let marker = model
                .marker_index(&marker_name)
                .ok_or(ModelError::MissingMarker(marker_name))?;
            let contact_name = params.contact_name(icontact);
            let contact = model
                .contact_index(&contact_name)
                .ok_or(ModelError::MissingContact(contact_name))?;
            markers.push(marker);
            contacts.push(contact);
        }
        Ok(Self {
            markers,
            contacts,
            height_bounds: params.marker_height_bounds,
            stiffness_factor: params.stiffness_scale * params.stiffness_unit,
        })
    }

    pub fn num_contacts(&self) -> usize {
        self.markers.len()
    }

    /// Length of the optimization vector.
    pub fn param_count(&self) -> usize {
        2 * self.num_contacts()
    }

    /// Marker height for a normalized value. Written in the two-sided form
    /// so that 0 and 1 land exactly on the lower and upper bound.
    #[inline]
    pub fn height(&self, normalized: f64) -> f64 {
        let (lower, upper) = self.height_bounds;
        (1.0 - normalized) * lower + normalized * upper
    }

    #[inline]
    pub fn stiffness(&self, normalized: f64) -> f64 {
        normalized * self.stiffness_factor
    }

    /// Physical quantities for `x` without touching a model.
    pub fn physical(&self, x: &[f64]) -> PhysicalParameters {
        let n = self.num_contacts();
        PhysicalParameters {
            marker_heights: x[..n].iter().map(|&v| self.height(v)).collect(),
            stiffnesses: x[n..2 * n].iter().map(|&v| self.stiffness(v)).collect(),
        }
    }

    /// Write marker heights and contact stiffnesses for `x` into `model`.
    /// Bounds are not re-checked; the optimizer's variable bounds enforce them.
    ///
    /// Panics if `x` is shorter than [`ParameterMapping::param_count`].
    pub fn apply<M: Multibody>(&self, model: &mut M, x: &[f64]) {
        let n = self.num_contacts();
        for (icontact, &marker) in self.markers.iter().enumerate() {
            model.set_marker_height(marker, self.height(x[icontact]));
        }
        for (icontact, &contact) in self.contacts.iter().enumerate() {
            model.set_contact_stiffness(contact, self.stiffness(x[n + icontact]));
        }
    }

    /// Read the mapped quantities back from `model`.
    pub fn read_back<M: Multibody>(&self, model: &M) -> PhysicalParameters {
        PhysicalParameters {
            marker_heights: self.markers.iter().map(|&m| model.marker_height(m)).collect(),
            stiffnesses: self
                .contacts
                .iter()
                .map(|&c| model.contact_stiffness(c))
                .collect(),
        }
    }

    /// Inverse map from the model's current quantities to a normalized vector.
    pub fn normalized<M: Multibody>(&self, model: &M) -> Vec<f64> {
        let (lower, upper) = self.height_bounds;
        let phys = self.read_back(model);
        phys.marker_heights
            .iter()
            .map(|h| (h - lower) / (upper - lower))
            .chain(phys.stiffnesses.iter().map(|k| k / self.stiffness_factor))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::multibody::PlanarFootModel;

    fn setup() -> (PlanarFootModel, ParameterMapping) {
        let mut model = PlanarFootModel::foot_with_contacts(6, 70.0, 5e7).unwrap();
        model.init_system().unwrap();
        let mapping = ParameterMapping::new(&model, &ContactModelParams::default()).unwrap();
        (model, mapping)
    }

    #[test]
    fn apply_then_read_back_is_exact() {
        let (mut model, mapping) = setup();
        let x: Vec<f64> = (0..12).map(|i| i as f64 / 11.0).collect();
        mapping.apply(&mut model, &x);
        assert_eq!(mapping.read_back(&model), mapping.physical(&x));
    }

    #[test]
    fn bounds_map_exactly() {
        let (mut model, mapping) = setup();
        let mut x = vec![0.0; 12];
        x[1] = 1.0;
        x[7] = 1.0;
        mapping.apply(&mut model, &x);
        let phys = mapping.read_back(&model);
        assert_eq!(phys.marker_heights[0], -0.06);
        assert_eq!(phys.marker_heights[1], 0.05);
        assert_eq!(phys.stiffnesses[0], 0.0);
        assert_eq!(phys.stiffnesses[1], 1e8);
    }

    #[test]
    fn midpoint_matches_affine_form() {
        let (_, mapping) = setup();
        let expected = -0.06 + 0.5 * (0.05 - (-0.06));
        assert!((mapping.height(0.5) - expected).abs() < 1e-15);
    }

    #[test]
    fn normalized_inverts_apply() {
        let (mut model, mapping) = setup();
        let x = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 0.0, 0.25];
        mapping.apply(&mut model, &x);
        for (a, b) in mapping.normalized(&model).iter().zip(&x) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn missing_marker_is_reported() {
        let mut model = PlanarFootModel::foot_with_contacts(2, 70.0, 5e7).unwrap();
        model.init_system().unwrap();
        let err = ParameterMapping::new(&model, &ContactModelParams::default()).unwrap_err();
        assert_eq!(err, ModelError::MissingMarker("marker2".to_string()));
    }
}
