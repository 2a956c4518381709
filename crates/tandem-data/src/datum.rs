//! Exchange datum: one named quantity exchanged between participants.

use crate::error::{DataError, Result};
use crate::extrapolation::Extrapolation;

/// Stable identity of a datum, as configured by the embedding adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataId(pub u32);

impl std::fmt::Display for DataId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of the mesh a datum lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshId(pub u32);

/// Where a datum's values are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DatumKind {
    /// One element per mesh vertex.
    Mesh(MeshId),
    /// A single element not associated with any mesh.
    Global,
}

/// Static description used to allocate an [`ExchangeDatum`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatumSpec {
    pub id: DataId,
    pub name: String,
    pub kind: DatumKind,
    /// Components per element (1 = scalar).
    pub dimensions: usize,
    /// Number of elements (vertices for mesh data, 1 for global data).
    pub elements: usize,
    /// Spatial dimensions of the gradient, if gradients are exchanged.
    pub gradient_dimensions: Option<usize>,
}

impl DatumSpec {
    /// Describe a datum living on the vertices of a mesh.
    pub fn mesh(
        id: DataId,
        name: impl Into<String>,
        mesh: MeshId,
        dimensions: usize,
        vertices: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: DatumKind::Mesh(mesh),
            dimensions,
            elements: vertices,
            gradient_dimensions: None,
        }
    }

    /// Describe a mesh-less datum holding a single element.
    pub fn global(id: DataId, name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            id,
            name: name.into(),
            kind: DatumKind::Global,
            dimensions,
            elements: 1,
            gradient_dimensions: None,
        }
    }

    /// Also allocate a gradient buffer with `mesh_dimensions` per component.
    #[must_use]
    pub fn with_gradient(mut self, mesh_dimensions: usize) -> Self {
        self.gradient_dimensions = Some(mesh_dimensions);
        self
    }

    /// Length of the value buffer.
    pub const fn value_len(&self) -> usize {
        self.dimensions * self.elements
    }
}

/// A named, versioned numeric buffer with iteration and window history.
#[derive(Debug, Clone)]
pub struct ExchangeDatum {
    id: DataId,
    name: String,
    kind: DatumKind,
    dimensions: usize,
    values: Vec<f64>,
    previous_iteration: Vec<f64>,
    gradient: Option<Vec<f64>>,
    gradient_dimensions: usize,
    extrapolation: Option<Extrapolation>,
    /// Must be populated by the adapter before the very first exchange.
    pub requires_initialization: bool,
}

impl ExchangeDatum {
    /// Allocate a zeroed datum.
    ///
    /// `extrapolation_order` is `None` for data that never predicts the next
    /// window (explicit coupling, global data).
    pub fn new(
        spec: DatumSpec,
        requires_initialization: bool,
        extrapolation_order: Option<usize>,
    ) -> Result<Self> {
        let len = spec.value_len();
        let gradient_dimensions = spec.gradient_dimensions.unwrap_or(0);
        let gradient = spec
            .gradient_dimensions
            .map(|mesh_dims| vec![0.0; len * mesh_dims]);
        let extrapolation = extrapolation_order.map(Extrapolation::new).transpose()?;

        Ok(Self {
            id: spec.id,
            name: spec.name,
            kind: spec.kind,
            dimensions: spec.dimensions,
            values: vec![0.0; len],
            previous_iteration: vec![0.0; len],
            gradient,
            gradient_dimensions,
            extrapolation,
            requires_initialization,
        })
    }

    pub fn id(&self) -> DataId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DatumKind {
        self.kind
    }

    /// Components per element.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Components per element of the gradient buffer.
    pub fn gradient_dimensions(&self) -> usize {
        self.dimensions * self.gradient_dimensions
    }

    /// Current values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable view of the current values. The length cannot change.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Overwrite the current values with a buffer of identical length.
    pub fn set_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(DataError::LengthMismatch {
                data: self.name.clone(),
                expected: self.values.len(),
                actual: values.len(),
            });
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    /// Values at the start of the current iteration.
    pub fn previous_iteration(&self) -> &[f64] {
        &self.previous_iteration
    }

    /// Snapshot the current values as the previous-iteration reference.
    pub fn store_iteration(&mut self) {
        self.previous_iteration.copy_from_slice(&self.values);
    }

    pub fn has_gradient(&self) -> bool {
        self.gradient.is_some()
    }

    pub fn gradient_values(&self) -> Result<&[f64]> {
        self.gradient
            .as_deref()
            .ok_or_else(|| DataError::MissingGradient(self.name.clone()))
    }

    pub fn gradient_values_mut(&mut self) -> Result<&mut [f64]> {
        match self.gradient.as_deref_mut() {
            Some(gradient) => Ok(gradient),
            None => Err(DataError::MissingGradient(self.name.clone())),
        }
    }

    /// Window history, if this datum predicts the next window.
    pub fn extrapolation(&self) -> Option<&Extrapolation> {
        self.extrapolation.as_ref()
    }

    /// Reset the window history to the current values.
    pub fn initialize_extrapolation(&mut self) {
        if let Some(extrapolation) = self.extrapolation.as_mut() {
            extrapolation.initialize(&self.values);
        }
    }

    /// Record the current values as this window's latest values.
    pub fn store_extrapolation_data(&mut self) {
        if let Some(extrapolation) = self.extrapolation.as_mut() {
            extrapolation.store(&self.values);
        }
    }

    /// Shift the window history and overwrite the values with the predictor.
    pub fn move_to_next_window(&mut self) {
        if let Some(prediction) = self
            .extrapolation
            .as_mut()
            .and_then(Extrapolation::move_to_next_window)
        {
            self.values = prediction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn displacement(order: Option<usize>) -> ExchangeDatum {
        let spec = DatumSpec::mesh(DataId(3), "Displacements", MeshId(1), 2, 3);
        ExchangeDatum::new(spec, false, order).unwrap()
    }

    #[test]
    fn allocation_matches_spec() {
        let datum = displacement(None);
        assert_eq!(datum.values().len(), 6);
        assert_eq!(datum.previous_iteration().len(), 6);
        assert!(!datum.has_gradient());
        assert!(datum.extrapolation().is_none());
    }

    #[test]
    fn global_data_has_one_element() {
        let spec = DatumSpec::global(DataId(9), "Angle", 3);
        let datum = ExchangeDatum::new(spec, true, None).unwrap();
        assert_eq!(datum.values().len(), 3);
        assert_eq!(datum.kind(), DatumKind::Global);
        assert!(datum.requires_initialization);
    }

    #[test]
    fn set_values_rejects_other_length() {
        let mut datum = displacement(None);
        let err = datum.set_values(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            DataError::LengthMismatch {
                data: "Displacements".into(),
                expected: 6,
                actual: 2,
            }
        );
        assert_eq!(datum.values().len(), 6);
    }

    #[test]
    fn store_iteration_snapshots_values() {
        let mut datum = displacement(None);
        datum.set_values(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_ne!(datum.previous_iteration(), datum.values());

        datum.store_iteration();
        assert_eq!(datum.previous_iteration(), datum.values());

        datum.values_mut()[0] = 10.0;
        assert_eq!(datum.previous_iteration()[0], 1.0);
    }

    #[test]
    fn gradient_buffer_scales_with_mesh_dimensions() {
        let spec = DatumSpec::mesh(DataId(1), "Temperature", MeshId(0), 1, 4).with_gradient(3);
        let datum = ExchangeDatum::new(spec, false, None).unwrap();
        assert_eq!(datum.gradient_values().unwrap().len(), 12);
        assert_eq!(datum.gradient_dimensions(), 3);
    }

    #[test]
    fn missing_gradient_is_an_error() {
        let datum = displacement(None);
        assert_eq!(
            datum.gradient_values(),
            Err(DataError::MissingGradient("Displacements".into()))
        );
    }

    #[test]
    fn move_to_next_window_applies_predictor() {
        let spec = DatumSpec::global(DataId(0), "Force", 1);
        let mut datum = ExchangeDatum::new(spec, false, Some(1)).unwrap();

        datum.set_values(&[3.0]).unwrap();
        datum.initialize_extrapolation();
        datum.move_to_next_window();
        assert_eq!(datum.values(), &[3.0]);

        datum.set_values(&[5.0]).unwrap();
        datum.store_extrapolation_data();
        datum.move_to_next_window();
        assert_eq!(datum.values(), &[7.0]);
    }

    #[test]
    fn without_extrapolation_values_are_untouched() {
        let mut datum = displacement(None);
        datum.values_mut()[2] = 8.0;
        datum.store_extrapolation_data();
        datum.move_to_next_window();
        assert_eq!(datum.values()[2], 8.0);
    }
}
