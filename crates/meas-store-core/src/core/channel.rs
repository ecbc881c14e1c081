// crates/meas-store-core/src/core/channel.rs
// ============================================================================
// Module: Measurement Channels
// Description: One named data series within a run.
// Purpose: Carry display metadata, shape/dependency lists, and the flat payload.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Channel`] is one measured or swept quantity. Its payload is a flat
//! `f64` buffer whose length must equal the declared sample count: the
//! explicit `size` when set, otherwise the product of `shape`.
//!
//! Plain channels and identity-bearing channels share one type; the extended
//! identity is an optional [`ChannelIdentity`] record. Back-references such as
//! [`ChannelIdentity::setpoint_param_id`] are plain identifiers resolved by
//! lookup, never embedded channels.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ParamId;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Extended identity of a channel within a multi-parameter measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelIdentity {
    /// Process-wide identity of the physical parameter.
    pub param_id: ParamId,
    /// Repetition or sweep this channel instance belongs to.
    pub set_index: i64,
    /// Identity of the independent variable this channel is recorded against.
    pub setpoint_param_id: Option<ParamId>,
    /// Channel is a swept (independent) variable.
    pub is_setpoint: bool,
    /// Channel is a setpoint local to one measured parameter.
    pub is_local_setpoint: bool,
    /// Cross-run stable alias.
    pub global_name: String,
}

/// One named data series within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name, unique within the run.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Display unit.
    pub unit: String,
    /// Names of the channels this one is computed from.
    #[serde(default)]
    pub dependency: Vec<String>,
    /// Logical multi-dimensional extent of the payload.
    #[serde(default)]
    pub shape: Vec<usize>,
    /// Explicit sample count, used when `shape` is not tracked.
    #[serde(default)]
    pub size: Option<usize>,
    /// Optional extended identity.
    #[serde(default)]
    pub identity: Option<ChannelIdentity>,
    /// Flat sample data.
    #[serde(default)]
    pub payload: Vec<f64>,
}

/// Data-integrity faults detected on a channel before it is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelIntegrityError {
    /// Channel name is empty.
    #[error("channel name must be non-empty")]
    EmptyName,
    /// A shape dimension is zero.
    #[error("shape dimension {axis} must be positive")]
    ZeroDimension {
        /// Offending axis index.
        axis: usize,
    },
    /// The product of `shape` overflows `usize`.
    #[error("shape product overflows")]
    CountOverflow,
    /// Explicit size disagrees with the shape product.
    #[error("explicit size {size} disagrees with shape product {shape_product}")]
    SizeShapeMismatch {
        /// Declared explicit size.
        size: usize,
        /// Product of the shape dimensions.
        shape_product: usize,
    },
    /// Payload length differs from the declared sample count.
    #[error("payload holds {actual} samples, declared {declared}")]
    LengthMismatch {
        /// Declared sample count.
        declared: usize,
        /// Actual payload length.
        actual: usize,
    },
}

// ============================================================================
// SECTION: Channel Behavior
// ============================================================================

impl Channel {
    /// Creates an independent channel whose shape is the payload length.
    ///
    /// An empty payload is tracked by explicit size instead, since shape
    /// dimensions must be positive.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        unit: impl Into<String>,
        payload: Vec<f64>,
    ) -> Self {
        let (shape, size) =
            if payload.is_empty() { (Vec::new(), Some(0)) } else { (vec![payload.len()], None) };
        Self {
            name: name.into(),
            label: label.into(),
            unit: unit.into(),
            dependency: Vec::new(),
            shape,
            size,
            identity: None,
            payload,
        }
    }

    /// Replaces the dependency list.
    #[must_use]
    pub fn with_dependency<I, S>(mut self, dependency: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency = dependency.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the shape.
    #[must_use]
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }

    /// Attaches an extended identity.
    #[must_use]
    pub fn with_identity(mut self, identity: ChannelIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Returns the declared sample count.
    ///
    /// The explicit `size` wins when present; otherwise the product of
    /// `shape` is used (an empty shape describes a scalar).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelIntegrityError`] when the shape product overflows or
    /// disagrees with an explicit size.
    pub fn declared_len(&self) -> Result<usize, ChannelIntegrityError> {
        let shape_product = self
            .shape
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
            .ok_or(ChannelIntegrityError::CountOverflow)?;
        match self.size {
            Some(size) if !self.shape.is_empty() && size != shape_product => {
                Err(ChannelIntegrityError::SizeShapeMismatch {
                    size,
                    shape_product,
                })
            }
            Some(size) => Ok(size),
            None => Ok(shape_product),
        }
    }

    /// Checks the channel invariants required before storage.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelIntegrityError`] for empty names, zero dimensions, or
    /// a payload whose length differs from the declared count.
    pub fn validate(&self) -> Result<(), ChannelIntegrityError> {
        if self.name.is_empty() {
            return Err(ChannelIntegrityError::EmptyName);
        }
        if let Some(axis) = self.shape.iter().position(|dim| *dim == 0) {
            return Err(ChannelIntegrityError::ZeroDimension {
                axis,
            });
        }
        let declared = self.declared_len()?;
        if declared != self.payload.len() {
            return Err(ChannelIntegrityError::LengthMismatch {
                declared,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    /// Returns true when the channel is a swept (independent) variable.
    ///
    /// Identity flags decide when present; plain channels count as setpoints
    /// when they depend on nothing.
    #[must_use]
    pub fn is_setpoint(&self) -> bool {
        self.identity.as_ref().map_or_else(
            || self.dependency.is_empty(),
            |identity| identity.is_setpoint || identity.is_local_setpoint,
        )
    }

    /// Returns the label, falling back to the name when the label is empty.
    #[must_use]
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() { &self.name } else { &self.label }
    }
}
