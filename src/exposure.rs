//! Sampling and scoring the exposure of a contact.
//!
//! An exposure is the distance and duration of one physical contact. Both are
//! drawn from distributions configured in mean/spread terms through the
//! [`ExposureParameters`] global property:
//!
//! * distance ~ Gamma with mean `distance_mean` and standard deviation
//!   `distance_sd`, i.e. `scale = sd² / mean`, `shape = mean / scale`;
//! * duration ~ Pareto with minimum `duration_min` and tail index
//!   `duration_mean / (duration_mean - duration_min)`, the value for which
//!   the analytic mean `min · α / (α - 1)` equals `duration_mean`.
//!
//! The free functions here are stateless; randomness comes in through a
//! [`RandomSource`]. [`ContextExposureExt`] binds them to the interaction
//! store, the configured parameters, and a dedicated random stream.
use log::trace;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::ExposureError;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::interaction::{
    existing_interaction_data, interaction_data, AgentId, Interaction, InteractionId,
    InteractionKind, InteractionStore,
};
use crate::random::{ContextRandomExt, RandomSource};
use crate::{define_global_property, define_rng};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ExposureParametersValues {
    pub distance_mean: f64,
    pub distance_sd: f64,
    pub duration_mean: f64,
    pub duration_min: f64,
}

impl ExposureParametersValues {
    /// Shape and scale of the Gamma distribution of distances.
    #[must_use]
    pub fn distance_shape_scale(&self) -> (f64, f64) {
        let scale = self.distance_sd * self.distance_sd / self.distance_mean;
        (self.distance_mean / scale, scale)
    }

    /// Tail index of the Pareto distribution of durations. Grows without bound
    /// as `duration_mean` approaches `duration_min`.
    #[must_use]
    pub fn duration_shape(&self) -> f64 {
        self.duration_mean / (self.duration_mean - self.duration_min)
    }
}

fn validate_exposure_parameters(values: &ExposureParametersValues) -> Result<(), ExposureError> {
    let fields = [
        ("distance_mean", values.distance_mean),
        ("distance_sd", values.distance_sd),
        ("duration_mean", values.duration_mean),
        ("duration_min", values.duration_min),
    ];
    for (name, value) in fields {
        if !(value.is_finite() && value > 0.0) {
            return Err(ExposureError::IllegalGlobalPropertyValue(format!(
                "{name} must be finite and positive, got {value}"
            )));
        }
    }
    if values.duration_mean <= values.duration_min {
        return Err(ExposureError::IllegalGlobalPropertyValue(format!(
            "duration_mean ({}) must exceed duration_min ({})",
            values.duration_mean, values.duration_min
        )));
    }
    Ok(())
}

define_global_property!(
    ExposureParameters,
    ExposureParametersValues,
    validate_exposure_parameters
);

define_rng!(ExposureRng);

/// Draws the distance of one contact. Non-negative for valid parameters.
pub fn sample_distance(params: &ExposureParametersValues, rng: &mut impl RandomSource) -> f64 {
    let (shape, scale) = params.distance_shape_scale();
    rng.gamma(shape, scale)
}

/// Draws the duration of one contact. At least `duration_min` for valid
/// parameters.
pub fn sample_duration(params: &ExposureParametersValues, rng: &mut impl RandomSource) -> f64 {
    rng.pareto(params.duration_min, params.duration_shape())
}

/// Draws a duration, then a distance, for the contact `interaction` belongs to
/// and writes both to `interaction` and its paired record. Nothing else on
/// either record changes.
///
/// # Panics
///
/// Panics if `interaction` is not in `store`.
pub fn generate(
    store: &mut InteractionStore,
    interaction: InteractionId,
    params: &ExposureParametersValues,
    rng: &mut impl RandomSource,
) {
    let pair = store
        .pair_of(interaction)
        .unwrap_or_else(|| panic!("interaction {interaction:?} is not in the store"));
    let duration = sample_duration(params, rng);
    let distance = sample_distance(params, rng);
    for id in [interaction, pair] {
        if let Some(record) = store.get_mut(id) {
            record.duration = duration;
            record.distance = distance;
        }
    }
}

/// Scales baseline transmission for a contact: `duration / duration_mean`.
///
/// `distance` does not currently affect the result. It is part of the
/// signature so that a distance model can be added without changing callers.
#[must_use]
pub fn transmission_factor(params: &ExposureParametersValues, _distance: f64, duration: f64) -> f64 {
    duration / params.duration_mean
}

/// Risk score used to rank contacts for tracing: `duration / duration_mean`.
///
/// Neither `contact_time` nor `distance` is used yet. This currently equals
/// [`transmission_factor`], but callers should not rely on the two staying
/// equal.
#[must_use]
pub fn risk_score(
    params: &ExposureParametersValues,
    _contact_time: u32,
    _distance: f64,
    duration: f64,
) -> f64 {
    duration / params.duration_mean
}

fn exposure_parameters(context: &Context) -> Result<ExposureParametersValues, ExposureError> {
    context
        .get_global_property_value(ExposureParameters)
        .copied()
        .ok_or(ExposureError::MissingParameters("ExposureParameters"))
}

fn stored_interaction(context: &Context, id: InteractionId) -> Result<Interaction, ExposureError> {
    existing_interaction_data(context)
        .and_then(|data| data.store.borrow().get(id).copied())
        .ok_or(ExposureError::UnknownInteraction(id))
}

pub trait ContextExposureExt {
    /// Records a contact between `agent` and `partner` on the current
    /// interaction day and samples its exposure. Returns the agent's and the
    /// partner's record ids.
    ///
    /// # Errors
    ///
    /// Returns `MissingParameters` if `ExposureParameters` is not set; no
    /// records are created in that case.
    fn add_interaction_pair(
        &mut self,
        agent: AgentId,
        partner: AgentId,
        kind: InteractionKind,
    ) -> Result<(InteractionId, InteractionId), ExposureError>;

    /// Samples a new exposure for the contact `id` belongs to, using the
    /// `ExposureRng` stream.
    ///
    /// # Errors
    ///
    /// Returns `MissingParameters` if `ExposureParameters` is not set, or
    /// `UnknownInteraction` if `id` is not in the window.
    fn generate_exposure(&mut self, id: InteractionId) -> Result<(), ExposureError>;

    /// [`transmission_factor`] of a stored interaction.
    ///
    /// # Errors
    ///
    /// As for `generate_exposure`.
    fn get_transmission_factor(&self, id: InteractionId) -> Result<f64, ExposureError>;

    /// [`risk_score`] of a stored interaction.
    ///
    /// # Errors
    ///
    /// As for `generate_exposure`.
    fn get_risk_score(&self, id: InteractionId, contact_time: u32) -> Result<f64, ExposureError>;
}

impl ContextExposureExt for Context {
    fn add_interaction_pair(
        &mut self,
        agent: AgentId,
        partner: AgentId,
        kind: InteractionKind,
    ) -> Result<(InteractionId, InteractionId), ExposureError> {
        exposure_parameters(self)?;
        let (agent_side, partner_side) = interaction_data(self)
            .store
            .borrow_mut()
            .add_pair(agent, partner, kind);
        self.generate_exposure(agent_side)?;
        Ok((agent_side, partner_side))
    }

    fn generate_exposure(&mut self, id: InteractionId) -> Result<(), ExposureError> {
        let params = exposure_parameters(self)?;
        let data = existing_interaction_data(self).ok_or(ExposureError::UnknownInteraction(id))?;
        let mut store = data.store.borrow_mut();
        if store.get(id).is_none() {
            return Err(ExposureError::UnknownInteraction(id));
        }
        self.sample(ExposureRng, |rng| generate(&mut store, id, &params, rng));
        if let Some(interaction) = store.get(id) {
            trace!(
                "exposure for {id:?}: distance {} duration {}",
                interaction.distance,
                interaction.duration
            );
        }
        Ok(())
    }

    fn get_transmission_factor(&self, id: InteractionId) -> Result<f64, ExposureError> {
        let params = exposure_parameters(self)?;
        let interaction = stored_interaction(self, id)?;
        Ok(transmission_factor(
            &params,
            interaction.distance,
            interaction.duration,
        ))
    }

    fn get_risk_score(&self, id: InteractionId, contact_time: u32) -> Result<f64, ExposureError> {
        let params = exposure_parameters(self)?;
        let interaction = stored_interaction(self, id)?;
        Ok(risk_score(
            &params,
            contact_time,
            interaction.distance,
            interaction.duration,
        ))
    }
}
