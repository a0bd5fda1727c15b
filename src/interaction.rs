//! Paired interaction records and the rolling window they live in.
//!
//! A physical contact between two agents is stored as two [`Interaction`]
//! records, one from each agent's point of view. Each record holds the
//! [`InteractionId`] of its counterpart rather than a reference, so the pair
//! has no ownership cycle; the [`InteractionStore`] arena owns both.
//!
//! Records are kept for a fixed number of days. Advancing the day drops the
//! interactions recorded that many days ago.
use std::cell::RefCell;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::ExposureError;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::{define_data_plugin, define_global_property, HashMap, HashSet};

/// Handle to one side of an interaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractionId(u64);

impl InteractionId {
    #[must_use]
    pub fn index(self) -> u64 {
        self.0
    }
}

/// An agent as identified by the caller's population model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u64);

/// The contact network an interaction came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    Household,
    Occupation,
    Random,
}

/// One side of a contact.
///
/// `duration` and `distance` start at zero and are filled in by
/// [`exposure::generate`](crate::exposure::generate), which writes the same
/// values to both sides. `traceable` is one-sided: an agent may be able to
/// recall a contact its partner cannot.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Interaction {
    pub agent: AgentId,
    pub partner: AgentId,
    pub kind: InteractionKind,
    pub day: u32,
    pub traceable: bool,
    pub duration: f64,
    pub distance: f64,
    pub paired_interaction: InteractionId,
}

fn ring_inc(index: usize, n: usize) -> usize {
    if index == n - 1 {
        0
    } else {
        index + 1
    }
}

/// Arena of interaction records covering the most recent `days` days.
pub struct InteractionStore {
    records: HashMap<InteractionId, Interaction>,
    by_agent: HashMap<AgentId, Vec<InteractionId>>,
    // One bucket per day in the window, used as a ring buffer.
    window: Vec<Vec<InteractionId>>,
    day_index: usize,
    current_day: u32,
    next_id: u64,
}

impl InteractionStore {
    /// # Panics
    ///
    /// Panics if `days` is zero.
    #[must_use]
    pub fn new(days: usize) -> Self {
        assert!(days > 0, "the interaction window must cover at least one day");
        InteractionStore {
            records: HashMap::default(),
            by_agent: HashMap::default(),
            window: vec![Vec::new(); days],
            day_index: 0,
            current_day: 0,
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> InteractionId {
        let id = InteractionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Records a contact between `agent` and `partner` on the current day and
    /// returns the ids of the agent's and the partner's records, in that order.
    /// Both sides start traceable with zero duration and distance.
    pub fn add_pair(
        &mut self,
        agent: AgentId,
        partner: AgentId,
        kind: InteractionKind,
    ) -> (InteractionId, InteractionId) {
        let agent_side = self.next_id();
        let partner_side = self.next_id();
        let day = self.current_day;
        let record = |owner, other, pair| Interaction {
            agent: owner,
            partner: other,
            kind,
            day,
            traceable: true,
            duration: 0.0,
            distance: 0.0,
            paired_interaction: pair,
        };

        self.records
            .insert(agent_side, record(agent, partner, partner_side));
        self.records
            .insert(partner_side, record(partner, agent, agent_side));
        self.by_agent.entry(agent).or_default().push(agent_side);
        self.by_agent.entry(partner).or_default().push(partner_side);
        self.window[self.day_index].extend([agent_side, partner_side]);

        trace!("added interaction pair {agent_side:?}/{partner_side:?} ({agent:?}, {partner:?})");
        (agent_side, partner_side)
    }

    #[must_use]
    pub fn get(&self, id: InteractionId) -> Option<&Interaction> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: InteractionId) -> Option<&mut Interaction> {
        self.records.get_mut(&id)
    }

    /// The id of the other side of `id`'s contact.
    #[must_use]
    pub fn pair_of(&self, id: InteractionId) -> Option<InteractionId> {
        self.get(id).map(|interaction| interaction.paired_interaction)
    }

    /// Sets whether the owner of `id` can trace this contact. The other side
    /// is unaffected.
    ///
    /// # Errors
    ///
    /// Returns `UnknownInteraction` if `id` is not in the window.
    pub fn set_traceable(&mut self, id: InteractionId, traceable: bool) -> Result<(), ExposureError> {
        let interaction = self
            .get_mut(id)
            .ok_or(ExposureError::UnknownInteraction(id))?;
        interaction.traceable = traceable;
        Ok(())
    }

    /// The records owned by `agent` still in the window, oldest first.
    pub fn interactions_of(&self, agent: AgentId) -> impl Iterator<Item = &Interaction> + '_ {
        self.by_agent
            .get(&agent)
            .into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id))
    }

    /// Moves to the next day. Interactions recorded `days` days ago leave the
    /// window; returns how many records were dropped.
    pub fn advance_day(&mut self) -> usize {
        self.current_day += 1;
        self.day_index = ring_inc(self.day_index, self.window.len());
        let expired = std::mem::take(&mut self.window[self.day_index]);

        let mut expired_by_agent: HashMap<AgentId, HashSet<InteractionId>> = HashMap::default();
        for id in &expired {
            if let Some(interaction) = self.records.remove(id) {
                expired_by_agent
                    .entry(interaction.agent)
                    .or_default()
                    .insert(*id);
            }
        }
        for (agent, ids) in expired_by_agent {
            if let Some(kept) = self.by_agent.get_mut(&agent) {
                kept.retain(|id| !ids.contains(id));
                if kept.is_empty() {
                    self.by_agent.remove(&agent);
                }
            }
        }

        debug!(
            "interaction day {}: expired {} records, {} remain",
            self.current_day,
            expired.len(),
            self.records.len()
        );
        expired.len()
    }

    #[must_use]
    pub fn current_day(&self) -> u32 {
        self.current_day
    }

    /// Number of days covered by the window.
    #[must_use]
    pub fn days(&self) -> usize {
        self.window.len()
    }

    /// Number of records (two per contact) in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InteractionStore {
    fn default() -> Self {
        InteractionStore::new(1)
    }
}

/// Longest interaction window accepted from configuration.
pub const MAX_INTERACTION_DAYS: usize = 366;

define_global_property!(InteractionDays, usize, |days: &usize| {
    if (1..=MAX_INTERACTION_DAYS).contains(days) {
        Ok(())
    } else {
        Err(ExposureError::IllegalGlobalPropertyValue(format!(
            "InteractionDays must be between 1 and {MAX_INTERACTION_DAYS}, got {days}"
        )))
    }
});

pub(crate) struct InteractionData {
    pub(crate) store: RefCell<InteractionStore>,
}

define_data_plugin!(
    InteractionPlugin,
    InteractionData,
    InteractionData {
        store: RefCell::new(InteractionStore::default()),
    }
);

/// Ensures the interaction container exists and returns it.
pub(crate) fn interaction_data(context: &mut Context) -> &InteractionData {
    context.get_data_container_mut(InteractionPlugin)
}

/// The interaction container, if any interaction has been touched yet.
pub(crate) fn existing_interaction_data(context: &Context) -> Option<&InteractionData> {
    context.get_data_container(InteractionPlugin)
}

pub trait ContextInteractionExt {
    /// Resets the interaction window, sized by the `InteractionDays` global
    /// property (one day if unset). Existing interactions are discarded.
    fn init_interactions(&mut self);

    /// Advances the window by one day; returns the number of expired records.
    fn advance_interaction_day(&mut self) -> usize;

    /// Sets whether the owner of `id` can trace this contact.
    ///
    /// # Errors
    ///
    /// Returns `UnknownInteraction` if `id` is not in the window.
    fn set_interaction_traceable(
        &mut self,
        id: InteractionId,
        traceable: bool,
    ) -> Result<(), ExposureError>;

    fn get_interaction(&self, id: InteractionId) -> Option<Interaction>;

    /// The other side of `id`'s contact.
    fn get_paired_interaction(&self, id: InteractionId) -> Option<Interaction>;

    /// The records owned by `agent` in the window, oldest first.
    fn get_agent_interactions(&self, agent: AgentId) -> Vec<Interaction>;

    fn get_interaction_count(&self) -> usize;

    fn get_interaction_day(&self) -> u32;
}

impl ContextInteractionExt for Context {
    fn init_interactions(&mut self) {
        let days = self
            .get_global_property_value(InteractionDays)
            .copied()
            .unwrap_or(1);
        debug!("initializing interaction window of {days} days");
        *self.get_data_container_mut(InteractionPlugin).store.get_mut() =
            InteractionStore::new(days);
    }

    fn advance_interaction_day(&mut self) -> usize {
        self.get_data_container_mut(InteractionPlugin)
            .store
            .get_mut()
            .advance_day()
    }

    fn set_interaction_traceable(
        &mut self,
        id: InteractionId,
        traceable: bool,
    ) -> Result<(), ExposureError> {
        self.get_data_container_mut(InteractionPlugin)
            .store
            .get_mut()
            .set_traceable(id, traceable)
    }

    fn get_interaction(&self, id: InteractionId) -> Option<Interaction> {
        let data = self.get_data_container(InteractionPlugin)?;
        let store = data.store.borrow();
        store.get(id).copied()
    }

    fn get_paired_interaction(&self, id: InteractionId) -> Option<Interaction> {
        let data = self.get_data_container(InteractionPlugin)?;
        let store = data.store.borrow();
        store.get(store.pair_of(id)?).copied()
    }

    fn get_agent_interactions(&self, agent: AgentId) -> Vec<Interaction> {
        self.get_data_container(InteractionPlugin)
            .map(|data| data.store.borrow().interactions_of(agent).copied().collect())
            .unwrap_or_default()
    }

    fn get_interaction_count(&self) -> usize {
        self.get_data_container(InteractionPlugin)
            .map_or(0, |data| data.store.borrow().len())
    }

    fn get_interaction_day(&self) -> u32 {
        self.get_data_container(InteractionPlugin)
            .map_or(0, |data| data.store.borrow().current_day())
    }
}
