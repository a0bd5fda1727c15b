//! The simulation `Context`: type-keyed data plugins plus a time-ordered
//! queue of plans.
//!
//! Modules keep their state in data plugins declared with
//! [`define_data_plugin!`] and expose behavior through extension traits on
//! `Context` (see [`ContextRandomExt`](crate::random::ContextRandomExt),
//! [`ContextInteractionExt`](crate::interaction::ContextInteractionExt),
//! [`ContextExposureExt`](crate::exposure::ContextExposureExt)).
use std::any::{Any, TypeId};
use std::collections::VecDeque;

use log::trace;

use crate::plan::{PlanId, PlanQueue};
use crate::HashMap;

/// A type that owns one data container stored on the `Context`.
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a data plugin type whose container is created with `$default` the
/// first time it is requested mutably.
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default:expr) => {
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

type Callback = dyn FnOnce(&mut Context);

pub struct Context {
    plan_queue: PlanQueue<Box<Callback>>,
    callback_queue: VecDeque<Box<Callback>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: PlanQueue::new(),
            callback_queue: VecDeque::new(),
            data_plugins: HashMap::default(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Schedules `callback` to run at `time`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) -> PlanId {
        assert!(
            !time.is_nan() && !time.is_infinite() && time >= self.current_time,
            "Time {time} is invalid"
        );
        trace!("adding plan at {time}");
        self.plan_queue.add_plan(time, Box::new(callback))
    }

    /// Cancels a plan that has not run yet. Cancelling an unknown or already
    /// executed plan has no effect.
    pub fn cancel_plan(&mut self, id: &PlanId) {
        trace!("cancelling plan {id:?}");
        self.plan_queue.cancel_plan(id);
    }

    /// Queues `callback` to run before the next plan, at the current time.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// Stops `execute` once the currently running callback returns. Plans that
    /// have not run yet are dropped.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at {}", self.current_time);
        self.shutdown_requested = true;
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Returns the container for `plugin`, creating it on first use.
    ///
    /// # Panics
    ///
    /// Panics if the stored container is not a `T::DataContainer`, which can only
    /// happen through a bug in `define_data_plugin!`.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .expect("data plugin container has the wrong type")
    }

    /// Returns the container for `plugin` if it has been created.
    #[must_use]
    pub fn get_data_container<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|container| container.downcast_ref::<T::DataContainer>())
    }

    /// Runs queued callbacks and plans in order until both queues are empty or
    /// `shutdown` is called.
    pub fn execute(&mut self) {
        trace!("entering event loop");
        loop {
            if self.shutdown_requested {
                break;
            }

            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            match self.plan_queue.get_next_plan() {
                Some(plan) => {
                    self.current_time = plan.time;
                    (plan.data)(self);
                }
                None => break,
            }
        }
        trace!("event loop finished at {}", self.current_time);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    define_data_plugin!(ComponentA, Vec<u32>, vec![]);

    fn add_plan(context: &mut Context, time: f64, value: u32) -> PlanId {
        context.add_plan(time, move |context| {
            context.get_data_container_mut(ComponentA).push(value);
        })
    }

    fn recorded(context: &Context) -> Vec<u32> {
        context
            .get_data_container(ComponentA)
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    #[should_panic(expected = "Time -1 is invalid")]
    fn negative_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, -1.0, 0);
    }

    #[test]
    #[should_panic(expected = "is invalid")]
    fn infinite_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, f64::INFINITY, 0);
    }

    #[test]
    #[should_panic(expected = "is invalid")]
    fn nan_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, f64::NAN, 0);
    }

    #[test]
    fn empty_context() {
        let mut context = Context::new();
        context.execute();
        assert_eq!(context.get_current_time(), 0.0);
        assert!(context.get_data_container(ComponentA).is_none());
    }

    #[test]
    fn plans_advance_time() {
        let mut context = Context::new();
        add_plan(&mut context, 2.0, 2);
        add_plan(&mut context, 1.0, 1);
        context.execute();
        assert_eq!(context.get_current_time(), 2.0);
        assert_eq!(recorded(&context), vec![1, 2]);
    }

    #[test]
    fn callback_runs_before_plan_it_schedules() {
        let mut context = Context::new();
        context.queue_callback(|context| {
            context.get_data_container_mut(ComponentA).push(1);
            add_plan(context, 1.0, 3);
            context.queue_callback(|context| {
                context.get_data_container_mut(ComponentA).push(2);
            });
        });
        context.execute();
        assert_eq!(recorded(&context), vec![1, 2, 3]);
    }

    #[test]
    fn plans_at_same_time_fire_in_order() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        add_plan(&mut context, 1.0, 2);
        add_plan(&mut context, 1.0, 3);
        context.execute();
        assert_eq!(recorded(&context), vec![1, 2, 3]);
    }

    #[test]
    fn cancel_plan() {
        let mut context = Context::new();
        let to_cancel = add_plan(&mut context, 2.0, 1);
        context.add_plan(1.0, move |context| {
            context.cancel_plan(&to_cancel);
        });
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert!(recorded(&context).is_empty());
    }

    #[test]
    fn shutdown_drops_remaining_plans() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        context.add_plan(2.0, Context::shutdown);
        add_plan(&mut context, 3.0, 3);
        context.execute();
        assert_eq!(context.get_current_time(), 2.0);
        assert_eq!(recorded(&context), vec![1]);
    }
}
