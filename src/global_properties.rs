//! Global properties: configuration values that are set once when a
//! simulation starts and read by any module afterwards.
//!
//! Declare a property with [`define_global_property!`], giving it a value
//! type and, optionally, a validator. Every property is registered under
//! `"<crate name>.<property name>"` so that it can be loaded from a JSON file
//! whose top-level keys are those names:
//!
//! ```json
//! {
//!     "contact_exposure.ExposureParameters": {
//!         "distance_mean": 2.0,
//!         "distance_sd": 1.0,
//!         "duration_mean": 5.0,
//!         "duration_min": 1.0
//!     }
//! }
//! ```
//!
//! A property may be set more than once only with the same value.
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex};

use log::{debug, trace};
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::ExposureError;
use crate::HashMap;

/// Defines a global property with the following parameters:
/// * `$global_property`: name of the unit type identifying the property
/// * `$value`: the type of the property's value
/// * `$validate`: a function (or closure) checking a candidate value (optional)
#[macro_export]
macro_rules! define_global_property {
    ($global_property:ident, $value:ty, $validate:expr) => {
        #[derive(Copy, Clone)]
        pub struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;

            fn new() -> Self {
                $global_property
            }

            fn validate(value: &$value) -> Result<(), $crate::error::ExposureError> {
                $validate(value)
            }
        }

        $crate::paste::paste! {
            $crate::ctor::declarative::ctor! {
                #[ctor]
                fn [<$global_property:snake _register>]() {
                    let module = module_path!();
                    let krate = module.split("::").next().unwrap_or(module);
                    let name = format!("{}.{}", krate, stringify!($global_property));
                    $crate::global_properties::add_global_property::<$global_property>(&name);
                }
            }
        }
    };

    ($global_property:ident, $value:ty) => {
        $crate::define_global_property!($global_property, $value, |_| Ok(()));
    };
}
pub use define_global_property;

pub trait GlobalProperty: Any {
    type Value: Any + Debug + PartialEq + DeserializeOwned;

    fn new() -> Self;

    /// Checks a candidate value before it is stored.
    ///
    /// # Errors
    ///
    /// Returns `ExposureError::IllegalGlobalPropertyValue` describing the problem.
    fn validate(value: &Self::Value) -> Result<(), ExposureError>;
}

type PropertySetter = dyn Fn(&mut Context, &str, serde_json::Value) -> Result<(), ExposureError>
    + Send
    + Sync;

static GLOBAL_PROPERTIES: LazyLock<Mutex<HashMap<String, Arc<PropertySetter>>>> =
    LazyLock::new(|| Mutex::new(HashMap::default()));

/// Registers `T` under `name` for `load_global_properties`. Called by
/// `define_global_property!` at startup.
///
/// # Panics
///
/// Panics if another property already uses `name`.
pub fn add_global_property<T: GlobalProperty>(name: &str) {
    trace!("registering global property {name}");
    let mut properties = GLOBAL_PROPERTIES
        .lock()
        .expect("global property registry poisoned");
    let setter: Arc<PropertySetter> = Arc::new(
        |context: &mut Context, name: &str, value: serde_json::Value| {
            let value: T::Value = serde_json::from_value(value)?;
            debug!("loaded global property {name}: {value:?}");
            context.set_global_property_value(T::new(), value)
        },
    );
    assert!(
        properties.insert(name.to_string(), setter).is_none(),
        "duplicate global property {name}"
    );
}

fn get_global_property_setter(name: &str) -> Option<Arc<PropertySetter>> {
    GLOBAL_PROPERTIES
        .lock()
        .expect("global property registry poisoned")
        .get(name)
        .cloned()
}

struct GlobalPropertiesDataContainer {
    global_property_container: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesDataContainer,
    GlobalPropertiesDataContainer {
        global_property_container: HashMap::default(),
    }
);

pub trait ContextGlobalPropertiesExt {
    /// Validates and stores `value` for `property`.
    ///
    /// # Errors
    ///
    /// * `IllegalGlobalPropertyValue` if the property's validator rejects it
    /// * `GlobalPropertyAlreadySet` if a different value is already stored
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        property: T,
        value: T::Value,
    ) -> Result<(), ExposureError>;

    /// Returns the value of `property`, or `None` if it has not been set.
    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;

    /// Reads a single value of type `T` from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not deserialize to `T`.
    fn load_parameters_from_json<T: DeserializeOwned>(
        &mut self,
        file_path: &Path,
    ) -> Result<T, ExposureError>;

    /// Sets every property named in a JSON object file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, names an
    /// unregistered property, or holds a value that fails to deserialize,
    /// validate, or conflicts with an already set value.
    fn load_global_properties(&mut self, file_path: &Path) -> Result<(), ExposureError>;
}

impl ContextGlobalPropertiesExt for Context {
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        _property: T,
        value: T::Value,
    ) -> Result<(), ExposureError> {
        T::validate(&value)?;
        let container = self.get_data_container_mut(GlobalPropertiesPlugin);
        match container.global_property_container.entry(TypeId::of::<T>()) {
            Entry::Occupied(existing) => {
                if existing.get().downcast_ref::<T::Value>() != Some(&value) {
                    return Err(ExposureError::GlobalPropertyAlreadySet(
                        std::any::type_name::<T>().to_string(),
                    ));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Box::new(value));
            }
        }
        Ok(())
    }

    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        self.get_data_container(GlobalPropertiesPlugin)?
            .global_property_container
            .get(&TypeId::of::<T>())?
            .downcast_ref::<T::Value>()
    }

    fn load_parameters_from_json<T: DeserializeOwned>(
        &mut self,
        file_path: &Path,
    ) -> Result<T, ExposureError> {
        trace!("reading parameters from {}", file_path.display());
        let config_file = fs::File::open(file_path)?;
        let reader = std::io::BufReader::new(config_file);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    fn load_global_properties(&mut self, file_path: &Path) -> Result<(), ExposureError> {
        trace!("loading global properties from {}", file_path.display());
        let properties: serde_json::Map<String, serde_json::Value> =
            self.load_parameters_from_json(file_path)?;
        for (name, value) in properties {
            let setter = get_global_property_setter(&name)
                .ok_or_else(|| ExposureError::UnknownGlobalProperty(name.clone()))?;
            setter(self, &name, value)?;
        }
        Ok(())
    }
}
