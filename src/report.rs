//! CSV reports. Each report type is a serializable row struct written to its
//! own file in the configured output directory.
use std::any::TypeId;
use std::cell::RefCell;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use csv::Writer;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::ExposureError;
use crate::exposure::ContextExposureExt;
use crate::interaction::{ContextInteractionExt, InteractionId, InteractionKind};
use crate::HashMap;

pub trait Report: 'static {
    fn type_id(&self) -> TypeId;

    /// Writes this row.
    ///
    /// # Errors
    ///
    /// Returns the writer's error if serialization or I/O fails.
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), csv::Error>;
}

/// Implements [`Report`] for a `Serialize` row type.
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut $crate::csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::csv::Error> {
                writer.serialize(self)
            }
        }
    };
}
pub use define_report;

/// Where report files go: `<directory>/<file_prefix><short name>.csv`.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub(crate) directory: PathBuf,
    pub(crate) file_prefix: String,
    pub(crate) overwrite: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            directory: PathBuf::from("."),
            file_prefix: String::new(),
            overwrite: false,
        }
    }
}

impl ReportOptions {
    pub fn directory(&mut self, directory: PathBuf) -> &mut Self {
        self.directory = directory;
        self
    }

    pub fn file_prefix(&mut self, file_prefix: String) -> &mut Self {
        self.file_prefix = file_prefix;
        self
    }

    /// Whether existing report files may be replaced.
    pub fn overwrite(&mut self, overwrite: bool) -> &mut Self {
        self.overwrite = overwrite;
        self
    }

    fn path_for(&self, short_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}.csv", self.file_prefix, short_name))
    }
}

struct ReportData {
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
    options: ReportOptions,
}

define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_writers: RefCell::new(HashMap::default()),
        options: ReportOptions::default(),
    }
);

pub trait ContextReportExt {
    fn report_options(&mut self) -> &mut ReportOptions;

    /// Opens the file for report type `T` and writes its header with the first
    /// row.
    ///
    /// # Errors
    ///
    /// Returns `ReportError` if the file exists and overwriting is off, or an
    /// I/O error if the directory or file cannot be created.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), ExposureError>;

    /// Appends a row to `T`'s report file.
    ///
    /// # Errors
    ///
    /// Returns `ReportError` if `add_report::<T>` was not called, or the
    /// writer's error.
    fn send_report<T: Report>(&self, report: T) -> Result<(), ExposureError>;
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.get_data_container_mut(ReportPlugin).options
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), ExposureError> {
        let data_container = self.get_data_container_mut(ReportPlugin);
        let path = data_container.options.path_for(short_name);
        if path.exists() && !data_container.options.overwrite {
            return Err(ExposureError::ReportError(format!(
                "{} already exists; enable overwrite to replace it",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        debug!("writing report {short_name} to {}", path.display());
        data_container
            .file_writers
            .get_mut()
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) -> Result<(), ExposureError> {
        let missing = || {
            ExposureError::ReportError(format!(
                "no report added for {}",
                std::any::type_name::<T>()
            ))
        };
        let data_container = self.get_data_container(ReportPlugin).ok_or_else(missing)?;
        let mut writers = data_container.file_writers.borrow_mut();
        let writer = writers.get_mut(&report.type_id()).ok_or_else(missing)?;
        report.serialize(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// One row per interaction record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExposureRecord {
    pub day: u32,
    pub interaction_id: u64,
    pub paired_interaction_id: u64,
    pub agent: u64,
    pub partner: u64,
    pub kind: InteractionKind,
    pub traceable: bool,
    pub distance: f64,
    pub duration: f64,
    pub transmission_factor: f64,
}
define_report!(ExposureRecord);

pub trait ContextExposureReportExt {
    /// Adds the [`ExposureRecord`] report under `short_name`.
    ///
    /// # Errors
    ///
    /// As for `add_report`.
    fn add_exposure_report(&mut self, short_name: &str) -> Result<(), ExposureError>;

    /// Writes the row for interaction `id`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownInteraction` if `id` is not in the window, or any
    /// `send_report` error.
    fn report_interaction(&self, id: InteractionId) -> Result<(), ExposureError>;
}

impl ContextExposureReportExt for Context {
    fn add_exposure_report(&mut self, short_name: &str) -> Result<(), ExposureError> {
        self.add_report::<ExposureRecord>(short_name)
    }

    fn report_interaction(&self, id: InteractionId) -> Result<(), ExposureError> {
        let interaction = self
            .get_interaction(id)
            .ok_or(ExposureError::UnknownInteraction(id))?;
        let record = ExposureRecord {
            day: interaction.day,
            interaction_id: id.index(),
            paired_interaction_id: interaction.paired_interaction.index(),
            agent: interaction.agent.0,
            partner: interaction.partner.0,
            kind: interaction.kind,
            traceable: interaction.traceable,
            distance: interaction.distance,
            duration: interaction.duration,
            transmission_factor: self.get_transmission_factor(id)?,
        };
        trace!("reporting {record:?}");
        self.send_report(record)
    }
}
