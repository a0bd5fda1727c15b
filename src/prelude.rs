pub use crate::context::Context;
pub use crate::error::ExposureError;
pub use crate::exposure::{
    risk_score, sample_distance, sample_duration, transmission_factor, ContextExposureExt,
    ExposureParameters, ExposureParametersValues,
};
pub use crate::global_properties::ContextGlobalPropertiesExt;
pub use crate::interaction::{
    AgentId, ContextInteractionExt, Interaction, InteractionDays, InteractionId, InteractionKind,
};
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::numeric::SampleMoments;
pub use crate::random::{round_random, ContextRandomExt, RandomSource};
pub use crate::report::{ContextExposureReportExt, ContextReportExt, ExposureRecord};
pub use crate::{define_data_plugin, define_global_property, define_report, define_rng};
