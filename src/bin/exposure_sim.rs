//! Drives the exposure sampler with a random contact network: every day each
//! agent meets `--contacts-per-day` others on average, and every contact gets
//! a sampled distance and duration. Summary statistics are printed at the end;
//! with `--output-dir` every interaction record is also written to
//! `exposures.csv`.
use std::process::ExitCode;

use clap::Args;
use contact_exposure::prelude::*;
use contact_exposure::runner::{run_with_custom_args, BaseArgs};

#[derive(Args, Debug)]
struct SimArgs {
    /// Number of agents in the population
    #[arg(long, default_value = "1000")]
    agents: usize,

    /// Number of simulated days
    #[arg(long, default_value = "7")]
    days: u32,

    /// Mean number of contacts per agent per day
    #[arg(long, default_value = "4.0")]
    contacts_per_day: f64,

    /// Replace an existing exposure report
    #[arg(long)]
    overwrite: bool,
}

#[derive(Copy, Clone)]
struct DayConfig {
    agents: usize,
    mean_contacts: f64,
    report: bool,
}

#[derive(Default)]
struct ExposureSummary {
    contacts: u64,
    distance: SampleMoments,
    duration: SampleMoments,
    transmission_factor: SampleMoments,
    failure: Option<String>,
}

define_data_plugin!(SummaryPlugin, ExposureSummary, ExposureSummary::default());

define_rng!(ContactRng);

const DEFAULT_PARAMETERS: ExposureParametersValues = ExposureParametersValues {
    distance_mean: 2.0,
    distance_sd: 1.0,
    duration_mean: 5.0,
    duration_min: 1.0,
};

fn draw_contact(rng: &mut impl RandomSource, agents: usize) -> (AgentId, AgentId, InteractionKind) {
    let agent = rng.uniform_int(agents);
    let mut partner = rng.uniform_int(agents - 1);
    if partner >= agent {
        partner += 1;
    }
    let kind = match rng.uniform_int(3) {
        0 => InteractionKind::Household,
        1 => InteractionKind::Occupation,
        _ => InteractionKind::Random,
    };
    (AgentId(agent as u64), AgentId(partner as u64), kind)
}

fn record_contact(context: &mut Context, config: DayConfig) -> Result<(), ExposureError> {
    let (agent, partner, kind) =
        context.sample(ContactRng, |rng| draw_contact(rng, config.agents));
    let (agent_side, partner_side) = context.add_interaction_pair(agent, partner, kind)?;

    // Strangers met at random are only sometimes remembered.
    if kind == InteractionKind::Random {
        for id in [agent_side, partner_side] {
            if !context.sample(ContactRng, |rng| rng.bernoulli(0.5)) {
                context.set_interaction_traceable(id, false)?;
            }
        }
    }

    if config.report {
        context.report_interaction(agent_side)?;
        context.report_interaction(partner_side)?;
    }

    let factor = context.get_transmission_factor(agent_side)?;
    let interaction = context
        .get_interaction(agent_side)
        .ok_or(ExposureError::UnknownInteraction(agent_side))?;
    let summary = context.get_data_container_mut(SummaryPlugin);
    summary.contacts += 1;
    summary.distance.push(interaction.distance);
    summary.duration.push(interaction.duration);
    summary.transmission_factor.push(factor);
    Ok(())
}

fn run_day(context: &mut Context, config: DayConfig) -> Result<(), ExposureError> {
    if context.get_current_time() > 0.0 {
        let expired = context.advance_interaction_day();
        debug!("day {}: {expired} interactions expired", context.get_interaction_day());
    }
    let contacts = context.sample(ContactRng, |rng| round_random(config.mean_contacts, rng));
    for _ in 0..contacts {
        record_contact(context, config)?;
    }
    info!(
        "day {}: {contacts} contacts, {} interactions in window",
        context.get_interaction_day(),
        context.get_interaction_count()
    );
    Ok(())
}

fn setup(context: &mut Context, args: BaseArgs, sim: Option<SimArgs>) -> Result<(), ExposureError> {
    let sim = sim.ok_or(ExposureError::ExposureError("missing simulation arguments".to_string()))?;
    if sim.agents < 2 {
        return Err(ExposureError::ExposureError(format!(
            "at least 2 agents are needed, got {}",
            sim.agents
        )));
    }
    if !(sim.contacts_per_day.is_finite() && sim.contacts_per_day >= 0.0) {
        return Err(ExposureError::ExposureError(format!(
            "contacts per day must be a non-negative number, got {}",
            sim.contacts_per_day
        )));
    }
    // Daily contact counts are drawn as an i64.
    let mean_contacts = sim.agents as f64 * sim.contacts_per_day / 2.0;
    if !(mean_contacts.is_finite() && mean_contacts < i64::MAX as f64) {
        return Err(ExposureError::ExposureError(format!(
            "{} agents with {} contacts per day is too many contacts",
            sim.agents, sim.contacts_per_day
        )));
    }

    if context.get_global_property_value(ExposureParameters).is_none() {
        info!("using default exposure parameters {DEFAULT_PARAMETERS:?}");
        context.set_global_property_value(ExposureParameters, DEFAULT_PARAMETERS)?;
    }
    context.init_interactions();

    let report = args.output_dir.is_some();
    if report {
        context.report_options().overwrite(sim.overwrite);
        context.add_exposure_report("exposures")?;
    }

    let config = DayConfig {
        agents: sim.agents,
        mean_contacts,
        report,
    };
    for day in 0..sim.days {
        context.add_plan(f64::from(day), move |context| {
            if let Err(e) = run_day(context, config) {
                error!("day {day} failed: {e}");
                context.get_data_container_mut(SummaryPlugin).failure = Some(e.to_string());
                context.shutdown();
            }
        });
    }
    Ok(())
}

fn describe(name: &str, moments: &SampleMoments) -> String {
    match (moments.mean(), moments.min(), moments.max()) {
        (Some(mean), Some(min), Some(max)) => format!(
            "{name}: mean {mean:.4} sd {:.4} min {min:.4} max {max:.4}",
            moments.variance().map_or(0.0, f64::sqrt)
        ),
        _ => format!("{name}: no samples"),
    }
}

fn main() -> ExitCode {
    let context = match run_with_custom_args(setup) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("exposure-sim: {e}");
            return ExitCode::FAILURE;
        }
    };

    let empty = ExposureSummary::default();
    let summary = context.get_data_container(SummaryPlugin).unwrap_or(&empty);
    if let Some(failure) = &summary.failure {
        eprintln!("exposure-sim: {failure}");
        return ExitCode::FAILURE;
    }

    let lines = [
        format!("contacts: {}", summary.contacts),
        describe("distance", &summary.distance),
        describe("duration", &summary.duration),
        describe("transmission factor", &summary.transmission_factor),
    ];
    for line in &lines {
        info!("{line}");
        println!("{line}");
    }
    ExitCode::SUCCESS
}
