use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use drrha_model::{
    CloudletScheduler, DrrhaScheduler, FifoScheduler, Job, SchedEvent, Sim, SimConfig, SimReport,
};
use rand::prelude::*;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    Drrha,
    Fifo,
}

#[derive(Parser)]
#[command(name = "drrha-model")]
#[command(about = "Run a Bernoulli workload through a cloudlet scheduler")]
#[command(version)]
struct Cli {
    /// Scheduling policy.
    #[arg(short, long, value_enum, default_value = "drrha")]
    policy: Policy,

    /// JSON config file; flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of PEs.
    #[arg(long)]
    pes: Option<usize>,

    /// MIPS of each PE.
    #[arg(long)]
    mips: Option<f64>,

    /// Minimum time slice for DRRHA, in seconds.
    #[arg(long)]
    min_granularity: Option<f64>,

    /// Seconds of simulated time during which jobs may arrive.
    #[arg(long, default_value = "500")]
    horizon: u64,

    /// Probability of an arrival in each second of the horizon.
    #[arg(long, default_value = "0.3")]
    p_arrival: f64,

    /// Probability that an arriving job is short.
    #[arg(long, default_value = "0.3")]
    p_short: f64,

    /// Length of short jobs, in MI.
    #[arg(long, default_value = "2000")]
    short_length: f64,

    /// Length of long jobs, in MI.
    #[arg(long, default_value = "6000")]
    long_length: f64,

    /// Random seed for the workload.
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Print every scheduler event.
    #[arg(long)]
    trace: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(pes) = cli.pes {
        config.num_pes = pes;
    }
    if let Some(mips) = cli.mips {
        config.mips_per_pe = mips;
    }
    if let Some(granularity) = cli.min_granularity {
        config.drrha.minimum_granularity = granularity;
    }
    config.validate()?;

    let jobs = bernoulli_jobs(
        cli.horizon,
        cli.p_arrival,
        cli.p_short,
        cli.short_length,
        cli.long_length,
        cli.seed,
    );
    let share = config.share()?;

    let report = match cli.policy {
        Policy::Drrha => run(
            Sim::new(DrrhaScheduler::new(&share, &config.drrha), jobs, &config)?,
            cli.trace,
        )?,
        Policy::Fifo => run(Sim::new(FifoScheduler::new(&share), jobs, &config)?, cli.trace)?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Jobs completed: {}", report.jobs.len());
        println!("Makespan: {:.2} s", report.makespan);
        println!("Average response time: {:.2} s", report.mean_response_time);
        println!("Average turnaround time: {:.2} s", report.mean_turnaround_time);
        println!("Longest turnaround: {:.2} s", report.max_turnaround_time);
        println!("Utilization: {:.1}%", report.utilization * 100.0);
        println!("Context switches: {}", report.context_switches);
    }
    Ok(())
}

fn run<S: CloudletScheduler>(mut sim: Sim<S>, trace: bool) -> Result<SimReport> {
    if !trace {
        return Ok(sim.run()?);
    }

    while !sim.all_jobs_completed() {
        for record in sim.step()? {
            if !matches!(record.event, SchedEvent::TickStart { .. }) {
                println!("t={:.3} {:?}", record.time, record.event);
            }
        }
        if sim.next_event_time().is_none() && !sim.all_jobs_completed() {
            anyhow::bail!("simulation stalled with {} jobs left", sim.unfinished_jobs());
        }
    }
    Ok(SimReport::from_sim(&sim))
}

fn bernoulli_jobs(
    horizon: u64,
    p_arrival: f64,
    p_short: f64,
    short_length: f64,
    long_length: f64,
    seed: u64,
) -> Vec<Job> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut jobs = Vec::new();

    for t in 0..horizon {
        if rng.random::<f64>() < p_arrival {
            let length = if rng.random::<f64>() < p_short {
                short_length
            } else {
                long_length
            };

            jobs.push(Job::new(jobs.len() as u64, t as f64, length, 1));
        }
    }

    jobs
}
