use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use smb_core::{
    Configuration, Encoding, FitnessFunction, MovieCodec, MovieOptions, RepresentationKind,
};
use smb_tuner::batch::{load_configurations, run_batch, sample_configurations, BatchConfig};
use smb_tuner::config::EmulatorConfig;
use smb_tuner::emulator::FceuxEmulator;
use smb_tuner::harness::Harness;
use smb_tuner::history::HistoryStore;
use smb_tuner::replay::new_bests_movie;
use smb_tuner::util::{timestamp_suffix, write_output};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "smb-tuner")]
#[command(about = "Evaluate and replay Super Mario Bros. input movies for black-box autotuning")]
struct Cli {
    #[arg(long, value_enum, default_value_t = CliRepresentation::Duration, global = true)]
    representation: CliRepresentation,
    #[arg(long, value_enum, default_value_t = CliFitness::Progress, global = true)]
    fitness_function: CliFitness,
    /// Override the representation horizon and the level timer used for scoring
    #[arg(long, global = true)]
    horizon: Option<u32>,
    /// fceux binary (default: $FCEUX_PATH or `fceux`)
    #[arg(long, global = true)]
    fceux_path: Option<PathBuf>,
    /// Super Mario Bros. ROM (default: $SMB_ROM or `smb.nes`)
    #[arg(long, global = true)]
    rom: Option<PathBuf>,
    /// Lua hook that prints the outcome line (default: $SMB_HOOK or `fceux-hook.lua`)
    #[arg(long, global = true)]
    hook: Option<PathBuf>,
    /// Run fceux with a visible window instead of under xvfb-run
    #[arg(long, global = true)]
    headful: bool,
    #[arg(long, global = true)]
    xvfb_delay: Option<u64>,
    /// Kill an emulator run after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Describe the parameter space of the selected representation
    Space {
        /// Dump every parameter as JSON instead of a summary
        #[arg(long)]
        json: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write uniformly random configurations as JSON Lines
    Sample {
        #[arg(long, default_value_t = 8)]
        count: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Decode a configuration and write its fm2 movie without running the emulator
    Encode {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_header: bool,
        #[arg(long)]
        no_padding: bool,
    },
    /// Evaluate one configuration in the emulator
    Evaluate {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Also keep the played movie here
        #[arg(long)]
        movie_out: Option<PathBuf>,
    },
    /// Evaluate many configurations in parallel
    Batch {
        /// JSON array or JSON Lines of configurations
        #[arg(long)]
        configs: PathBuf,
        #[arg(long)]
        jobs: Option<usize>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Record results into this history database
        #[arg(long)]
        database: Option<PathBuf>,
        /// Append to an existing tuning run instead of starting a new one
        #[arg(long, requires = "database")]
        tuning_run: Option<i64>,
    },
    /// Concatenate every new-best movie of a tuning run into one fm2
    Replay {
        #[arg(long)]
        database: PathBuf,
        #[arg(long)]
        tuning_run: i64,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliRepresentation {
    Naive,
    Duration,
    Alphabet,
}

impl From<CliRepresentation> for RepresentationKind {
    fn from(value: CliRepresentation) -> Self {
        match value {
            CliRepresentation::Naive => RepresentationKind::Naive,
            CliRepresentation::Duration => RepresentationKind::Duration,
            CliRepresentation::Alphabet => RepresentationKind::Alphabet,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliFitness {
    Progress,
    ProgressPlusTimeRemaining,
    ProgressTimesAverageSpeed,
}

impl From<CliFitness> for FitnessFunction {
    fn from(value: CliFitness) -> Self {
        match value {
            CliFitness::Progress => FitnessFunction::Progress,
            CliFitness::ProgressPlusTimeRemaining => FitnessFunction::progress_plus_time_remaining(),
            CliFitness::ProgressTimesAverageSpeed => FitnessFunction::ProgressTimesAverageSpeed,
        }
    }
}

impl Cli {
    fn fitness(&self) -> FitnessFunction {
        let fitness = FitnessFunction::from(self.fitness_function);
        match self.horizon {
            Some(horizon) => fitness.with_horizon(horizon),
            None => fitness,
        }
    }

    fn emulator_config(&self) -> EmulatorConfig {
        let mut config = EmulatorConfig::from_env();
        if let Some(path) = &self.fceux_path {
            config.fceux_path = path.clone();
        }
        if let Some(path) = &self.rom {
            config.rom_path = path.clone();
        }
        if let Some(path) = &self.hook {
            config.hook_path = path.clone();
        }
        if let Some(delay) = self.xvfb_delay {
            config.xvfb_delay_secs = delay;
        }
        if let Some(secs) = self.timeout_secs.filter(|secs| *secs > 0) {
            config.timeout = Some(Duration::from_secs(secs));
        }
        config.headful |= self.headful;
        config
    }

    /// Harness over the real emulator. Refuses to build without the ROM.
    fn harness(&self) -> Result<Harness<FceuxEmulator>> {
        let config = self.emulator_config();
        config.ensure_assets()?;
        let representation = RepresentationKind::from(self.representation).build(self.horizon);
        Harness::new(representation, self.fitness(), FceuxEmulator::new(config))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let kind = RepresentationKind::from(cli.representation);

    match &cli.command {
        Commands::Space { json, output } => {
            let space = kind.build(cli.horizon).parameter_space();
            if *json {
                let encoded = serde_json::to_vec_pretty(&space)?;
                match output {
                    Some(path) => {
                        write_output(path, encoded)?;
                        println!("wrote={}", path.display());
                    }
                    None => println!("{}", String::from_utf8_lossy(&encoded)),
                }
            } else {
                let counts = space.domain_counts();
                println!("representation={}", kind.as_str());
                println!("parameters={}", space.len());
                println!("bool_params={}", counts.bool_params);
                println!("int_params={}", counts.int_params);
                println!("enum_params={}", counts.enum_params);
                println!("log10_size={:.1}", space.log10_size());
            }
        }
        Commands::Sample {
            count,
            seed,
            output,
        } => {
            let space = kind.build(cli.horizon).parameter_space();
            let configurations = sample_configurations(&space, *count, *seed);
            let mut lines = String::new();
            for configuration in &configurations {
                lines.push_str(&serde_json::to_string(configuration)?);
                lines.push('\n');
            }
            let path = output.clone().unwrap_or_else(|| {
                PathBuf::from(format!(
                    "configs/{}-seed{}-{}.jsonl",
                    kind.as_str(),
                    seed,
                    timestamp_suffix()
                ))
            });
            write_output(&path, lines)?;
            println!("representation={}", kind.as_str());
            println!("count={}", configurations.len());
            println!("output={}", path.display());
        }
        Commands::Encode {
            config,
            index,
            output,
            no_header,
            no_padding,
        } => {
            let representation = kind.build(cli.horizon);
            let configuration = pick_configuration(config, *index)?;
            let events = representation
                .decode(&configuration)
                .with_context(|| format!("{} decode failed", representation.id()))?;
            let options = MovieOptions {
                include_header: !no_header,
                include_padding: !no_padding,
                ..MovieOptions::default()
            };
            let movie = MovieCodec::default().encode(&events, &options);
            let summary = events.summary();
            let path = output.clone().unwrap_or_else(|| {
                PathBuf::from(format!("movies/{}-{}.fm2", kind.as_str(), timestamp_suffix()))
            });
            write_output(&path, &movie)?;
            println!("representation={}", kind.as_str());
            println!("movie_lines={}", movie.lines().count());
            println!("action_frames={}", summary.action_frames);
            println!("horizontal_frames={}", summary.horizontal_frames);
            println!("run_frames={}", summary.run_frames);
            println!("jump_frames={}", summary.jump_frames);
            println!("output={}", path.display());
        }
        Commands::Evaluate {
            config,
            index,
            movie_out,
        } => {
            let harness = cli.harness()?;
            let configuration = pick_configuration(config, *index)?;
            if let Some(path) = movie_out {
                let events = harness.decode(&configuration)?;
                write_output(path, harness.movie(&events, &MovieOptions::full()))?;
            }
            let result = harness.evaluate(&configuration);
            println!("representation={}", kind.as_str());
            println!("fitness={}", harness.fitness());
            println!("state={}", result.state.as_str());
            println!("score={}", result.score);
            if let Some(outcome) = result.outcome {
                println!("status={}", outcome.status.as_str());
                println!("x_pos={}", outcome.x_pos);
                println!("frames={}", outcome.frames);
            }
            if let Some(path) = movie_out {
                println!("movie={}", path.display());
            }
        }
        Commands::Batch {
            configs,
            jobs,
            out_dir,
            database,
            tuning_run,
        } => {
            let harness = cli.harness()?;
            let configurations = load_configurations(configs)?;
            let store = database.as_deref().map(HistoryStore::open).transpose()?;
            let history = match &store {
                Some(store) => {
                    let run_id = match tuning_run {
                        Some(run_id) => {
                            if !store.tuning_run_exists(*run_id)? {
                                return Err(anyhow!("tuning run {run_id} does not exist"));
                            }
                            *run_id
                        }
                        None => store.create_tuning_run(kind.as_str(), harness.fitness().as_str())?,
                    };
                    Some((store, run_id))
                }
                None => None,
            };

            let report = run_batch(
                &harness,
                BatchConfig {
                    configurations,
                    jobs: *jobs,
                    out_dir: out_dir.clone(),
                    history,
                },
            )?;

            println!("representation={}", kind.as_str());
            println!("fitness={}", harness.fitness());
            println!("runs={}", report.run_count);
            println!("ok={}", report.ok_count);
            println!("errors={}", report.error_count);
            if let (Some(index), Some(score)) = (report.best_index, report.best_score) {
                println!("best_index={index}");
                println!("best_score={score}");
            }
            if let Some(run_id) = report.tuning_run {
                println!("tuning_run={run_id}");
            }
            if let Some(dir) = out_dir {
                println!("summary={}", dir.join("summary.json").display());
            }
        }
        Commands::Replay {
            database,
            tuning_run,
            output,
        } => {
            let harness = cli.harness()?;
            let store = HistoryStore::open(database)?;
            if !store.tuning_run_exists(*tuning_run)? {
                return Err(anyhow!("tuning run {tuning_run} does not exist"));
            }
            let reel = new_bests_movie(&harness, &store, *tuning_run)?;
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("new-bests-run{tuning_run}.fm2")));
            write_output(&path, &reel)?;
            println!("tuning_run={tuning_run}");
            println!("movie_lines={}", reel.lines().count());
            println!("output={}", path.display());
        }
    }

    Ok(())
}

fn pick_configuration(path: &Path, index: usize) -> Result<Configuration> {
    let mut configurations = load_configurations(path)?;
    let count = configurations.len();
    if index >= count {
        return Err(anyhow!(
            "{} holds {count} configurations; index {index} is out of range",
            path.display()
        ));
    }
    Ok(configurations.swap_remove(index))
}
