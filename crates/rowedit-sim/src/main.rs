use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rowedit_sim::{run_demo, run_simulator, SimulatorConfig};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("rowedit-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Row edit controller simulator")
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run randomized stage/cancel/commit workload against a shadow model")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("FILE")
                        .help("TOML file with simulator settings; flags override it"),
                )
                .arg(
                    Arg::new("rows")
                        .long("rows")
                        .value_parser(value_parser!(usize))
                        .help("Number of rows in the simulated table"),
                )
                .arg(
                    Arg::new("operations")
                        .long("operations")
                        .value_parser(value_parser!(u64))
                        .help("Number of operations to generate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .value_parser(value_parser!(f64))
                        .help("Probability that a persist call fails"),
                )
                .arg(
                    Arg::new("max-delay-ms")
                        .long("max-delay-ms")
                        .value_parser(value_parser!(u64))
                        .help("Upper bound of simulated persist latency"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("demo").about("Walk one row through stage, commit and cancel"))
}

fn simulator_config(args: &ArgMatches) -> anyhow::Result<SimulatorConfig> {
    let mut config = match args.get_one::<String>("config") {
        Some(path) => SimulatorConfig::from_toml_file(path)?,
        None => SimulatorConfig::default(),
    };

    if let Some(rows) = args.get_one::<usize>("rows") {
        config.rows = *rows;
    }
    if let Some(operations) = args.get_one::<u64>("operations") {
        config.operations = *operations;
    }
    if let Some(seed) = args.get_one::<u64>("seed") {
        config.seed = *seed;
    }
    if let Some(rate) = args.get_one::<f64>("failure-rate") {
        config.failure_rate = *rate;
    }
    if let Some(delay) = args.get_one::<u64>("max-delay-ms") {
        config.max_delay_ms = *delay;
    }
    if args.get_flag("stop-on-violation") {
        config.stop_on_first_violation = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let config = simulator_config(args)?;
            let report = run_simulator(config).await?;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("demo", _)) => {
            for step in run_demo().await? {
                println!("{step}");
            }
        }
        _ => {}
    }
    Ok(())
}
