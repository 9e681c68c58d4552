//! # Treasure Roller
//!
//! Command-line tool that rolls treasure and, optionally, splits it across a party.
//!
//! Output is one JSON document on stdout; logs go to stderr and follow `RUST_LOG`.

use std::process::ExitCode;

use hoard_economy::{
    distribute, CoinPolicy, DifficultyBand, EngineConfig, PartyLoot, ProbabilityTable, ReferenceData, RollLedger,
    TreasureError, TreasureGenerator, TreasureResult, TreasureType, VariantTable,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: treasure_roller <data-dir> <individual|hoard> <band|cr> [options]

Arguments:
  <data-dir>         Directory holding the four JSON catalogs
  <band|cr>          0-4, 5-10, 11-16, 17+ or a challenge rating

Options:
  --seed <n>         Seed the dice (default: 0)
  --bundles <n>      Roll this many bundles into the pool (default: 1)
  --party <a,b,c>    Distribute the pooled loot among these members
  --split            Pay coins as equal mixed-denomination shares
  --config <file>    Engine configuration (TOML)
  --rolls            Include the roll ledger in the output";

struct Options {
    data_dir: String,
    kind: TreasureType,
    band: DifficultyBand,
    seed: u64,
    bundles: u32,
    party: Option<Vec<String>>,
    policy: CoinPolicy,
    config: Option<String>,
    show_rolls: bool,
}

const VALUE_FLAGS: [&str; 4] = ["--seed", "--bundles", "--party", "--config"];

/// Value following `flag`; a flag given without one is a usage error.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>, String> {
    let Some(i) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    match args.get(i + 1) {
        Some(value) if !value.starts_with("--") => Ok(Some(value.as_str())),
        _ => Err(format!("{flag} expects a value\n\n{USAGE}")),
    }
}

fn parse_band(arg: &str) -> TreasureResult<DifficultyBand> {
    arg.parse().or_else(|err| {
        arg.trim()
            .parse::<u32>()
            .map(DifficultyBand::from_challenge_rating)
            .map_err(|_| err)
    })
}

fn parse_number<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> Result<T, String> {
    match flag_value(args, flag)? {
        Some(raw) => raw.parse().map_err(|_| format!("{flag} expects a number, got '{raw}'")),
        None => Ok(default),
    }
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let positional: Vec<&String> = {
        let mut out = Vec::new();
        let mut skip = false;
        for arg in args.iter().skip(1) {
            if skip {
                skip = false;
            } else if VALUE_FLAGS.contains(&arg.as_str()) {
                skip = true;
            } else if !arg.starts_with("--") {
                out.push(arg);
            }
        }
        out
    };

    let [data_dir, kind, band] = positional.as_slice() else {
        return Err(USAGE.to_string());
    };

    Ok(Options {
        data_dir: (*data_dir).clone(),
        kind: kind.parse().map_err(|e: TreasureError| e.to_string())?,
        band: parse_band(band).map_err(|e| e.to_string())?,
        seed: parse_number(args, "--seed", 0)?,
        bundles: parse_number(args, "--bundles", 1)?,
        party: flag_value(args, "--party")?.map(|list| list.split(',').map(str::to_string).collect()),
        policy: if args.iter().any(|a| a == "--split") {
            CoinPolicy::SplitDenominations
        } else {
            CoinPolicy::RandomExtra
        },
        config: flag_value(args, "--config")?.map(str::to_string),
        show_rolls: args.iter().any(|a| a == "--rolls"),
    })
}

fn run(options: &Options) -> TreasureResult<serde_json::Value> {
    let config = match &options.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    };
    let tables = ProbabilityTable::standard()?;
    let reference = ReferenceData::load_dir(&options.data_dir)?;
    let variants = VariantTable::standard();
    let generator = TreasureGenerator::new(&tables, &reference, &config, &variants);

    let mut ledger = RollLedger::seeded(options.seed);
    let mut party = PartyLoot::new();
    let mut bundles = Vec::new();
    for _ in 0..options.bundles {
        let bundle = generator.generate(&mut ledger, options.kind, options.band)?;
        bundles.push(bundle.clone());
        party.add_bundle(bundle)?;
    }

    let pool = party.contents();
    let mut output = json!({
        "kind": options.kind,
        "band": options.band,
        "seed": options.seed,
        "bundles": bundles,
        "total_value_gp": config.rates.copper_to_gp(pool.total_value_copper(&config.rates)?).to_string(),
        "total_weight_lb": pool.total_weight(&config).to_string(),
    });

    if let Some(members) = &options.party {
        let shares = distribute(&mut party, members, options.policy, &mut ledger, &config.rates)?;
        output["distribution"] = serde_json::to_value(&shares).map_err(|e| TreasureError::DataIntegrity(e.to_string()))?;
    }
    if options.show_rolls {
        output["rolls"] = serde_json::to_value(ledger.into_records()).map_err(|e| TreasureError::DataIntegrity(e.to_string()))?;
    }
    Ok(output)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let options = match parse_options(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    match run(&options).and_then(|value| {
        serde_json::to_string_pretty(&value).map_err(|e| TreasureError::DataIntegrity(e.to_string()))
    }) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
