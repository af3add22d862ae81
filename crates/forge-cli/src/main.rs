use std::collections::HashMap;
use std::error::Error;
use std::fs;

use forge_ai::backend::DEFAULT_OPENROUTER_BASE_URL;
use forge_ai::normalize::normalize;
use forge_ai::{DesignRequest, OpenRouterBackend, Orchestrator, PipelineConfig, analyze};
use forge_geom::{Solid, to_ascii_stl, to_binary_stl};
use forge_script::Evaluator;
use secrecy::SecretString;

type DynError = Box<dyn Error>;
type Flags = HashMap<String, String>;

#[tokio::main]
async fn main() -> Result<(), DynError> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    match args[0].as_str() {
        "generate" => run_generate(&args[1..]).await,
        "eval" => run_eval(&args[1..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("usage:");
    println!("  forge-cli generate --prompt <text> [--base-code-file <path>]");
    println!("      [--out <path>] [--format binary-stl|ascii-stl]");
    println!("      [--retry-budget <n>] [--review true]");
    println!("  forge-cli eval --file <script> [--out <path>] [--format binary-stl|ascii-stl]");
    println!();
    println!("generate reads OPENROUTER_API_KEY (and optionally OPENROUTER_BASE_URL)");
    println!("from the environment or a .env file.");
}

async fn run_generate(args: &[String]) -> Result<(), DynError> {
    dotenvy::dotenv().ok();
    let flags = parse_flags(args)?;
    let prompt = required_str(&flags, "--prompt")?.to_string();
    let base_code = match flags.get("--base-code-file") {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };
    let out = optional_str(&flags, "--out", "part.stl");
    let format = optional_str(&flags, "--format", "binary-stl");

    let api_key = std::env::var("OPENROUTER_API_KEY")
        .map_err(|_| "OPENROUTER_API_KEY is not set")?;
    let base_url = std::env::var("OPENROUTER_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_OPENROUTER_BASE_URL.to_string());

    let mut config = PipelineConfig::default();
    config.retry_budget = optional_usize(&flags, "--retry-budget", config.retry_budget)?;
    config.review = flags
        .get("--review")
        .is_some_and(|value| value == "true" || value == "1");

    let backend = OpenRouterBackend::new(base_url, SecretString::new(api_key));
    let orchestrator = Orchestrator::new(backend, config);

    let outcome = orchestrator
        .run(&DesignRequest { prompt, base_code })
        .await?;

    write_artifact(&outcome.solid, out, format)?;

    println!("attempts {}", outcome.attempts);
    println!("volume {:.2}", outcome.report.volume);
    if let Some(warning) = &outcome.report.warning {
        println!("warning {warning}");
    }
    for failure in &outcome.failures {
        println!("error attempt {} {}", failure.attempt, failure.message);
    }
    println!("wrote {out}");
    Ok(())
}

fn run_eval(args: &[String]) -> Result<(), DynError> {
    let flags = parse_flags(args)?;
    let source = fs::read_to_string(required_str(&flags, "--file")?)?;
    let out = optional_str(&flags, "--out", "part.stl");
    let format = optional_str(&flags, "--format", "binary-stl");

    let value = Evaluator::default().run(&source)?;
    let solid = normalize(value)?;
    let report = analyze(&solid);

    write_artifact(&solid, out, format)?;

    println!("volume {:.2}", report.volume);
    if let Some(warning) = &report.warning {
        println!("warning {warning}");
    }
    println!("wrote {out}");
    Ok(())
}

fn write_artifact(solid: &Solid, out: &str, format: &str) -> Result<(), DynError> {
    match format {
        "binary-stl" => fs::write(out, to_binary_stl(solid.mesh(), "part"))?,
        "ascii-stl" => fs::write(out, to_ascii_stl(solid.mesh(), "part"))?,
        _ => return Err(format!("unknown format: {format}").into()),
    }
    Ok(())
}

fn parse_flags(args: &[String]) -> Result<Flags, DynError> {
    if args.len() % 2 != 0 {
        return Err("expected flag-value pairs".into());
    }

    let mut flags = HashMap::new();
    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        if !flag.starts_with("--") {
            return Err(format!("expected flag at position {}", index + 1).into());
        }
        let value = args[index + 1].clone();
        if flags.insert(flag.to_string(), value).is_some() {
            return Err(format!("duplicate flag: {flag}").into());
        }
        index += 2;
    }
    Ok(flags)
}

fn required_str<'a>(flags: &'a Flags, key: &str) -> Result<&'a str, DynError> {
    flags
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| format!("missing required {key}").into())
}

fn optional_str<'a>(flags: &'a Flags, key: &str, default: &'a str) -> &'a str {
    flags.get(key).map(String::as_str).unwrap_or(default)
}

fn optional_usize(flags: &Flags, key: &str, default: usize) -> Result<usize, DynError> {
    match flags.get(key) {
        Some(value) => value
            .parse::<usize>()
            .map_err(|err| format!("invalid usize for {key}: {err}").into()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_flags;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn flags_parse_as_pairs() {
        let flags = parse_flags(&args(&["--prompt", "a cube", "--out", "cube.stl"]))
            .expect("flags should parse");
        assert_eq!(flags.get("--prompt").map(String::as_str), Some("a cube"));
        assert_eq!(flags.get("--out").map(String::as_str), Some("cube.stl"));
    }

    #[test]
    fn odd_argument_count_is_rejected() {
        assert!(parse_flags(&args(&["--prompt"])).is_err());
    }

    #[test]
    fn duplicate_flags_are_rejected() {
        assert!(parse_flags(&args(&["--out", "a.stl", "--out", "b.stl"])).is_err());
    }
}
