// Prompt harness CLI
//
// Runs a single interactive command, or a JSON scenario of commands, answering
// prompts as they appear. Exits with the child's exit code (run) or 0/1
// (scenario).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kodegen_prompt_harness::{
    DriverConfig, ProcessDriver, PromptRule, RunRequest, RunResult, Scenario, ScenarioContext,
};

#[derive(Parser)]
#[command(
    name = "prompt-harness",
    version,
    about = "Drive interactive CLI programs by answering their prompts"
)]
struct Cli {
    /// Timeout in seconds for each child run
    #[arg(long, global = true, env = "PROMPT_HARNESS_TIMEOUT")]
    timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one command, answering prompts
    Run {
        /// Prompt rule as MATCH=RESPONSE; repeat MATCH to answer with several lines
        #[arg(long = "rule", value_parser = parse_rule)]
        rules: Vec<PromptRule>,

        /// Treat every MATCH as a regular expression
        #[arg(long)]
        regex: bool,

        /// Working directory for the child
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Program and arguments (after `--`)
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true,
            num_args = 1..
        )]
        argv: Vec<String>,
    },
    /// Run a JSON scenario file
    Scenario {
        /// Path to the scenario file
        file: PathBuf,

        /// Seed a context value as KEY=VALUE
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_rule(s: &str) -> std::result::Result<PromptRule, String> {
    let (pattern, response) = parse_key_val(s)?;
    Ok(PromptRule::contains(pattern, [response]))
}

fn print_result(result: &RunResult) {
    for line in &result.lines {
        println!("{line}");
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }
}

fn exit_code_of(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = DriverConfig::builder();
    if let Some(secs) = cli.timeout {
        config = config.default_timeout(Duration::from_secs(secs));
    }
    let driver = ProcessDriver::with_config(config.build());

    match cli.command {
        Commands::Run {
            rules,
            regex,
            cwd,
            argv,
        } => {
            let rules = if regex {
                rules
                    .iter()
                    .map(|rule| {
                        PromptRule::regex(rule.matcher().as_str(), rule.response().to_vec())
                    })
                    .collect::<kodegen_prompt_harness::Result<Vec<_>>>()?
            } else {
                rules
            };

            let mut request = RunRequest::new(argv, rules);
            request.cwd = cwd;

            let result = driver.run(&request, None).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            Ok(exit_code_of(result.exit_code))
        }
        Commands::Scenario { file, set } => {
            let scenario = Scenario::load(&file)
                .with_context(|| format!("failed to load scenario {}", file.display()))?;
            let ctx: ScenarioContext = set.into_iter().collect();

            let outcome = scenario.run(&driver, ctx).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                for report in &outcome.steps {
                    let mark = if report.passed() { "ok" } else { "FAILED" };
                    println!(
                        "== {} ({mark}, exit {})",
                        report.name, report.result.exit_code
                    );
                    print_result(&report.result);
                }
            }

            Ok(if outcome.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
