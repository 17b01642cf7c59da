//! `harvest`: the CLI entry point over the HAR-to-client-code session
//! pipeline (§6.6). Follows the teacher family's `clap::Parser` +
//! single-threaded `tokio` runtime shape.

mod commands;
mod config;
mod error;
mod output;
mod setup_instructions;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::CliOverrides;
use indexmap::IndexMap;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "harvest", about = "Synthesize client code from a HAR capture and an action description")]
#[command(disable_version_flag = true)]
struct Args {
	/// Path to an optional YAML configuration file.
	#[arg(long)]
	config: Option<PathBuf>,

	/// Overrides the configured/detected LLM provider for this invocation.
	#[arg(long, global = true)]
	llm_provider: Option<String>,

	/// Overrides the API key for the selected provider for this invocation.
	#[arg(long, global = true)]
	llm_api_key: Option<String>,

	/// Overrides the model name for the selected provider for this invocation.
	#[arg(long, global = true)]
	llm_model: Option<String>,

	/// Overrides the directory generated code is written to.
	#[arg(long, global = true)]
	output_dir: Option<String>,

	/// Overrides the structured logging level (trace, debug, info, warn, error).
	#[arg(long, global = true)]
	logging_level: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Starts a session from a HAR capture and an action description.
	SessionStart {
		/// Natural-language description of the action to reproduce.
		#[arg(long)]
		prompt: String,
		/// Path to the captured HAR file.
		#[arg(long)]
		har: PathBuf,
		/// Optional path to a Netscape-format cookie file.
		#[arg(long)]
		cookies: Option<PathBuf>,
		/// Repeatable `name=value` input variable bindings.
		#[arg(long = "var", value_parser = parse_key_val)]
		vars: Vec<(String, String)>,
	},
	/// Identifies the workflow's master request via the configured LLM.
	IdentifyWorkflow { id: Uuid },
	/// Reports a session's current state and progress.
	SessionStatus { id: Uuid },
	/// Lists every session with persisted state.
	SessionList,
	/// Processes the next queued dependency node.
	ProcessNext { id: Uuid },
	/// Reports whether the session's dependency DAG is complete.
	IsComplete { id: Uuid },
	/// Lists the DAG's currently unresolved nodes.
	GetUnresolved { id: Uuid },
	/// Reports symbolic blockers preventing code generation.
	GetCompletionBlockers { id: Uuid },
	/// Emits client code for a completed session.
	GenerateCode {
		id: Uuid,
		/// ISO-8601 date stamped into the generated file's header comment.
		#[arg(long)]
		generated_date: String,
	},
	/// Deletes a session's persisted state.
	DeleteSession { id: Uuid },
	/// Lists every HAR request retained after filtering.
	ListAllRequests { id: Uuid },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
	let (name, value) = raw.split_once('=').ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
	Ok((name.to_string(), value.to_string()))
}

fn parse_log_level(raw: &str) -> harvest_util::telemetry::LogLevel {
	use harvest_util::telemetry::LogLevel;
	match raw.to_ascii_lowercase().as_str() {
		"trace" => LogLevel::Trace,
		"debug" => LogLevel::Debug,
		"warn" => LogLevel::Warn,
		"error" => LogLevel::Error,
		"fatal" => LogLevel::Fatal,
		_ => LogLevel::Info,
	}
}

fn main() {
	let args = Args::parse();

	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("tokio runtime builds");
	let exit_code = runtime.block_on(run(args));
	std::process::exit(exit_code);
}

async fn run(args: Args) -> i32 {
	let cli = CliOverrides {
		llm_provider: args.llm_provider,
		llm_api_key: args.llm_api_key,
		llm_model: args.llm_model,
		output_dir: args.output_dir,
		logging_level: args.logging_level,
	};

	let cfg = match config::initialize(args.config.as_deref(), &cli) {
		Ok(cfg) => cfg,
		Err(err) => return output::failure(err),
	};

	harvest_util::telemetry::init(parse_log_level(&cfg.logging_level), false);

	let result = dispatch(&cfg, args.command).await;
	match result {
		Ok(value) => output::success(value),
		Err(err) => output::failure(err),
	}
}

async fn dispatch(cfg: &config::Config, command: Command) -> error::Result<serde_json::Value> {
	match command {
		Command::SessionStart { prompt, har, cookies, vars } => {
			let input_variables: IndexMap<String, String> = vars.into_iter().collect();
			commands::session_start(cfg, &prompt, &har, cookies.as_deref(), input_variables)
		}
		Command::IdentifyWorkflow { id } => commands::identify_workflow(cfg, id).await,
		Command::SessionStatus { id } => commands::session_status(cfg, id),
		Command::SessionList => commands::session_list(cfg),
		Command::ProcessNext { id } => commands::process_next(cfg, id).await,
		Command::IsComplete { id } => commands::is_complete(cfg, id),
		Command::GetUnresolved { id } => commands::get_unresolved(cfg, id),
		Command::GetCompletionBlockers { id } => commands::get_completion_blockers(cfg, id),
		Command::GenerateCode { id, generated_date } => commands::generate_code(cfg, id, &generated_date),
		Command::DeleteSession { id } => commands::delete_session(cfg, id),
		Command::ListAllRequests { id } => commands::list_all_requests(cfg, id),
	}
}
