use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use setapi::api::{CallContext, SetApi};
use setapi::config::{ConfigLoader, auth_token};
use setapi::domain::{ObjectRef, ProvenanceAction, SetKind};
use setapi::error::SetApiError;
use setapi::navigator::ListSetsParams;
use setapi::output::JsonOutput;
use setapi::sample_search::SearchHttpClient;
use setapi::set_interface::GetSetParams;
use setapi::workspace::WorkspaceHttpClient;

#[derive(Parser)]
#[command(name = "setapi")]
#[command(about = "Save and read KBase workspace Set objects")]
#[command(version, author)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Service config file (defaults to KB_DEPLOYMENT_CONFIG, then ./setapi.json)"
    )]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print service status")]
    Status,
    #[command(about = "Invoke a method by name with JSON params")]
    Call(CallArgs),
    #[command(about = "Fetch one set")]
    Get(GetArgs),
    #[command(about = "List top-level sets in one or more workspaces")]
    List(ListArgs),
}

#[derive(Args)]
struct CallArgs {
    #[arg(help = "Method name, e.g. save_reads_set_v1 or SetAPI.list_sets")]
    method: String,

    #[arg(long, default_value = "{}")]
    params: String,

    #[arg(long, help = "Provenance actions as a JSON list")]
    provenance: Option<String>,
}

#[derive(Args)]
struct GetArgs {
    #[arg(value_enum)]
    kind: SetKind,

    reference: ObjectRef,

    #[arg(
        long = "path",
        help = "Reference path to the set, root first; the set's own ref goes last"
    )]
    ref_path_to_set: Vec<ObjectRef>,

    #[arg(long)]
    include_item_info: bool,

    #[arg(long)]
    include_set_item_ref_paths: bool,
}

#[derive(Args)]
struct ListArgs {
    #[arg(required = true)]
    workspaces: Vec<String>,

    #[arg(long)]
    include_set_item_info: bool,

    #[arg(long)]
    include_metadata: bool,

    #[arg(long)]
    include_set_item_ref_paths: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SetApiError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SetApiError) -> u8 {
    if error.is_remote() {
        return 3;
    }
    match error {
        SetApiError::MissingConfig
        | SetApiError::ConfigRead(_)
        | SetApiError::ConfigParse(_)
        | SetApiError::MissingSearchUrl
        | SetApiError::UnknownMethod(_) => 1,
        _ => 2,
    }
}

fn flag(value: bool) -> Value {
    json!(u8::from(value))
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let token = auth_token();
    let client = WorkspaceHttpClient::new(&config.workspace_url, token.as_deref(), config.timeout)?;
    let search = config
        .search_url
        .as_deref()
        .map(|url| SearchHttpClient::new(url, token.as_deref(), config.timeout))
        .transpose()?;
    let api = SetApi::new(client)
        .with_search(search)
        .with_commit_hash(config.git_commit_hash);

    match cli.command {
        Commands::Status => JsonOutput::print_result(&api.status()).into_diagnostic(),
        Commands::Call(args) => {
            let params: Value = serde_json::from_str(&args.params).into_diagnostic()?;
            let provenance: Vec<ProvenanceAction> = match args.provenance.as_deref() {
                Some(raw) => serde_json::from_str(raw).into_diagnostic()?,
                None => Vec::new(),
            };
            let ctx = CallContext {
                provenance,
                user_id: None,
            };
            let result = api.call(&ctx, &args.method, params)?;
            JsonOutput::print_result(&result).into_diagnostic()
        }
        Commands::Get(args) => {
            let params = GetSetParams {
                reference: Some(args.reference.to_string()),
                include_item_info: Some(flag(args.include_item_info)),
                include_set_item_ref_paths: Some(flag(args.include_set_item_ref_paths)),
                ref_path_to_set: Some(
                    args.ref_path_to_set
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                ),
            };
            let set = api.get_set(args.kind, params)?;
            JsonOutput::print_result(&set).into_diagnostic()
        }
        Commands::List(args) => {
            let params = ListSetsParams {
                workspace: None,
                workspaces: Some(json!(args.workspaces)),
                include_set_item_info: Some(flag(args.include_set_item_info)),
                include_metadata: Some(flag(args.include_metadata)),
                include_set_item_ref_paths: Some(flag(args.include_set_item_ref_paths)),
            };
            let sets = api.list_sets(&params)?;
            JsonOutput::print_result(&sets).into_diagnostic()
        }
    }
}
