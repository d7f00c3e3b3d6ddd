mod llm;
mod session;
mod settings;
mod story;

use std::path::PathBuf;

use anyhow::{Context, Result};
use llm::openai::{OpenAiConfig, OpenAiEngine};
use session::Session;
use settings::Settings;
use story::persist::FileSnapshotStore;
use story::store::DecisionTreeStore;

const DEFAULT_DATA_DIR: &str = ".fataliste";

fn main() -> Result<()> {
    // Initialize logging. Control verbosity with RUST_LOG env var:
    //   RUST_LOG=info   cargo run            # turns + tree mutations
    //   RUST_LOG=debug  cargo run            # + configuration turn + sent messages
    //   RUST_LOG=trace  cargo run            # + raw model output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!(
            "Usage: fataliste [data-dir] [model.gguf [gpu_layers] [context_size] [max_tokens]]\n\
             \n\
             data-dir holds settings.json and the story tree (default: {DEFAULT_DATA_DIR}).\n\
             Without a model path the story is narrated through the OpenAI API;\n\
             set OPENAI_API_KEY or /set openai_api_key <key>.\n\
             \n\
             Example:\n  fataliste ~/.fataliste ./models/qwen2.5-7b-instruct-q4_k_m.gguf 99 8092 1000\n\
             \n\
             Logging: set RUST_LOG=debug or RUST_LOG=trace for verbose output"
        );
        return Ok(());
    }

    let data_dir = PathBuf::from(args.get(1).map(String::as_str).unwrap_or(DEFAULT_DATA_DIR));
    let mut settings =
        Settings::load(data_dir.join("settings.json")).context("failed to load settings")?;
    let credential = settings
        .credential()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()));

    let snapshots = FileSnapshotStore::new(&data_dir);
    println!("Story data: {}", snapshots.path().display());
    let trees = DecisionTreeStore::open(snapshots);

    match args.get(2) {
        Some(model_path) => run_local(model_path, &args, trees, &mut settings, credential),
        None => {
            let engine = OpenAiEngine::new(openai_config())?;
            let mut session = Session::start(engine, trees, &settings.narrative(), credential);
            story::run(&mut session, &mut settings)
        }
    }
}

fn openai_config() -> OpenAiConfig {
    let mut config = OpenAiConfig::default();
    if let Ok(base_url) = std::env::var("FATALISTE_API_BASE") {
        config.base_url = base_url;
    }
    if let Ok(model) = std::env::var("FATALISTE_MODEL") {
        config.model = model;
    }
    config
}

#[cfg(feature = "local")]
fn run_local(
    model_path: &str,
    args: &[String],
    trees: DecisionTreeStore<FileSnapshotStore>,
    settings: &mut Settings,
    credential: Option<String>,
) -> Result<()> {
    use llm::local::{LocalEngine, ModelConfig};

    let defaults = ModelConfig::default();
    let config = ModelConfig {
        n_gpu_layers: args.get(3).and_then(|s| s.parse().ok()).unwrap_or(defaults.n_gpu_layers),
        n_ctx: args.get(4).and_then(|s| s.parse().ok()).unwrap_or(defaults.n_ctx),
        max_tokens: args.get(5).and_then(|s| s.parse().ok()).unwrap_or(defaults.max_tokens),
    };

    println!("Loading model: {model_path}");
    println!("  GPU layers : {}", config.n_gpu_layers);
    println!("  Context    : {}", config.n_ctx);
    println!("  Max tokens : {}", config.max_tokens);

    let engine = LocalEngine::load_model(model_path, config).context("failed to load model")?;
    let mut session = Session::start(engine, trees, &settings.narrative(), credential);
    story::run(&mut session, settings)
}

#[cfg(not(feature = "local"))]
fn run_local(
    model_path: &str,
    _args: &[String],
    _trees: DecisionTreeStore<FileSnapshotStore>,
    _settings: &mut Settings,
    _credential: Option<String>,
) -> Result<()> {
    anyhow::bail!(
        "cannot run {}: this build has no local model support (rebuild with --features local)",
        std::path::Path::new(model_path).display()
    )
}
