use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use std::path::Path;
use troupe_core::config::{Config, get_config_path, get_troupe_dir};
use troupe_core::memory::{MemoryBackend, MemoryConfig};
use troupe_core::providers::factory::OPENAI_KEY_VARS;

const BANNER: &str = r"
    -------------------------------------

     _                             
    | |_ _ __ ___  _   _ _ __   ___ 
    | __| '__/ _ \| | | | '_ \ / _ \
    | |_| | | (_) | |_| | |_) |  __/
     \__|_|  \___/ \__,_| .__/ \___|
                        |_|        

    -------------------------------------
";

const OPENAI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4.1", "gpt-4.1-mini"];
const OLLAMA_MODELS: &[&str] = &["llama3.2", "qwen2.5", "mistral"];

pub const SAMPLE_WORKFLOW: &str = r#"# Two agents in sequence: the drafter's answer becomes the editor's input.
# Run with: troupe run ~/.troupe/workflows/draft-and-edit.toml "Explain backpressure"
type = "sequential"

[error_handling]
strategy = "retry"
max_attempts = 2

[[agents]]
name = "drafter"
model = "gpt-4o-mini"
system_prompt = "Write a short, accurate first draft answering the user's request."

[[agents]]
name = "editor"
model = "gpt-4o-mini"
system_prompt = "Tighten the draft you are given. Keep facts, cut filler."
tools = ["calculator"]
"#;

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn ensure_file(path: &Path, content: &str) -> Result<bool> {
    if !path.exists() {
        std::fs::write(path, content)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn create_sample_workflow(troupe_dir: &Path) -> Result<std::path::PathBuf> {
    let workflows = troupe_dir.join("workflows");
    std::fs::create_dir_all(&workflows)?;
    let path = workflows.join("draft-and-edit.toml");
    ensure_file(&path, SAMPLE_WORKFLOW)?;
    Ok(path)
}

fn setup_provider() -> Result<String> {
    let providers = ["openai", "ollama"];

    let selection = Select::new()
        .with_prompt("Select your provider")
        .items(&providers)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(providers[selection].to_string())
}

fn setup_api_key() -> Result<String> {
    if OPENAI_KEY_VARS.iter().any(|v| std::env::var(v).is_ok()) {
        println!(
            "  {} Using API key from the environment",
            style("✓").green()
        );
        return Ok(String::new());
    }

    let api_key: String = Input::new()
        .with_prompt("Enter your OpenAI API key")
        .interact_text()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key.trim().to_string())
}

fn setup_model(provider: &str) -> Result<String> {
    let models = if provider == "ollama" {
        OLLAMA_MODELS
    } else {
        OPENAI_MODELS
    };

    let selection = Select::new()
        .with_prompt("Select your model")
        .items(models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(models[selection].to_string())
}

fn setup_memory(troupe_dir: &Path) -> Result<MemoryConfig> {
    let options = [
        "Keep conversations on disk",
        "Keep conversations for this session only",
        "Do not keep conversations",
    ];

    let selection = Select::new()
        .with_prompt("Conversation memory")
        .items(&options)
        .default(0)
        .interact()
        .context("Failed to select memory backend")?;

    Ok(match selection {
        0 => MemoryConfig {
            backend: MemoryBackend::File,
            path: Some(troupe_dir.join("conversations")),
        },
        1 => MemoryConfig {
            backend: MemoryBackend::InMemory,
            path: None,
        },
        _ => MemoryConfig::default(),
    })
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to troupe!").white().bold());
    println!(
        "  {}",
        style("This wizard sets up the provider your agents will talk to.").dim()
    );
    println!();

    let troupe_dir = get_troupe_dir();

    print_step(1, 4, "Provider");
    let provider = setup_provider()?;

    print_step(2, 4, "Credentials and Model");
    let api_key = if provider == "openai" {
        setup_api_key()?
    } else {
        String::new()
    };
    let model = setup_model(&provider)?;

    print_step(3, 4, "Memory");
    let memory = setup_memory(&troupe_dir)?;

    let config = Config {
        provider: Some(provider),
        api_key,
        model,
        memory,
        ..Default::default()
    };

    print_step(4, 4, "Workspace Setup");
    match std::fs::create_dir_all(&config.workspace_dir)
        .map_err(anyhow::Error::from)
        .and_then(|_| create_sample_workflow(&troupe_dir))
    {
        Ok(path) => {
            println!(
                "  {} Workspace ready at {}",
                style("✓").green(),
                style(config.workspace_dir.display()).cyan()
            );
            println!(
                "  {} Sample workflow at {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        Err(e) => eprintln!(
            "  {} Warning: Could not prepare workspace: {}",
            style("!").yellow(),
            e
        ),
    }

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(get_config_path().display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("troupe chat").cyan().bold()
    );
    println!();

    Ok(config)
}
