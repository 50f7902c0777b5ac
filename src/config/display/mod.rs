
use console::style;
use itertools::Itertools;
use std::fmt::Write as _;

use super::Config;
use crate::llm::ModelType;

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config) {
    eprint!("{}", render_config(config));
}

/// Render the effective configuration as styled, human-readable text
#[inline]
pub fn render_config(config: &Config) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", style("📋 Current Configuration").bold().cyan());
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("Embeddings:").bold().yellow());
    match config.embeddings_url() {
        Ok(url) => {
            let _ = writeln!(out, "  URL: {}", style(url).cyan());
        }
        Err(e) => {
            let _ = writeln!(out, "  URL: {} ({})", style("Invalid").red(), e);
        }
    }
    let _ = writeln!(out, "  Model: {}", style(&config.embeddings.model).cyan());
    let _ = writeln!(
        out,
        "  Batch Size: {}",
        style(config.embeddings.batch_size).cyan()
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("Language Model:").bold().yellow());
    let model_type = match config.model.model_type.parse::<ModelType>() {
        Ok(model_type) => style(model_type.to_string()).cyan(),
        Err(_) => style(format!("{} (unsupported)", config.model.model_type)).red(),
    };
    let _ = writeln!(out, "  Type: {}", model_type);
    let _ = writeln!(out, "  Model: {}", style(&config.model.model_path).cyan());
    let _ = writeln!(out, "  Context Size: {}", style(config.model.n_ctx).cyan());
    let _ = writeln!(
        out,
        "  Temperature: {}",
        style(config.model.temperature).cyan()
    );
    let stop = if config.model.stop.is_empty() {
        "(none)".to_string()
    } else {
        config.model.stop.iter().map(|s| format!("{:?}", s)).join(", ")
    };
    let _ = writeln!(out, "  Stop Sequences: {}", style(stop).cyan());
    let _ = writeln!(out, "  Memory Lock: {}", style(config.model.use_mlock).cyan());
    let _ = writeln!(out, "  LlamaCpp URL: {}", style(&config.model.llama_cpp_url).cyan());
    let _ = writeln!(out, "  GPT4All URL: {}", style(&config.model.gpt4all_url).cyan());
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("Storage:").bold().yellow());
    let _ = writeln!(
        out,
        "  Store: {}",
        style(config.vector_database_path().display()).cyan()
    );
    let _ = writeln!(out, "  Collection: {}", style(&config.store.collection).cyan());
    let _ = writeln!(
        out,
        "  Documents: {}",
        style(config.source_directory_path().display()).cyan()
    );
    let _ = writeln!(
        out,
        "  Chunking: {} chars, {} overlap",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    let _ = writeln!(
        out,
        "  Retrieval: {} (k = {}, fetch_k = {}, lambda = {})",
        style(config.retrieval.search_type).cyan(),
        config.retrieval.k,
        config.retrieval.fetch_k,
        config.retrieval.lambda_mult
    );

    let _ = writeln!(out);
    let config_file = config
        .config_file
        .as_ref()
        .map_or_else(|| "(none)".to_string(), |path| path.display().to_string());
    let _ = writeln!(out, "Config file: {}", style(config_file).dim());

    out
}
