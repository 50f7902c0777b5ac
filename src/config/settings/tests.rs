use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embeddings.protocol, "http");
    assert_eq!(config.embeddings.host, "localhost");
    assert_eq!(config.embeddings.port, 11434);
    assert_eq!(config.model.model_type, "LlamaCpp");
    assert!(!config.model.use_mlock);
    assert_eq!(config.store.persist_directory, PathBuf::from("db"));
    assert_eq!(config.store.collection, "test");
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 50);
    assert!(config.session.announce_empty_queries);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.embeddings.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embeddings.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embeddings.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_overlap = 500;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::OverlapTooLarge(500, 500))
    ));

    let mut invalid_config = config.clone();
    invalid_config.model.n_ctx = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.model.temperature = -0.1;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.fetch_k = 2;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::FetchCountTooSmall(2, 4))
    ));

    let mut invalid_config = config;
    invalid_config.store.collection = "  ".to_string();
    assert!(invalid_config.validate().is_err());
}

#[test]
fn unknown_model_type_is_not_a_config_error() {
    let mut config = Config::default();
    config.model.model_type = "Falcon".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn embeddings_url_generation() {
    let config = Config::default();
    let url = config
        .embeddings_url()
        .expect("should generate embeddings_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let partial = r#"
        [model]
        model_type = "GPT4All"
        n_ctx = 2048

        [chunking]
        chunk_size = 300
    "#;

    let config: Config = toml::from_str(partial).expect("should parse toml correctly");
    assert_eq!(config.model.model_type, "GPT4All");
    assert_eq!(config.model.n_ctx, 2048);
    assert_eq!(config.model.temperature, ModelConfig::default().temperature);
    assert_eq!(config.chunking.chunk_size, 300);
    assert_eq!(config.chunking.chunk_overlap, 50);
    assert_eq!(config.store, StoreConfig::default());
}

#[test]
fn load_resolves_paths_against_config_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &config_path,
        "[store]\npersist_directory = \"vectors\"\ncollection = \"notes\"\n",
    )
    .expect("should write config file");

    let config = Config::load(Some(&config_path)).expect("should load config");
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.vector_database_path(), temp_dir.path().join("vectors"));
    assert_eq!(
        config.source_directory_path(),
        temp_dir.path().join("source_documents")
    );
    assert_eq!(config.store.collection, "notes");
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
    fs::write(&config_path, "[chunking]\nchunk_size = 50\nchunk_overlap = 60\n")
        .expect("should write config file");

    assert!(Config::load(Some(&config_path)).is_err());
}

#[test]
fn load_without_file_gives_defaults() {
    let config = Config::load(None).expect("defaults should load");
    assert_eq!(config, Config::default());
}

#[test]
fn env_overrides() {
    let config = Config::default()
        .with_env(env_from(&[
            ("LLAMA_EMBEDDINGS_MODEL", "all-minilm"),
            ("PERSIST_DIRECTORY", "store"),
            ("MODEL_TYPE", "GPT4All"),
            ("MODEL_PATH", "ggml-gpt4all-j-v1.3-groovy.bin"),
            ("MODEL_N_CTX", "2048"),
            ("MODEL_TEMP", "0.2"),
            ("MODEL_STOP", "###, Human:,"),
            ("USE_MLOCK", "true"),
            ("EMBEDDINGS_URL", "https://embed.internal:8443"),
        ]))
        .expect("overrides should apply");

    assert_eq!(config.embeddings.model, "all-minilm");
    assert_eq!(config.embeddings.protocol, "https");
    assert_eq!(config.embeddings.host, "embed.internal");
    assert_eq!(config.embeddings.port, 8443);
    assert_eq!(config.store.persist_directory, PathBuf::from("store"));
    assert_eq!(config.model.model_type, "GPT4All");
    assert_eq!(config.model.model_path, "ggml-gpt4all-j-v1.3-groovy.bin");
    assert_eq!(config.model.n_ctx, 2048);
    assert!((config.model.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.model.stop, vec!["###", "Human:"]);
    assert!(config.model.use_mlock);
}

#[test]
fn non_numeric_env_values_are_fatal() {
    let result = Config::default().with_env(env_from(&[("MODEL_N_CTX", "lots")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvValue {
            key: "MODEL_N_CTX",
            ..
        })
    ));

    let result = Config::default().with_env(env_from(&[("MODEL_TEMP", "warm")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvValue {
            key: "MODEL_TEMP",
            ..
        })
    ));

    let result = Config::default().with_env(env_from(&[("USE_MLOCK", "maybe")]));
    assert!(result.is_err());
}

#[test]
fn stop_list_parsing() {
    assert_eq!(parse_stop_list("a,b , c"), vec!["a", "b", "c"]);
    assert!(parse_stop_list("").is_empty());
    assert!(parse_stop_list(" , ,").is_empty());
}

#[test]
fn setter_validation() {
    let mut config = EmbeddingConfig::default();

    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_url("http://10.0.0.2:9999").is_ok());
    assert_eq!(config.port, 9999);

    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_url("ftp://example.com").is_err());
    assert!(config.set_url("not a url").is_err());
}
