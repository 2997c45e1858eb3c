//! Command line and environment configuration, read once at startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use intentd_ai::{DEFAULT_API_URL, DEFAULT_MODEL, RemoteConfig, RemoteScorer, Resolver, Scorer};
use intentd_core::IntentRegistry;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "intentd", version, about = "Zero-shot intent classification service")]
pub struct Cli {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve POST /classify and GET /health over HTTP
    Serve(ServeArgs),
    /// Classify one message, or the built-in samples when none is given
    Classify(ClassifyArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "INTENT_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 5001)]
    pub port: u16,
}

impl ServeArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Message to classify
    pub message: Option<String>,

    /// Earlier conversation turn, oldest first (repeatable)
    #[arg(long = "history", value_name = "TEXT")]
    pub history: Vec<String>,

    /// Print the raw JSON result
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hosted inference endpoint
    Remote,
    /// Resident ONNX model
    Local,
}

/// Classifier backend settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    #[arg(long, env = "INTENT_BACKEND", value_enum, default_value_t = Backend::Remote, global = true)]
    pub backend: Backend,

    /// Inference endpoint base URL
    #[arg(long, env = "HF_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Zero-shot model identifier
    #[arg(long, env = "HF_INTENT_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Bearer token for the inference endpoint
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true, global = true)]
    pub api_token: Option<String>,

    /// Per-request timeout for the remote backend
    #[arg(
        long,
        env = "INTENT_TIMEOUT_SECS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub timeout_secs: u64,

    /// Directory holding model.onnx, tokenizer.json and config.json
    #[arg(
        long,
        env = "INTENT_MODEL_DIR",
        default_value = "models/DeBERTa-v3-base-mnli-fever-anli",
        global = true
    )]
    pub model_dir: PathBuf,

    /// Run the local model on CUDA
    #[arg(long, env = "USE_GPU", global = true)]
    pub use_gpu: bool,

    /// JSON label registry replacing the built-in table
    #[arg(long = "labels", env = "INTENT_LABELS_FILE", global = true)]
    pub labels: Option<PathBuf>,
}

impl BackendArgs {
    pub fn registry(&self) -> anyhow::Result<IntentRegistry> {
        let registry = match &self.labels {
            Some(path) => IntentRegistry::from_file(path)
                .with_context(|| format!("loading label registry from {}", path.display()))?,
            None => IntentRegistry::builtin(),
        };
        info!(
            version = registry.version(),
            labels = registry.len(),
            intents = registry.intents().len(),
            "label registry ready"
        );
        Ok(registry)
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            api_url: self.api_url.clone(),
            model: self.model.clone(),
            api_token: self.api_token.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn scorer(&self) -> anyhow::Result<Arc<dyn Scorer>> {
        match self.backend {
            Backend::Remote => {
                let scorer = RemoteScorer::new(self.remote_config())
                    .context("building inference HTTP client")?;
                info!(url = scorer.url(), timeout_secs = self.timeout_secs, "using remote classifier");
                Ok(Arc::new(scorer))
            }
            Backend::Local => self.local_scorer(),
        }
    }

    #[cfg(feature = "onnx")]
    fn local_scorer(&self) -> anyhow::Result<Arc<dyn Scorer>> {
        let config = intentd_ai::LocalConfig {
            model_dir: self.model_dir.clone(),
            use_gpu: self.use_gpu,
        };
        let scorer = intentd_ai::LocalScorer::load(&config)
            .with_context(|| format!("loading local model from {}", self.model_dir.display()))?;
        Ok(Arc::new(scorer))
    }

    #[cfg(not(feature = "onnx"))]
    fn local_scorer(&self) -> anyhow::Result<Arc<dyn Scorer>> {
        anyhow::bail!("local backend requested but intentd was built without the `onnx` feature")
    }

    pub fn resolver(&self) -> anyhow::Result<Resolver> {
        Ok(Resolver::new(Arc::new(self.registry()?), self.scorer()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("intentd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn classify_collects_history_in_order() {
        let cli = parse(&["classify", "and eth?", "--history", "hi", "--history", "btc price", "--json"]);
        let Command::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(args.message.as_deref(), Some("and eth?"));
        assert_eq!(args.history, vec!["hi", "btc price"]);
        assert!(args.json);
    }

    #[test]
    fn classify_without_message() {
        let cli = parse(&["classify"]);
        let Command::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert!(args.message.is_none());
        assert!(args.history.is_empty());
    }

    #[test]
    fn backend_flags_after_subcommand() {
        let cli = parse(&[
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--backend",
            "local",
            "--model-dir",
            "/srv/nli",
            "--use-gpu",
        ]);
        assert_eq!(cli.backend.backend, Backend::Local);
        assert_eq!(cli.backend.model_dir, PathBuf::from("/srv/nli"));
        assert!(cli.backend.use_gpu);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.addr(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn remote_config_from_flags() {
        let cli = parse(&[
            "--api-url",
            "http://127.0.0.1:9000/models/",
            "--model",
            "acme/nli",
            "--api-token",
            "hf_x",
            "--timeout-secs",
            "2",
            "classify",
        ]);
        let config = cli.backend.remote_config();
        assert_eq!(config.model, "acme/nli");
        assert_eq!(config.api_token.as_deref(), Some("hf_x"));
        assert_eq!(config.timeout, Duration::from_secs(2));

        let scorer = RemoteScorer::new(config).unwrap();
        assert_eq!(scorer.url(), "http://127.0.0.1:9000/models/acme/nli");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Cli::try_parse_from(["intentd", "--timeout-secs", "0", "classify"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = parse(&["--timeout-secs", "1", "classify"]);
        assert_eq!(cli.backend.remote_config().timeout, Duration::from_secs(1));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = Cli::try_parse_from(["intentd", "--backend", "cloud", "classify"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn missing_labels_file_fails_with_path() {
        let cli = parse(&["--labels", "/nonexistent/intents.json", "classify"]);
        let err = cli.backend.registry().unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/intents.json"));
    }

    #[test]
    fn labels_file_replaces_builtin() {
        let path = std::env::temp_dir().join(format!("intentd-labels-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"version": "3.1.0", "labels": [
                {"label": "buy_crypto", "intent": "buy"},
                {"label": "greeting", "intent": "greeting"}
            ]}"#,
        )
        .unwrap();

        let cli = parse(&["--labels", path.to_str().unwrap(), "classify"]);
        let registry = cli.backend.registry().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(registry.version(), "3.1.0");
        assert_eq!(registry.labels(), ["buy_crypto", "greeting"]);
        assert_eq!(registry.canonical("buy_crypto"), "buy");
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn local_backend_needs_onnx_feature() {
        let cli = parse(&["--backend", "local", "classify"]);
        let err = cli.backend.scorer().err().unwrap();
        assert!(err.to_string().contains("onnx"));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn local_backend_reports_missing_model() {
        let cli = parse(&["--backend", "local", "--model-dir", "/nonexistent/model", "classify"]);
        let err = cli.backend.scorer().err().unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/model"));
    }
}
