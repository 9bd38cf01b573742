//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! [`ChatConfig`] the client and session are built from.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::decoder::Framing;
use crate::error::Result;
use crate::types::{KnownModel, Model};

/// Default developer message sent with every turn.
pub const DEFAULT_DEVELOPER_MESSAGE: &str =
    "You are a helpful AI assistant. Please provide accurate and helpful responses.";

/// Default chat proxy endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/chat";

/// Default model listing used to probe credentials.
pub const DEFAULT_MODELS_URL: &str = "https://api.openai.com/v1/models";

/// Environment variable the binary reads the credential from.
pub const API_KEY_ENV: &str = "STREAMCHAT_API_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Command-line arguments for the streamchat tool.
///
/// The credential is never taken from the command line.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gpt-4.1-mini)", "MODEL")]
    pub model: Option<String>,

    /// Developer message to set context for the conversation.
    #[arrrg(optional, "Developer message for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Chat proxy endpoint.
    #[arrrg(optional, "Chat endpoint (default: http://localhost:8000/api/chat)", "URL")]
    pub endpoint: Option<String>,

    /// Model listing used to check the API key.
    #[arrrg(optional, "Models URL used to validate the API key", "URL")]
    pub models_url: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Response framing.
    #[arrrg(optional, "Response framing: plain or event-stream", "FRAMING")]
    pub framing: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Log requests and stream errors to stderr.
    #[arrrg(flag, "Log requests and stream errors to stderr")]
    pub verbose: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: Model,

    /// Developer message sent with every turn.
    pub developer_message: String,

    /// URL the chat request is POSTed to.
    pub endpoint: String,

    /// URL probed to validate credentials.
    pub models_url: String,

    /// Bounds connecting, waiting for headers, and each gap between body chunks.
    pub timeout: Duration,

    /// How the endpoint frames its response body.
    pub framing: Framing,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether client activity is logged to stderr.
    pub verbose: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-4.1-mini
    /// - Endpoint: http://localhost:8000/api/chat
    /// - Timeout: 60 seconds
    /// - Framing: plain
    /// - Color: enabled
    /// - Verbose: off
    pub fn new() -> Self {
        Self {
            model: Model::Known(KnownModel::Gpt41Mini),
            developer_message: DEFAULT_DEVELOPER_MESSAGE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            models_url: DEFAULT_MODELS_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            framing: Framing::Plain,
            use_color: true,
            verbose: false,
        }
    }

    /// Resolves command-line arguments against the defaults.
    ///
    /// Fails only when the framing is not recognized.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let framing = match args.framing.as_deref() {
            Some(framing) => framing.parse::<Framing>()?,
            None => Framing::Plain,
        };
        let mut config = ChatConfig::new().with_framing(framing);
        if let Some(model) = args.model {
            config = config.with_model(model.parse::<Model>().unwrap_or(Model::Custom(model)));
        }
        if let Some(system) = args.system {
            config = config.with_developer_message(system);
        }
        if let Some(endpoint) = args.endpoint {
            config = config.with_endpoint(endpoint);
        }
        if let Some(models_url) = args.models_url {
            config = config.with_models_url(models_url);
        }
        if let Some(secs) = args.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if args.no_color {
            config = config.without_color();
        }
        if args.verbose {
            config = config.with_verbose();
        }
        Ok(config)
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the developer message.
    pub fn with_developer_message(mut self, message: impl Into<String>) -> Self {
        self.developer_message = message.into();
        self
    }

    /// Sets the chat endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the models URL used for probing.
    pub fn with_models_url(mut self, models_url: impl Into<String>) -> Self {
        self.models_url = models_url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the response framing.
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Enables logging client activity to stderr.
    pub fn with_verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}
