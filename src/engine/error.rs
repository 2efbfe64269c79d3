use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParsagonError>;

#[derive(Debug, Error)]
pub enum ParsagonError {
    /// Backend answered with a non-2xx status
    #[error("{status} - {message}")]
    Api { status: u16, message: String },

    /// Pipeline lookup by name returned 404
    #[error("A program with name {0} does not exist.")]
    ProgramNotFound(String),

    /// Remote identifier returned no element for the description
    #[error("Could not find an element matching \"{description}\". Perhaps try rephrasing your prompt.")]
    ElementNotFound { description: String },

    /// Inferred scrape found neither data nor nodes
    #[error(
        "Parsagon could not find any data on the page that would fit the format {schema}. Perhaps try rephrasing your prompt."
    )]
    NoDataFound { schema: Value },

    /// Inferred scrape found data but no nodes to build a program from
    #[error(
        "Parsagon found the following data on the page for the format {schema}:\n\n{data}\n\nHowever, it could not find a plausible program to scrape this data. If the data above is incorrect, perhaps try rephrasing your prompt."
    )]
    ImplausibleProgram { schema: Value, data: Value },

    /// Pipeline creation rejected because the name is taken
    #[error("A program with name {0} already exists.")]
    PipelineNameTaken(String),

    /// `assert` step evaluated to a falsy value
    #[error("{0}")]
    AssertionFailed(String),

    /// Remote run ended in ERROR or CANCELED
    #[error("{0}")]
    RunFailed(String),

    /// Sketch could not be evaluated (unknown variable, bad argument type, ...)
    #[error("Invalid program: {0}")]
    InvalidProgram(String),

    /// Operator-supplied arguments are unusable
    #[error("{0}")]
    InvalidArguments(String),

    /// Missing API key, unreadable settings
    #[error("{0}")]
    Config(String),

    /// Driver subprocess failed to spawn
    #[error("Failed to spawn {script} (is Node.js installed?): {source}")]
    SubprocessSpawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    /// Driver reported a failed command
    #[error("Browser command '{command}' failed: {error}")]
    SessionProtocol { command: String, error: String },

    /// Pipe to the driver broke
    #[error("Browser session I/O: {0}")]
    SessionIO(String),

    /// Visible snapshot requested before the page was stamped
    #[error("Page has not been stamped with node ids")]
    NotStamped,

    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialize error ({context}): {source}")]
    JsonSerialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Operator input channel closed
    #[error("Input closed")]
    InputClosed,
}

impl ParsagonError {
    /// Domain errors are printed as plain messages at the top level.
    /// Everything else is treated as a crash.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            ParsagonError::SubprocessSpawn { .. }
                | ParsagonError::SessionIO(_)
                | ParsagonError::NotStamped
                | ParsagonError::JsonSerialize { .. }
                | ParsagonError::Io(_)
        )
    }

    pub fn to_user_string(&self, verbose: bool) -> String {
        if verbose {
            let mut text = self.to_string();
            let mut source = std::error::Error::source(self);
            while let Some(cause) = source {
                text.push_str(&format!("\n  caused by: {}", cause));
                source = cause.source();
            }
            text
        } else {
            self.to_string()
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ParsagonError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
