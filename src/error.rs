use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SetApiError {
    #[error("The \"{0}\" parameter is required")]
    MissingParameter(String),

    #[error("The \"workspace\" or \"workspace_id\" or \"workspace_name\" parameter is required")]
    MissingWorkspace,

    #[error("One of \"workspace\" or \"workspaces\" field required to list sets")]
    MissingWorkspaceList,

    #[error("No appropriate key found for workspace name or ID")]
    NoWorkspaceKey,

    #[error("An \"{0}\" list must be defined in the \"data\" parameter")]
    ListRequired(String),

    #[error("The \"ref\" parameter must be a valid workspace reference: {0}")]
    InvalidReference(String),

    #[error("The \"ref_path\" parameter must contain valid workspace references: {0}")]
    InvalidRefPath(String),

    #[error("The \"{0}\" parameter can only be set to 0 or 1")]
    InvalidFlag(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{set_type} must contain at least one {item_type} object reference")]
    NoItems {
        set_type: String,
        item_type: String,
    },

    #[error("Set items must not contain duplicate object references: {0}")]
    DuplicateReferences(String),

    #[error("All {0} objects in the set must use the same genome reference.")]
    MismatchedGenomes(String),

    #[error("This method can only take 2 or more RNASeq samples, got {0}")]
    TooFewSamples(usize),

    #[error("condition should be either a string or a list with one entry: {0}")]
    InvalidCondition(String),

    #[error("Library_type mentioned: {0}. Please add only {0} typed objects in Reads fields")]
    LibraryTypeMismatch(String),

    #[error("Invalid RNASeqSampleSet: {0}")]
    InvalidSampleSet(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("workspace request failed: {0}")]
    WorkspaceHttp(String),

    #[error("workspace returned status {status}: {message}")]
    WorkspaceStatus { status: u16, message: String },

    #[error("workspace error {name}: {message}")]
    WorkspaceRpc { name: String, message: String },

    #[error("malformed workspace response: {0}")]
    MalformedResponse(String),

    #[error("sample search failed: {0}")]
    SearchFailed(String),

    #[error("malformed sample search response: {0}")]
    MalformedSearchResponse(String),

    #[error("no sample search endpoint configured (set \"search-url\" or \"kbase-endpoint\")")]
    MissingSearchUrl,

    #[error("missing service config (pass --config, set KB_DEPLOYMENT_CONFIG, or create setapi.json)")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl SetApiError {
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SetApiError::WorkspaceHttp(_)
                | SetApiError::WorkspaceStatus { .. }
                | SetApiError::WorkspaceRpc { .. }
                | SetApiError::MalformedResponse(_)
                | SetApiError::SearchFailed(_)
                | SetApiError::MalformedSearchResponse(_)
                | SetApiError::InvalidSampleSet(_)
        )
    }
}
