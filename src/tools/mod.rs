//! Local tools the model may call
//!
//! The catalog is fixed at startup and read-only: `list_files` and
//! `read_file`, both scoped to the registry's root directory. Nothing here
//! writes, executes, or touches the network.

pub mod fs;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Primitive type of a tool parameter, as advertised to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
}

impl ParamType {
    /// Schema type name in the remote service's OpenAPI subset
    pub fn schema_name(self) -> &'static str {
        match self {
            ParamType::String => "STRING",
        }
    }
}

/// A single named parameter of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
}

/// Static metadata for one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Render the parameters as the JSON schema object sent to the model.
    ///
    /// Tools without parameters still get an empty `properties` object,
    /// which the remote API requires for function declarations.
    pub fn parameters_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .params
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    serde_json::json!({ "type": p.kind.schema_name() }),
                )
            })
            .collect();

        let mut schema = serde_json::json!({
            "type": "OBJECT",
            "properties": properties,
        });

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        if !required.is_empty() {
            schema["required"] = serde_json::json!(required);
        }

        schema
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationRequest {
    pub name: String,
    pub args: HashMap<String, Value>,
    /// Opaque token the service attached to the call; echoed back unchanged
    pub signature: Option<String>,
}

impl ToolInvocationRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: HashMap::new(),
            signature: None,
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Arguments as a JSON object, for echoing back to the model and the operator
    pub fn args_json(&self) -> Value {
        Value::Object(
            self.args
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Successful tool payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    /// Directory entry names
    Files(Vec<String>),
    /// File contents, unmodified
    Text(String),
}

impl ToolOutput {
    /// The `{"result": ...}` object returned to the model
    pub fn to_response(&self) -> Value {
        match self {
            ToolOutput::Files(names) => serde_json::json!({ "result": names }),
            ToolOutput::Text(text) => serde_json::json!({ "result": text }),
        }
    }
}

/// Error type for tool execution
#[derive(Debug)]
pub enum ToolError {
    /// The requested path does not exist
    FileNotFound(PathBuf),
    /// Any other filesystem failure (permissions, is-a-directory, invalid UTF-8)
    Io { path: PathBuf, source: std::io::Error },
    /// The model asked for a tool that is not in the catalog
    UnknownTool(String),
    /// Arguments did not match the tool's parameter schema
    InvalidArguments { tool: String, reason: String },
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            ToolError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            ToolError::UnknownTool(name) => write!(f, "Unknown tool: {}", name),
            ToolError::InvalidArguments { tool, reason } => {
                write!(f, "Invalid arguments for {}: {}", tool, reason)
            }
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ToolError {
    pub(crate) fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ToolError::FileNotFound(path.to_path_buf())
        } else {
            ToolError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

pub const LIST_FILES: &str = "list_files";
pub const READ_FILE: &str = "read_file";

/// Catalog and dispatcher for the local tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    root: PathBuf,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Create a registry whose tools operate relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            specs: vec![
                ToolSpec {
                    name: LIST_FILES,
                    description: "List files in current directory",
                    params: vec![],
                },
                ToolSpec {
                    name: READ_FILE,
                    description: "Read file content",
                    params: vec![ParamSpec {
                        name: "filename",
                        kind: ParamType::String,
                        required: true,
                    }],
                },
            ],
        }
    }

    /// Directory the tools are anchored at
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tool specs advertised to the model
    pub fn list_tools(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Execute a tool call against the filesystem
    pub async fn execute(&self, request: &ToolInvocationRequest) -> Result<ToolOutput, ToolError> {
        match request.name.as_str() {
            LIST_FILES => fs::list_files(&self.root).await.map(ToolOutput::Files),
            READ_FILE => {
                let filename = request
                    .args
                    .get("filename")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::InvalidArguments {
                        tool: READ_FILE.to_string(),
                        reason: "missing string parameter 'filename'".to_string(),
                    })?;
                fs::read_file(&self.root, filename).await.map(ToolOutput::Text)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(".")
    }
}
