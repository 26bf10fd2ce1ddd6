use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("restart command is empty")]
    EmptyCommand,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("restart timed out after {0:?}")]
    Timeout(Duration),

    #[error("restart command exited with {}: {stderr}", exit_code_label(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("runtime restarts are disabled")]
    Disabled,
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".into(),
    }
}
