//! Agent CLI argument construction.
//!
//! Builds the ordered argument vector for one agent invocation from the
//! process-wide [`Config`], its defaults, and the per-request overrides.
//! The agent CLI treats `--mcp-config` as variadic, so a `--` terminator is
//! inserted immediately before the prompt to guarantee the prompt is never
//! consumed as another config path.

use crate::config::Config;
use crate::error::TaskError;
use crate::supervisor::SubmitRequest;
use serde_json::Value;
use std::path::PathBuf;

/// A fully prepared invocation: resolved config path plus argv tail.
#[derive(Debug, Clone)]
pub struct BuiltCommand {
    /// The agent configuration file the invocation will use. Existence on
    /// disk is checked by the supervisor before spawning.
    pub config_path: PathBuf,
    pub args: Vec<String>,
}

impl BuiltCommand {
    /// Human-readable command line for logs and the task record.
    pub fn display(&self, agent_command: &str) -> String {
        let mut line = String::from(agent_command);
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Build the argument vector for a submission.
///
/// Fails with [`TaskError::ConfigurationMissing`] when neither the request
/// nor the process-wide defaults provide a config path. Output-format and
/// max-turns defaults are only appended when the caller has not supplied
/// them in `extra_args` (override always wins, kebab or camel spelling).
pub fn build(config: &Config, request: &SubmitRequest) -> Result<BuiltCommand, TaskError> {
    let config_path = request
        .config_path
        .clone()
        .or_else(|| config.agent_config_path.clone())
        .ok_or(TaskError::ConfigurationMissing)?;

    let mut args = vec!["--print".to_string()];

    if config.skip_permissions {
        args.push("--dangerously-skip-permissions".to_string());
    }

    if let Some(level) = &config.debug {
        args.push("--debug".to_string());
        if level != "1" && level != "true" {
            args.push(level.clone());
        }
    }

    if !has_override(request, "output-format", "outputFormat") && !config.output_format.is_empty() {
        args.push("--output-format".to_string());
        args.push(config.output_format.clone());
    }

    args.push("--mcp-config".to_string());
    args.push(config_path.display().to_string());

    if !has_override(request, "max-turns", "maxTurns")
        && let Some(max_turns) = config.max_turns
    {
        args.push("--max-turns".to_string());
        args.push(max_turns.to_string());
    }

    if let Some(extra) = &request.extra_args {
        for (key, value) in extra {
            args.push(format!("--{key}"));
            if let Some(rendered) = render_value(value) {
                args.push(rendered);
            }
        }
    }

    args.push("--".to_string());
    args.push(request.prompt.clone());

    Ok(BuiltCommand { config_path, args })
}

fn has_override(request: &SubmitRequest, kebab: &str, camel: &str) -> bool {
    request
        .extra_args
        .as_ref()
        .is_some_and(|extra| extra.contains_key(kebab) || extra.contains_key(camel))
}

/// Render an extra-arg value as a CLI argument. Nulls and empty strings emit
/// the flag alone.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(prompt: &str) -> SubmitRequest {
        SubmitRequest {
            prompt: prompt.to_string(),
            ..SubmitRequest::default()
        }
    }

    fn config_with_path() -> Config {
        Config {
            agent_config_path: Some(PathBuf::from("/etc/agent/mcp.json")),
            ..Config::default()
        }
    }

    #[test]
    fn missing_config_path_fails_before_spawn() {
        let err = build(&Config::default(), &request("hi")).unwrap_err();
        assert!(matches!(err, TaskError::ConfigurationMissing));
    }

    #[test]
    fn request_config_path_wins_over_default() {
        let mut req = request("hi");
        req.config_path = Some(PathBuf::from("/tmp/override.json"));
        let built = build(&config_with_path(), &req).unwrap();
        assert_eq!(built.config_path, PathBuf::from("/tmp/override.json"));
        let mcp_pos = built.args.iter().position(|a| a == "--mcp-config").unwrap();
        assert_eq!(built.args[mcp_pos + 1], "/tmp/override.json");
    }

    #[test]
    fn terminator_immediately_precedes_prompt() {
        let built = build(&config_with_path(), &request("deploy the thing")).unwrap();
        let len = built.args.len();
        assert_eq!(built.args[len - 2], "--");
        assert_eq!(built.args[len - 1], "deploy the thing");
    }

    #[test]
    fn output_format_default_is_appended_once() {
        let built = build(&config_with_path(), &request("hi")).unwrap();
        let pos = built
            .args
            .iter()
            .position(|a| a == "--output-format")
            .unwrap();
        assert_eq!(built.args[pos + 1], "json");
    }

    #[test]
    fn caller_output_format_override_suppresses_default() {
        let mut req = request("hi");
        req.extra_args = json!({"output-format": "stream-json"})
            .as_object()
            .cloned();
        let built = build(&config_with_path(), &req).unwrap();
        let occurrences = built
            .args
            .iter()
            .filter(|a| *a == "--output-format")
            .count();
        assert_eq!(occurrences, 1);
        let pos = built
            .args
            .iter()
            .position(|a| a == "--output-format")
            .unwrap();
        assert_eq!(built.args[pos + 1], "stream-json");
    }

    #[test]
    fn camel_case_override_also_suppresses_max_turns_default() {
        let config = Config {
            max_turns: Some(5),
            ..config_with_path()
        };
        let mut req = request("hi");
        req.extra_args = json!({"maxTurns": 12}).as_object().cloned();
        let built = build(&config, &req).unwrap();
        assert!(!built.args.iter().any(|a| a == "--max-turns"));
        assert!(built.args.iter().any(|a| a == "--maxTurns"));
    }

    #[test]
    fn max_turns_default_is_appended() {
        let config = Config {
            max_turns: Some(3),
            ..config_with_path()
        };
        let built = build(&config, &request("hi")).unwrap();
        let pos = built.args.iter().position(|a| a == "--max-turns").unwrap();
        assert_eq!(built.args[pos + 1], "3");
    }

    #[test]
    fn empty_and_null_extra_values_emit_flag_alone() {
        let mut req = request("hi");
        req.extra_args = json!({"verbose": "", "trace": null, "model": "opus"})
            .as_object()
            .cloned();
        let built = build(&config_with_path(), &req).unwrap();
        let verbose_pos = built.args.iter().position(|a| a == "--verbose").unwrap();
        // The next token is another flag or the model value, never an empty string.
        assert_ne!(built.args[verbose_pos + 1], "");
        let model_pos = built.args.iter().position(|a| a == "--model").unwrap();
        assert_eq!(built.args[model_pos + 1], "opus");
    }

    #[test]
    fn debug_level_one_emits_bare_flag() {
        let config = Config {
            debug: Some("1".to_string()),
            ..config_with_path()
        };
        let built = build(&config, &request("hi")).unwrap();
        let pos = built.args.iter().position(|a| a == "--debug").unwrap();
        assert_ne!(built.args[pos + 1], "1");

        let config = Config {
            debug: Some("mcp".to_string()),
            ..config_with_path()
        };
        let built = build(&config, &request("hi")).unwrap();
        let pos = built.args.iter().position(|a| a == "--debug").unwrap();
        assert_eq!(built.args[pos + 1], "mcp");
    }

    #[test]
    fn skip_permissions_flag_is_passed_through() {
        let config = Config {
            skip_permissions: true,
            ..config_with_path()
        };
        let built = build(&config, &request("hi")).unwrap();
        assert!(
            built
                .args
                .iter()
                .any(|a| a == "--dangerously-skip-permissions")
        );
        assert_eq!(built.args[0], "--print");
    }
}
