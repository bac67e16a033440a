use conductor_llm::McpServerConfig;

/// Hard-coded MCP server descriptors. `command` is the package to
/// invoke; `extra_args`/`extra_env` are computed per-provider from the
/// integration's metadata at assembly time.
pub(crate) fn command_for(provider: &str) -> Option<&'static str> {
    match provider {
        "gmail" => Some("@anthropic/mcp-server-gmail"),
        "google_photos" => Some("@anthropic/mcp-server-google-photos"),
        "google_drive" => Some("@anthropic/mcp-server-google-drive"),
        "slack" => Some("@anthropic/mcp-server-slack"),
        "filesystem" => Some("@anthropic/mcp-server-filesystem"),
        _ => None,
    }
}

/// Builds the env map for a provider given its decrypted tokens and raw
/// metadata, and returns any extra CLI args (filesystem's `--root`).
pub(crate) fn build_server_config(
    provider: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    metadata: &serde_json::Map<String, serde_json::Value>,
) -> Option<McpServerConfig> {
    let command = command_for(provider)?.to_string();
    let mut env = std::collections::HashMap::new();
    env.insert("OAUTH_ACCESS_TOKEN".to_string(), access_token.to_string());
    if let Some(refresh) = refresh_token {
        env.insert("OAUTH_REFRESH_TOKEN".to_string(), refresh.to_string());
    }

    let mut args = Vec::new();
    match provider {
        "gmail" => {
            if let Some(email) = metadata.get("userEmail").and_then(|v| v.as_str()) {
                env.insert("GMAIL_USER_EMAIL".to_string(), email.to_string());
            }
        }
        "slack" => {
            if let Some(team_id) = metadata.get("teamId").and_then(|v| v.as_str()) {
                env.insert("SLACK_TEAM_ID".to_string(), team_id.to_string());
            }
        }
        "filesystem" => {
            let root = metadata
                .get("rootPath")
                .and_then(|v| v.as_str())
                .unwrap_or("/tmp");
            args.push("--root".to_string());
            args.push(root.to_string());
        }
        _ => {}
    }

    Some(McpServerConfig { command, args, env })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_provider_has_no_command() {
        assert!(command_for("carrier_pigeon").is_none());
    }

    #[test]
    fn gmail_env_includes_user_email() {
        let metadata = json!({"userEmail": "me@example.com"}).as_object().unwrap().clone();
        let cfg = build_server_config("gmail", "access", Some("refresh"), &metadata).unwrap();
        assert_eq!(cfg.command, "@anthropic/mcp-server-gmail");
        assert_eq!(cfg.env.get("OAUTH_ACCESS_TOKEN").unwrap(), "access");
        assert_eq!(cfg.env.get("OAUTH_REFRESH_TOKEN").unwrap(), "refresh");
        assert_eq!(cfg.env.get("GMAIL_USER_EMAIL").unwrap(), "me@example.com");
    }

    #[test]
    fn filesystem_defaults_root_to_tmp() {
        let metadata = serde_json::Map::new();
        let cfg = build_server_config("filesystem", "access", None, &metadata).unwrap();
        assert_eq!(cfg.args, vec!["--root".to_string(), "/tmp".to_string()]);
    }
}
