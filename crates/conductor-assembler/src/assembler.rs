use std::collections::HashMap;

use conductor_core::{ids::UserRole, Integration, Skill};
use conductor_llm::{InvocationPolicy, McpServerConfig, QueryPlan, SubAgentConfig};
use indexmap::IndexSet;

use crate::decrypt::Decryptor;
use crate::mcp;

/// Default allowed-tool set when the caller doesn't specify one.
pub const DEFAULT_ALLOWED_TOOLS: [&str; 6] = ["Read", "Write", "Edit", "Bash", "Glob", "Grep"];

/// The output of credential/tool assembly, short of the turn-specific
/// prompt text and session id — those belong to the chat/worker
/// processor that invokes the LLM, so they're added via
/// [`AssembledPlan::into_query_plan`].
#[derive(Debug, Clone, Default)]
pub struct AssembledPlan {
    pub system_prompt: Option<String>,
    pub allowed_tools: IndexSet<String>,
    pub sub_agents: HashMap<String, SubAgentConfig>,
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

impl AssembledPlan {
    pub fn into_query_plan(
        self,
        prompt: impl Into<String>,
        session_id: Option<String>,
        policy: InvocationPolicy,
    ) -> QueryPlan {
        let mut plan = QueryPlan::new(prompt, policy);
        plan.system_prompt = self.system_prompt;
        plan.session_id = session_id;
        plan.allowed_tools = self.allowed_tools;
        plan.sub_agents = self.sub_agents;
        plan.mcp_servers = self.mcp_servers;
        plan
    }
}

/// Assembles tools, MCP servers, sub-agents, and system prompt from a
/// user's integrations and requested skills.
///
/// `caller_allowed_tools` is the invoking component's explicit tool set
/// (`None` falls back to [`DEFAULT_ALLOWED_TOOLS`]); `skill_registry` is
/// the full set of known skills, searched by name for each entry in
/// `requested_skill_names` — unknown names are silently skipped.
pub fn assemble(
    caller_system_prompt: Option<&str>,
    caller_allowed_tools: Option<&IndexSet<String>>,
    requested_skill_names: &[String],
    skill_registry: &[Skill],
    integrations: &[Integration],
    decryptor: &dyn Decryptor,
    user_role: UserRole,
) -> AssembledPlan {
    let user_mcp = build_user_integration_mcp_map(integrations, decryptor);

    let resolved_skills: Vec<Skill> = requested_skill_names
        .iter()
        .filter_map(|name| {
            let found = skill_registry.iter().find(|s| &s.name == name);
            if found.is_none() {
                tracing::warn!(skill = %name, "ignoring unknown skill");
            }
            found.cloned()
        })
        .collect();
    let merged = conductor_core::merge_skills(&resolved_skills);

    let mut allowed_tools: IndexSet<String> = match caller_allowed_tools {
        Some(set) => set.clone(),
        None => DEFAULT_ALLOWED_TOOLS.iter().map(|s| s.to_string()).collect(),
    };
    for tool in &merged.tools {
        allowed_tools.insert(tool.clone());
    }

    if user_role.is_child() {
        allowed_tools.shift_remove("Bash");
        allowed_tools.shift_remove("Edit");
    }

    // Skill MCP servers override user-integration ones by name.
    let mut mcp_servers = user_mcp;
    for (name, spec) in &merged.mcp_servers {
        mcp_servers.insert(
            name.clone(),
            McpServerConfig {
                command: spec.command.clone(),
                args: spec.args.clone(),
                env: spec.env.clone(),
            },
        );
    }

    let sub_agents = merged
        .sub_agents
        .iter()
        .map(|(name, spec)| {
            (
                name.clone(),
                SubAgentConfig {
                    description: spec.description.clone(),
                    prompt: spec.prompt.clone(),
                    tools: spec.tools.clone(),
                    model: spec.model.clone(),
                },
            )
        })
        .collect();

    let system_prompt = match (caller_system_prompt, merged.prompt.as_deref()) {
        (Some(c), Some(s)) => Some(format!("{c}\n\n{s}")),
        (Some(c), None) => Some(c.to_string()),
        (None, Some(s)) => Some(s.to_string()),
        (None, None) => None,
    };

    AssembledPlan {
        system_prompt,
        allowed_tools,
        sub_agents,
        mcp_servers,
    }
}

fn build_user_integration_mcp_map(
    integrations: &[Integration],
    decryptor: &dyn Decryptor,
) -> HashMap<String, McpServerConfig> {
    let mut user_mcp = HashMap::new();

    for integration in integrations.iter().filter(|i| i.active) {
        let access_token = match &integration.access_token_ciphertext {
            Some(ciphertext) => match decryptor.decrypt(ciphertext) {
                Ok(token) => token,
                Err(error) => {
                    tracing::warn!(provider = %integration.provider, %error, "skipping integration: decryption failed");
                    continue;
                }
            },
            None => {
                tracing::warn!(provider = %integration.provider, "skipping integration: no access token stored");
                continue;
            }
        };

        let refresh_token = integration
            .refresh_token_ciphertext
            .as_ref()
            .and_then(|ciphertext| decryptor.decrypt(ciphertext).ok());

        match mcp::build_server_config(
            &integration.provider,
            &access_token,
            refresh_token.as_deref(),
            &integration.metadata,
        ) {
            Some(config) => {
                user_mcp.insert(integration.provider.clone(), config);
            }
            None => tracing::warn!(provider = %integration.provider, "unknown provider, skipping MCP descriptor"),
        }
    }

    user_mcp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decrypt::Decryptor;
    use conductor_core::ids::{IntegrationId, UserId};
    use conductor_core::skill::McpServerSpec;
    use serde_json::json;

    struct IdentityDecryptor;
    impl Decryptor for IdentityDecryptor {
        fn decrypt(&self, ciphertext: &[u8]) -> crate::error::Result<String> {
            Ok(String::from_utf8(ciphertext.to_vec()).unwrap())
        }
    }

    struct AlwaysFailsDecryptor;
    impl Decryptor for AlwaysFailsDecryptor {
        fn decrypt(&self, _ciphertext: &[u8]) -> crate::error::Result<String> {
            Err(crate::error::AssemblerError::Decryption("boom".into()))
        }
    }

    fn integration(provider: &str, metadata: serde_json::Value) -> Integration {
        Integration {
            id: IntegrationId::new(),
            user_id: UserId::new(),
            provider: provider.to_string(),
            access_token_ciphertext: Some(b"access-token".to_vec()),
            refresh_token_ciphertext: Some(b"refresh-token".to_vec()),
            token_expires_at: None,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            active: true,
        }
    }

    #[test]
    fn default_tools_apply_when_caller_specifies_none() {
        let plan = assemble(
            None,
            None,
            &[],
            &[],
            &[],
            &IdentityDecryptor,
            UserRole::User,
        );
        let expected: IndexSet<String> = DEFAULT_ALLOWED_TOOLS.iter().map(|s| s.to_string()).collect();
        assert_eq!(plan.allowed_tools, expected);
    }

    #[test]
    fn child_role_strips_bash_and_edit() {
        let plan = assemble(None, None, &[], &[], &[], &IdentityDecryptor, UserRole::Child);
        assert!(!plan.allowed_tools.contains("Bash"));
        assert!(!plan.allowed_tools.contains("Edit"));
        assert!(plan.allowed_tools.contains("Read"));
    }

    #[test]
    fn failed_decryption_skips_only_that_integration() {
        let integrations = vec![integration("gmail", json!({"userEmail": "a@b.com"}))];
        let plan = assemble(
            None,
            None,
            &[],
            &[],
            &integrations,
            &AlwaysFailsDecryptor,
            UserRole::User,
        );
        assert!(plan.mcp_servers.is_empty());
    }

    #[test]
    fn skill_mcp_overrides_user_integration_mcp_by_name() {
        let integrations = vec![integration("gmail", json!({"userEmail": "a@b.com"}))];
        let skill = Skill {
            name: "override-gmail".into(),
            description: String::new(),
            prompt: None,
            tools: vec![],
            mcp_servers: HashMap::from([(
                "gmail".to_string(),
                McpServerSpec {
                    command: "custom-gmail-server".into(),
                    args: vec![],
                    env: HashMap::new(),
                },
            )]),
            sub_agents: HashMap::new(),
        };
        let plan = assemble(
            None,
            None,
            &["override-gmail".to_string()],
            &[skill],
            &integrations,
            &IdentityDecryptor,
            UserRole::User,
        );
        assert_eq!(plan.mcp_servers.get("gmail").unwrap().command, "custom-gmail-server");
    }

    #[test]
    fn system_prompt_concatenates_caller_and_skill() {
        let skill = Skill {
            name: "s".into(),
            description: String::new(),
            prompt: Some("skill prompt".into()),
            tools: vec![],
            mcp_servers: HashMap::new(),
            sub_agents: HashMap::new(),
        };
        let plan = assemble(
            Some("caller prompt"),
            None,
            &["s".to_string()],
            &[skill],
            &[],
            &IdentityDecryptor,
            UserRole::User,
        );
        assert_eq!(plan.system_prompt.as_deref(), Some("caller prompt\n\nskill prompt"));
    }

    #[test]
    fn unknown_skill_name_is_ignored() {
        let plan = assemble(
            None,
            None,
            &["nonexistent".to_string()],
            &[],
            &[],
            &IdentityDecryptor,
            UserRole::User,
        );
        assert!(plan.system_prompt.is_none());
    }
}
