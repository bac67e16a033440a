//! Skills — named bundles of tools, MCP servers, sub-agents and prompt
//! fragments, composable by merge. Static configuration, not persisted:
//! the registry that supplies `Skill` values is external, pluggable
//! data.

use std::collections::HashMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Descriptor for an out-of-process MCP tool provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Descriptor for a named sub-agent a skill wants available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentSpec {
    pub description: String,
    pub prompt: String,
    pub tools: Vec<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerSpec>,
    #[serde(default)]
    pub sub_agents: HashMap<String, SubAgentSpec>,
}

/// Result of merging a list of resolved skills.
#[derive(Debug, Clone, Default)]
pub struct MergedSkills {
    /// Deduplicated, first-occurrence order preserved.
    pub tools: IndexSet<String>,
    /// Last-writer-wins by name.
    pub mcp_servers: HashMap<String, McpServerSpec>,
    /// Last-writer-wins by name.
    pub sub_agents: HashMap<String, SubAgentSpec>,
    /// Concatenation of each skill's prompt fragment with a blank-line
    /// separator; `None` if no skill carried a prompt.
    pub prompt: Option<String>,
}

/// Merge resolved skills in input order. Unknown skill names are filtered
/// out by the caller before this is invoked.
pub fn merge(skills: &[Skill]) -> MergedSkills {
    let mut merged = MergedSkills::default();
    let mut prompt_parts: Vec<&str> = Vec::new();

    for skill in skills {
        for tool in &skill.tools {
            merged.tools.insert(tool.clone());
        }
        for (name, spec) in &skill.mcp_servers {
            merged.mcp_servers.insert(name.clone(), spec.clone());
        }
        for (name, spec) in &skill.sub_agents {
            merged.sub_agents.insert(name.clone(), spec.clone());
        }
        if let Some(p) = skill.prompt.as_deref() {
            if !p.is_empty() {
                prompt_parts.push(p);
            }
        }
    }

    if !prompt_parts.is_empty() {
        merged.prompt = Some(prompt_parts.join("\n\n"));
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, tools: &[&str], prompt: Option<&str>) -> Skill {
        Skill {
            name: name.to_string(),
            description: String::new(),
            prompt: prompt.map(String::from),
            tools: tools.iter().map(|s| s.to_string()).collect(),
            mcp_servers: HashMap::new(),
            sub_agents: HashMap::new(),
        }
    }

    #[test]
    fn tools_are_deduplicated_preserving_first_occurrence_order() {
        let skills = vec![
            skill("a", &["Read", "Write"], None),
            skill("b", &["Write", "Bash"], None),
        ];
        let merged = merge(&skills);
        let order: Vec<&str> = merged.tools.iter().map(String::as_str).collect();
        assert_eq!(order, vec!["Read", "Write", "Bash"]);
    }

    #[test]
    fn mcp_servers_last_writer_wins() {
        let mut s1 = skill("a", &[], None);
        s1.mcp_servers.insert(
            "gmail".into(),
            McpServerSpec { command: "old".into(), args: vec![], env: HashMap::new() },
        );
        let mut s2 = skill("b", &[], None);
        s2.mcp_servers.insert(
            "gmail".into(),
            McpServerSpec { command: "new".into(), args: vec![], env: HashMap::new() },
        );
        let merged = merge(&[s1, s2]);
        assert_eq!(merged.mcp_servers.get("gmail").unwrap().command, "new");
    }

    #[test]
    fn prompts_concatenate_with_blank_line() {
        let skills = vec![skill("a", &[], Some("first")), skill("b", &[], Some("second"))];
        let merged = merge(&skills);
        assert_eq!(merged.prompt.as_deref(), Some("first\n\nsecond"));
    }

    #[test]
    fn no_prompts_yields_none() {
        let skills = vec![skill("a", &[], None)];
        let merged = merge(&skills);
        assert!(merged.prompt.is_none());
    }
}
