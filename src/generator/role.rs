use std::sync::Arc;

use crate::generator::prompts::{role_selection_instructions, role_selection_prompt};
use crate::generator::types::{AgentRole, ResearchError};
use crate::llm::LanguageModel;
use crate::utils::json::extract_json_object;

/// 研究角色选择器
pub struct RoleSelector {
    llm: Arc<dyn LanguageModel>,
}

impl RoleSelector {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// 根据想法所属领域选出角色
    pub async fn select_role(&self, idea: &str) -> Result<AgentRole, ResearchError> {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(AgentRole))
            .map_err(|e| ResearchError::Upstream(e.into()))?;
        let output = self
            .llm
            .complete(
                &role_selection_instructions(&schema),
                &role_selection_prompt(idea),
            )
            .await?;
        parse_role(&output)
    }
}

fn parse_role(output: &str) -> Result<AgentRole, ResearchError> {
    let malformed = |reason: String| ResearchError::MalformedOutput {
        what: "role selection",
        reason,
    };

    let fragment = extract_json_object(output)
        .ok_or_else(|| malformed(format!("expected a JSON object, got: {}", output.trim())))?;
    let role: AgentRole = serde_json::from_str(fragment).map_err(|e| malformed(e.to_string()))?;

    if role.name.trim().is_empty() || role.agent_role_prompt.trim().is_empty() {
        return Err(malformed("role name and prompt must not be empty".to_string()));
    }
    Ok(AgentRole {
        name: role.name.trim().to_string(),
        agent_role_prompt: role.agent_role_prompt.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TextStream;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingModel {
        reply: String,
        system_prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, system: &str, _user: &str) -> Result<String> {
            self.system_prompts.lock().unwrap().push(system.to_string());
            Ok(self.reply.clone())
        }

        async fn stream(&self, _system: &str, _user: &str) -> Result<TextStream> {
            Err(anyhow!("not used"))
        }
    }

    fn selector(reply: &str) -> (RoleSelector, Arc<RecordingModel>) {
        let model = Arc::new(RecordingModel {
            reply: reply.to_string(),
            system_prompts: Mutex::new(Vec::new()),
        });
        (RoleSelector::new(model.clone()), model)
    }

    #[tokio::test]
    async fn test_parses_role_object() {
        let (s, model) = selector(
            r#"{"name": "🏢 Real Estate Agent", "agent_role_prompt": "You are a property analyst."}"#,
        );
        let role = s.select_role("condo concierge app").await.unwrap();
        assert_eq!(role.name, "🏢 Real Estate Agent");
        assert_eq!(role.agent_role_prompt, "You are a property analyst.");
        assert!(model.system_prompts.lock().unwrap()[0].contains("agent_role_prompt"));
    }

    #[tokio::test]
    async fn test_accepts_legacy_server_key() {
        let (s, _) = selector(
            "response:\n{\"server\": \"💰 Finance Agent\", \"agent_role_prompt\": \"You analyse finance.\"}",
        );
        let role = s.select_role("apple stocks").await.unwrap();
        assert_eq!(role.name, "💰 Finance Agent");
    }

    #[tokio::test]
    async fn test_malformed_role_is_a_hard_failure() {
        for reply in [
            "Finance Agent",
            r#"{"name": "Finance Agent"}"#,
            r#"{"name": " ", "agent_role_prompt": "x"}"#,
        ] {
            let (s, _) = selector(reply);
            let err = s.select_role("idea").await.unwrap_err();
            assert!(
                matches!(err, ResearchError::MalformedOutput { what: "role selection", .. }),
                "{reply}"
            );
        }
    }
}
