use std::sync::Arc;

use crate::generator::prompts::decomposition_prompt;
use crate::generator::types::{AgentRole, ResearchError, SubIdea};
use crate::llm::LanguageModel;
use crate::utils::json::extract_json_array;

/// 想法拆解器：一次模型调用把想法扩展为若干子查询
pub struct IdeaDecomposer {
    llm: Arc<dyn LanguageModel>,
    max_queries: usize,
}

impl IdeaDecomposer {
    pub fn new(llm: Arc<dyn LanguageModel>, max_queries: usize) -> Self {
        Self {
            llm,
            max_queries: max_queries.max(1),
        }
    }

    /// 返回子查询列表，原始想法总是追加在最后
    pub async fn decompose(
        &self,
        idea: &str,
        role: &AgentRole,
    ) -> Result<Vec<SubIdea>, ResearchError> {
        let output = self
            .llm
            .complete(&role.agent_role_prompt, &decomposition_prompt(idea, self.max_queries))
            .await?;

        let queries = parse_queries(&output)?;
        let mut sub_ideas: Vec<SubIdea> = queries
            .into_iter()
            .filter(|q| q != idea)
            .map(|query| SubIdea {
                query,
                parent: idea.to_string(),
            })
            .collect();
        sub_ideas.push(SubIdea {
            query: idea.to_string(),
            parent: idea.to_string(),
        });
        Ok(sub_ideas)
    }
}

fn parse_queries(output: &str) -> Result<Vec<String>, ResearchError> {
    let malformed = |reason: String| ResearchError::MalformedOutput {
        what: "decomposition",
        reason,
    };

    let fragment = extract_json_array(output)
        .ok_or_else(|| malformed(format!("expected a list of strings, got: {}", output.trim())))?;
    let queries: Vec<String> =
        serde_json::from_str(fragment).map_err(|e| malformed(e.to_string()))?;

    let queries: Vec<String> = queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if queries.is_empty() {
        return Err(malformed("the list of queries is empty".to_string()));
    }
    Ok(queries)
}
