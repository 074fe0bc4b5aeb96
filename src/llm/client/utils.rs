use crate::{config::LLMConfig, llm::TextStream, utils::token_estimator::TokenEstimator};

use anyhow::anyhow;
use futures::StreamExt;
use std::sync::LazyLock;
use std::time::Duration;

static TOKEN_ESTIMATOR: LazyLock<TokenEstimator> = LazyLock::new(TokenEstimator::new);

/// 短提示词优先使用高能效模型，并以高质量模型兜底；长提示词直接使用高质量模型
pub fn evaluate_befitting_model(
    llm_config: &LLMConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> (String, Option<String>) {
    let estimated = TOKEN_ESTIMATOR.estimate_tokens(system_prompt)
        + TOKEN_ESTIMATOR.estimate_tokens(user_prompt);
    if estimated <= 8 * 1024 && llm_config.model_efficient != llm_config.model_powerful {
        return (
            llm_config.model_efficient.clone(),
            Some(llm_config.model_powerful.clone()),
        );
    }
    (llm_config.model_powerful.clone(), None)
}

/// 相邻两段增量之间超过idle仍无输出时，以错误结束流
pub fn with_idle_timeout(stream: TextStream, idle: Duration) -> TextStream {
    futures::stream::unfold(Some(stream), move |state| async move {
        let mut stream = state?;
        match tokio::time::timeout(idle, stream.next()).await {
            Ok(Some(item)) => Some((item, Some(stream))),
            Ok(None) => None,
            Err(_) => Some((
                Err(anyhow!("model stream stalled for {}s", idle.as_secs_f64())),
                None,
            )),
        }
    })
    .boxed()
}
