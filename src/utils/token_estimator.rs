use serde::{Deserialize, Serialize};

/// Token估算器，用于在不调用分词器的情况下估算文本的token数量
pub struct TokenEstimator {
    rules: TokenCalculationRules,
}

/// Token计算规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCalculationRules {
    /// 拉丁字符的平均比例（字符数/token数）
    pub latin_char_per_token: f64,
    /// CJK字符的平均比例
    pub cjk_char_per_token: f64,
}

impl Default for TokenCalculationRules {
    fn default() -> Self {
        Self {
            // 基于GPT系列模型的经验值
            latin_char_per_token: 4.0,
            cjk_char_per_token: 1.5,
        }
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self {
            rules: TokenCalculationRules::default(),
        }
    }

    /// 估算文本的token数量
    pub fn estimate_tokens(&self, text: &str) -> usize {
        let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
            if Self::is_cjk_char(c) {
                (cjk + 1, other)
            } else {
                (cjk, other + 1)
            }
        });

        let cjk_tokens = (cjk as f64 / self.rules.cjk_char_per_token).ceil() as usize;
        let other_tokens = (other as f64 / self.rules.latin_char_per_token).ceil() as usize;
        cjk_tokens + other_tokens
    }

    /// 估算多个文本片段的总token数量
    pub fn estimate_total_tokens<S: AsRef<str>>(&self, texts: &[S]) -> usize {
        texts
            .iter()
            .map(|text| self.estimate_tokens(text.as_ref()))
            .sum()
    }

    fn is_cjk_char(c: char) -> bool {
        matches!(c as u32,
            0x4E00..=0x9FFF |   // CJK统一汉字
            0x3400..=0x4DBF |   // CJK扩展A
            0x3040..=0x30FF |   // 平假名、片假名
            0xAC00..=0xD7AF |   // 韩文音节
            0x20000..=0x2EBEF   // CJK扩展B-F
        )
    }
}
