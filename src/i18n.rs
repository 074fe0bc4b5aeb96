use serde::{Deserialize, Serialize};

/// 报告输出语言
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum TargetLanguage {
    #[serde(rename = "en")]
    #[default]
    English,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "es")]
    Spanish,
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLanguage::English => write!(f, "en"),
            TargetLanguage::Chinese => write!(f, "zh"),
            TargetLanguage::Japanese => write!(f, "ja"),
            TargetLanguage::Korean => write!(f, "ko"),
            TargetLanguage::German => write!(f, "de"),
            TargetLanguage::French => write!(f, "fr"),
            TargetLanguage::Spanish => write!(f, "es"),
        }
    }
}

impl std::str::FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Ok(TargetLanguage::English),
            "zh" | "chinese" | "中文" => Ok(TargetLanguage::Chinese),
            "ja" | "japanese" | "日本語" => Ok(TargetLanguage::Japanese),
            "ko" | "korean" | "한국어" => Ok(TargetLanguage::Korean),
            "de" | "german" | "deutsch" => Ok(TargetLanguage::German),
            "fr" | "french" | "français" => Ok(TargetLanguage::French),
            "es" | "spanish" | "español" => Ok(TargetLanguage::Spanish),
            _ => Err(format!("Unknown target language: {}", s)),
        }
    }
}

impl TargetLanguage {
    /// 获取语言的描述性名称
    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::English => "English",
            TargetLanguage::Chinese => "中文",
            TargetLanguage::Japanese => "日本語",
            TargetLanguage::Korean => "한국어",
            TargetLanguage::German => "Deutsch",
            TargetLanguage::French => "Français",
            TargetLanguage::Spanish => "Español",
        }
    }

    /// 附加在报告提示词末尾的语言指令
    pub fn prompt_instruction(&self) -> String {
        match self {
            TargetLanguage::English => "Write the report in English.".to_string(),
            other => format!(
                "Write the report in {}, even though the research material may be in other languages.",
                other.display_name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_english() {
        assert_eq!(TargetLanguage::default(), TargetLanguage::English);
    }

    #[test]
    fn test_parse_round_trips_display_codes() {
        for lang in [
            TargetLanguage::English,
            TargetLanguage::Chinese,
            TargetLanguage::Japanese,
            TargetLanguage::Korean,
            TargetLanguage::German,
            TargetLanguage::French,
            TargetLanguage::Spanish,
        ] {
            assert_eq!(lang.to_string().parse::<TargetLanguage>(), Ok(lang));
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("klingon".parse::<TargetLanguage>().is_err());
    }

    #[test]
    fn test_prompt_instruction_names_language() {
        assert!(TargetLanguage::German.prompt_instruction().contains("Deutsch"));
        assert_eq!(
            TargetLanguage::English.prompt_instruction(),
            "Write the report in English."
        );
    }
}
