//! 提示词模板 - 报告类型到模板函数的映射，以及角色选择与想法拆解的指令

use chrono::Local;

use crate::generator::types::ReportType;
use crate::i18n::TargetLanguage;

/// 报告模板的输入
#[derive(Debug, Clone)]
pub struct ReportPromptArgs<'a> {
    pub idea: &'a str,
    pub context: &'a str,
    pub report_format: &'a str,
    pub total_words: usize,
    pub language: TargetLanguage,
}

/// 报告模板函数
pub type ReportTemplate = fn(&ReportPromptArgs<'_>) -> String;

/// 按报告类型取模板
pub fn template_for(report_type: ReportType) -> ReportTemplate {
    match report_type {
        ReportType::Research => research_report_prompt,
        ReportType::Resource => resource_report_prompt,
        ReportType::Outline => outline_report_prompt,
        ReportType::Custom => custom_report_prompt,
        ReportType::IdeaResearch => idea_research_report_prompt,
    }
}

fn current_date() -> String {
    Local::now().format("%B %d, %Y").to_string()
}

fn research_report_prompt(args: &ReportPromptArgs<'_>) -> String {
    format!(
        r#"Information: """{context}"""

Using the above information, answer the following query or task: "{idea}" in a detailed report.
The report should focus on the answer to the query, be well structured, informative, in depth and comprehensive, with facts and numbers if available and a minimum of {words} words.
Write the report with markdown syntax in {format} format and an unbiased, journalistic tone.
Form your own concrete and valid opinion based on the given information, and avoid general or meaningless conclusions.
Cite the most relevant sources inline at the end of the sentence or paragraph that references them.
List every used source url at the end of the report as references, one reference per source, without duplicates.
{language}
Assume that the current date is {date}."#,
        context = args.context,
        idea = args.idea,
        words = args.total_words,
        format = args.report_format,
        language = args.language.prompt_instruction(),
        date = current_date(),
    )
}

fn resource_report_prompt(args: &ReportPromptArgs<'_>) -> String {
    format!(
        r#""""{context}"""

Based on the above information, generate a bibliography recommendation report for the following question or topic: "{idea}".
The report should provide a detailed analysis of each recommended resource, explaining how each source can contribute to finding answers to the research question.
Focus on the relevance, reliability and significance of each source.
Make the report well structured, informative, in depth, following markdown syntax, with facts, numbers and concrete information where available.
The report should have a minimum length of {words} words.
Include every used source url at the end of the report as references, one reference per source, without duplicates.
{language}"#,
        context = args.context,
        idea = args.idea,
        words = args.total_words,
        language = args.language.prompt_instruction(),
    )
}

fn outline_report_prompt(args: &ReportPromptArgs<'_>) -> String {
    format!(
        r#""""{context}"""

Using the above information, generate an outline for a research report in markdown syntax for the following question or topic: "{idea}".
The outline should provide a well structured framework for the research report, including the main sections, subsections and key points to be covered.
The research report should be detailed, informative, in depth, and a minimum of {words} words.
Use appropriate markdown syntax to format the outline and ensure readability.
{language}"#,
        context = args.context,
        idea = args.idea,
        words = args.total_words,
        language = args.language.prompt_instruction(),
    )
}

fn custom_report_prompt(args: &ReportPromptArgs<'_>) -> String {
    format!(
        r#""{context}"

{idea}

{language}"#,
        context = args.context,
        idea = args.idea,
        language = args.language.prompt_instruction(),
    )
}

fn idea_research_report_prompt(args: &ReportPromptArgs<'_>) -> String {
    format!(
        r#"Information: """{context}"""

Using the above information, research the following idea: "{idea}" in a detailed report.
The report should focus on the idea, including market research, competitors, demand, features, viability, resources and tech stack.
It should be well structured, informative, in depth and comprehensive, with facts and numbers if available and a minimum of {words} words.
Write the report as long as the relevant information allows, with markdown syntax, in {format} format and an unbiased, journalistic tone.
Form your own concrete and valid opinion based on the given information, and avoid general or meaningless conclusions.
Cite the most relevant search results inline at the end of the sentence or paragraph that references them.
List every used source url at the end of the report as references, one reference per source, without duplicates.
{language}
Assume that the current date is {date}."#,
        context = args.context,
        idea = args.idea,
        words = args.total_words,
        format = args.report_format,
        language = args.language.prompt_instruction(),
        date = current_date(),
    )
}

/// 想法拆解提示词，要求模型返回字符串数组
pub fn decomposition_prompt(idea: &str, max_queries: usize) -> String {
    format!(
        r#"Write {count} google search queries to research the following idea: "{idea}".
Include queries for market research, competitors, demand, features, viability, resources and tech stack.
Use the current date if needed: {date}.
You must respond with a list of strings in the following format: ["query 1", "query 2", "query 3"]."#,
        count = max_queries,
        idea = idea,
        date = current_date(),
    )
}

/// 角色选择的系统提示词，附带期望输出的JSON Schema
pub fn role_selection_instructions(schema: &str) -> String {
    format!(
        r#"This task involves researching a given topic, regardless of its complexity or the availability of a definitive answer.
The research is conducted by a specific agent, defined by its type and role, with each agent requiring distinct instructions.
The agent is determined by the field of the topic and the specific name of the agent that could be utilized to research the topic provided.
Agents are categorized by their area of expertise, and each agent type is associated with a corresponding emoji.

examples:
task: "should I invest in apple stocks?"
response:
{{
    "name": "💰 Finance Agent",
    "agent_role_prompt": "You are a seasoned finance analyst AI assistant. Your primary goal is to compose comprehensive, astute, impartial, and methodically arranged financial reports based on provided data and trends."
}}
task: "could reselling sneakers become profitable?"
response:
{{
    "name": "📈 Business Analyst Agent",
    "agent_role_prompt": "You are an experienced AI business analyst assistant. Your main objective is to produce comprehensive, insightful, impartial, and systematically structured business reports based on provided business data, market trends, and strategic analysis."
}}
task: "what are the most interesting sites in Tel Aviv?"
response:
{{
    "name": "🌍 Travel Agent",
    "agent_role_prompt": "You are a world-travelled AI tour guide assistant. Your main purpose is to draft engaging, insightful, unbiased, and well-structured travel reports on given locations, including history, attractions, and cultural insights."
}}

Respond with a single JSON object matching this schema and nothing else:
{schema}"#,
        schema = schema,
    )
}

pub fn role_selection_prompt(idea: &str) -> String {
    format!("task: {}", idea)
}
