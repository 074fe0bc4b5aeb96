use anyhow::{Context, Result};

/// 渲染宽度，超出的行会被折行
const TEXT_WIDTH: usize = 200;

/// 把HTML转换为可读的纯文本
///
/// 脚本、样式和注释不会被渲染，链接与强调只保留文字，最后合并空白。
pub fn html_to_text(html: &str) -> Result<String> {
    let text = html2text::config::plain_no_decorate()
        .string_from_read(html.as_bytes(), TEXT_WIDTH)
        .context("failed to render HTML as text")?;
    Ok(collapse_whitespace(&text))
}

/// 行内空白合并为单个空格，连续空行合并为一个段落分隔
fn collapse_whitespace(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs.join("\n\n")
}
