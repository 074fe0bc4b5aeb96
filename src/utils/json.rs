/// 从模型输出中截取第一个 `open` 到最后一个 `close` 之间的片段
///
/// 模型常在JSON前后附加说明文字或代码围栏，这里只负责截取，不做校验。
fn extract_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_between(text, '[', ']')
}

pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_between(text, '{', '}')
}
