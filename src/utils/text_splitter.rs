/// 文本切分器，按字符窗口切分文档，相邻块之间保留重叠
///
/// 切分点会尽量回退到最近的空白字符，避免把单词切成两半。
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        // 重叠必须小于块大小，否则窗口无法前进
        let chunk_overlap = chunk_overlap.min(chunk_size.saturating_sub(1));
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let hard_end = (start + self.chunk_size).min(chars.len());
            let end = if hard_end < chars.len() {
                Self::snap_to_whitespace(&chars, start, hard_end)
            } else {
                hard_end
            };

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end >= chars.len() {
                break;
            }
            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }

    /// 在窗口后半段内寻找最后一个空白字符作为切分点
    fn snap_to_whitespace(chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + (hard_end - start) / 2;
        (floor..hard_end)
            .rev()
            .find(|&i| chars[i].is_whitespace())
            .map(|i| i + 1)
            .unwrap_or(hard_end)
    }
}
