//! 脚本行分词器
//!
//! 单次从左到右扫描（按 char，而非字节），切分为：
//! 说话人前缀、内联变量、换行、普通文本

use crate::align::types::{BreakKind, Token, OPEN_QUOTE};

/// `[VAR ...]` 变量的起始标记
const VAR_OPEN: &str = "[VAR ";

/// 分词器
pub struct Tokenizer;

impl Tokenizer {
    /// 分词
    ///
    /// 每个位置的识别优先级：
    /// 1. 说话人前缀（仅位置 0）
    /// 2. 变量 `{XX}` / `[VAR ...]`
    /// 3. 换行（转义 `\n`、CRLF、LF）
    ///
    /// 其余字符累积为普通文本
    pub fn tokenize(text: &str) -> Vec<Token> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut idx = 0;

        if let Some(name_len) = Self::speaker_prefix_len(&chars) {
            tokens.push(Token::SpeakerPrefix(chars[..name_len].iter().collect()));
            idx = name_len + 1;
        }

        while idx < chars.len() {
            if let Some(len) = Self::variable_len(&chars, idx) {
                Self::flush(&mut tokens, &mut current);
                tokens.push(Token::Variable(chars[idx..idx + len].iter().collect()));
                idx += len;
                continue;
            }

            if let Some((kind, len)) = Self::line_break_at(&chars, idx) {
                Self::flush(&mut tokens, &mut current);
                tokens.push(Token::LineBreak(kind));
                idx += len;
                continue;
            }

            current.push(chars[idx]);
            idx += 1;
        }

        Self::flush(&mut tokens, &mut current);
        tokens
    }

    /// 按原文形式拼回
    pub fn render(tokens: &[Token]) -> String {
        let mut out = String::new();
        for token in tokens {
            token.push_literal(&mut out);
        }
        out
    }

    /// 仅拼接普通文本
    pub fn content_text(tokens: &[Token]) -> String {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::ContentRun(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 按顺序取出变量和换行
    pub fn structural_skeleton(tokens: &[Token]) -> Vec<Token> {
        tokens
            .iter()
            .filter(|t| matches!(t, Token::Variable(_) | Token::LineBreak(_)))
            .cloned()
            .collect()
    }

    /// 说话人前缀：行首一个以上假名/汉字，紧跟开引号
    ///
    /// 返回名字的字符数（不含引号）
    pub(crate) fn speaker_prefix_len(chars: &[char]) -> Option<usize> {
        let name_len = chars.iter().take_while(|c| is_name_char(**c)).count();
        if name_len > 0 && chars.get(name_len) == Some(&OPEN_QUOTE) {
            Some(name_len)
        } else {
            None
        }
    }

    /// 变量长度（字符数）
    fn variable_len(chars: &[char], idx: usize) -> Option<usize> {
        match chars[idx] {
            '{' => {
                let body = chars.get(idx + 1..idx + 4)?;
                if body[0].is_ascii_hexdigit() && body[1].is_ascii_hexdigit() && body[2] == '}' {
                    Some(4)
                } else {
                    None
                }
            }
            '[' => {
                let open: Vec<char> = VAR_OPEN.chars().collect();
                if chars.get(idx..idx + open.len())? != open.as_slice() {
                    return None;
                }
                // 变量体内不允许出现括号、反斜杠或换行
                for (offset, ch) in chars[idx + open.len()..].iter().enumerate() {
                    match ch {
                        ']' => return Some(open.len() + offset + 1),
                        '[' | '{' | '}' | '\\' | '\n' | '\r' => return None,
                        _ => {}
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn line_break_at(chars: &[char], idx: usize) -> Option<(BreakKind, usize)> {
        match chars[idx] {
            '\\' if chars.get(idx + 1) == Some(&'n') => Some((BreakKind::Escaped, 2)),
            '\r' if chars.get(idx + 1) == Some(&'\n') => Some((BreakKind::CrLf, 2)),
            '\n' => Some((BreakKind::Newline, 1)),
            _ => None,
        }
    }

    fn flush(tokens: &mut Vec<Token>, current: &mut String) {
        if !current.is_empty() {
            tokens.push(Token::ContentRun(std::mem::take(current)));
        }
    }
}

/// 可作为说话人名的字符：平假名、片假名（含长音符）、汉字
fn is_name_char(ch: char) -> bool {
    let code = ch as u32;
    // Hiragana
    (0x3041..=0x309F).contains(&code)
        // Katakana
        || (0x30A0..=0x30FF).contains(&code)
        // Halfwidth Katakana
        || (0xFF66..=0xFF9F).contains(&code)
        // CJK Unified Ideographs
        || (0x4E00..=0x9FFF).contains(&code)
        // CJK Unified Ideographs Extension A
        || (0x3400..=0x4DBF).contains(&code)
        // CJK Compatibility Ideographs
        || (0xF900..=0xFAFF).contains(&code)
        // 々
        || ch == '\u{3005}'
}
