//! 结构保持重建
//!
//! 把替换文本写回原行：说话人前缀、变量、换行原位保留，
//! 只替换普通文本

use crate::align::diff::apply_mappings_from;
use crate::align::normalizer::canonical_len;
use crate::align::tokenizer::Tokenizer;
use crate::align::types::{DiffSegment, Token, OPEN_QUOTE};

/// 替换方式
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// 整体替换：按比例切分到各段普通文本
    Full(String),
    /// 逐个应用差异映射
    Mappings(Vec<DiffSegment>),
}

/// 重建
pub fn reconstruct(tokens: &[Token], replacement: &Replacement) -> String {
    reconstruct_with_stats(tokens, replacement).0
}

/// 重建，同时返回实际应用的映射数（整体替换时为 0）
pub fn reconstruct_with_stats(tokens: &[Token], replacement: &Replacement) -> (String, usize) {
    match replacement {
        Replacement::Full(text) => (rebuild_full(tokens, text), 0),
        Replacement::Mappings(maps) => {
            let source = Tokenizer::render(tokens);
            let (output, applied) = apply_mappings_from(&source, maps, prefix_len(tokens));
            if applied > 0 && structure_of(&Tokenizer::tokenize(&output)) != structure_of(tokens) {
                // 映射跨越了变量或换行，放弃
                tracing::debug!("映射破坏了行结构，放弃映射结果: applied={}", applied);
                return (source, 0);
            }
            (output, applied)
        }
    }
}

fn rebuild_full(tokens: &[Token], replacement: &str) -> String {
    let content: Vec<char> = plain_content(replacement).chars().collect();

    let runs: Vec<&str> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::ContentRun(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();

    let mut weights: Vec<usize> = runs.iter().map(|r| canonical_len(r)).collect();
    if weights.iter().all(|w| *w == 0) {
        weights = runs.iter().map(|r| r.chars().count()).collect();
    }
    let total: usize = weights.iter().sum();

    let mut out = String::new();
    let mut cursor = 0usize;
    let mut run_idx = 0usize;

    for token in tokens {
        match token {
            Token::ContentRun(_) => {
                let remaining = content.len() - cursor;
                let take = if run_idx + 1 == runs.len() {
                    remaining
                } else if total == 0 {
                    0
                } else {
                    let share = weights[run_idx] as f64 / total as f64 * content.len() as f64;
                    (share.round() as usize).min(remaining)
                };
                out.extend(&content[cursor..cursor + take]);
                cursor += take;
                run_idx += 1;
            }
            other => other.push_literal(&mut out),
        }
    }

    // 原行没有普通文本时，剩余内容追加到末尾
    if cursor < content.len() {
        out.extend(&content[cursor..]);
    }
    out
}

/// 替换文本中的普通文本
///
/// 去掉结构 token 与控制字符后可能拼出新的结构 token，反复处理直到没有为止
fn plain_content(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let tokens = Tokenizer::tokenize(&current);
        let has_structure = tokens.iter().any(Token::is_structural);
        let has_control = current.chars().any(char::is_control);
        if !has_structure && !has_control {
            return current;
        }
        current = Tokenizer::content_text(&tokens)
            .chars()
            .filter(|c| !c.is_control())
            .collect();
    }
}

/// 行首说话人前缀（含「）的字节长度，映射不在其中查找
fn prefix_len(tokens: &[Token]) -> usize {
    match tokens.first() {
        Some(Token::SpeakerPrefix(name)) => name.len() + OPEN_QUOTE.len_utf8(),
        _ => 0,
    }
}

fn structure_of(tokens: &[Token]) -> Vec<&Token> {
    tokens.iter().filter(|t| t.is_structural()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::types::BreakKind;
    use proptest::prelude::*;

    fn full(line: &str, replacement: &str) -> String {
        reconstruct(
            &Tokenizer::tokenize(line),
            &Replacement::Full(replacement.to_string()),
        )
    }

    #[test]
    fn test_full_single_run() {
        assert_eq!(full("げんき？", "元気？"), "元気？");
    }

    #[test]
    fn test_full_keeps_variables() {
        assert_eq!(full("{00}はげんき", "元気"), "{00}元気");
    }

    #[test]
    fn test_full_keeps_speaker_prefix() {
        assert_eq!(full("ナナミ「げんき？」", "元気？」"), "ナナミ「元気？」");
    }

    #[test]
    fn test_full_proportional_split() {
        // 两段规范长度 2:2，替换内容 4 字
        let output = full("ああ\\nいい", "亜亜伊伊");
        assert_eq!(output, "亜亜\\n伊伊");
    }

    #[test]
    fn test_full_short_replacement_carries_forward() {
        // 三段规范长度 2:2:2，前两段按比例取整为 0，剩余全部落在最后一段
        let line = "ああ\\nいい{00}うう";
        let output = full(line, "亜");
        assert_eq!(output, "\\n{00}亜");
        assert_eq!(
            Tokenizer::structural_skeleton(&Tokenizer::tokenize(&output)),
            Tokenizer::structural_skeleton(&Tokenizer::tokenize(line))
        );

        assert_eq!(full(line, "亜伊宇江"), "亜\\n伊{00}宇江");
    }

    #[test]
    fn test_full_rounding_never_duplicates() {
        // 每段按比例都取整为 1，内容用完后的段为空
        assert_eq!(full("あ\\nい\\nう", "亜伊"), "亜\\n伊\\n");
    }

    #[test]
    fn test_full_strips_replacement_structure() {
        let output = full("げんき\\nです", "{01}元気\\nです");
        assert_eq!(output, "元気\\nです");
    }

    #[test]
    fn test_full_no_content_run_appends() {
        let output = full("{00}", "元気");
        assert_eq!(output, "{00}元気");
    }

    #[test]
    fn test_mappings_mode() {
        let tokens = Tokenizer::tokenize("{00}げんき？\\nどこ？");
        let maps = vec![DiffSegment::new("げんき", "元気"), DiffSegment::new("どこ", "何処")];
        let (output, applied) = reconstruct_with_stats(&tokens, &Replacement::Mappings(maps));
        assert_eq!(output, "{00}元気？\\n何処？");
        assert_eq!(applied, 2);
    }

    #[test]
    fn test_mappings_skip_speaker_prefix() {
        let tokens = Tokenizer::tokenize("はな「はなをみる」");
        let maps = vec![DiffSegment::new("はな", "花"), DiffSegment::new("みる", "見る")];
        let (output, applied) = reconstruct_with_stats(&tokens, &Replacement::Mappings(maps));
        assert_eq!(output, "はな「花を見る」");
        assert_eq!(applied, 2);
    }

    #[test]
    fn test_mappings_rejects_broken_structure() {
        let tokens = Tokenizer::tokenize("{00}あ");
        let maps = vec![DiffSegment::new("0", "X")];
        let (output, applied) = reconstruct_with_stats(&tokens, &Replacement::Mappings(maps));
        assert_eq!(output, "{00}あ");
        assert_eq!(applied, 0);
    }

    #[test]
    fn test_line_break_kinds_kept() {
        let output = full("あ\r\nい\nう", "亜伊宇");
        let tokens = Tokenizer::tokenize(&output);
        assert_eq!(
            Tokenizer::structural_skeleton(&tokens),
            vec![
                Token::LineBreak(BreakKind::CrLf),
                Token::LineBreak(BreakKind::Newline)
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_full_preserves_structure(
            line in "[あいう漢{}0-9A-F「\\[\\]VAR \\\\n\r\n]{0,30}",
            replacement in "[亜伊宇{}0-9「\\[\\]VAR \\\\n\r\n]{0,30}",
        ) {
            let tokens = Tokenizer::tokenize(&line);
            let output = reconstruct(&tokens, &Replacement::Full(replacement));
            let rebuilt = Tokenizer::tokenize(&output);
            prop_assert_eq!(structure_of(&rebuilt), structure_of(&tokens));
        }
    }
}
