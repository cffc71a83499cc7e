// 假名/汉字差异对齐
//
// 功能：对两条规范文本做字符级 LCS，提取“假名片段 → 汉字片段”映射
// 并按顺序应用到原始行上

use crate::align::types::DiffSegment;

/// 最大处理字符数（超过此长度使用快速 diff）
const MAX_CHARS: usize = 2048;

/// Diff 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffOp {
    Equal,
    Insert,
    Delete,
}

/// 对齐两条规范文本
///
/// 连续的相同字符合并为一个未变化片段，连续的增删合并为一个变化片段。
/// 所有片段的假名侧拼起来等于 `phonetic`，汉字侧拼起来等于 `logographic`
pub fn diff(phonetic: &str, logographic: &str) -> Vec<DiffSegment> {
    let a: Vec<char> = phonetic.chars().collect();
    let b: Vec<char> = logographic.chars().collect();

    if a.is_empty() && b.is_empty() {
        return Vec::new();
    }

    if a.len() > MAX_CHARS || b.len() > MAX_CHARS {
        tracing::debug!(
            "文本过长 (kana={}, kanji={}), 使用快速 diff",
            a.len(),
            b.len()
        );
        return quick_diff(&a, &b);
    }

    let table = lcs_table(&a, &b);
    let ops = build_ops(&a, &b, &table);
    collect_segments(&a, &b, &ops)
}

/// 仅保留可应用的映射（两侧不同且假名侧非空）
pub fn mappings(segments: &[DiffSegment]) -> Vec<DiffSegment> {
    segments.iter().filter(|s| s.is_mapping()).cloned().collect()
}

/// 按顺序把映射应用到行上
///
/// 每条映射只替换游标之后第一次出现的假名片段，找不到时静默跳过。
/// 返回新行与实际应用的映射数
pub fn apply_mappings(line: &str, mappings: &[DiffSegment]) -> (String, usize) {
    apply_mappings_from(line, mappings, 0)
}

/// 同 [`apply_mappings`]，但只在 `start` 字节之后查找
///
/// `start` 之前的内容（如说话人前缀）保持不变；不在字符边界上时从头开始
pub fn apply_mappings_from(line: &str, mappings: &[DiffSegment], start: usize) -> (String, usize) {
    let mut output = line.to_string();
    let mut cursor = if line.is_char_boundary(start) { start } else { 0 };
    let mut applied = 0usize;

    for mapping in mappings {
        if mapping.phonetic.is_empty() {
            continue;
        }
        let Some(offset) = output[cursor..].find(mapping.phonetic.as_str()) else {
            tracing::debug!(
                "映射未找到，跳过: kana_len={}, cursor={}",
                mapping.phonetic.chars().count(),
                cursor
            );
            continue;
        };

        let start = cursor + offset;
        let end = start + mapping.phonetic.len();
        output.replace_range(start..end, &mapping.logographic);
        cursor = start + mapping.logographic.len();
        applied += 1;
    }

    (output, applied)
}

fn collect_segments(a: &[char], b: &[char], ops: &[DiffOp]) -> Vec<DiffSegment> {
    let mut segments = Vec::new();
    let mut same = String::new();
    let mut removed = String::new();
    let mut added = String::new();
    let mut i = 0usize;
    let mut j = 0usize;

    for op in ops {
        match op {
            DiffOp::Equal => {
                if !removed.is_empty() || !added.is_empty() {
                    segments.push(DiffSegment::new(
                        std::mem::take(&mut removed),
                        std::mem::take(&mut added),
                    ));
                }
                same.push(a[i]);
                i += 1;
                j += 1;
            }
            DiffOp::Delete => {
                flush_unchanged(&mut segments, &mut same);
                removed.push(a[i]);
                i += 1;
            }
            DiffOp::Insert => {
                flush_unchanged(&mut segments, &mut same);
                added.push(b[j]);
                j += 1;
            }
        }
    }

    flush_unchanged(&mut segments, &mut same);
    if !removed.is_empty() || !added.is_empty() {
        segments.push(DiffSegment::new(removed, added));
    }
    segments
}

fn flush_unchanged(segments: &mut Vec<DiffSegment>, same: &mut String) {
    if !same.is_empty() {
        let text = std::mem::take(same);
        segments.push(DiffSegment::new(text.clone(), text));
    }
}

fn lcs_table(a: &[char], b: &[char]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 0..a.len() {
        for j in 0..b.len() {
            if a[i] == b[j] {
                table[i + 1][j + 1] = table[i][j] + 1;
            } else {
                table[i + 1][j + 1] = table[i + 1][j].max(table[i][j + 1]);
            }
        }
    }
    table
}

/// 从 (m, n) 回溯；平局时先消耗汉字侧（插入）
fn build_ops(a: &[char], b: &[char], table: &[Vec<usize>]) -> Vec<DiffOp> {
    let mut ops = Vec::with_capacity(a.len() + b.len());
    let mut i = a.len();
    let mut j = b.len();
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            ops.push(DiffOp::Equal);
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i][j - 1] >= table[i - 1][j]) {
            ops.push(DiffOp::Insert);
            j -= 1;
        } else {
            ops.push(DiffOp::Delete);
            i -= 1;
        }
    }
    ops.reverse();
    ops
}

/// 快速 diff（用于超长文本）
///
/// 只比较首尾相同部分，中间视为一个变化片段
fn quick_diff(a: &[char], b: &[char]) -> Vec<DiffSegment> {
    let prefix_len = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    let suffix_len = a[prefix_len..]
        .iter()
        .rev()
        .zip(b[prefix_len..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let a_end = a.len() - suffix_len;
    let b_end = b.len() - suffix_len;

    let mut segments = Vec::new();
    if prefix_len > 0 {
        let prefix: String = a[..prefix_len].iter().collect();
        segments.push(DiffSegment::new(prefix.clone(), prefix));
    }
    if prefix_len < a_end || prefix_len < b_end {
        segments.push(DiffSegment::new(
            a[prefix_len..a_end].iter().collect::<String>(),
            b[prefix_len..b_end].iter().collect::<String>(),
        ));
    }
    if suffix_len > 0 {
        let suffix: String = a[a_end..].iter().collect();
        segments.push(DiffSegment::new(suffix.clone(), suffix));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn concat(segments: &[DiffSegment]) -> (String, String) {
        let phonetic = segments.iter().map(|s| s.phonetic.as_str()).collect();
        let logographic = segments.iter().map(|s| s.logographic.as_str()).collect();
        (phonetic, logographic)
    }

    #[test]
    fn test_empty() {
        assert!(diff("", "").is_empty());
    }

    #[test]
    fn test_identical() {
        let segments = diff("げんき", "げんき");
        assert_eq!(segments, vec![DiffSegment::new("げんき", "げんき")]);
        assert!(mappings(&segments).is_empty());
    }

    #[test]
    fn test_kanji_replacement() {
        let segments = diff("つぎはどこへいく", "次は何処へ行く");
        let found = mappings(&segments);
        assert!(found.contains(&DiffSegment::new("どこ", "何処")));
        assert_eq!(
            concat(&segments),
            ("つぎはどこへいく".to_string(), "次は何処へ行く".to_string())
        );
    }

    #[test]
    fn test_pure_insertion_not_mapping() {
        let segments = diff("げんき", "げんき！");
        assert_eq!(
            segments,
            vec![DiffSegment::new("げんき", "げんき"), DiffSegment::new("", "！")]
        );
        assert!(mappings(&segments).is_empty());
    }

    #[test]
    fn test_apply_mappings_in_order() {
        let maps = vec![DiffSegment::new("げんき", "元気"), DiffSegment::new("どこ", "何処")];
        let (line, applied) = apply_mappings("{00}げんき？\\nどこへ？", &maps);
        assert_eq!(line, "{00}元気？\\n何処へ？");
        assert_eq!(applied, 2);
    }

    #[test]
    fn test_apply_mappings_cursor() {
        // 第二条映射只在第一次替换之后查找
        let maps = vec![DiffSegment::new("いく", "行く"), DiffSegment::new("あ", "亜")];
        let (line, applied) = apply_mappings("あいくあ", &maps);
        assert_eq!(line, "あ行く亜");
        assert_eq!(applied, 2);
    }

    #[test]
    fn test_apply_mappings_skips_missing() {
        let maps = vec![DiffSegment::new("なし", "無し"), DiffSegment::new("げんき", "元気")];
        let (line, applied) = apply_mappings("げんき", &maps);
        assert_eq!(line, "元気");
        assert_eq!(applied, 1);
    }

    #[test]
    fn test_apply_mappings_from_offset() {
        let maps = vec![DiffSegment::new("はな", "花"), DiffSegment::new("みる", "見る")];
        let line = "はな「はなをみる」";
        let (output, applied) = apply_mappings_from(line, &maps, "はな「".len());
        assert_eq!(output, "はな「花を見る」");
        assert_eq!(applied, 2);

        // 非字符边界时从头查找
        let (output, _) = apply_mappings_from(line, &maps, 1);
        assert_eq!(output, "花「はなを見る」");
    }

    #[test]
    fn test_quick_diff_long_text() {
        let body = "あ".repeat(MAX_CHARS);
        let a = format!("{}かな{}", body, body);
        let b = format!("{}漢字{}", body, body);
        let segments = diff(&a, &b);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1], DiffSegment::new("かな", "漢字"));
        assert_eq!(concat(&segments), (a, b));
    }

    proptest! {
        #[test]
        fn prop_halves_reassemble(a in "[あいうかき漢字]{0,16}", b in "[あいうかき漢字]{0,16}") {
            let segments = diff(&a, &b);
            let (phonetic, logographic) = concat(&segments);
            prop_assert_eq!(phonetic, a);
            prop_assert_eq!(logographic, b);
        }
    }
}
