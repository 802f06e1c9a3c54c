//! 编辑距离相似度
//!
//! 长度与编辑距离都按 `char`（Unicode 标量值）计算。

/// Levenshtein 编辑距离（插入、删除、替换各计 1）
///
/// 只保留一行 DP 状态，行宽取较短字符串的长度 + 1。
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    levenshtein_chars(&a, &b)
}

fn levenshtein_chars(a: &[char], b: &[char]) -> usize {
    // 短的一方作为列
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return long.len();
    }

    let mut row: Vec<usize> = (0..=short.len()).collect();

    for (i, lc) in long.iter().enumerate() {
        // diag 保存 row[j - 1] 被覆盖前的值，即上一行的左上角
        let mut diag = row[0];
        row[0] = i + 1;

        for (j, sc) in short.iter().enumerate() {
            let cost = if lc == sc { 0 } else { 1 };
            let next = (row[j + 1] + 1)
                .min(row[j] + 1)
                .min(diag + cost);
            diag = row[j + 1];
            row[j + 1] = next;
        }
    }

    row[short.len()]
}

/// 归一化相似度：`1 - distance / max_len`，范围 [0, 1]
///
/// 两个空串视为完全相同（1.0），空串与非空串为 0.0。
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }

    let distance = levenshtein_chars(&a, &b);
    // (max - d) / max 而不是 1 - d / max，使 9/10 精确落在 0.9 上
    (max_len - distance) as f64 / max_len as f64
}
