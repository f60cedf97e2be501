//! Guard against byte-indexed string slicing in the source tree.
//!
//! Redaction and log truncation handle arbitrary upstream text, so a literal
//! range like `body[..200]` or `key[6..]` can panic on a UTF-8 boundary.
//! Only numeric literal ranges are flagged; `&buf[..n]` is left alone.

use anyhow::Context;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

fn collect_sources(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read_dir failed: {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sources(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
    Ok(())
}

#[test]
fn no_literal_range_string_slices() -> anyhow::Result<()> {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let patterns = [
        Regex::new(r"\[\s*\d*\s*\.\.=?\s*\d+\s*\]")?,
        Regex::new(r"\[\s*\d+\s*\.\.\s*\]")?,
    ];

    let mut files = Vec::new();
    collect_sources(&src_dir, &mut files)?;

    let mut offenders = Vec::new();
    for path in files {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for (i, line) in text.lines().enumerate() {
            if patterns.iter().any(|re| re.is_match(line)) {
                offenders.push(format!("{}:{}: {}", path.display(), i + 1, line.trim()));
            }
        }
    }

    anyhow::ensure!(
        offenders.is_empty(),
        "literal-range slices found (use char-aware helpers instead):\n{}",
        offenders.join("\n")
    );
    Ok(())
}
