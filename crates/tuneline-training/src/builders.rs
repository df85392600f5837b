use crate::dataset::{ConversationExample, Dataset};
use crate::error::{TrainingError, TrainingResult};
use std::path::Path;

/// Render examples as JSONL, one `{"messages": [...]}` object per line.
pub fn to_jsonl_string(examples: &[ConversationExample]) -> TrainingResult<String> {
    let mut out = String::new();
    for ex in examples {
        out.push_str(&serde_json::to_string(ex)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn write_jsonl_dataset(path: &Path, examples: &[ConversationExample]) -> TrainingResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_jsonl_string(examples)?)?;
    Ok(())
}

pub fn parse_jsonl_dataset(contents: &str) -> TrainingResult<Dataset> {
    let mut dataset = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let ex: ConversationExample = serde_json::from_str(line).map_err(|e| {
            TrainingError::Dataset(format!("failed to parse jsonl line {}: {}", idx + 1, e))
        })?;
        dataset.push(ex);
    }

    Ok(dataset)
}

pub fn read_jsonl_dataset(path: &Path) -> TrainingResult<Dataset> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TrainingError::DataLoad(format!("cannot read dataset '{}': {e}", path.display()))
    })?;
    parse_jsonl_dataset(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_jsonl_file_lines_are_conversations() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("train.jsonl");
        let examples = vec![
            ConversationExample::new("Hello there", "There hello"),
            ConversationExample::new("Bye", "Eyb"),
        ];
        write_jsonl_dataset(&path, &examples).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.starts_with(r#"{"messages":[{"role":"user""#));

        let back = read_jsonl_dataset(&path).unwrap();
        assert_eq!(back, examples);
    }

    #[test]
    fn test_parse_skips_blank_lines_and_reports_bad_line() {
        let line = to_jsonl_string(&[ConversationExample::new("a", "b")]).unwrap();
        let ok = format!("\n{line}\n\n");
        assert_eq!(parse_jsonl_dataset(&ok).unwrap().len(), 1);

        let err = parse_jsonl_dataset("{\"messages\": 3}\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
