//! Derived artifacts built from a repository context file: a unit-test suite
//! for one source file, or the same source file with documentation added.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::provider::{LlmError, LlmProvider, Message};

/// Upper bound on generated output.
const MAX_OUTPUT_TOKENS: u32 = 32_768;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("the model returned no content")]
    EmptyResponse,
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// What to ask the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    UnitTests,
    Comments,
}

/// Generates artifacts with a plain-completion provider at temperature 0.
pub struct ArtifactGenerator<P> {
    provider: P,
}

impl<P: LlmProvider> ArtifactGenerator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// A pytest suite for `source_file`, guided by the context file.
    pub async fn unit_tests(
        &self,
        context_file: impl AsRef<Path>,
        source_file: impl AsRef<Path>,
    ) -> Result<String, ArtifactError> {
        self.generate(ArtifactKind::UnitTests, context_file.as_ref(), source_file.as_ref())
            .await
    }

    /// `source_file` rewritten with module, function and inline comments.
    pub async fn comments(
        &self,
        context_file: impl AsRef<Path>,
        source_file: impl AsRef<Path>,
    ) -> Result<String, ArtifactError> {
        self.generate(ArtifactKind::Comments, context_file.as_ref(), source_file.as_ref())
            .await
    }

    pub async fn generate(
        &self,
        kind: ArtifactKind,
        context_file: &Path,
        source_file: &Path,
    ) -> Result<String, ArtifactError> {
        let source = read(source_file).await?;
        let context = read(context_file).await?;

        let prompt = match kind {
            ArtifactKind::UnitTests => unit_test_prompt(&context, source_file, &source),
            ArtifactKind::Comments => comment_prompt(&context, &source),
        };

        info!(kind = ?kind, source = %source_file.display(), "requesting artifact");
        let raw = self
            .provider
            .complete(vec![Message::user(prompt)], 0.0, MAX_OUTPUT_TOKENS)
            .await?;

        let code = strip_code_fence(&raw);
        if code.is_empty() {
            return Err(ArtifactError::EmptyResponse);
        }
        Ok(code.to_string())
    }
}

async fn read(path: &Path) -> Result<String, ArtifactError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn unit_test_prompt(context: &str, source_path: &Path, source: &str) -> String {
    format!(
        r#"You are an expert developer who writes high-quality, robust unit tests in Python with the pytest framework.

Generate a complete suite of unit tests for the Python code below.

**Project context:**
{context}

**Python code to test:**
```python
# File: {path}
{source}
```

**Instructions:**
1. Cover every function, method and class in the code.
2. Include typical use cases, edge cases (zero, empty inputs, large numbers) and error conditions.
3. Structure the tests with pytest.
4. Use pytest fixtures (`@pytest.fixture`) for shared setup and test data.
5. Give each test function or fixture a short comment stating its purpose.
6. Output a single, complete Python module containing only the test code.
7. Do not repeat the code under test.
8. Keep mocking to a minimum; only include tests that pass.
9. Output raw code, not wrapped in Markdown backticks."#,
        path = source_path.display(),
    )
}

fn comment_prompt(context: &str, source: &str) -> String {
    format!(
        r#"**Context:**
{context}

**Python code to comment:**
```python
{source}
```

**Task:**
Following the context, add comprehensive and clear comments to the Python code above:
1. A module-level docstring explaining the purpose of the file.
2. Function and class docstrings in a standard format (e.g. Google style).
3. Inline comments for complex or non-obvious lines.

Return only the fully commented Python code, without explanations or Markdown formatting."#
    )
}

/// The body of the first fenced code block, or the trimmed text when there
/// is no fence. An unterminated fence runs to the end of the text.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_tick = &trimmed[start + 3..];
    // Skip the language tag on the opening line.
    let content_start = after_tick.find('\n').map_or(after_tick.len(), |n| n + 1);
    let body = &after_tick[content_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Vec<Message>, f32)>>>;

    struct CannedProvider {
        reply: Result<String, ()>,
        seen: Seen,
    }

    impl CannedProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: Seen::default(),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                seen: Seen::default(),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(
            &self,
            messages: Vec<Message>,
            temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push((messages, temperature));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(LlmError::NetworkError("connection refused".into())),
            }
        }
    }

    fn fixture() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let context = dir.path().join("combined_project_code.txt");
        let source = dir.path().join("calc.py");
        std::fs::write(&context, "---Arborescence of the project---\nproj/\n").unwrap();
        std::fs::write(&source, "def add(a, b):\n    return a + b\n").unwrap();
        (dir, context, source)
    }

    #[test]
    fn strip_fence_variants() {
        assert_eq!(strip_code_fence("```python\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fence("Here you go:\n```\ny = 2\n```\nEnjoy"), "y = 2");
        assert_eq!(strip_code_fence("  z = 3  \n"), "z = 3");
        assert_eq!(strip_code_fence("```python\nw = 4\n"), "w = 4");
        assert_eq!(strip_code_fence("```python"), "");
    }

    #[tokio::test]
    async fn unit_tests_builds_prompt_and_strips_fence() {
        let (_dir, context, source) = fixture();
        let provider = CannedProvider::replying("```python\ndef test_add():\n    assert add(1, 2) == 3\n```");
        let seen = provider.seen.clone();
        let generator = ArtifactGenerator::new(provider);

        let code = generator.unit_tests(&context, &source).await.unwrap();
        assert_eq!(code, "def test_add():\n    assert add(1, 2) == 3");

        let seen = seen.lock().unwrap();
        let (messages, temperature) = &seen[0];
        assert_eq!(*temperature, 0.0);
        assert!(messages[0].content.contains("pytest"));
        assert!(messages[0].content.contains("def add(a, b):"));
        assert!(messages[0].content.contains("Arborescence"));
        assert!(messages[0].content.contains("calc.py"));
    }

    #[tokio::test]
    async fn comments_uses_comment_prompt() {
        let (_dir, context, source) = fixture();
        let provider = CannedProvider::replying("\"\"\"Calculator.\"\"\"\ndef add(a, b):\n    return a + b");
        let seen = provider.seen.clone();
        let generator = ArtifactGenerator::new(provider);

        let code = generator.comments(&context, &source).await.unwrap();
        assert!(code.starts_with("\"\"\"Calculator."));

        let seen = seen.lock().unwrap();
        assert!(seen[0].0[0].content.contains("module-level docstring"));
    }

    #[tokio::test]
    async fn missing_source_is_read_error() {
        let (dir, context, _source) = fixture();
        let provider = CannedProvider::replying("unused");
        let seen = provider.seen.clone();
        let generator = ArtifactGenerator::new(provider);

        let missing = dir.path().join("nope.py");
        let err = generator.unit_tests(&context, &missing).await.unwrap_err();
        match err {
            ArtifactError::Read { path, .. } => assert_eq!(path, missing),
            other => panic!("expected Read, got {other:?}"),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_rejected() {
        let (_dir, context, source) = fixture();
        let provider = CannedProvider::replying("```\n```");
        let generator = ArtifactGenerator::new(provider);

        let err = generator.comments(&context, &source).await.unwrap_err();
        assert!(matches!(err, ArtifactError::EmptyResponse));
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let (_dir, context, source) = fixture();
        let provider = CannedProvider::failing();
        let generator = ArtifactGenerator::new(provider);

        let err = generator.unit_tests(&context, &source).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Llm(LlmError::NetworkError(_))));
    }
}
