//! Top-level symbol listing for Python sources.
//!
//! Line-oriented: recognises `def`, `async def` and `class` statements at
//! column zero, plus method definitions at the first indentation level of a
//! class body. Triple-quoted blocks are skipped so docstrings cannot be
//! mistaken for code.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PySymbol {
    Function(String),
    Class { name: String, methods: Vec<String> },
}

struct OpenClass {
    name: String,
    methods: Vec<String>,
    body_indent: Option<usize>,
}

impl From<OpenClass> for PySymbol {
    fn from(class: OpenClass) -> Self {
        PySymbol::Class {
            name: class.name,
            methods: class.methods,
        }
    }
}

pub(crate) fn python_symbols(source: &str) -> Vec<PySymbol> {
    let mut symbols = Vec::new();
    let mut open: Option<OpenClass> = None;
    let mut in_string: Option<&'static str> = None;

    for line in source.lines() {
        let trimmed = line.trim_start();

        if let Some(delim) = in_string {
            if trimmed.contains(delim) {
                in_string = None;
            }
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = line.len() - trimmed.len();
        in_string = opens_block_string(trimmed);

        if indent == 0 {
            if let Some(class) = open.take() {
                symbols.push(class.into());
            }
            if let Some(name) = def_name(trimmed) {
                symbols.push(PySymbol::Function(name));
            } else if let Some(name) = class_name(trimmed) {
                open = Some(OpenClass {
                    name,
                    methods: Vec::new(),
                    body_indent: None,
                });
            }
            continue;
        }

        if let Some(class) = open.as_mut() {
            let body = *class.body_indent.get_or_insert(indent);
            if indent == body {
                if let Some(name) = def_name(trimmed) {
                    class.methods.push(name);
                }
            }
        }
    }

    if let Some(class) = open {
        symbols.push(class.into());
    }
    symbols
}

/// Delimiter of a triple-quoted string left open at the end of this line.
fn opens_block_string(line: &str) -> Option<&'static str> {
    ["\"\"\"", "'''"]
        .into_iter()
        .find(|delim| line.matches(delim).count() % 2 == 1)
}

fn def_name(line: &str) -> Option<String> {
    let rest = line.strip_prefix("async ").unwrap_or(line);
    let rest = rest.strip_prefix("def ")?;
    identifier(rest)
}

fn class_name(line: &str) -> Option<String> {
    identifier(line.strip_prefix("class ")?)
}

fn identifier(rest: &str) -> Option<String> {
    let name: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}
