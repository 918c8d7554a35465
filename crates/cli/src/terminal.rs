use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use repoctx_tool_runtime::{ModelPart, PathDictionary, Turn};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const USER_PROMPT: Color = Color::Green;
    const ASSISTANT_TEXT: Color = Color::Cyan;
    const TOOL_CALL: Color = Color::Yellow;
    const TOOL_RESULT: Color = Color::DarkGreen;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
}

/// Longest tool result shown in a transcript before it is cut.
const RESULT_PREVIEW_CHARS: usize = 400;

/// Styled stdout/stderr output for the `repoctx` binary.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// The final answer of a run, or a generated artifact.
    pub fn print_answer(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Print(text), Print("\n"))?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::DIM),
            Print(msg),
            Print("\n"),
            ResetColor,
        )?;
        Ok(())
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::ERROR),
            Print("error: "),
            ResetColor,
            Print(msg),
            Print("\n"),
        )?;
        Ok(())
    }

    /// Tree followed by the id -> path table.
    pub fn print_scan(&self, tree: &str, paths: &PathDictionary) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Print(tree), Print("\n"))?;
        for (id, path) in paths {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print(format!("[{id}] ")),
                ResetColor,
                Print(path.display()),
                Print("\n"),
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Every turn of a finished run, on stderr so stdout stays the answer.
    pub fn print_transcript(&self, turns: &[Turn]) -> Result<()> {
        let mut stderr = io::stderr();
        for turn in turns {
            match turn {
                Turn::User(text) => execute!(
                    stderr,
                    SetForegroundColor(Colors::USER_PROMPT),
                    Print("user> "),
                    ResetColor,
                    Print(text),
                    Print("\n"),
                )?,
                Turn::Model(model_turn) => {
                    for part in &model_turn.parts {
                        match part {
                            ModelPart::Text(text) => execute!(
                                stderr,
                                SetForegroundColor(Colors::ASSISTANT_TEXT),
                                Print("model> "),
                                Print(text),
                                ResetColor,
                                Print("\n"),
                            )?,
                            ModelPart::ToolCall(call) => execute!(
                                stderr,
                                SetForegroundColor(Colors::TOOL_CALL),
                                Print(format!("[tool: {}] ", call.name)),
                                ResetColor,
                                Print(call.input.to_string()),
                                Print("\n"),
                            )?,
                        }
                    }
                }
                Turn::ToolResult(result) => {
                    let color = if result.is_error {
                        Colors::ERROR
                    } else {
                        Colors::TOOL_RESULT
                    };
                    execute!(
                        stderr,
                        SetForegroundColor(color),
                        Print(format!("[result: {}] ", result.name)),
                        ResetColor,
                        SetForegroundColor(Colors::DIM),
                        Print(preview(&result.content)),
                        ResetColor,
                        Print("\n"),
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= RESULT_PREVIEW_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(RESULT_PREVIEW_CHARS).collect();
    format!("{cut}...")
}
