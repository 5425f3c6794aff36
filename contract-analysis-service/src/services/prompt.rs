//! Prompt templates for contract review.

use crate::models::Lang;

/// Prompts longer than this (in characters) are cut before sending.
pub const MAX_PROMPT_CHARS: usize = 3000;

pub const TRUNCATION_MARKER: &str = "...";

fn instruction(lang: Lang) -> &'static str {
    match lang {
        Lang::Zh => "作为专业外贸律师，请分析以下合同的风险点和改进建议：",
        Lang::En => {
            "As a professional trade lawyer, please analyze risks and suggestions for this contract:"
        }
        Lang::Es => {
            "Como abogado profesional de comercio exterior, analice los riesgos y sugerencias de este contrato:"
        }
    }
}

/// Instruction for `lang`, a blank line, then the contract verbatim.
pub fn build_prompt(lang: Lang, text: &str) -> String {
    format!("{}\n\n{}", instruction(lang), text)
}

/// Keep the first [`MAX_PROMPT_CHARS`] characters and mark the cut.
pub fn truncate_prompt(prompt: String) -> String {
    match prompt.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((cut, _)) => {
            let mut truncated = prompt[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => prompt,
    }
}
