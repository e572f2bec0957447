use crate::blocks::{
  BULLET_ITEM,
  Block,
  CHECK_ITEM,
  CODE_BLOCK,
  HEADING,
  NUMBERED_ITEM,
  NoteContent,
  QUOTE,
  decode_note_content
};

/// Child indentation is capped at this many spaces per level.
pub const MAX_INDENT: usize = 16;

/// Read-only view of a note's content.
///
/// Rendering is a pure mapping from the stored string to text lines; nothing
/// is written back.
#[derive(Debug, Clone)]
pub struct NoteRenderer {
  indent: usize
}

impl Default for NoteRenderer {
  fn default() -> Self {
    Self { indent: 2 }
  }
}

impl NoteRenderer {
  #[must_use]
  pub fn with_indent(indent: usize) -> Self {
    Self {
      indent: indent.min(MAX_INDENT)
    }
  }

  /// Empty content yields no lines at all.
  #[must_use]
  pub fn render(
    &self,
    content: &str
  ) -> Vec<String> {
    self.render_content(&decode_note_content(
      content
    ))
  }

  #[must_use]
  pub fn render_content(
    &self,
    content: &NoteContent
  ) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(blocks) =
      content.initial_blocks()
    {
      self.render_level(blocks, 0, &mut lines);
    }
    lines
  }

  fn render_level(
    &self,
    blocks: &[Block],
    depth: usize,
    lines: &mut Vec<String>
  ) {
    let pad =
      " ".repeat(self.indent.saturating_mul(depth));
    let mut number = 0_usize;

    for block in blocks {
      if block.kind == NUMBERED_ITEM {
        number += 1;
      } else {
        number = 0;
      }

      let text = block.text();
      match block.kind.as_str() {
        | HEADING => {
          let level = block
            .prop("level")
            .and_then(|v| v.as_u64())
            .unwrap_or(1)
            .clamp(1, 6) as usize;
          lines.push(format!(
            "{pad}{} {text}",
            "#".repeat(level)
          ));
        }
        | BULLET_ITEM => {
          lines.push(format!("{pad}• {text}"));
        }
        | NUMBERED_ITEM => {
          lines
            .push(format!("{pad}{number}. {text}"));
        }
        | CHECK_ITEM => {
          let checked = block
            .prop("checked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
          let mark =
            if checked { "x" } else { " " };
          lines.push(format!(
            "{pad}[{mark}] {text}"
          ));
        }
        | CODE_BLOCK => {
          for code_line in text.lines() {
            lines.push(format!(
              "{pad}    {code_line}"
            ));
          }
        }
        | QUOTE => {
          for quote_line in text.lines() {
            lines.push(format!(
              "{pad}> {quote_line}"
            ));
          }
        }
        | "image" | "video" | "audio"
        | "file" => {
          let target = block
            .prop("url")
            .and_then(|v| v.as_str())
            .or_else(|| {
              block
                .prop("name")
                .and_then(|v| v.as_str())
            })
            .unwrap_or_default();
          lines.push(format!(
            "{pad}[{}: {target}]",
            block.kind
          ));
        }
        | _ => {
          if text.is_empty() {
            lines.push(pad.clone());
          } else {
            for text_line in text.lines() {
              lines.push(format!(
                "{pad}{text_line}"
              ));
            }
          }
        }
      }

      self.render_level(
        block.children(),
        depth + 1,
        lines
      );
    }
  }
}
