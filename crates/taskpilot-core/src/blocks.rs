//! Rich-text note content.
//!
//! A note's `content` string holds either a JSON array of editor blocks or,
//! for notes written before blocks existed, plain text. Every read tries the
//! block format first and falls back to wrapping the whole string in one
//! paragraph. The fallback is for display only and is never written back.

use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize
};
use serde_json::{
  Value,
  json
};
use tracing::trace;

pub const PARAGRAPH: &str = "paragraph";
pub const HEADING: &str = "heading";
pub const BULLET_ITEM: &str =
  "bulletListItem";
pub const NUMBERED_ITEM: &str =
  "numberedListItem";
pub const CHECK_ITEM: &str =
  "checkListItem";
pub const CODE_BLOCK: &str = "codeBlock";
pub const QUOTE: &str = "quote";

/// One editor block. Only the fields the renderer reads are typed; the rest
/// is carried through untouched.
#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq,
)]
pub struct Block {
  #[serde(rename = "type")]
  pub kind:     String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub props:    Option<Value>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub content:  Option<Value>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub children: Option<Vec<Block>>,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl Block {
  /// Paragraph with string content, the shape used for legacy plain text.
  pub fn paragraph(text: &str) -> Self {
    Self::with_content(
      PARAGRAPH,
      None,
      Value::String(text.to_string())
    )
  }

  fn with_content(
    kind: &str,
    props: Option<Value>,
    content: Value
  ) -> Self {
    Self {
      kind: kind.to_string(),
      props,
      content: Some(content),
      children: None,
      extra: BTreeMap::new()
    }
  }

  fn inline(
    kind: &str,
    props: Option<Value>,
    text: &str
  ) -> Self {
    Self::with_content(
      kind,
      props,
      json!([
        { "type": "text", "text": text, "styles": {} }
      ])
    )
  }

  #[must_use]
  pub fn prop(
    &self,
    key: &str
  ) -> Option<&Value> {
    self.props.as_ref()?.get(key)
  }

  #[must_use]
  pub fn children(&self) -> &[Block] {
    self.children.as_deref().unwrap_or(&[])
  }

  /// Plain text of this block's own inline content, children excluded.
  #[must_use]
  pub fn text(&self) -> String {
    let mut out = String::new();
    if let Some(content) = &self.content {
      collect_inline_text(content, &mut out);
    }
    out
  }
}

fn collect_inline_text(
  value: &Value,
  out: &mut String
) {
  match value {
    | Value::String(s) => out.push_str(s),
    | Value::Array(items) => {
      for item in items {
        collect_inline_text(item, out);
      }
    }
    | Value::Object(map) => {
      if let Some(Value::String(text)) =
        map.get("text")
      {
        out.push_str(text);
      } else if let Some(inner) =
        map.get("content")
      {
        collect_inline_text(inner, out);
      }
    }
    | _ => {}
  }
}

/// Decoded form of a note's stored content.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteContent {
  /// Empty stored string: the editor starts from its default document.
  Empty,
  /// Stored string was a block array.
  Blocks(Vec<Block>),
  /// Stored string was plain text, wrapped as a single paragraph.
  Legacy(Vec<Block>)
}

impl NoteContent {
  /// Blocks to seed the editor with; `None` means "no initial content".
  #[must_use]
  pub fn initial_blocks(
    &self
  ) -> Option<&[Block]> {
    match self {
      | Self::Empty => None,
      | Self::Blocks(blocks)
      | Self::Legacy(blocks) => {
        Some(blocks)
      }
    }
  }

  #[must_use]
  pub fn is_legacy(&self) -> bool {
    matches!(self, Self::Legacy(_))
  }

  /// Concatenated text of every block, one line per block, children
  /// included.
  #[must_use]
  pub fn plain_text(&self) -> String {
    let mut lines = Vec::new();
    if let Some(blocks) = self.initial_blocks()
    {
      collect_lines(blocks, &mut lines);
    }
    lines.join("\n")
  }
}

fn collect_lines(
  blocks: &[Block],
  lines: &mut Vec<String>
) {
  for block in blocks {
    lines.push(block.text());
    collect_lines(block.children(), lines);
  }
}

/// Decodes a stored note content string.
///
/// Never fails: anything that is not a JSON array of block objects,
/// including JSON of another shape, is shown as one plain paragraph holding
/// the original string.
#[must_use]
pub fn decode_note_content(
  content: &str
) -> NoteContent {
  if content.is_empty() {
    return NoteContent::Empty;
  }

  match serde_json::from_str::<Vec<Block>>(
    content
  ) {
    | Ok(blocks) => {
      NoteContent::Blocks(blocks)
    }
    | Err(err) => {
      trace!(
        error = %err,
        "note content is not a block array; treating as plain text"
      );
      NoteContent::Legacy(vec![
        Block::paragraph(content),
      ])
    }
  }
}

/// Serializes blocks into the stored block-array format.
pub fn encode_blocks(
  blocks: &[Block]
) -> anyhow::Result<String> {
  Ok(serde_json::to_string(blocks)?)
}

/// Builds blocks from lightly marked-up text typed on the command line.
///
/// One block per non-blank line: `#`, `##` and `###` prefixes make headings,
/// `- ` and `* ` bullets, `1. ` numbered items, `[ ] ` and `[x] ` check
/// items. Everything else becomes a paragraph.
#[must_use]
pub fn blocks_from_text(
  text: &str
) -> Vec<Block> {
  text
    .lines()
    .filter(|line| !line.trim().is_empty())
    .map(block_from_line)
    .collect()
}

fn block_from_line(line: &str) -> Block {
  let trimmed = line.trim_end();

  for (prefix, level) in
    [("### ", 3), ("## ", 2), ("# ", 1)]
  {
    if let Some(rest) =
      trimmed.strip_prefix(prefix)
    {
      return Block::inline(
        HEADING,
        Some(json!({ "level": level })),
        rest.trim()
      );
    }
  }

  if let Some(rest) = trimmed
    .strip_prefix("- ")
    .or_else(|| trimmed.strip_prefix("* "))
  {
    return Block::inline(
      BULLET_ITEM,
      None,
      rest.trim()
    );
  }

  for (prefix, checked) in [
    ("[ ] ", false),
    ("[x] ", true),
    ("[X] ", true)
  ] {
    if let Some(rest) =
      trimmed.strip_prefix(prefix)
    {
      return Block::inline(
        CHECK_ITEM,
        Some(json!({ "checked": checked })),
        rest.trim()
      );
    }
  }

  if let Some((num, rest)) =
    trimmed.split_once(". ")
    && !num.is_empty()
    && num.chars().all(|c| c.is_ascii_digit())
  {
    return Block::inline(
      NUMBERED_ITEM,
      None,
      rest.trim()
    );
  }

  Block::inline(PARAGRAPH, None, trimmed)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::{
    Block,
    HEADING,
    NoteContent,
    blocks_from_text,
    decode_note_content,
    encode_blocks
  };

  #[test]
  fn block_json_decodes_to_blocks() {
    let decoded = decode_note_content(
      r#"[{"type":"paragraph","content":"hi"}]"#
    );
    let NoteContent::Blocks(blocks) =
      &decoded
    else {
      panic!("expected block content, got {decoded:?}");
    };
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind, "paragraph");
    assert_eq!(blocks[0].text(), "hi");
    assert!(!decoded.is_legacy());
  }

  #[test]
  fn plain_text_decodes_to_one_paragraph()
  {
    let decoded = decode_note_content("hi");
    assert_eq!(
      decoded,
      NoteContent::Legacy(vec![
        Block::paragraph("hi"),
      ])
    );
    assert_eq!(decoded.plain_text(), "hi");
  }

  #[test]
  fn empty_string_has_no_initial_content()
  {
    let decoded = decode_note_content("");
    assert_eq!(decoded, NoteContent::Empty);
    assert_eq!(decoded.initial_blocks(), None);
    assert_ne!(
      decoded,
      NoteContent::Legacy(vec![
        Block::paragraph(""),
      ])
    );
  }

  #[test]
  fn json_of_another_shape_is_plain_text() {
    for raw in [
      "42",
      "\"quoted\"",
      "{\"type\":\"paragraph\"}",
      "[1, 2]",
      "[{\"content\":\"no type\"}]"
    ] {
      let decoded = decode_note_content(raw);
      assert_eq!(
        decoded,
        NoteContent::Legacy(vec![
          Block::paragraph(raw),
        ]),
        "input {raw:?}"
      );
    }
  }

  #[test]
  fn multiline_legacy_text_stays_one_block()
  {
    let raw = "# Title\n- item\nplain";
    let decoded = decode_note_content(raw);
    let blocks = decoded
      .initial_blocks()
      .expect("blocks");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].text(), raw);
  }

  #[test]
  fn unknown_block_fields_survive_decoding()
  {
    let raw = json!([
      {
        "id": "b1",
        "type": "heading",
        "props": { "level": 2, "textColor": "default" },
        "content": [
          { "type": "text", "text": "Plan ", "styles": { "bold": true } },
          {
            "type": "link",
            "href": "https://example.com",
            "content": [{ "type": "text", "text": "here", "styles": {} }]
          }
        ],
        "children": []
      }
    ]);
    let decoded = decode_note_content(
      &raw.to_string()
    );
    let blocks = decoded
      .initial_blocks()
      .expect("blocks");
    assert_eq!(blocks[0].text(), "Plan here");
    assert_eq!(
      blocks[0].prop("level"),
      Some(&json!(2))
    );

    let encoded = encode_blocks(blocks)
      .expect("encode");
    let reparsed: serde_json::Value =
      serde_json::from_str(&encoded)
        .expect("reparse");
    assert_eq!(reparsed, raw);
  }

  #[test]
  fn text_markup_builds_blocks() {
    let blocks = blocks_from_text(
      "## Goals\n\n- ship\n[x] tests\n2. later\nfree text"
    );
    let kinds: Vec<&str> = blocks
      .iter()
      .map(|b| b.kind.as_str())
      .collect();
    assert_eq!(
      kinds,
      vec![
        HEADING,
        "bulletListItem",
        "checkListItem",
        "numberedListItem",
        "paragraph"
      ]
    );
    assert_eq!(
      blocks[0].prop("level"),
      Some(&json!(2))
    );
    assert_eq!(
      blocks[2].prop("checked"),
      Some(&json!(true))
    );
    assert_eq!(blocks[4].text(), "free text");

    let stored = encode_blocks(&blocks)
      .expect("encode");
    assert_eq!(
      decode_note_content(&stored),
      NoteContent::Blocks(blocks)
    );
  }
}
