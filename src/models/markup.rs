//! 结构化标记解析
//!
//! 宽松解析 HTML 子集：块级标签成为节点，其余标签作为行内标记原样保留。
//! 解析永不失败：未闭合标签在输入结束时闭合，多余的闭合标签被忽略。

use std::sync::LazyLock;

use regex::Regex;

use crate::models::document::{Document, Node, Tag};

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid attribute regex")
});

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        raw: String,
        self_closing: bool,
    },
    Close {
        name: String,
        raw: String,
    },
    Text(String),
}

/// 解析结构化标记为文档
pub fn parse(source: &str) -> Document {
    let mut state = ParseState::default();
    for token in tokenize(source) {
        state.process(token);
    }
    state.finalize()
}

// ---------------------------------------------------------------------------
// 解析状态
// ---------------------------------------------------------------------------

/// 正在构建的块级节点
struct Frame {
    node: Node,
    /// 出现在子块之后的行内内容，按出现位置收拢成段落
    trailing: String,
}

impl Frame {
    fn new(node: Node) -> Self {
        Self {
            node,
            trailing: String::new(),
        }
    }

    fn flush_trailing(&mut self) {
        let trailing = std::mem::take(&mut self.trailing);
        let trimmed = trailing.trim();
        if !trimmed.is_empty() {
            self.node
                .children
                .push(Node::new(Tag::Paragraph).with_inline(trimmed));
        }
    }
}

#[derive(Default)]
struct ParseState {
    /// 栈顶为当前作用域
    stack: Vec<Frame>,
    /// 已完成的顶层节点
    top: Vec<Node>,
    /// 顶层散落的行内内容，遇到块级标签时收拢成段落
    loose: String,
}

impl ParseState {
    fn process(&mut self, token: Token) {
        match token {
            Token::Text(text) => self.push_inline(&text),
            Token::Open {
                name,
                attrs,
                raw,
                self_closing,
            } => match Tag::from_name(&name) {
                Some(tag) => self.open_block(tag, attrs, self_closing),
                None => self.push_inline(&raw),
            },
            Token::Close { name, raw } => match Tag::from_name(&name) {
                Some(tag) => self.close_block(&tag),
                None => self.push_inline(&raw),
            },
        }
    }

    fn push_inline(&mut self, markup: &str) {
        match self.stack.last_mut() {
            Some(frame) if frame.node.children.is_empty() => frame.node.inline.push_str(markup),
            Some(frame) => frame.trailing.push_str(markup),
            None => self.loose.push_str(markup),
        }
    }

    fn open_block(&mut self, tag: Tag, attrs: Vec<(String, String)>, self_closing: bool) {
        // <p> 和 <li> 遇到同级开标签时隐式闭合
        if matches!(tag, Tag::Paragraph | Tag::ListItem)
            && self.stack.last().map(|f| &f.node.tag) == Some(&tag)
        {
            self.pop();
        }
        match self.stack.last_mut() {
            Some(frame) => frame.flush_trailing(),
            None => self.flush_loose(),
        }
        let mut node = Node::new(tag);
        node.attrs = attrs;
        if node.tag.is_void() || self_closing {
            self.attach(node);
        } else {
            self.stack.push(Frame::new(node));
        }
    }

    fn close_block(&mut self, tag: &Tag) {
        let Some(depth) = self.stack.iter().rposition(|f| &f.node.tag == tag) else {
            return;
        };
        while self.stack.len() > depth {
            self.pop();
        }
    }

    fn pop(&mut self) {
        if let Some(mut frame) = self.stack.pop() {
            frame.flush_trailing();
            let mut node = frame.node;
            node.inline = node.inline.trim().to_string();
            self.attach(node);
        }
    }

    fn attach(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.node.children.push(node),
            None => self.top.push(node),
        }
    }

    fn flush_loose(&mut self) {
        let loose = std::mem::take(&mut self.loose);
        let trimmed = loose.trim();
        if !trimmed.is_empty() {
            self.top.push(Node::new(Tag::Paragraph).with_inline(trimmed));
        }
    }

    fn finalize(mut self) -> Document {
        while !self.stack.is_empty() {
            self.pop();
        }
        self.flush_loose();
        Document::new(self.top)
    }
}

// ---------------------------------------------------------------------------
// 词法分析
// ---------------------------------------------------------------------------

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            push_text(&mut tokens, rest);
            break;
        };
        push_text(&mut tokens, &rest[..lt]);
        rest = &rest[lt..];

        // 注释和声明直接跳过
        if rest.starts_with("<!--") {
            rest = match rest.find("-->") {
                Some(end) => &rest[end + 3..],
                None => "",
            };
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            rest = match rest.find('>') {
                Some(end) => &rest[end + 1..],
                None => "",
            };
            continue;
        }

        let looks_like_tag = rest[1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/');
        let Some(gt) = rest.find('>').filter(|_| looks_like_tag) else {
            // 不是标签的 '<' 按文本处理
            push_text(&mut tokens, "&lt;");
            rest = &rest[1..];
            continue;
        };

        let raw = &rest[..=gt];
        tokens.push(parse_tag(raw));
        rest = &rest[gt + 1..];
    }

    tokens
}

fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    match tokens.last_mut() {
        Some(Token::Text(prev)) => prev.push_str(text),
        _ => tokens.push(Token::Text(text.to_string())),
    }
}

fn parse_tag(raw: &str) -> Token {
    let inner = raw[1..raw.len() - 1].trim();
    if let Some(name) = inner.strip_prefix('/') {
        return Token::Close {
            name: name.trim().to_ascii_lowercase(),
            raw: raw.to_string(),
        };
    }

    let self_closing = inner.ends_with('/');
    let inner = inner.trim_end_matches('/');
    let (name, attr_src) = match inner.find(char::is_whitespace) {
        Some(idx) => (&inner[..idx], &inner[idx..]),
        None => (inner, ""),
    };

    let attrs = ATTR_RE
        .captures_iter(attr_src)
        .map(|caps| {
            let key = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_attr(m.as_str()))
                .unwrap_or_default();
            (key, value)
        })
        .collect();

    Token::Open {
        name: name.to_ascii_lowercase(),
        attrs,
        raw: raw.to_string(),
        self_closing,
    }
}

fn decode_attr(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_lesson() {
        let doc = parse(
            "<h1>Fractions</h1>\n<h2>Lesson Objectives</h2>\n<ul><li>Add <strong>like</strong> fractions</li><li>Compare</li></ul>",
        );
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.nodes[0].tag, Tag::Heading(1));
        assert_eq!(doc.nodes[0].text(), "Fractions");
        let list = &doc.nodes[2];
        assert_eq!(list.tag, Tag::UnorderedList);
        assert_eq!(list.children.len(), 2);
        assert_eq!(list.children[0].inline, "Add <strong>like</strong> fractions");
        assert_eq!(list.children[0].text(), "Add like fractions");
    }

    #[test]
    fn test_serialize_reparse_is_stable() {
        let source = r#"<h2>Practice Problems</h2>
<div data-problem-item="true"><p>What is 1/2 + 1/4?</p><div data-solution="true" style="background: #f5f5f5;"><p><strong>Solution:</strong></p><ol><li>Rewrite</li></ol><p><strong>Answer:</strong> 3/4</p></div></div>
<hr>
<p>Done &amp; dusted</p>"#;
        let doc = parse(source);
        let serialized = doc.to_markup();
        assert_eq!(parse(&serialized), doc);
        assert_eq!(parse(&serialized).to_markup(), serialized);
    }

    #[test]
    fn test_attributes() {
        let doc = parse(r#"<div data-problem-item="true" class='card' hidden data-x=1></div>"#);
        let node = &doc.nodes[0];
        assert_eq!(node.attr("data-problem-item"), Some("true"));
        assert_eq!(node.attr("class"), Some("card"));
        assert_eq!(node.attr("hidden"), Some(""));
        assert_eq!(node.attr("data-x"), Some("1"));
    }

    #[test]
    fn test_loose_text_becomes_paragraph() {
        let doc = parse("Here is the plan\n<h2>Notes</h2>trailing <em>text</em>");
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.nodes[0].tag, Tag::Paragraph);
        assert_eq!(doc.nodes[0].text(), "Here is the plan");
        assert_eq!(doc.nodes[2].inline, "trailing <em>text</em>");
    }

    #[test]
    fn test_unclosed_and_stray_tags() {
        let doc = parse("<ol><li>one<li>two</ol></div><p>after");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.nodes[0].children.len(), 2);
        assert_eq!(doc.nodes[0].children[1].text(), "two");
        assert_eq!(doc.nodes[1].text(), "after");
    }

    #[test]
    fn test_comments_and_lone_angle_brackets() {
        let doc = parse("<!-- generated --><p>x < 3</p>");
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.nodes[0].text(), "x < 3");
    }

    #[test]
    fn test_nested_list_in_item() {
        let doc = parse("<ul><li>Parent<ul><li>Child</li></ul></li></ul>");
        let parent = &doc.nodes[0].children[0];
        assert_eq!(parent.text(), "Parent");
        assert_eq!(parent.children[0].children[0].text(), "Child");
    }

    #[test]
    fn test_text_after_child_block_keeps_its_position() {
        let doc = parse("<div><p>Intro</p>Then <em>try</em> this<p>Last</p></div>");
        let div = &doc.nodes[0];
        assert_eq!(div.inline, "");
        assert_eq!(div.children.len(), 3);
        assert_eq!(div.children[1].tag, Tag::Paragraph);
        assert_eq!(div.children[1].inline, "Then <em>try</em> this");
        assert_eq!(div.deep_text(), "Intro Then try this Last");

        let serialized = doc.to_markup();
        assert_eq!(
            serialized,
            "<div><p>Intro</p><p>Then <em>try</em> this</p><p>Last</p></div>"
        );
        assert_eq!(parse(&serialized), doc);
    }

    #[test]
    fn test_text_after_nested_list_stays_after_it() {
        let doc = parse("<li>Parent<ul><li>Child</li></ul>tail</li>");
        let item = &doc.nodes[0];
        assert_eq!(item.inline, "Parent");
        assert_eq!(item.children[0].tag, Tag::UnorderedList);
        assert_eq!(item.children[1].text(), "tail");
        assert_eq!(
            doc.to_markup(),
            "<li>Parent<ul><li>Child</li></ul><p>tail</p></li>"
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("   \n ").is_empty());
    }
}
