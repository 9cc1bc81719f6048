//! 课程文档树
//!
//! 文档是块级节点的有序树。每个节点有标签、属性、行内内容和子节点。
//! 行内内容保留原始标记（如 `<strong>`），纯文本通过 [`Node::text`] 获取。

use std::fmt;

/// 块级标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Heading(u8),
    Paragraph,
    OrderedList,
    UnorderedList,
    ListItem,
    Div,
    Section,
    Blockquote,
    Pre,
    Table,
    Rule,
}

impl Tag {
    /// 从标签名解析块级标签，行内标签返回 None
    pub fn from_name(name: &str) -> Option<Self> {
        let tag = match name.to_ascii_lowercase().as_str() {
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "p" => Tag::Paragraph,
            "ol" => Tag::OrderedList,
            "ul" => Tag::UnorderedList,
            "li" => Tag::ListItem,
            "div" => Tag::Div,
            "section" => Tag::Section,
            "blockquote" => Tag::Blockquote,
            "pre" => Tag::Pre,
            "table" => Tag::Table,
            "hr" => Tag::Rule,
            _ => return None,
        };
        Some(tag)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tag::Heading(1) => "h1",
            Tag::Heading(2) => "h2",
            Tag::Heading(3) => "h3",
            Tag::Heading(4) => "h4",
            Tag::Heading(5) => "h5",
            Tag::Heading(_) => "h6",
            Tag::Paragraph => "p",
            Tag::OrderedList => "ol",
            Tag::UnorderedList => "ul",
            Tag::ListItem => "li",
            Tag::Div => "div",
            Tag::Section => "section",
            Tag::Blockquote => "blockquote",
            Tag::Pre => "pre",
            Tag::Table => "table",
            Tag::Rule => "hr",
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Rule)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Tag::OrderedList | Tag::UnorderedList)
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Tag::Heading(level) => Some(*level),
            _ => None,
        }
    }
}

/// 文档节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: Tag,
    /// 属性，保持原始顺序
    pub attrs: Vec<(String, String)>,
    /// 行内内容（原始标记）
    pub inline: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            inline: String::new(),
            children: Vec::new(),
        }
    }

    /// 用纯文本创建节点（会转义）
    pub fn with_text(tag: Tag, text: &str) -> Self {
        Self::new(tag).with_inline(escape_text(text))
    }

    pub fn with_inline(mut self, inline: impl Into<String>) -> Self {
        self.inline = inline.into();
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn heading(level: u8, text: &str) -> Self {
        Self::with_text(Tag::Heading(level.clamp(1, 6)), text)
    }

    pub fn paragraph(text: &str) -> Self {
        Self::with_text(Tag::Paragraph, text)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.attr(name) == Some("true")
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// 行内内容的纯文本（去标签、解码常见实体、折叠空白）
    pub fn text(&self) -> String {
        plain_text(&self.inline)
    }

    /// 包括所有子孙节点在内的纯文本
    pub fn deep_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text(&self, parts: &mut Vec<String>) {
        let own = self.text();
        if !own.is_empty() {
            parts.push(own);
        }
        for child in &self.children {
            child.collect_text(parts);
        }
    }

    pub fn is_heading(&self) -> bool {
        self.tag.heading_level().is_some()
    }

    /// 深度优先查找第一个满足条件的子孙节点（包括自身）
    pub fn find(&self, predicate: &dyn Fn(&Node) -> bool) -> Option<&Node> {
        if predicate(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(predicate))
    }

    pub fn contains(&self, predicate: &dyn Fn(&Node) -> bool) -> bool {
        self.find(predicate).is_some()
    }
}

/// 课程文档
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 序列化为结构化标记
    pub fn to_markup(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.tag.name();
        write!(f, "<{}", name)?;
        for (key, value) in &self.attrs {
            write!(f, " {}=\"{}\"", key, escape_attr(value))?;
        }
        write!(f, ">")?;
        if self.tag.is_void() {
            return Ok(());
        }
        write!(f, "{}", self.inline)?;
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", name)
    }
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// 去掉行内标签，解码常见实体，折叠空白
pub fn plain_text(inline: &str) -> String {
    let mut stripped = String::with_capacity(inline.len());
    let mut tag = String::new();
    let mut in_tag = false;
    for c in inline.chars() {
        match c {
            '<' if !in_tag => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                // 换行标签视为空白
                if tag.trim_start_matches('/').to_ascii_lowercase().starts_with("br") {
                    stripped.push(' ');
                }
            }
            _ if in_tag => tag.push(c),
            _ => stripped.push(c),
        }
    }
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
