//! 更新请求上下文
//!
//! 封装"我正在处理哪个课程的第几次请求"这一信息

use std::fmt::Display;

/// 更新请求上下文
#[derive(Debug, Clone)]
pub struct UpdateCtx {
    /// 课程ID
    pub lesson_id: String,

    /// 本次会话中的请求序号（从1开始，仅用于日志显示）
    pub request_index: usize,

    /// 用户的原始请求
    pub request: String,
}

impl UpdateCtx {
    pub fn new(lesson_id: impl Into<String>, request_index: usize, request: impl Into<String>) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            request_index,
            request: request.into(),
        }
    }
}

impl Display for UpdateCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[课程 {} 请求#{}]", self.lesson_id, self.request_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = UpdateCtx::new("lp-7", 2, "add 5 practice problems");
        assert_eq!(ctx.to_string(), "[课程 lp-7 请求#2]");
    }
}
