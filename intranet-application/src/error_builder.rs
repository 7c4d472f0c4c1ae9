//! 错误重分类（ErrorBuilder）
//!
//! 处理器执行中出现的任意错误，在 `handle_exception` 中被重分类为三类内网错误之一：
//! - 已是仓储/业务/系统错误：原样返回；
//! - 来自命令处理器（有无返回值均可）：包装为系统错误，消息中注明命令（及返回）类型，
//!   原错误保留为 `source`；
//! - 其他来源：原样返回。
//!
use crate::command::Command;
use crate::error::AppError;
use intranet_domain::DomainError;
use std::any::type_name;

/// 错误产生的位置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerOrigin {
    /// 无返回值的命令处理器
    Command { command: &'static str },
    /// 带返回值的命令处理器
    CommandWithResult {
        command: &'static str,
        result: &'static str,
    },
    /// 非命令处理器（查询处理器、服务操作等）
    Other { name: &'static str },
}

impl HandlerOrigin {
    pub fn command<C: Command>() -> Self {
        Self::Command { command: C::NAME }
    }

    pub fn command_with_result<C: Command, R>() -> Self {
        Self::CommandWithResult {
            command: C::NAME,
            result: type_name::<R>(),
        }
    }
}

pub trait ErrorBuilder: Send + Sync {
    fn build(&self, error: AppError, origin: &HandlerOrigin) -> AppError;
}

/// 默认的重分类策略
#[derive(Clone, Copy, Debug, Default)]
pub struct IntranetErrorBuilder;

impl ErrorBuilder for IntranetErrorBuilder {
    fn build(&self, error: AppError, origin: &HandlerOrigin) -> AppError {
        if error.is_intranet() {
            return error;
        }

        let message = match origin {
            HandlerOrigin::Command { command } => {
                format!("error in command handler for {command}: {error}")
            }
            HandlerOrigin::CommandWithResult { command, result } => {
                format!("error in command handler for {command} returning {result}: {error}")
            }
            HandlerOrigin::Other { .. } => return error,
        };

        DomainError::system(message).with_source(error).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::error::Error;

    struct PostLine;

    impl Command for PostLine {
        const NAME: &'static str = "PostLine";
    }

    #[test]
    fn intranet_errors_pass_through_unchanged() {
        for err in [
            DomainError::repository("db down"),
            DomainError::business("period closed"),
            DomainError::system("disk full"),
        ] {
            let message = err.to_string();
            let built = IntranetErrorBuilder.build(err.into(), &HandlerOrigin::command::<PostLine>());
            assert!(built.is_intranet());
            assert_eq!(built.to_string(), message);
            assert!(built.source().is_none(), "pass-through must not wrap");
        }
    }

    #[test]
    fn command_errors_become_system_errors_naming_the_command() {
        let err: AppError = DomainError::not_supported("foreign currency").into();
        let built = IntranetErrorBuilder.build(err, &HandlerOrigin::command::<PostLine>());

        assert_eq!(built.kind(), ErrorKind::System);
        assert_eq!(
            built.to_string(),
            "error in command handler for PostLine: not supported: foreign currency"
        );
        let inner = built.source().map(ToString::to_string);
        assert_eq!(inner.as_deref(), Some("not supported: foreign currency"));
    }

    #[test]
    fn result_handlers_name_the_result_type() {
        let built = IntranetErrorBuilder.build(
            AppError::Infra("socket closed".into()),
            &HandlerOrigin::command_with_result::<PostLine, u64>(),
        );
        assert_eq!(built.kind(), ErrorKind::System);
        assert_eq!(
            built.to_string(),
            "error in command handler for PostLine returning u64: infra: socket closed"
        );
    }

    #[test]
    fn other_origins_are_left_alone() {
        let built = IntranetErrorBuilder.build(
            AppError::validation("empty"),
            &HandlerOrigin::Other { name: "GetAccount" },
        );
        assert_eq!(built.kind(), ErrorKind::Validation);
    }
}
