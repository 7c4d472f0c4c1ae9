use std::any::{Any, TypeId};
use std::fmt;

/// 应用层命令（Command）
///
/// 表达“意图”的写操作请求，通常会修改领域状态，如记账、删除账户、更新联系人。
/// - 仅由运行时类型标识，自身不携带行为；
/// - 可注册多个处理器（扇出），也可注册一个带返回值的主处理器。
///
/// 关联常量：
/// - `NAME`：命令的稳定名称，用于日志、错误信息与服务故障文本。避免依赖 `type_name::<T>()`。
pub trait Command: Send + Sync + 'static {
    /// 命令的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;
}

/// 类型擦除后的命令视图
///
/// 调用方只持有 `Box<dyn DynCommand>` 时（如批量发布的异构列表），
/// 总线据此取得命令的实际类型再路由，而不是依赖静态声明的类型。
pub trait DynCommand: Send + Sync + 'static {
    fn command_name(&self) -> &'static str;
    fn command_type_id(&self) -> TypeId;
    fn as_any(&self) -> &(dyn Any + Send + Sync + 'static);
    fn as_any_mut(&mut self) -> &mut (dyn Any + Send + Sync + 'static);
}

impl<C: Command> DynCommand for C {
    fn command_name(&self) -> &'static str {
        C::NAME
    }

    fn command_type_id(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync + 'static) {
        self
    }

    fn as_any_mut(&mut self) -> &mut (dyn Any + Send + Sync + 'static) {
        self
    }
}

impl fmt::Debug for dyn DynCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynCommand").field(&self.command_name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CloseAccount {
        number: String,
    }

    impl Command for CloseAccount {
        const NAME: &'static str = "CloseAccount";
    }

    #[test]
    fn boxed_command_reports_concrete_type() {
        let mut boxed: Box<dyn DynCommand> = Box::new(CloseAccount {
            number: "1010".into(),
        });

        assert_eq!(boxed.command_name(), "CloseAccount");
        assert_eq!(boxed.command_type_id(), TypeId::of::<CloseAccount>());
        assert_eq!(format!("{boxed:?}"), "DynCommand(\"CloseAccount\")");

        let cmd = boxed.as_any_mut().downcast_mut::<CloseAccount>().unwrap();
        cmd.number.push_str("-closed");
        let cmd = boxed.as_any().downcast_ref::<CloseAccount>().unwrap();
        assert_eq!(cmd.number, "1010-closed");
    }
}
