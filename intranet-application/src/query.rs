/// 应用层查询（Query）
///
/// 表达只读意图，不改变领域状态。
/// - 返回类型由调用方指定，同一查询可按不同返回类型各注册一个处理器；
/// - 与 [`Command`](crate::command::Command) 相对，`Query` 不允许扇出。
pub trait Query: Send + Sync + 'static {
    /// 查询的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;
}
