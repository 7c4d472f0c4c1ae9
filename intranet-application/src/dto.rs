use serde::Serialize;

/// 数据传输对象（DTO）
///
/// 跨越服务边界返回给调用方的只读载体（视图、故障详情等），
/// 与领域模型解耦，避免将领域对象直接暴露到接口层。
pub trait Dto: Serialize + Send + Sync + 'static {}
