//! TaskParams trait - task_type とパラメータ型の対応付け
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Parameters of one task type.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ResizeImage {
///     path: String,
///     width: u32,
/// }
///
/// impl TaskParams for ResizeImage {
///     const TYPE: &'static str = "resize_image";
/// }
/// ```
pub trait TaskParams: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}
