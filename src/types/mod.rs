//! 类型模块：操作键、情绪词表与语言偏好。
//!
//! # Types Module
//!
//! Small value types shared across the gateway and the typed operations.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`OperationKey`] | `<model>:<modality>:<operation>` identifier owning one breaker |
//! | [`Modality`] | Text or vision call shape |
//! | [`Emotion`] | Fixed emotion vocabulary used by every label/score field |
//! | [`Language`] | Response language preference (`en`, `hi`, `hinglish`) |

pub mod key;
pub mod vocabulary;

pub use key::{Modality, OperationKey};
pub use vocabulary::{Emotion, Language};
