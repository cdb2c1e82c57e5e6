//! 翻页采集循环 - 从渲染面采样，识别目标页并按编号保存
//!
//! 核心流程：
//! 1. 采样 - 从渲染面截图
//! 2. 文字提取 - 二值化 / 反色变体分别 OCR 后拼接
//! 3. 目标判定 - 目标短语或位置标记任一命中
//! 4. 编号去重 - 单槽游标，与上次保存相同则跳过
//! 5. 保存并翻页；长时间无进展则强制翻页

pub mod clock;
pub mod controller;
pub mod deduplicator;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod frame;
pub mod preprocess;
pub mod resolver;
pub mod state_machine;
pub mod store;
pub mod surface;

pub use clock::{Clock, ManualClock, ShutdownSignal, SystemClock};
pub use controller::{CaptureController, RunOutcome};
pub use deduplicator::DedupStore;
pub use detector::{Detection, TargetDetector};
pub use error::{CaptureError, ExtractError, StoreError, SurfaceError};
pub use extractor::{
    ExtractorAdapter, MockRecognizer, RecognitionMode, TesseractRecognizer, TextRecognizer,
};
pub use frame::{CaptureFrame, FrameInfo};
pub use preprocess::{ImageVariant, VariantKind, VariantStrategy};
pub use resolver::IdentifierResolver;
pub use state_machine::{CaptureStats, ControllerEvent, ControllerState};
pub use store::{ArtifactStore, DirectoryStore};
pub use surface::{CommandSurface, RenderSurface, SurfaceConfig};
