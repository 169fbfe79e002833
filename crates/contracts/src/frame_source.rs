//! FrameSource trait - transport abstraction
//!
//! The radio stack, synthetic generators and recorded traces all hand frames
//! to ingestion through the same callback interface.

use std::sync::Arc;

use crate::RawFrame;

/// Frame callback type
///
/// Invoked from the source's own thread or task for every received frame.
pub type FrameCallback = Arc<dyn Fn(RawFrame) + Send + Sync>;

/// Frame source trait
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn FrameSource> = open_source();
/// source.listen(Arc::new(|frame| {
///     println!("frame from {}", frame.device_id);
/// }));
/// // ... run ...
/// source.stop();
/// ```
pub trait FrameSource: Send + Sync {
    /// Source identifier (for logs)
    fn source_id(&self) -> &str;

    /// Start delivering frames to `callback`.
    ///
    /// Repeated calls while already listening are ignored.
    fn listen(&self, callback: FrameCallback);

    /// Stop delivering frames.
    fn stop(&self);

    fn is_listening(&self) -> bool;
}
