//! Stream framer: tags outbound audio chunks with their utterance
//! position.
//!
//! For N chunks the emitted markers are: N = 1 → a single LAST frame;
//! N > 1 → FIRST, then N-2 MIDDLE, then LAST. Exactly one frame is
//! emitted per chunk, in input order. Pacing between emissions is the
//! driver's concern, never the framer's.

use std::iter::Peekable;

use crate::wire::FrameState;

/// One chunk of outbound audio tagged with its position in the
/// utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Correlation id, stable for the whole utterance.
    pub request_id: String,
    /// Position marker.
    pub state: FrameState,
    /// Raw audio payload (already transport-encoded).
    pub payload: Vec<u8>,
}

/// Lazy iterator adapter turning audio chunks into tagged
/// [`AudioFrame`]s.
///
/// The adapter peeks one chunk ahead to decide whether the current chunk
/// is the last, so a single-chunk input yields one frame marked LAST and
/// never two frames for one chunk.
pub struct FrameTagger<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    chunks: Peekable<I>,
    request_id: String,
    started: bool,
}

impl<I> FrameTagger<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    /// Creates a tagger for one utterance.
    pub fn new(request_id: impl Into<String>, chunks: I) -> Self {
        Self {
            chunks: chunks.peekable(),
            request_id: request_id.into(),
            started: false,
        }
    }
}

impl<I> Iterator for FrameTagger<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    type Item = AudioFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let payload = self.chunks.next()?;
        let is_last = self.chunks.peek().is_none();

        let state = if is_last {
            FrameState::Last
        } else if !self.started {
            FrameState::First
        } else {
            FrameState::Middle
        };
        self.started = true;

        Some(AudioFrame {
            request_id: self.request_id.clone(),
            state,
            payload,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

/// Convenience constructor over an owned chunk list.
pub fn tag_chunks(
    request_id: impl Into<String>,
    chunks: Vec<Vec<u8>>,
) -> FrameTagger<std::vec::IntoIter<Vec<u8>>> {
    FrameTagger::new(request_id, chunks.into_iter())
}
