//! Incremental assembly of the streamed review.
//!
//! The completion arrives as a sequence of [`Fragment`]s. Each fragment
//! that carries text is appended to the review and produces a
//! [`Snapshot`] of the full text so far, so a consumer can redraw the
//! whole document on every update instead of patching it. When the
//! fragments end a final, terminal snapshot is emitted with the same text
//! as the last one.
//!
//! Fragments with no text (role-only deltas, the closing finish-reason
//! delta) never produce a snapshot.

use crate::error::StreamError;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// One incremental piece of the completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

impl Fragment {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: None,
        }
    }

    pub fn finished(reason: impl Into<String>) -> Self {
        Self {
            content: None,
            finish_reason: Some(reason.into()),
        }
    }

    /// The text carried by this fragment, if any. Empty strings count as none.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }
}

impl From<&str> for Fragment {
    fn from(content: &str) -> Self {
        Fragment::text(content)
    }
}

/// The review as it stood after a fragment was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Full review text so far.
    pub text: String,
    /// Number of text-bearing fragments appended.
    pub fragments: usize,
    /// Set only on the final snapshot, after the stream ended cleanly.
    pub terminal: bool,
    pub finish_reason: Option<String>,
}

/// The stream failed after it had started. `partial` is what was assembled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("review interrupted after {fragments} fragment(s): {error}")]
pub struct Interrupted {
    pub partial: String,
    pub fragments: usize,
    #[source]
    pub error: StreamError,
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, StreamError>> + Send>>;
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Snapshot, Interrupted>> + Send>>;

/// Accumulates fragments into the growing review.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    review: String,
    fragments: usize,
    finish_reason: Option<String>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text assembled so far.
    pub fn text(&self) -> &str {
        &self.review
    }

    /// Number of text-bearing fragments appended so far.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Append a fragment without taking a snapshot. Returns whether it
    /// carried text.
    pub fn push(&mut self, fragment: Fragment) -> bool {
        if let Some(reason) = fragment.finish_reason.as_ref() {
            self.finish_reason = Some(reason.clone());
        }
        match fragment.content() {
            Some(content) => {
                self.review.push_str(content);
                self.fragments += 1;
                true
            }
            None => false,
        }
    }

    /// Append a fragment. Returns a snapshot only if it carried text.
    pub fn accept(&mut self, fragment: Fragment) -> Option<Snapshot> {
        self.push(fragment).then(|| self.snapshot())
    }

    /// The stream ended cleanly.
    pub fn finish(self) -> Snapshot {
        Snapshot {
            text: self.review,
            fragments: self.fragments,
            terminal: true,
            finish_reason: self.finish_reason,
        }
    }

    /// The stream failed; hand back what was assembled.
    pub fn interrupt(self, error: StreamError) -> Interrupted {
        Interrupted {
            partial: self.review,
            fragments: self.fragments,
            error,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            text: self.review.clone(),
            fragments: self.fragments,
            terminal: false,
            finish_reason: self.finish_reason.clone(),
        }
    }
}

/// Turn a fragment stream into a snapshot stream.
///
/// Yields one snapshot per text-bearing fragment, then a terminal snapshot
/// when the fragments end. A fragment error yields a single
/// `Err(Interrupted)` carrying the partial review, after which the stream
/// ends.
pub fn assemble<S>(fragments: S) -> SnapshotStream
where
    S: Stream<Item = Result<Fragment, StreamError>> + Send + 'static,
{
    let state = Some((Box::pin(fragments), StreamAssembler::new()));
    Box::pin(stream::unfold(state, |state| async move {
        let (mut fragments, mut assembler) = state?;
        loop {
            match fragments.next().await {
                Some(Ok(fragment)) => {
                    if let Some(snapshot) = assembler.accept(fragment) {
                        return Some((Ok(snapshot), Some((fragments, assembler))));
                    }
                }
                Some(Err(error)) => return Some((Err(assembler.interrupt(error)), None)),
                None => return Some((Ok(assembler.finish()), None)),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(content: &str) -> Result<Fragment, StreamError> {
        Ok(Fragment::text(content))
    }

    #[test]
    fn accept_skips_empty_fragments() {
        let mut a = StreamAssembler::new();
        assert!(a.accept(Fragment::text("")).is_none());
        assert!(a.accept(Fragment::default()).is_none());
        let snap = a.accept(Fragment::text("Hi")).unwrap();
        assert_eq!(snap.text, "Hi");
        assert_eq!(snap.fragments, 1);
        assert!(!snap.terminal);
    }

    #[test]
    fn push_appends_without_snapshots() {
        let mut a = StreamAssembler::new();
        assert!(a.push(Fragment::text("# Back")));
        assert!(!a.push(Fragment::default()));
        assert!(a.push(Fragment::text("ground")));
        assert!(!a.push(Fragment::finished("length")));
        assert_eq!(a.fragments(), 2);
        let last = a.finish();
        assert_eq!(last.text, "# Background");
        assert_eq!(last.finish_reason.as_deref(), Some("length"));
        assert!(last.terminal);
    }

    #[test]
    fn finish_reason_is_carried_to_terminal_snapshot() {
        let mut a = StreamAssembler::new();
        a.accept(Fragment::text("Done."));
        assert!(a.accept(Fragment::finished("stop")).is_none());
        let last = a.finish();
        assert!(last.terminal);
        assert_eq!(last.text, "Done.");
        assert_eq!(last.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn snapshots_are_cumulative() {
        let fragments = stream::iter(vec![ok("# Back"), ok("ground\n"), ok(""), ok("Text.")]);
        let snapshots: Vec<Snapshot> = assemble(fragments)
            .map(|s| s.unwrap())
            .collect()
            .await;
        let texts: Vec<&str> = snapshots.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["# Back", "# Background\n", "# Background\nText.", "# Background\nText."]
        );
        assert!(snapshots[..3].iter().all(|s| !s.terminal));
        assert!(snapshots[3].terminal);
    }

    #[test]
    fn replaying_fragments_is_deterministic() {
        let script = || stream::iter(vec![ok("(Piegl, "), ok(""), ok("1991)")]);
        let first: Vec<_> = tokio_test::block_on(assemble(script()).collect::<Vec<_>>());
        let second: Vec<_> = tokio_test::block_on(assemble(script()).collect::<Vec<_>>());
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[2].as_ref().unwrap().text, "(Piegl, 1991)");
    }

    #[tokio::test]
    async fn empty_stream_yields_one_empty_terminal_snapshot() {
        let snapshots: Vec<_> = assemble(stream::empty::<Result<Fragment, StreamError>>())
            .collect()
            .await;
        assert_eq!(snapshots.len(), 1);
        let last = snapshots[0].as_ref().unwrap();
        assert!(last.terminal);
        assert_eq!(last.text, "");
    }

    #[tokio::test]
    async fn error_keeps_partial_and_ends_stream() {
        let fragments = stream::iter(vec![
            ok("Partial "),
            ok("review"),
            Err(StreamError::Interrupted("reset by peer".into())),
            ok("never seen"),
        ]);
        let items: Vec<_> = assemble(fragments).collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_ref().unwrap().text, "Partial review");
        let err = items[2].as_ref().unwrap_err();
        assert_eq!(err.partial, "Partial review");
        assert_eq!(err.fragments, 2);
        assert!(matches!(err.error, StreamError::Interrupted(_)));
    }
}
